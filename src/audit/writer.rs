//! 审计写入器
//!
//! open 在调度开始时写入 started 记录并返回 OpenAudit；OpenAudit 按值消费于 complete / fail，
//! 因此每条记录至多一次终态迁移，之后不可再改。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::audit::{AuditLevel, AuditRecord, AuditStatus, AuditTarget};
use crate::core::{DockError, DockResult};
use crate::store::Repository;

#[derive(Clone)]
pub struct AuditWriter {
    store: Arc<dyn Repository<AuditRecord>>,
}

impl AuditWriter {
    pub fn new(store: Arc<dyn Repository<AuditRecord>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Repository<AuditRecord>> {
        &self.store
    }

    /// 写入 started 记录；耗时从此刻开始计
    pub async fn open(
        &self,
        target: AuditTarget,
        user_id: &str,
        action: impl Into<String>,
        input: Value,
    ) -> DockResult<OpenAudit> {
        let started = Instant::now();
        let record = AuditRecord::started(&target, user_id, action, input);
        let record = self.store.create(record).await?;
        Ok(OpenAudit {
            store: Arc::clone(&self.store),
            id: record.id,
            started,
        })
    }
}

/// 已打开、尚未终结的审计记录
pub struct OpenAudit {
    store: Arc<dyn Repository<AuditRecord>>,
    id: String,
    started: Instant,
}

impl OpenAudit {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn complete(self, output: Value) -> DockResult<AuditRecord> {
        self.finish(AuditStatus::Completed, AuditLevel::Info, output).await
    }

    /// 失败终态：output 为 {"error": message}
    pub async fn fail(self, error: &DockError) -> DockResult<AuditRecord> {
        let output = serde_json::json!({ "error": error.to_string() });
        self.finish(AuditStatus::Failed, AuditLevel::Error, output).await
    }

    async fn finish(self, status: AuditStatus, level: AuditLevel, output: Value) -> DockResult<AuditRecord> {
        let duration = self.started.elapsed().as_millis() as u64;
        self.store
            .update(
                &self.id,
                Box::new(move |r: &mut AuditRecord| {
                    r.status = status;
                    r.level = level;
                    r.output = output;
                    r.duration = duration;
                }),
            )
            .await?
            .ok_or_else(|| DockError::Persistence(format!("audit record {} disappeared before completion", self.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::store::{MemoryRepository, SortOrder};

    #[tokio::test]
    async fn test_open_then_fail() {
        let store: Arc<dyn Repository<AuditRecord>> = Arc::new(MemoryRepository::new());
        let writer = AuditWriter::new(Arc::clone(&store));

        let open = writer
            .open(AuditTarget::Agent("a1".into()), "u1", "process_query", serde_json::json!({"query": "hi"}))
            .await
            .unwrap();
        let stored = store.find_by_id(open.id()).await.unwrap().unwrap();
        assert_eq!(stored.status, AuditStatus::Started);

        let err = DockError::external("Failed to generate response", "boom");
        let record = open.fail(&err).await.unwrap();
        assert_eq!(record.status, AuditStatus::Failed);
        assert_eq!(record.level, AuditLevel::Error);
        assert_eq!(record.output["error"], "Failed to generate response: boom");

        let all = store.query(&AuditFilter::default(), None, SortOrder::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
