//! 审计日志查询与统计

use std::sync::Arc;

use crate::audit::{AuditFilter, AuditRecord, AuditStats};
use crate::core::{DockError, DockResult, EntityKind};
use crate::management::ListOptions;
use crate::store::{Page, Repository, SortOrder};

pub struct LogService {
    store: Arc<dyn Repository<AuditRecord>>,
}

impl LogService {
    pub fn new(store: Arc<dyn Repository<AuditRecord>>) -> Self {
        Self { store }
    }

    pub async fn list(&self, filter: &AuditFilter, options: ListOptions) -> DockResult<Vec<AuditRecord>> {
        self.store.query(filter, options.page, options.sort).await
    }

    pub async fn get(&self, id: &str) -> DockResult<AuditRecord> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DockError::not_found(EntityKind::Log, id))
    }

    /// 某个 Agent 的记录，新的在前；limit 为 None 时不限条数
    pub async fn for_agent(&self, agent_id: &str, limit: Option<usize>) -> DockResult<Vec<AuditRecord>> {
        let page = limit.map(|l| Page::new(1, l));
        self.store
            .query(&AuditFilter::for_agent(agent_id), page, SortOrder::NewestFirst)
            .await
    }

    pub async fn for_tool(&self, tool_id: &str, limit: Option<usize>) -> DockResult<Vec<AuditRecord>> {
        let page = limit.map(|l| Page::new(1, l));
        self.store
            .query(&AuditFilter::for_tool(tool_id), page, SortOrder::NewestFirst)
            .await
    }

    pub async fn delete(&self, id: &str) -> DockResult<()> {
        if !self.store.delete_by_id(id).await? {
            return Err(DockError::not_found(EntityKind::Log, id));
        }
        tracing::info!("Log deleted: {}", id);
        Ok(())
    }

    pub async fn clear(&self) -> DockResult<usize> {
        let removed = self.store.clear().await?;
        tracing::info!("Cleared all logs ({} items)", removed);
        Ok(removed)
    }

    pub async fn count(&self, filter: &AuditFilter) -> DockResult<usize> {
        self.store.count(filter).await
    }

    pub async fn stats(&self, filter: &AuditFilter) -> DockResult<AuditStats> {
        let records = self.store.query(filter, None, SortOrder::default()).await?;
        Ok(AuditStats::from_records(&records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditStatus, AuditTarget, AuditWriter};
    use crate::store::SqliteAuditStore;
    use serde_json::json;

    async fn seeded() -> (LogService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Repository<AuditRecord>> =
            Arc::new(SqliteAuditStore::open(dir.path().join("audit.db")).unwrap());
        let writer = AuditWriter::new(store.clone());

        for i in 0..3 {
            let open = writer
                .open(AuditTarget::Agent("a1".into()), "u1", "process_query", json!({ "query": i }))
                .await
                .unwrap();
            open.complete(json!({ "response": "ok" })).await.unwrap();
        }
        let open = writer
            .open(AuditTarget::Tool("t1".into()), "u1", "execute_tool_info", json!({}))
            .await
            .unwrap();
        open.fail(&DockError::DispatchFailure("boom".into())).await.unwrap();
        (LogService::new(store), dir)
    }

    #[tokio::test]
    async fn test_listing_and_stats() {
        let (logs, _dir) = seeded().await;
        assert_eq!(logs.count(&AuditFilter::default()).await.unwrap(), 4);
        assert_eq!(logs.for_agent("a1", Some(2)).await.unwrap().len(), 2);

        let tool_logs = logs.for_tool("t1", None).await.unwrap();
        assert_eq!(tool_logs.len(), 1);
        assert_eq!(tool_logs[0].status, AuditStatus::Failed);

        let stats = logs.stats(&AuditFilter::default()).await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.success_count, 3);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.success_rate, 75.0);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (logs, _dir) = seeded().await;
        let id = logs.for_tool("t1", None).await.unwrap()[0].id.clone();
        assert_eq!(logs.get(&id).await.unwrap().action, "execute_tool_info");
        logs.delete(&id).await.unwrap();
        let err = logs.delete(&id).await.unwrap_err();
        assert!(matches!(err, DockError::NotFound { kind: EntityKind::Log, .. }));
        assert_eq!(logs.get(&id).await.unwrap_err().to_string(), format!("Log with ID {id} not found"));
        assert_eq!(logs.clear().await.unwrap(), 3);
        assert_eq!(logs.count(&AuditFilter::default()).await.unwrap(), 0);
    }
}
