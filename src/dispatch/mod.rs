//! 调度核心：process_query（Agent 路径）与 execute_tool（Tool 路径）
//!
//! 两条路径形状一致：
//! 1. 在注册表中查找活实例，找不到直接返回 NotFound，不写审计
//! 2. 写入 started 审计记录（此刻开始计时）
//! 3. 执行调用；panic / 中止记为 DispatchFailure
//! 4. 成功写 completed + 输出，失败写 failed + {"error": message}，错误原样返回
//!
//! 第 2 到 4 步（以及按实体串行化的许可）都在同一个独立任务里，不受调用方取消影响。
//!
//! 每次调度另输出一行 dispatch_audit 结构化日志。

pub mod request;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};

use crate::agents::QueryResponse;
use crate::audit::{AuditTarget, AuditWriter};
use crate::core::{preview, DockError, DockResult, EntityKind};
use crate::registry::Registry;
use crate::tools::ToolOutput;

pub use request::{QueryRequest, ToolRequest};

/// 每个实体 id 同时至多一个在途调用
#[derive(Default)]
struct EntityGuards {
    locks: Mutex<HashMap<(EntityKind, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl EntityGuards {
    fn lock_for(&self, kind: EntityKind, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((kind, id.to_string()))
            .or_default()
            .clone()
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    audit: AuditWriter,
    guards: Option<Arc<EntityGuards>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, audit: AuditWriter) -> Self {
        Self {
            registry,
            audit,
            guards: None,
        }
    }

    /// 开启按实体串行化（默认关闭：同一实体的并发调用完全交错）
    pub fn serialize_per_entity(mut self, enabled: bool) -> Self {
        self.guards = enabled.then(|| Arc::new(EntityGuards::default()));
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn audit(&self) -> &AuditWriter {
        &self.audit
    }

    pub async fn process_query(
        &self,
        agent_id: &str,
        user_id: &str,
        query: &str,
        tool_params: Value,
    ) -> DockResult<QueryResponse> {
        let agent = self
            .registry
            .agent(agent_id)
            .ok_or_else(|| DockError::not_found(EntityKind::Agent, agent_id))?;
        tracing::info!("Processing query with agent {}: {}", agent_id, preview(query, 80));

        let input = json!({ "query": query, "toolParams": tool_params });
        let query = query.to_string();
        self.run(AuditTarget::Agent(agent_id.to_string()), user_id, "process_query".to_string(), input, async move {
            agent.process_query(&query, &tool_params).await
        })
        .await
    }

    pub async fn execute_tool(&self, tool_id: &str, action: &str, params: Value, user_id: &str) -> DockResult<ToolOutput> {
        let tool = self
            .registry
            .tool(tool_id)
            .ok_or_else(|| DockError::not_found(EntityKind::Tool, tool_id))?;
        tracing::info!("Executing tool {} action {}", tool_id, action);

        let input = params.clone();
        let owned_action = action.to_string();
        self.run(AuditTarget::Tool(tool_id.to_string()), user_id, format!("execute_tool_{action}"), input, async move {
            tool.execute(&owned_action, &params).await
        })
        .await
    }

    pub async fn handle_query(&self, request: QueryRequest) -> DockResult<QueryResponse> {
        let params = request.tool_params.unwrap_or_else(|| json!({}));
        self.process_query(&request.agent_id, &request.user_id, &request.query, params)
            .await
    }

    pub async fn handle_tool(&self, request: ToolRequest) -> DockResult<ToolOutput> {
        self.execute_tool(&request.tool_id, &request.action, request.params, &request.user_id)
            .await
    }

    /// 查找之后的整个生命周期（许可、审计、调用、终态）在独立任务中完成，
    /// 调用方放弃等待时该任务照常跑完，记录不会停留在 started
    async fn run<T, F>(&self, target: AuditTarget, user_id: &str, action: String, input: Value, call: F) -> DockResult<T>
    where
        T: Serialize + Send + 'static,
        F: Future<Output = DockResult<T>> + Send + 'static,
    {
        let lock = self
            .guards
            .as_ref()
            .map(|guards| guards.lock_for(target.kind(), target.id()));
        let audit = self.audit.clone();
        let user_id = user_id.to_string();

        let task = tokio::spawn(async move {
            let _permit = match lock {
                Some(lock) => Some(lock.lock_owned().await),
                None => None,
            };
            audited(audit, target, user_id, action, input, call).await
        });
        match task.await {
            Ok(result) => result,
            Err(join) => Err(DockError::DispatchFailure(join.to_string())),
        }
    }
}

async fn audited<T, F>(
    audit: AuditWriter,
    target: AuditTarget,
    user_id: String,
    action: String,
    input: Value,
    call: F,
) -> DockResult<T>
where
    T: Serialize + Send + 'static,
    F: Future<Output = DockResult<T>> + Send + 'static,
{
    let input_preview = preview(&input.to_string(), 200);
    let open = audit.open(target.clone(), &user_id, action.clone(), input).await?;
    let start = Instant::now();

    let result = match tokio::spawn(call).await {
        Ok(result) => result,
        Err(join) => Err(DockError::DispatchFailure(join.to_string())),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    let outcome = match &result {
        Ok(_) => "completed",
        Err(_) => "failed",
    };
    let line = json!({
        "event": "dispatch_audit",
        "entity": target.kind().to_string(),
        "id": target.id(),
        "user": user_id,
        "action": action,
        "status": outcome,
        "duration_ms": duration_ms,
        "input_preview": input_preview,
    });
    tracing::info!(audit = %line.to_string(), "dispatch");

    match result {
        Ok(value) => {
            let output = serde_json::to_value(&value).unwrap_or(Value::Null);
            open.complete(output).await.map_err(|e| {
                tracing::error!("Failed to close audit record for {} {}: {}", target.kind(), target.id(), e);
                e
            })?;
            Ok(value)
        }
        Err(err) => {
            if err.is_validation() {
                tracing::warn!("Dispatch to {} {} rejected: {}", target.kind(), target.id(), err);
            } else {
                tracing::error!("Dispatch to {} {} failed: {}", target.kind(), target.id(), err);
            }
            if let Err(e) = open.fail(&err).await {
                tracing::error!("Failed to close audit record for {} {}: {}", target.kind(), target.id(), e);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Agent;
    use crate::audit::{AuditFilter, AuditRecord, AuditStatus};
    use crate::registry::ProviderKind;
    use crate::store::{MemoryRepository, Repository, SortOrder};
    use crate::tools::GenericTool;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedAgent {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedAgent {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            "scripted"
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Generic
        }

        async fn process_query(&self, query: &str, _tool_params: &Value) -> DockResult<QueryResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let pause = if query == "slow" { 200 } else { 20 };
            tokio::time::sleep(Duration::from_millis(pause)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match query {
                "boom" => Err(DockError::external("Failed to generate response", "upstream down")),
                "panic" => panic!("agent crashed"),
                _ => Ok(QueryResponse::direct(format!("echo: {query}"))),
            }
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<dyn Repository<AuditRecord>>) {
        let store: Arc<dyn Repository<AuditRecord>> = Arc::new(MemoryRepository::new());
        let registry = Arc::new(Registry::new());
        (Dispatcher::new(registry, AuditWriter::new(store.clone())), store)
    }

    async fn all_records(store: &Arc<dyn Repository<AuditRecord>>) -> Vec<AuditRecord> {
        store.query(&AuditFilter::default(), None, SortOrder::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_success_and_failure_each_leave_one_terminal_record() {
        let (dispatcher, store) = dispatcher();
        dispatcher.registry().register_agent("a1", ScriptedAgent::new());

        let out = dispatcher.process_query("a1", "u1", "hello", json!({"k": 1})).await.unwrap();
        assert_eq!(out.response, "echo: hello");
        let records = all_records(&store).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AuditStatus::Completed);
        assert_eq!(records[0].input["toolParams"]["k"], 1);
        assert_eq!(records[0].output["response"], "echo: hello");
        assert!(records[0].duration >= 20);

        let err = dispatcher.process_query("a1", "u1", "boom", json!({})).await.unwrap_err();
        assert!(matches!(err, DockError::ExternalService { .. }));
        let failed = store
            .query(&AuditFilter { status: Some(AuditStatus::Failed), ..Default::default() }, None, SortOrder::default())
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].output["error"], "Failed to generate response: upstream down");
    }

    #[tokio::test]
    async fn test_unknown_entity_writes_no_audit() {
        let (dispatcher, store) = dispatcher();
        let err = dispatcher.process_query("ghost", "u1", "hello", json!({})).await.unwrap_err();
        assert!(matches!(err, DockError::NotFound { kind: EntityKind::Agent, .. }));
        let err = dispatcher.execute_tool("ghost", "info", json!({}), "u1").await.unwrap_err();
        assert_eq!(err.to_string(), "Tool with ID ghost not found");
        assert!(all_records(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_agent_is_dispatch_failure() {
        let (dispatcher, store) = dispatcher();
        dispatcher.registry().register_agent("a1", ScriptedAgent::new());
        let err = dispatcher.process_query("a1", "u1", "panic", json!({})).await.unwrap_err();
        assert!(matches!(err, DockError::DispatchFailure(_)));
        let records = all_records(&store).await;
        assert_eq!(records[0].status, AuditStatus::Failed);
    }

    #[tokio::test]
    async fn test_tool_path_records_action() {
        let (dispatcher, store) = dispatcher();
        dispatcher
            .registry()
            .register_tool("t1", Arc::new(GenericTool::new("Notifier", "notify")));
        let out = dispatcher.execute_tool("t1", "info", Value::Null, "u1").await.unwrap();
        assert!(out.success);
        let err = dispatcher.execute_tool("t1", "explode", json!({}), "u1").await.unwrap_err();
        assert!(matches!(err, DockError::ActionNotFound { .. }));

        let records = store.query(&AuditFilter::for_tool("t1"), None, SortOrder::OldestFirst).await.unwrap();
        assert_eq!(records.len(), 2);
        let info = records.iter().find(|r| r.action == "execute_tool_info").unwrap();
        assert_eq!(info.status, AuditStatus::Completed);
        let failed = records.iter().find(|r| r.action == "execute_tool_explode").unwrap();
        assert_eq!(failed.status, AuditStatus::Failed);
        assert!(failed.output["error"].as_str().unwrap().contains("explode"));
    }

    #[tokio::test]
    async fn test_serialized_dispatch_runs_one_at_a_time() {
        let (dispatcher, _store) = dispatcher();
        let dispatcher = Arc::new(dispatcher.serialize_per_entity(true));
        let agent = ScriptedAgent::new();
        dispatcher.registry().register_agent("a1", agent.clone());

        let calls = (0..4).map(|i| {
            let d = dispatcher.clone();
            tokio::spawn(async move { d.process_query("a1", "u1", &format!("q{i}"), json!({})).await })
        });
        for handle in calls.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(agent.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_caller_still_closes_record_and_holds_guard() {
        let (dispatcher, store) = dispatcher();
        let dispatcher = dispatcher.serialize_per_entity(true);
        let agent = ScriptedAgent::new();
        dispatcher.registry().register_agent("a1", agent.clone());

        let first = tokio::time::timeout(
            Duration::from_millis(50),
            dispatcher.process_query("a1", "u1", "slow", json!({})),
        )
        .await;
        assert!(first.is_err());

        // 第一个调用仍持有许可，第二个调用要等它跑完并写完终态
        let out = dispatcher.process_query("a1", "u1", "next", json!({})).await.unwrap();
        assert_eq!(out.response, "echo: next");
        assert_eq!(agent.max_in_flight.load(Ordering::SeqCst), 1);

        let records = all_records(&store).await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.status == AuditStatus::Completed));
        let slow = records.iter().find(|r| r.input["query"] == "slow").unwrap();
        assert!(slow.duration >= 200);
    }
}
