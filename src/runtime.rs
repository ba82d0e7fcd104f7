//! 运行时装配：配置 -> 仓库 / 注册表 / Dispatcher / 管理服务，并载入激活中的描述符
//!
//! 注册表与 Dispatcher 都是显式构造后注入的实例，不存在进程级单例。

use std::sync::Arc;

use crate::audit::{AuditRecord, AuditWriter};
use crate::config::AppConfig;
use crate::core::{DockError, DockResult, EntityKind};
use crate::descriptor::{AgentDescriptor, AgentFilter, DescriptorSeed, ToolDescriptor, ToolFilter};
use crate::dispatch::Dispatcher;
use crate::management::{AgentService, LogService, ToolService};
use crate::registry::{ProviderContext, Registry};
use crate::store::{MemoryRepository, Repository, SortOrder, SqliteAuditStore};

/// 启动载入结果：单个描述符失败不会中断整体载入
#[derive(Debug, Default)]
pub struct LoadReport {
    pub agents_loaded: usize,
    pub tools_loaded: usize,
    pub failures: Vec<LoadFailure>,
}

#[derive(Debug)]
pub struct LoadFailure {
    pub kind: EntityKind,
    pub id: String,
    pub reason: String,
}

pub struct AgentDock {
    pub registry: Arc<Registry>,
    pub dispatcher: Arc<Dispatcher>,
    pub agents: AgentService,
    pub tools: ToolService,
    pub logs: LogService,
    ctx: ProviderContext,
    agent_store: Arc<dyn Repository<AgentDescriptor>>,
    tool_store: Arc<dyn Repository<ToolDescriptor>>,
}

/// 装配所需的协作方
pub struct DockParts {
    pub ctx: ProviderContext,
    pub agent_store: Arc<dyn Repository<AgentDescriptor>>,
    pub tool_store: Arc<dyn Repository<ToolDescriptor>>,
    pub audit_store: Arc<dyn Repository<AuditRecord>>,
    pub serialize_per_entity: bool,
}

impl AgentDock {
    pub fn assemble(parts: DockParts) -> Self {
        let registry = Arc::new(Registry::new());
        let dispatcher = Arc::new(
            Dispatcher::new(registry.clone(), AuditWriter::new(parts.audit_store.clone()))
                .serialize_per_entity(parts.serialize_per_entity),
        );
        Self {
            agents: AgentService::new(parts.agent_store.clone(), dispatcher.clone(), parts.ctx.clone()),
            tools: ToolService::new(parts.tool_store.clone(), dispatcher.clone(), parts.ctx.clone()),
            logs: LogService::new(parts.audit_store),
            registry,
            dispatcher,
            ctx: parts.ctx,
            agent_store: parts.agent_store,
            tool_store: parts.tool_store,
        }
    }

    /// 按配置装配：种子描述符进内存仓库，审计记录进 SQLite（未配置时在内存）
    pub fn from_config(cfg: &AppConfig) -> DockResult<Self> {
        let seed = match &cfg.app.descriptors_path {
            Some(path) => {
                let seed = DescriptorSeed::load(path)
                    .map_err(|e| DockError::ConfigError(format!("{}: {}", path.display(), e)))?;
                tracing::info!(
                    "Loaded {} agent and {} tool descriptor(s) from {}",
                    seed.agents.len(),
                    seed.tools.len(),
                    path.display()
                );
                seed
            }
            None => DescriptorSeed::default(),
        };

        let audit_store: Arc<dyn Repository<AuditRecord>> = match &cfg.app.audit_db {
            Some(path) => Arc::new(SqliteAuditStore::open(path)?),
            None => Arc::new(MemoryRepository::new()),
        };

        Ok(Self::assemble(DockParts {
            ctx: ProviderContext::from_config(cfg),
            agent_store: Arc::new(MemoryRepository::with_records(seed.agents)),
            tool_store: Arc::new(MemoryRepository::with_records(seed.tools)),
            audit_store,
            serialize_per_entity: cfg.dispatch.serialize_per_entity,
        }))
    }

    /// 注册所有激活中的描述符：先 Tool 后 Agent，这样 Agent 注册时就能挂上已有 Tool
    pub async fn load_active(&self) -> DockResult<LoadReport> {
        let mut report = LoadReport::default();

        let tools = self
            .tool_store
            .query(&ToolFilter { is_active: Some(true), ..Default::default() }, None, SortOrder::OldestFirst)
            .await?;
        for descriptor in &tools {
            match self.registry.register_tool_from_descriptor(descriptor, &self.ctx) {
                Ok(_) => report.tools_loaded += 1,
                Err(e) => {
                    tracing::error!("Failed to load and register tool {}: {}", descriptor.name, e);
                    report.failures.push(LoadFailure {
                        kind: EntityKind::Tool,
                        id: descriptor.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let agents = self
            .agent_store
            .query(&AgentFilter { is_active: Some(true), ..Default::default() }, None, SortOrder::OldestFirst)
            .await?;
        for descriptor in &agents {
            match self.registry.register_agent_from_descriptor(descriptor, &self.ctx) {
                Ok(_) => report.agents_loaded += 1,
                Err(e) => {
                    tracing::error!("Failed to load and register agent {}: {}", descriptor.name, e);
                    report.failures.push(LoadFailure {
                        kind: EntityKind::Agent,
                        id: descriptor.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Loaded {} agent(s) and {} tool(s), {} failure(s)",
            report.agents_loaded,
            report.tools_loaded,
            report.failures.len()
        );
        Ok(report)
    }

    /// 注销全部活实例（触发各自的 cleanup）
    pub fn shutdown(&self) {
        for id in self.registry.agent_ids() {
            self.registry.deregister_agent(&id);
        }
        for id in self.registry.tool_ids() {
            self.registry.deregister_tool(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionOptions, MockLlmClient};
    use serde_json::json;

    #[tokio::test]
    async fn test_load_active_continues_past_failures() {
        let agents = vec![
            AgentDescriptor::new("a1", "custom", "Helper"),
            // slack 缺少 token，构造失败
            AgentDescriptor::new("a2", "slack", "Broken"),
            AgentDescriptor::new("a3", "custom", "Sleeper").inactive(),
        ];
        let tools = vec![ToolDescriptor::new("t1", "webhook", "Notifier")];
        let dock = AgentDock::assemble(DockParts {
            ctx: ProviderContext::new(Arc::new(MockLlmClient::with_reply("hi")), CompletionOptions::default()),
            agent_store: Arc::new(MemoryRepository::with_records(agents)),
            tool_store: Arc::new(MemoryRepository::with_records(tools)),
            audit_store: Arc::new(MemoryRepository::new()),
            serialize_per_entity: false,
        });

        let report = dock.load_active().await.unwrap();
        assert_eq!(report.agents_loaded, 1);
        assert_eq!(report.tools_loaded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "a2");
        assert_eq!(dock.registry.agent_ids(), vec!["a1".to_string()]);

        let out = dock.agents.process_query("a1", "u1", "hello", json!({})).await.unwrap();
        assert_eq!(out.response, "hi");

        dock.shutdown();
        assert!(dock.registry.agent_ids().is_empty());
        assert!(dock.registry.tool_ids().is_empty());
    }

    #[test]
    fn test_from_config_reads_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("descriptors.toml");
        std::fs::write(&seed, "[[agents]]\nid = \"a1\"\ntype = \"custom\"\nname = \"Helper\"\n").unwrap();

        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        cfg.app.descriptors_path = Some(seed);
        cfg.app.audit_db = Some(dir.path().join("data").join("audit.db"));
        assert!(AgentDock::from_config(&cfg).is_ok());

        cfg.app.descriptors_path = Some(dir.path().join("missing.toml"));
        assert!(matches!(AgentDock::from_config(&cfg), Err(DockError::ConfigError(_))));
    }
}
