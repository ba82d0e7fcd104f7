//! Agent 描述符管理

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::agents::QueryResponse;
use crate::core::{preview, DockError, DockResult, EntityKind};
use crate::descriptor::{AgentDescriptor, AgentFilter};
use crate::dispatch::Dispatcher;
use crate::management::ListOptions;
use crate::registry::{build_agent, ProviderContext, Registry};
use crate::store::Repository;

/// 可更新字段；None 表示保持不变
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub config: Option<Map<String, Value>>,
    pub tools: Option<Vec<String>>,
    pub capabilities: Option<Vec<String>>,
}

impl AgentUpdate {
    fn apply(self, d: &mut AgentDescriptor) {
        if let Some(name) = self.name {
            d.name = name;
        }
        if let Some(description) = self.description {
            d.description = description;
        }
        if let Some(config) = self.config {
            d.config = config;
        }
        if let Some(tools) = self.tools {
            d.tools = tools;
        }
        if let Some(capabilities) = self.capabilities {
            d.capabilities = capabilities;
        }
        d.updated_at = Utc::now();
    }
}

pub struct AgentService {
    store: Arc<dyn Repository<AgentDescriptor>>,
    dispatcher: Arc<Dispatcher>,
    ctx: ProviderContext,
}

impl AgentService {
    pub fn new(store: Arc<dyn Repository<AgentDescriptor>>, dispatcher: Arc<Dispatcher>, ctx: ProviderContext) -> Self {
        Self { store, dispatcher, ctx }
    }

    fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    pub async fn list(&self, filter: &AgentFilter, options: ListOptions) -> DockResult<Vec<AgentDescriptor>> {
        self.store.query(filter, options.page, options.sort).await
    }

    pub async fn count(&self, filter: &AgentFilter) -> DockResult<usize> {
        self.store.count(filter).await
    }

    pub async fn get(&self, id: &str) -> DockResult<AgentDescriptor> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DockError::not_found(EntityKind::Agent, id))
    }

    /// 保存新描述符；id 为空时生成。激活状态的描述符先构造实例，构造失败则不保存
    pub async fn create(&self, mut descriptor: AgentDescriptor) -> DockResult<AgentDescriptor> {
        if descriptor.id.is_empty() {
            descriptor.id = uuid::Uuid::new_v4().to_string();
        }
        let live = if descriptor.is_active {
            Some(build_agent(&descriptor, &self.ctx)?)
        } else {
            None
        };
        let descriptor = self.store.create(descriptor).await?;
        if let Some(agent) = live {
            self.registry().register_agent(&descriptor.id, agent);
        }
        tracing::info!("Agent created: {}", descriptor.id);
        Ok(descriptor)
    }

    /// 更新描述符；激活中的 Agent 先以新配置构造实例，成功后替换旧实例再清理旧实例
    pub async fn update(&self, id: &str, update: AgentUpdate) -> DockResult<AgentDescriptor> {
        let mut next = self.get(id).await?;
        update.apply(&mut next);

        let live = if next.is_active {
            let built = build_agent(&next, &self.ctx).map_err(|e| {
                tracing::error!("Error updating agent {}: {}", id, e);
                e
            })?;
            Some(built)
        } else {
            None
        };

        let stored = next.clone();
        let saved = self
            .store
            .update(id, Box::new(move |d: &mut AgentDescriptor| *d = stored))
            .await?
            .ok_or_else(|| DockError::not_found(EntityKind::Agent, id))?;

        if let Some(agent) = live {
            if let Some(previous) = self.registry().register_agent(id, agent) {
                previous.cleanup();
            }
        }
        tracing::info!("Agent updated: {}", id);
        Ok(saved)
    }

    pub async fn delete(&self, id: &str) -> DockResult<()> {
        self.get(id).await?;
        self.registry().deregister_agent(id);
        self.store.delete_by_id(id).await?;
        tracing::info!("Agent deleted: {}", id);
        Ok(())
    }

    /// 激活：构造并注册，然后标记为 active
    pub async fn activate(&self, id: &str) -> DockResult<AgentDescriptor> {
        let descriptor = self.get(id).await?;
        if let Some(previous) = self.registry().register_agent_from_descriptor(&descriptor, &self.ctx)? {
            previous.cleanup();
        }
        let saved = self.set_active(id, true).await?;
        tracing::info!("Agent registered: {}", id);
        Ok(saved)
    }

    /// 停用：注销活实例，然后标记为 inactive
    pub async fn deactivate(&self, id: &str) -> DockResult<AgentDescriptor> {
        self.get(id).await?;
        if !self.registry().deregister_agent(id) {
            return Err(DockError::RegistrationFailed {
                kind: EntityKind::Agent,
                id: id.to_string(),
                reason: "agent is not registered".to_string(),
            });
        }
        let saved = self.set_active(id, false).await?;
        tracing::info!("Agent deregistered: {}", id);
        Ok(saved)
    }

    async fn set_active(&self, id: &str, active: bool) -> DockResult<AgentDescriptor> {
        self.store
            .update(
                id,
                Box::new(move |d: &mut AgentDescriptor| {
                    d.is_active = active;
                    d.updated_at = Utc::now();
                }),
            )
            .await?
            .ok_or_else(|| DockError::not_found(EntityKind::Agent, id))
    }

    /// 先检查描述符存在且激活，再交给 Dispatcher
    pub async fn process_query(
        &self,
        id: &str,
        user_id: &str,
        query: &str,
        tool_params: Value,
    ) -> DockResult<QueryResponse> {
        let descriptor = self.get(id).await?;
        if !descriptor.is_active {
            return Err(DockError::InactiveEntity {
                kind: EntityKind::Agent,
                id: id.to_string(),
            });
        }
        let result = self
            .dispatcher
            .process_query(id, user_id, query, tool_params)
            .await
            .map_err(|e| {
                tracing::error!("Error processing query with agent {}: {}", id, e);
                e
            })?;
        tracing::info!("Query processed by agent {}: {}", id, preview(query, 50));
        Ok(result)
    }
}
