//! Tool 描述符管理（与 Agent 管理同形）

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::{DockError, DockResult, EntityKind};
use crate::descriptor::{AuthType, ParameterDescriptor, ToolDescriptor, ToolFilter};
use crate::dispatch::Dispatcher;
use crate::management::ListOptions;
use crate::registry::{build_tool, ProviderContext, Registry};
use crate::store::Repository;
use crate::tools::ToolOutput;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub endpoint: Option<String>,
    pub auth_type: Option<AuthType>,
    pub auth_config: Option<Map<String, Value>>,
    pub parameters: Option<Vec<ParameterDescriptor>>,
    pub config: Option<Map<String, Value>>,
}

impl ToolUpdate {
    fn apply(self, d: &mut ToolDescriptor) {
        if let Some(name) = self.name {
            d.name = name;
        }
        if let Some(description) = self.description {
            d.description = description;
        }
        if let Some(endpoint) = self.endpoint {
            d.endpoint = endpoint;
        }
        if let Some(auth_type) = self.auth_type {
            d.auth_type = auth_type;
        }
        if let Some(auth_config) = self.auth_config {
            d.auth_config = auth_config;
        }
        if let Some(parameters) = self.parameters {
            d.parameters = parameters;
        }
        if let Some(config) = self.config {
            d.config = config;
        }
        d.updated_at = Utc::now();
    }
}

pub struct ToolService {
    store: Arc<dyn Repository<ToolDescriptor>>,
    dispatcher: Arc<Dispatcher>,
    ctx: ProviderContext,
}

impl ToolService {
    pub fn new(store: Arc<dyn Repository<ToolDescriptor>>, dispatcher: Arc<Dispatcher>, ctx: ProviderContext) -> Self {
        Self { store, dispatcher, ctx }
    }

    fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    pub async fn list(&self, filter: &ToolFilter, options: ListOptions) -> DockResult<Vec<ToolDescriptor>> {
        self.store.query(filter, options.page, options.sort).await
    }

    pub async fn count(&self, filter: &ToolFilter) -> DockResult<usize> {
        self.store.count(filter).await
    }

    pub async fn get(&self, id: &str) -> DockResult<ToolDescriptor> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DockError::not_found(EntityKind::Tool, id))
    }

    pub async fn create(&self, mut descriptor: ToolDescriptor) -> DockResult<ToolDescriptor> {
        if descriptor.id.is_empty() {
            descriptor.id = uuid::Uuid::new_v4().to_string();
        }
        let live = if descriptor.is_active {
            Some(build_tool(&descriptor, &self.ctx)?)
        } else {
            None
        };
        let descriptor = self.store.create(descriptor).await?;
        if let Some(tool) = live {
            self.registry().register_tool(&descriptor.id, tool);
        }
        tracing::info!("Tool created: {}", descriptor.id);
        Ok(descriptor)
    }

    pub async fn update(&self, id: &str, update: ToolUpdate) -> DockResult<ToolDescriptor> {
        let mut next = self.get(id).await?;
        update.apply(&mut next);

        let live = if next.is_active {
            let built = build_tool(&next, &self.ctx).map_err(|e| {
                tracing::error!("Error updating tool {}: {}", id, e);
                e
            })?;
            Some(built)
        } else {
            None
        };

        let stored = next.clone();
        let saved = self
            .store
            .update(id, Box::new(move |d: &mut ToolDescriptor| *d = stored))
            .await?
            .ok_or_else(|| DockError::not_found(EntityKind::Tool, id))?;

        if let Some(tool) = live {
            if let Some(previous) = self.registry().register_tool(id, tool) {
                previous.cleanup();
            }
        }
        tracing::info!("Tool updated: {}", id);
        Ok(saved)
    }

    pub async fn delete(&self, id: &str) -> DockResult<()> {
        self.get(id).await?;
        self.registry().deregister_tool(id);
        self.store.delete_by_id(id).await?;
        tracing::info!("Tool deleted: {}", id);
        Ok(())
    }

    pub async fn activate(&self, id: &str) -> DockResult<ToolDescriptor> {
        let descriptor = self.get(id).await?;
        if let Some(previous) = self.registry().register_tool_from_descriptor(&descriptor, &self.ctx)? {
            previous.cleanup();
        }
        let saved = self.set_active(id, true).await?;
        tracing::info!("Tool registered: {}", id);
        Ok(saved)
    }

    pub async fn deactivate(&self, id: &str) -> DockResult<ToolDescriptor> {
        self.get(id).await?;
        if !self.registry().deregister_tool(id) {
            return Err(DockError::RegistrationFailed {
                kind: EntityKind::Tool,
                id: id.to_string(),
                reason: "tool is not registered".to_string(),
            });
        }
        let saved = self.set_active(id, false).await?;
        tracing::info!("Tool deregistered: {}", id);
        Ok(saved)
    }

    async fn set_active(&self, id: &str, active: bool) -> DockResult<ToolDescriptor> {
        self.store
            .update(
                id,
                Box::new(move |d: &mut ToolDescriptor| {
                    d.is_active = active;
                    d.updated_at = Utc::now();
                }),
            )
            .await?
            .ok_or_else(|| DockError::not_found(EntityKind::Tool, id))
    }

    pub async fn execute(&self, id: &str, action: &str, params: Value, user_id: &str) -> DockResult<ToolOutput> {
        let descriptor = self.get(id).await?;
        if !descriptor.is_active {
            return Err(DockError::InactiveEntity {
                kind: EntityKind::Tool,
                id: id.to_string(),
            });
        }
        self.dispatcher
            .execute_tool(id, action, params, user_id)
            .await
            .map_err(|e| {
                tracing::error!("Error executing tool {} action {}: {}", id, action, e);
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, QueryResponse};
    use crate::audit::{AuditRecord, AuditWriter};
    use crate::llm::{CompletionOptions, MockLlmClient};
    use crate::registry::ProviderKind;
    use crate::store::MemoryRepository;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct AttachRecorder {
        attached: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Agent for AttachRecorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Generic
        }

        async fn process_query(&self, _query: &str, _tool_params: &Value) -> DockResult<QueryResponse> {
            Ok(QueryResponse::direct(""))
        }

        fn attach_tool(&self, tool_id: &str, _tool: Arc<dyn Tool>) -> bool {
            self.attached.lock().unwrap().push(tool_id.to_string());
            true
        }
    }

    fn service() -> ToolService {
        let audit: Arc<dyn Repository<AuditRecord>> = Arc::new(MemoryRepository::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(Registry::new()), AuditWriter::new(audit)));
        let ctx = ProviderContext::new(Arc::new(MockLlmClient::new()), CompletionOptions::default());
        ToolService::new(Arc::new(MemoryRepository::new()), dispatcher, ctx)
    }

    #[tokio::test]
    async fn test_activation_fans_out_and_gates_execution() {
        let svc = service();
        let recorder = Arc::new(AttachRecorder::default());
        svc.registry().register_agent("a1", recorder.clone());

        let mut d = ToolDescriptor::new("t1", "webhook", "Notifier").inactive();
        d.description = "Posts notifications".into();
        svc.create(d).await.unwrap();
        assert!(recorder.attached.lock().unwrap().is_empty());
        let err = svc.execute("t1", "info", json!({}), "u1").await.unwrap_err();
        assert!(matches!(err, DockError::InactiveEntity { kind: EntityKind::Tool, .. }));

        svc.activate("t1").await.unwrap();
        assert_eq!(*recorder.attached.lock().unwrap(), vec!["t1".to_string()]);
        let out = svc.execute("t1", "info", json!({}), "u1").await.unwrap();
        assert_eq!(out.data["name"], "Notifier");

        let renamed = svc
            .update("t1", ToolUpdate { name: Some("Pager".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(renamed.name, "Pager");
        assert_eq!(svc.registry().tool("t1").unwrap().name(), "Pager");

        svc.deactivate("t1").await.unwrap();
        assert!(!svc.registry().has_tool("t1"));
        svc.delete("t1").await.unwrap();
        assert_eq!(svc.count(&ToolFilter::default()).await.unwrap(), 0);
    }
}
