//! 注册表：id -> 活实例（Agent / Tool 各一张表）与生命周期事件
//!
//! - 查找是同步的，不跨 await 持锁
//! - 同 id 重复注册直接替换并返回旧实例，旧实例的 cleanup 由调用方负责
//! - 注销先把实例移出表，再在锁外调用 cleanup
//! - Tool 注册后逐个提交给当前所有 Agent 挂载；Agent 注册时也会拿到已有的 Tool

pub mod resolver;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::agents::Agent;
use crate::core::{DockResult, EntityKind};
use crate::descriptor::{AgentDescriptor, ToolDescriptor};
use crate::tools::Tool;

pub use resolver::{build_agent, build_tool, ProviderContext, ProviderKind};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleChange {
    Registered,
    Replaced,
    Deregistered,
}

/// 注册表广播的生命周期事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub kind: EntityKind,
    pub id: String,
    pub change: LifecycleChange,
}

pub struct Registry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            agents: RwLock::new(HashMap::new()),
            tools: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    fn emit(&self, kind: EntityKind, id: &str, change: LifecycleChange) {
        // 没有订阅者时 send 返回 Err，忽略即可
        let _ = self.events.send(LifecycleEvent {
            kind,
            id: id.to_string(),
            change,
        });
    }

    // ---- agents ----

    /// 注册（或替换）Agent；返回被替换的旧实例
    pub fn register_agent(&self, id: &str, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        for (tool_id, tool) in self.tool_entries() {
            agent.attach_tool(&tool_id, tool);
        }
        let previous = self
            .agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), agent);
        if previous.is_some() {
            tracing::warn!("Agent with ID {} already exists, replacing", id);
            self.emit(EntityKind::Agent, id, LifecycleChange::Replaced);
        } else {
            self.emit(EntityKind::Agent, id, LifecycleChange::Registered);
        }
        previous
    }

    /// 注销 Agent：不存在时返回 false 且不改变任何状态
    pub fn deregister_agent(&self, id: &str) -> bool {
        let removed = self
            .agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            None => {
                tracing::warn!("Agent with ID {} not found, cannot deregister", id);
                false
            }
            Some(agent) => {
                agent.cleanup();
                self.emit(EntityKind::Agent, id, LifecycleChange::Deregistered);
                true
            }
        }
    }

    /// 描述符 -> 活实例 -> 注册；构造失败时注册表不变
    pub fn register_agent_from_descriptor(
        &self,
        descriptor: &AgentDescriptor,
        ctx: &ProviderContext,
    ) -> DockResult<Option<Arc<dyn Agent>>> {
        let agent = build_agent(descriptor, ctx)?;
        let previous = self.register_agent(&descriptor.id, agent);
        tracing::info!("Agent {} ({}) registered successfully", descriptor.name, descriptor.kind);
        Ok(previous)
    }

    pub fn agent(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn has_agent(&self, id: &str) -> bool {
        self.agents.read().unwrap_or_else(PoisonError::into_inner).contains_key(id)
    }

    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn agent_entries(&self) -> Vec<Arc<dyn Agent>> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    // ---- tools ----

    /// 注册（或替换）Tool，并提交给当前所有 Agent 挂载（每个 Agent 一次）
    pub fn register_tool(&self, id: &str, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let previous = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), tool.clone());
        if previous.is_some() {
            tracing::warn!("Tool with ID {} already exists, replacing", id);
            self.emit(EntityKind::Tool, id, LifecycleChange::Replaced);
        } else {
            self.emit(EntityKind::Tool, id, LifecycleChange::Registered);
        }

        let attached = self
            .agent_entries()
            .into_iter()
            .filter(|agent| agent.attach_tool(id, tool.clone()))
            .count();
        tracing::debug!("Tool {} attached to {} agent(s)", id, attached);
        previous
    }

    /// 注销 Tool：cleanup 后从所有 Agent 上卸下
    pub fn deregister_tool(&self, id: &str) -> bool {
        let removed = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            None => {
                tracing::warn!("Tool with ID {} not found, cannot deregister", id);
                false
            }
            Some(tool) => {
                tool.cleanup();
                for agent in self.agent_entries() {
                    agent.detach_tool(id);
                }
                self.emit(EntityKind::Tool, id, LifecycleChange::Deregistered);
                true
            }
        }
    }

    pub fn register_tool_from_descriptor(
        &self,
        descriptor: &ToolDescriptor,
        ctx: &ProviderContext,
    ) -> DockResult<Option<Arc<dyn Tool>>> {
        let tool = build_tool(descriptor, ctx)?;
        let previous = self.register_tool(&descriptor.id, tool);
        tracing::info!("Tool {} ({}) registered successfully", descriptor.name, descriptor.kind);
        Ok(previous)
    }

    pub fn tool(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn has_tool(&self, id: &str) -> bool {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).contains_key(id)
    }

    pub fn tool_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn tool_entries(&self) -> Vec<(String, Arc<dyn Tool>)> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, tool)| (id.clone(), tool.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::QueryResponse;
    use crate::tools::GenericTool;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAgent {
        label: String,
        attached: Mutex<Vec<String>>,
        cleanups: AtomicUsize,
    }

    impl RecordingAgent {
        fn named(label: &str) -> Arc<Self> {
            Arc::new(Self {
                label: label.into(),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl Agent for RecordingAgent {
        fn name(&self) -> &str {
            &self.label
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Generic
        }

        async fn process_query(&self, query: &str, _tool_params: &Value) -> DockResult<QueryResponse> {
            Ok(QueryResponse::direct(format!("{}: {}", self.label, query)))
        }

        fn attach_tool(&self, tool_id: &str, _tool: Arc<dyn Tool>) -> bool {
            self.attached.lock().unwrap().push(tool_id.to_string());
            true
        }

        fn cleanup(&self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_replacement_keeps_second_instance() {
        let registry = Registry::new();
        let mut events = registry.subscribe();
        let first = RecordingAgent::named("first");
        let second = RecordingAgent::named("second");

        assert!(registry.register_agent("x", first.clone()).is_none());
        let replaced = registry.register_agent("x", second.clone()).unwrap();
        assert_eq!(replaced.name(), "first");
        // 旧实例的 cleanup 不由注册表调用
        assert_eq!(first.cleanups.load(Ordering::SeqCst), 0);
        assert_eq!(registry.agent("x").unwrap().name(), "second");
        assert_eq!(registry.agent_ids(), vec!["x".to_string()]);

        assert!(registry.deregister_agent("x"));
        assert!(!registry.deregister_agent("x"));
        assert_eq!(second.cleanups.load(Ordering::SeqCst), 1);

        let changes: Vec<LifecycleChange> = std::iter::from_fn(|| events.try_recv().ok()).map(|e| e.change).collect();
        assert_eq!(
            changes,
            vec![LifecycleChange::Registered, LifecycleChange::Replaced, LifecycleChange::Deregistered]
        );
    }

    #[test]
    fn test_unknown_deregistration_is_noop() {
        let registry = Registry::new();
        registry.register_agent("a1", RecordingAgent::named("a1"));
        assert!(!registry.deregister_agent("does-not-exist"));
        assert!(!registry.deregister_tool("does-not-exist"));
        assert!(registry.has_agent("a1"));
    }

    #[test]
    fn test_tool_fan_out_once_per_agent() {
        let registry = Registry::new();
        let a = RecordingAgent::named("a");
        let b = RecordingAgent::named("b");
        registry.register_agent("a", a.clone());
        registry.register_agent("b", b.clone());

        registry.register_tool("t1", Arc::new(GenericTool::new("Notifier", "notify")));
        assert_eq!(*a.attached.lock().unwrap(), vec!["t1".to_string()]);
        assert_eq!(*b.attached.lock().unwrap(), vec!["t1".to_string()]);

        // 后注册的 Agent 拿到已有的 Tool
        let c = RecordingAgent::named("c");
        registry.register_agent("c", c.clone());
        assert_eq!(*c.attached.lock().unwrap(), vec!["t1".to_string()]);

        assert!(registry.deregister_tool("t1"));
        assert!(registry.tool("t1").is_none());
    }
}
