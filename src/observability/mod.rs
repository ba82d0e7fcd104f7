//! 可观测性：tracing 订阅器初始化与注册表生命周期日志

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::registry::{LifecycleChange, LifecycleEvent, Registry};

/// 日志：默认 info，可通过 RUST_LOG 覆盖；重复调用不会 panic
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

fn describe(event: &LifecycleEvent) -> String {
    let verb = match event.change {
        LifecycleChange::Registered => "registered",
        LifecycleChange::Replaced => "replaced",
        LifecycleChange::Deregistered => "deregistered",
    };
    format!("{} {}: {}", event.kind, verb, event.id)
}

/// 订阅注册表事件并逐条写日志，直到注册表被释放
pub fn spawn_lifecycle_logger(registry: &Registry) -> JoinHandle<()> {
    let mut events = registry.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!("{}", describe(&event)),
                Err(RecvError::Lagged(n)) => tracing::warn!("Lifecycle logger lagged, {} event(s) dropped", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityKind;
    use crate::tools::GenericTool;
    use std::sync::Arc;

    #[test]
    fn test_describe() {
        let event = LifecycleEvent {
            kind: EntityKind::Agent,
            id: "a1".into(),
            change: LifecycleChange::Registered,
        };
        assert_eq!(describe(&event), "Agent registered: a1");
        let event = LifecycleEvent {
            kind: EntityKind::Tool,
            id: "t1".into(),
            change: LifecycleChange::Deregistered,
        };
        assert_eq!(describe(&event), "Tool deregistered: t1");
    }

    #[tokio::test]
    async fn test_logger_stops_when_registry_drops() {
        let registry = Registry::new();
        let handle = spawn_lifecycle_logger(&registry);
        registry.register_tool("t1", Arc::new(GenericTool::new("Notifier", "notify")));
        drop(registry);
        handle.await.unwrap();
    }
}
