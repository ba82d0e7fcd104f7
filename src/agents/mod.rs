//! Agent：面向某个 Provider 的自然语言查询处理器
//!
//! 处理顺序固定：先按声明顺序尝试直达模式（命中即调用 Provider 并返回格式化文本，不调用补全）；
//! 都未命中时构建 Provider 上下文并升级到补全。变体：jira / slack / shopify / github / generic。

pub mod core;
pub mod generic;
pub mod github;
pub mod jira;
pub mod patterns;
pub mod shopify;
pub mod slack;
pub mod toolbelt;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::DockResult;
use crate::registry::resolver::ProviderKind;
use crate::tools::Tool;

pub use self::core::{AgentCore, Persona};
pub use generic::GenericAgent;
pub use github::GithubAgent;
pub use jira::JiraAgent;
pub use shopify::ShopifyAgent;
pub use slack::SlackAgent;
pub use toolbelt::ToolBelt;

/// 查询结果：回复文本 + 工具执行结果（直达模式下恒为空）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub response: String,
    #[serde(default)]
    pub tool_results: Map<String, Value>,
}

impl QueryResponse {
    pub fn direct(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            tool_results: Map::new(),
        }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// tool_params 只透传，不做校验
    async fn process_query(&self, query: &str, tool_params: &Value) -> DockResult<QueryResponse>;

    /// 新 Tool 注册后由注册表调用（每个 Agent 每个 Tool 一次）；返回是否接受
    fn attach_tool(&self, _tool_id: &str, _tool: Arc<dyn Tool>) -> bool {
        false
    }

    fn detach_tool(&self, _tool_id: &str) -> bool {
        false
    }

    /// 注销时释放资源；未持有资源时也必须可安全调用
    fn cleanup(&self) {
        tracing::info!("Cleaning up agent: {}", self.name());
    }
}

/// 基于 AgentCore 的变体共用的 attach / detach 实现
macro_rules! delegate_tool_belt {
    () => {
        fn attach_tool(&self, tool_id: &str, tool: std::sync::Arc<dyn crate::tools::Tool>) -> bool {
            let accepted = self.core.tools().attach(tool_id, tool);
            if accepted {
                tracing::debug!("{} attached tool {}", self.core.name(), tool_id);
            }
            accepted
        }

        fn detach_tool(&self, tool_id: &str) -> bool {
            self.core.tools().detach(tool_id)
        }
    };
}

pub(crate) use delegate_tool_belt;
