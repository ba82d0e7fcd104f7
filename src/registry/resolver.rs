//! 描述符 -> 活实例：按类型标签选择构造器
//!
//! 标签与变体：github / slack / jira / shopify，其余一律走 Generic（不会因未知标签拒绝）。
//! 凭据优先取描述符（config / authConfig），缺省回落到 [providers.*] 段。

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::agents::{Agent, GenericAgent, GithubAgent, JiraAgent, ShopifyAgent, SlackAgent};
use crate::config::{AppConfig, ProvidersSection};
use crate::core::{DockError, DockResult, EntityKind};
use crate::descriptor::{config_str, AgentDescriptor, ToolDescriptor};
use crate::llm::{create_client_from_config, options_from_config, CompletionClient, CompletionOptions};
use crate::tools::{GenericTool, GithubTool, JiraTool, ShopifyTool, SlackTool, Tool};

/// 已知的 Provider 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Github,
    Slack,
    Jira,
    Shopify,
    Generic,
}

impl ProviderKind {
    /// 类型标签（大小写不敏感）-> 变体；未知标签为 Generic
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "github" => Self::Github,
            "slack" => Self::Slack,
            "jira" => Self::Jira,
            "shopify" => Self::Shopify,
            _ => Self::Generic,
        }
    }

    /// 写进 prompt 的显示名
    pub fn label(&self) -> &'static str {
        match self {
            Self::Github => "GitHub",
            Self::Slack => "Slack",
            Self::Jira => "Jira",
            Self::Shopify => "Shopify",
            Self::Generic => "Generic",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 构造活实例所需的共享协作方
#[derive(Clone)]
pub struct ProviderContext {
    pub llm: Arc<dyn CompletionClient>,
    pub options: CompletionOptions,
    pub providers: ProvidersSection,
    pub execute_tool_actions: bool,
}

impl ProviderContext {
    pub fn new(llm: Arc<dyn CompletionClient>, options: CompletionOptions) -> Self {
        Self {
            llm,
            options,
            providers: ProvidersSection::default(),
            execute_tool_actions: false,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            llm: create_client_from_config(&cfg.llm),
            options: options_from_config(&cfg.llm),
            providers: cfg.providers.clone(),
            execute_tool_actions: cfg.dispatch.execute_tool_actions,
        }
    }

    pub fn with_tool_actions(mut self, enabled: bool) -> Self {
        self.execute_tool_actions = enabled;
        self
    }
}

/// 描述符里的字符串设置，空串视为未设置，缺省时用 fallback
pub fn setting(map: &Map<String, Value>, key: &str, fallback: Option<&str>) -> Option<String> {
    config_str(map, key)
        .or_else(|| fallback.filter(|s| !s.is_empty()))
        .map(String::from)
}

/// 必需的设置；缺失时注册失败（错误信息点名缺少的键）
pub fn require_setting(kind: EntityKind, id: &str, key: &str, value: Option<String>) -> DockResult<String> {
    value.ok_or_else(|| DockError::RegistrationFailed {
        kind,
        id: id.to_string(),
        reason: format!("missing required setting '{key}'"),
    })
}

fn registration_error(kind: EntityKind, id: &str) -> impl FnOnce(DockError) -> DockError + '_ {
    move |e| match e {
        DockError::RegistrationFailed { .. } => e,
        other => DockError::RegistrationFailed {
            kind,
            id: id.to_string(),
            reason: other.to_string(),
        },
    }
}

/// AgentDescriptor -> 活 Agent
pub fn build_agent(descriptor: &AgentDescriptor, ctx: &ProviderContext) -> DockResult<Arc<dyn Agent>> {
    let kind = ProviderKind::from_tag(&descriptor.kind);
    tracing::debug!("Building {} agent {} ({})", kind, descriptor.id, descriptor.name);
    let fail = || registration_error(EntityKind::Agent, &descriptor.id);
    let agent: Arc<dyn Agent> = match kind {
        ProviderKind::Jira => Arc::new(JiraAgent::from_descriptor(descriptor, ctx).map_err(fail())?),
        ProviderKind::Slack => Arc::new(SlackAgent::from_descriptor(descriptor, ctx).map_err(fail())?),
        ProviderKind::Shopify => Arc::new(ShopifyAgent::from_descriptor(descriptor, ctx).map_err(fail())?),
        ProviderKind::Github => Arc::new(GithubAgent::from_descriptor(descriptor, ctx).map_err(fail())?),
        ProviderKind::Generic => Arc::new(GenericAgent::from_descriptor(descriptor, ctx)),
    };
    Ok(agent)
}

/// ToolDescriptor -> 活 Tool
pub fn build_tool(descriptor: &ToolDescriptor, ctx: &ProviderContext) -> DockResult<Arc<dyn Tool>> {
    let kind = ProviderKind::from_tag(&descriptor.kind);
    tracing::debug!("Building {} tool {} ({})", kind, descriptor.id, descriptor.name);
    let fail = || registration_error(EntityKind::Tool, &descriptor.id);
    let tool: Arc<dyn Tool> = match kind {
        ProviderKind::Jira => Arc::new(JiraTool::from_descriptor(descriptor, ctx).map_err(fail())?),
        ProviderKind::Slack => Arc::new(SlackTool::from_descriptor(descriptor, ctx).map_err(fail())?),
        ProviderKind::Shopify => Arc::new(ShopifyTool::from_descriptor(descriptor, ctx).map_err(fail())?),
        ProviderKind::Github => Arc::new(GithubTool::from_descriptor(descriptor, ctx).map_err(fail())?),
        ProviderKind::Generic => Arc::new(GenericTool::from_descriptor(descriptor, ctx).map_err(fail())?),
    };
    Ok(tool)
}
