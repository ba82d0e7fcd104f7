//! 描述符：Agent / Tool 的持久化配置记录（惰性数据，与注册表中的活实例相对）
//!
//! 由管理操作创建；仅激活/停用与配置更新会修改；删除即销毁。注册表按同一 id 持有派生的活实例。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Record;
use crate::tools::ParamType;

/// Agent 描述符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub id: String,
    /// 类型标签（github / slack / jira / shopify / custom / 任意未知值）
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// 该 Agent 可使用的 Tool id；为空表示不限
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind: kind.into(),
            name: name.into(),
            description: String::new(),
            config: Map::new(),
            is_active: true,
            tools: Vec::new(),
            capabilities: Vec::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// 鉴权方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthType {
    #[default]
    None,
    ApiKey,
    Oauth,
    Basic,
    Bearer,
}

/// 描述符中声明的参数（通用 Tool 的 invoke 动作以此为 schema）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
}

/// Tool 描述符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub auth_config: Map<String, Value>,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ToolDescriptor {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind: kind.into(),
            name: name.into(),
            description: String::new(),
            endpoint: String::new(),
            auth_type: AuthType::None,
            auth_config: Map::new(),
            parameters: Vec::new(),
            config: Map::new(),
            is_active: true,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_auth_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.auth_config.insert(key.into(), value);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

fn default_active() -> bool {
    true
}

/// Agent 描述符查询条件；None 表示不限
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub kind: Option<String>,
    pub is_active: Option<bool>,
    pub created_by: Option<String>,
}

impl Record for AgentDescriptor {
    type Filter = AgentFilter;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &AgentFilter) -> bool {
        filter.kind.as_ref().map_or(true, |k| k == &self.kind)
            && filter.is_active.map_or(true, |a| a == self.is_active)
            && filter
                .created_by
                .as_ref()
                .map_or(true, |u| self.created_by.as_ref() == Some(u))
    }
}

/// Tool 描述符查询条件
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub kind: Option<String>,
    pub is_active: Option<bool>,
    pub created_by: Option<String>,
}

impl Record for ToolDescriptor {
    type Filter = ToolFilter;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches(&self, filter: &ToolFilter) -> bool {
        filter.kind.as_ref().map_or(true, |k| k == &self.kind)
            && filter.is_active.map_or(true, |a| a == self.is_active)
            && filter
                .created_by
                .as_ref()
                .map_or(true, |u| self.created_by.as_ref() == Some(u))
    }
}

/// 从 config / authConfig 中取字符串配置项
pub fn config_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// 描述符种子文件（TOML）：[[agents]] 与 [[tools]]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptorSeed {
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

impl DescriptorSeed {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_from_toml() {
        let seed = DescriptorSeed::from_toml_str(
            r#"
[[agents]]
id = "a1"
type = "jira"
name = "Jira Helper"
tools = ["t1"]

[agents.config]
host = "example.atlassian.net"
defaultProject = "PROJ"

[[tools]]
id = "t1"
type = "webhook"
name = "Notifier"
endpoint = "https://hooks.example.com/notify"
authType = "bearer"
isActive = false

[[tools.parameters]]
name = "text"
type = "string"
required = true
"#,
        )
        .unwrap();

        assert_eq!(seed.agents.len(), 1);
        let agent = &seed.agents[0];
        assert_eq!(agent.kind, "jira");
        assert!(agent.is_active);
        assert_eq!(config_str(&agent.config, "defaultProject"), Some("PROJ"));

        let tool = &seed.tools[0];
        assert_eq!(tool.auth_type, AuthType::Bearer);
        assert!(!tool.is_active);
        assert_eq!(tool.parameters[0].kind, ParamType::String);
        assert!(tool.parameters[0].required);
    }
}
