//! 审计记录：一次调度的关联记录（started → completed / failed）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::EntityKind;
use crate::store::Record;

/// 记录状态；终态只会写入一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Started,
    Completed,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Started => "started",
            AuditStatus::Completed => "completed",
            AuditStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(Self::Started),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuditStatus::Started)
    }
}

/// 记录级别：失败记录为 error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    #[default]
    Info,
    Error,
}

/// 调度目标（决定记录里填 agentId 还是 toolId）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditTarget {
    Agent(String),
    Tool(String),
}

impl AuditTarget {
    pub fn kind(&self) -> EntityKind {
        match self {
            AuditTarget::Agent(_) => EntityKind::Agent,
            AuditTarget::Tool(_) => EntityKind::Tool,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AuditTarget::Agent(id) | AuditTarget::Tool(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    pub user_id: String,
    pub action: String,
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    pub status: AuditStatus,
    #[serde(rename = "type", default)]
    pub level: AuditLevel,
    /// 被调度调用的耗时（毫秒）
    #[serde(default)]
    pub duration: u64,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn started(target: &AuditTarget, user_id: &str, action: impl Into<String>, input: Value) -> Self {
        let (agent_id, tool_id) = match target {
            AuditTarget::Agent(id) => (Some(id.clone()), None),
            AuditTarget::Tool(id) => (None, Some(id.clone())),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id,
            tool_id,
            user_id: user_id.to_string(),
            action: action.into(),
            input,
            output: Value::Object(Default::default()),
            status: AuditStatus::Started,
            level: AuditLevel::Info,
            duration: 0,
            timestamp: Utc::now(),
        }
    }
}

/// 审计记录查询条件
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub agent_id: Option<String>,
    pub tool_id: Option<String>,
    pub user_id: Option<String>,
    pub status: Option<AuditStatus>,
}

impl AuditFilter {
    pub fn for_agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Self::default()
        }
    }

    pub fn for_tool(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: Some(tool_id.into()),
            ..Self::default()
        }
    }
}

impl Record for AuditRecord {
    type Filter = AuditFilter;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn matches(&self, f: &AuditFilter) -> bool {
        f.agent_id.as_ref().map_or(true, |a| self.agent_id.as_ref() == Some(a))
            && f.tool_id.as_ref().map_or(true, |t| self.tool_id.as_ref() == Some(t))
            && f.user_id.as_ref().map_or(true, |u| u == &self.user_id)
            && f.status.map_or(true, |s| s == self.status)
    }
}
