//! 调度错误类型
//!
//! 校验类错误（ActionNotFound / MissingParameter / InvalidParameter）在触达任何外部协作方之前抛出；
//! 外部协作方的失败统一包成 ExternalService 并带上操作上下文；Dispatcher 只记录、不改写错误形状。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 实体种类：Agent / Tool（注册表、审计记录、错误信息共用），Log 仅用于审计记录的 NotFound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agent,
    Tool,
    Log,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Agent => f.write_str("Agent"),
            EntityKind::Tool => f.write_str("Tool"),
            EntityKind::Log => f.write_str("Log"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DockError {
    /// 注册表中没有该 id 的活实例（或描述符不存在）；不会产生审计记录
    #[error("{kind} with ID {id} not found")]
    NotFound { kind: EntityKind, id: String },

    /// 描述符存在但未激活
    #[error("{kind} {id} is not active")]
    InactiveEntity { kind: EntityKind, id: String },

    #[error("Action '{action}' not found for tool {tool}")]
    ActionNotFound { tool: String, action: String },

    #[error("Missing required parameter '{parameter}' for action '{action}'")]
    MissingParameter { action: String, parameter: String },

    #[error("Invalid parameter '{parameter}' for action '{action}': expected {expected}")]
    InvalidParameter {
        action: String,
        parameter: String,
        expected: String,
    },

    /// 外部服务（Provider / Completion / Persistence 之外的 HTTP 调用）失败，context 说明是哪个操作
    #[error("{context}: {message}")]
    ExternalService { context: String, message: String },

    /// 被包装的调用未能正常返回（panic 或被中止）
    #[error("Dispatch failed: {0}")]
    DispatchFailure(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Failed to register {kind} {id}: {reason}")]
    RegistrationFailed {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl DockError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn external(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ExternalService {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// 是否属于本地校验错误（未触达外部协作方）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ActionNotFound { .. } | Self::MissingParameter { .. } | Self::InvalidParameter { .. }
        )
    }
}

pub type DockResult<T> = Result<T, DockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_entity_and_parameter() {
        let err = DockError::not_found(EntityKind::Agent, "a1");
        assert_eq!(err.to_string(), "Agent with ID a1 not found");

        let err = DockError::MissingParameter {
            action: "createIssue".into(),
            parameter: "issueType".into(),
        };
        assert!(err.to_string().contains("issueType"));
        assert!(err.to_string().contains("createIssue"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_external_wraps_context() {
        let err = DockError::external("Failed to create Jira issue", "HTTP 500");
        assert_eq!(err.to_string(), "Failed to create Jira issue: HTTP 500");
        assert!(!err.is_validation());
    }
}
