//! 管理层：描述符 CRUD、激活/停用、审计日志查询
//!
//! 描述符（持久化）与注册表（活实例）由这里保持一致：
//! 激活 = 构造并注册，停用 = 注销，更新 = 先构造新实例再替换，删除 = 注销后删除。

pub mod agents;
pub mod logs;
pub mod tools;

use crate::store::{Page, SortOrder};

pub use agents::{AgentService, AgentUpdate};
pub use logs::LogService;
pub use tools::{ToolService, ToolUpdate};

/// 列表查询选项：分页可选，默认按创建时间倒序
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    pub page: Option<Page>,
    pub sort: SortOrder,
}

impl ListOptions {
    pub fn paged(page: usize, limit: usize) -> Self {
        Self {
            page: Some(Page::new(page, limit)),
            sort: SortOrder::default(),
        }
    }
}
