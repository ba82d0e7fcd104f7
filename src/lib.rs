//! AgentDock - Agent / Tool 运行时调度器
//!
//! 模块划分：
//! - **agents**: Agent 契约、直达模式表、各 Provider 的 Agent 变体
//! - **audit**: 审计记录（started → completed / failed）与写入器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与实体种类
//! - **descriptor**: Agent / Tool 描述符与种子文件
//! - **dispatch**: process_query / execute_tool 调度与请求 Schema
//! - **llm**: 生成式补全客户端（OpenAI 兼容 / Mock）
//! - **management**: 描述符管理、激活/停用、审计日志查询
//! - **observability**: tracing 初始化与生命周期日志
//! - **providers**: Jira / Slack / GitHub / Shopify / 通用端点 REST 客户端
//! - **registry**: 注册表与类型标签解析
//! - **runtime**: 运行时装配与启动载入
//! - **store**: 窄 CRUD 仓库接口（内存 / SQLite）
//! - **tools**: Tool 契约、动作校验与各 Provider 的 Tool 变体

pub mod agents;
pub mod audit;
pub mod config;
pub mod core;
pub mod descriptor;
pub mod dispatch;
pub mod llm;
pub mod management;
pub mod observability;
pub mod providers;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod tools;

pub use crate::core::{DockError, DockResult};
pub use dispatch::Dispatcher;
pub use registry::Registry;
pub use runtime::AgentDock;
