//! Tool：动作目录 + 参数校验 + Provider 调用
//!
//! 具体变体：jira / slack / github / shopify，未知类型标签使用 GenericTool。

pub mod contract;
pub mod generic;
pub mod github;
pub mod jira;
pub mod shopify;
pub mod slack;

pub use contract::{ActionParams, ActionSpec, ParamSpec, ParamType, Tool, ToolOutput};
pub use generic::GenericTool;
pub use github::GithubTool;
pub use jira::JiraTool;
pub use shopify::ShopifyTool;
pub use slack::SlackTool;
