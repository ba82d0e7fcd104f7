//! Provider 协作方：每个外部系统一个窄能力 trait + reqwest 实现
//!
//! Agent / Tool 只依赖 trait（JiraApi / SlackApi / GithubApi / ShopifyApi / EndpointApi），
//! 测试中以计数 mock 替换。

pub mod endpoint;
pub mod github;
pub mod http;
pub mod jira;
pub mod shopify;
pub mod slack;

pub use endpoint::{EndpointApi, HttpEndpoint};
pub use github::{GithubApi, GithubRestClient, RepoRef};
pub use http::{Auth, HttpProvider};
pub use jira::{JiraApi, JiraRestClient, NewIssue};
pub use shopify::{ShopifyApi, ShopifyRestClient};
pub use slack::{SlackApi, SlackWebClient};
