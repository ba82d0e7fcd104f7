//! GitHub Provider：REST API（Bearer token，可无 token 访问公开仓库）

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::DockResult;
use crate::providers::http::{Auth, HttpProvider};

/// owner/name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GithubUser {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubRepo {
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
}

/// Issue 与 PR 共用的字段；pull_request 非空表示列表中的条目实为 PR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubItem {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: GithubUser,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mergeable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubComment {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: GithubUser,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub html_url: String,
}

#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn get_repo(&self, repo: &RepoRef) -> DockResult<GithubRepo>;

    /// 注意：GitHub 的 issue 列表包含 PR
    async fn list_issues(&self, repo: &RepoRef, state: &str, per_page: u64) -> DockResult<Vec<GithubItem>>;

    async fn list_pulls(&self, repo: &RepoRef, state: &str, per_page: u64) -> DockResult<Vec<GithubItem>>;

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> DockResult<GithubItem>;

    async fn get_pull(&self, repo: &RepoRef, number: u64) -> DockResult<GithubItem>;

    async fn list_comments(&self, repo: &RepoRef, number: u64) -> DockResult<Vec<GithubComment>>;

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> DockResult<GithubComment>;
}

pub struct GithubRestClient {
    http: HttpProvider,
}

impl GithubRestClient {
    pub fn new(api_base: Option<&str>, token: Option<&str>, timeout_secs: u64) -> DockResult<Self> {
        let auth = token.map_or(Auth::None, |t| Auth::Bearer(t.to_string()));
        let base = api_base.unwrap_or("https://api.github.com");
        Ok(Self {
            http: HttpProvider::new("GitHub API", base, auth, timeout_secs)?,
        })
    }
}

#[async_trait]
impl GithubApi for GithubRestClient {
    async fn get_repo(&self, repo: &RepoRef) -> DockResult<GithubRepo> {
        self.http.get(&format!("repos/{repo}"), &[]).await
    }

    async fn list_issues(&self, repo: &RepoRef, state: &str, per_page: u64) -> DockResult<Vec<GithubItem>> {
        self.http
            .get(
                &format!("repos/{repo}/issues"),
                &[("state", state.to_string()), ("per_page", per_page.to_string())],
            )
            .await
    }

    async fn list_pulls(&self, repo: &RepoRef, state: &str, per_page: u64) -> DockResult<Vec<GithubItem>> {
        self.http
            .get(
                &format!("repos/{repo}/pulls"),
                &[("state", state.to_string()), ("per_page", per_page.to_string())],
            )
            .await
    }

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> DockResult<GithubItem> {
        self.http.get(&format!("repos/{repo}/issues/{number}"), &[]).await
    }

    async fn get_pull(&self, repo: &RepoRef, number: u64) -> DockResult<GithubItem> {
        self.http.get(&format!("repos/{repo}/pulls/{number}"), &[]).await
    }

    async fn list_comments(&self, repo: &RepoRef, number: u64) -> DockResult<Vec<GithubComment>> {
        self.http
            .get(&format!("repos/{repo}/issues/{number}/comments"), &[])
            .await
    }

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> DockResult<GithubComment> {
        self.http
            .post(&format!("repos/{repo}/issues/{number}/comments"), &json!({ "body": body }))
            .await
    }
}
