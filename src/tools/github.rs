//! GitHub Tool：PR / Issue 查询与评论（仓库由 config.repoOwner / repoName 指定）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{DockError, DockResult};
use crate::descriptor::{config_str, ToolDescriptor};
use crate::providers::github::{GithubApi, GithubComment, GithubItem, GithubRestClient, RepoRef};
use crate::registry::resolver::{setting, ProviderContext};
use crate::tools::contract::{
    provider_error, unimplemented_action, ActionParams, ActionSpec, ParamSpec, ParamType, Tool, ToolOutput,
};
use crate::tools::jira::descriptor_description;

pub struct GithubTool {
    name: String,
    description: String,
    client: Arc<dyn GithubApi>,
    repo: Option<RepoRef>,
    actions: Vec<ActionSpec>,
}

impl GithubTool {
    pub fn new(name: impl Into<String>, client: Arc<dyn GithubApi>, repo: Option<RepoRef>) -> Self {
        let name = name.into();
        Self {
            description: format!("{name} tool"),
            name,
            client,
            repo,
            actions: catalogue(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// token 取 authConfig.token（或 config.githubToken），缺省回落到 [providers.github]
    pub fn from_descriptor(descriptor: &ToolDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let defaults = &ctx.providers.github;
        let token = setting(&descriptor.auth_config, "token", None)
            .or_else(|| setting(&descriptor.config, "githubToken", defaults.token.as_deref()));
        let client = GithubRestClient::new(defaults.api_base.as_deref(), token.as_deref(), ctx.providers.http_timeout_secs)?;
        let repo = repo_from_config(&descriptor.config);
        match &repo {
            Some(r) => tracing::info!("GitHub tool initialized for {}", r),
            None => tracing::warn!("GitHub tool {} has no repository configured", descriptor.name),
        }
        Ok(Self::new(descriptor.name.clone(), Arc::new(client), repo).with_description(descriptor_description(descriptor)))
    }

    fn repo(&self) -> DockResult<&RepoRef> {
        self.repo
            .as_ref()
            .ok_or_else(|| DockError::ConfigError("GitHub repository not configured".into()))
    }

    async fn list_prs(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let pulls = self
            .client
            .list_pulls(self.repo()?, params.str("state")?, params.u64("limit")?)
            .await
            .map_err(provider_error("Failed to list PRs"))?;
        Ok(ToolOutput::ok(json!(pulls.iter().map(summarize).collect::<Vec<_>>())))
    }

    async fn list_issues(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let issues = self
            .client
            .list_issues(self.repo()?, params.str("state")?, params.u64("limit")?)
            .await
            .map_err(provider_error("Failed to list issues"))?;
        let data: Vec<Value> = issues
            .iter()
            .filter(|i| i.pull_request.is_none())
            .map(summarize)
            .collect();
        Ok(ToolOutput::ok(json!(data)))
    }

    async fn get_item(&self, params: &ActionParams, pull: bool) -> DockResult<ToolOutput> {
        let repo = self.repo()?;
        let number = params.u64("number")?;
        let context = if pull { "Failed to get PR" } else { "Failed to get issue" };
        let item = if pull {
            self.client.get_pull(repo, number).await
        } else {
            self.client.get_issue(repo, number).await
        };
        let item = item.map_err(provider_error(context))?;
        let comments = self
            .client
            .list_comments(repo, number)
            .await
            .map_err(provider_error(context))?;

        let mut data = summarize(&item);
        data["body"] = json!(item.body);
        data["comments"] = json!(comments.iter().map(comment_view).collect::<Vec<_>>());
        if pull {
            data["merged"] = json!(item.merged);
            data["mergeable"] = json!(item.mergeable);
        }
        Ok(ToolOutput::ok(data))
    }

    async fn create_comment(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let comment = self
            .client
            .create_comment(self.repo()?, params.u64("number")?, params.str("body")?)
            .await
            .map_err(provider_error("Failed to create comment"))?;
        Ok(ToolOutput::ok(json!({ "id": comment.id, "body": comment.body, "url": comment.html_url })))
    }
}

pub(crate) fn repo_from_config(config: &serde_json::Map<String, Value>) -> Option<RepoRef> {
    Some(RepoRef {
        owner: config_str(config, "repoOwner")?.to_string(),
        name: config_str(config, "repoName")?.to_string(),
    })
}

fn summarize(item: &GithubItem) -> Value {
    json!({
        "number": item.number,
        "title": item.title,
        "state": item.state,
        "author": item.user.login,
        "created_at": item.created_at,
        "updated_at": item.updated_at,
        "url": item.html_url,
    })
}

fn comment_view(comment: &GithubComment) -> Value {
    json!({ "author": comment.user.login, "body": comment.body, "created_at": comment.created_at })
}

fn catalogue() -> Vec<ActionSpec> {
    let state = || {
        ParamSpec::optional("state", ParamType::String, "State to fetch (open, closed, all)").with_default(json!("open"))
    };
    let limit = || ParamSpec::optional("limit", ParamType::Number, "Maximum number of items to return").with_default(json!(5));
    vec![
        ActionSpec::info(),
        ActionSpec::new("listPRs", "List pull requests for the repository")
            .param(state())
            .param(limit()),
        ActionSpec::new("getPR", "Get details about a specific pull request")
            .param(ParamSpec::required("number", ParamType::Number, "PR number")),
        ActionSpec::new("listIssues", "List issues for the repository")
            .param(state())
            .param(limit()),
        ActionSpec::new("getIssue", "Get details about a specific issue")
            .param(ParamSpec::required("number", ParamType::Number, "Issue number")),
        ActionSpec::new("createComment", "Create a comment on an issue or PR")
            .param(ParamSpec::required("number", ParamType::Number, "Issue or PR number"))
            .param(ParamSpec::required("body", ParamType::String, "Comment text")),
    ]
}

#[async_trait]
impl Tool for GithubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    async fn invoke(&self, action: &str, params: ActionParams) -> DockResult<ToolOutput> {
        match action {
            "listPRs" => self.list_prs(&params).await,
            "getPR" => self.get_item(&params, true).await,
            "listIssues" => self.list_issues(&params).await,
            "getIssue" => self.get_item(&params, false).await,
            "createComment" => self.create_comment(&params).await,
            other => Err(unimplemented_action(&self.name, other)),
        }
    }
}
