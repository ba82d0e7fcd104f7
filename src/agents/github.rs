//! GitHub Agent：没有直达模式，只提供仓库上下文（概况、open issue、open PR）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::core::{AgentCore, Persona};
use crate::agents::{delegate_tool_belt, Agent, QueryResponse};
use crate::core::{preview, DockResult};
use crate::descriptor::AgentDescriptor;
use crate::providers::github::{GithubApi, GithubItem, GithubRestClient, RepoRef};
use crate::registry::resolver::{setting, ProviderContext, ProviderKind};
use crate::tools::github::repo_from_config;

pub struct GithubAgent {
    core: AgentCore,
    client: Arc<dyn GithubApi>,
    repo: Option<RepoRef>,
}

impl GithubAgent {
    pub fn new(core: AgentCore, client: Arc<dyn GithubApi>, repo: Option<RepoRef>) -> Self {
        Self { core, client, repo }
    }

    pub fn persona(repo: Option<&RepoRef>) -> Persona {
        let role = match repo {
            Some(r) => format!("a GitHub assistant working with the repository {r}"),
            None => "a GitHub assistant".to_string(),
        };
        Persona::provider("GitHub", role)
    }

    pub fn from_descriptor(descriptor: &AgentDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let defaults = &ctx.providers.github;
        let token = setting(&descriptor.config, "githubToken", defaults.token.as_deref());
        let client = GithubRestClient::new(defaults.api_base.as_deref(), token.as_deref(), ctx.providers.http_timeout_secs)?;
        let repo = repo_from_config(&descriptor.config);
        match &repo {
            Some(r) => tracing::info!("GitHub agent initialized for {}", r),
            None => tracing::warn!("GitHub agent {} has no repository configured", descriptor.name),
        }
        let core = AgentCore::from_descriptor(descriptor, Self::persona(repo.as_ref()), ctx);
        Ok(Self::new(core, Arc::new(client), repo))
    }

    fn item_lines(items: &[GithubItem]) -> String {
        items.iter().map(|i| format!("- #{}: {}\n", i.number, i.title)).collect()
    }

    pub async fn context(&self) -> String {
        let Some(repo) = &self.repo else {
            return "No GitHub repository configured.".to_string();
        };
        let mut context = String::new();

        match self.client.get_repo(repo).await {
            Ok(info) => {
                context.push_str(&format!("Repository: {}\n", info.full_name));
                context.push_str(&format!("Description: {}\n", info.description.as_deref().unwrap_or("None")));
                context.push_str(&format!("Stars: {}, Forks: {}\n\n", info.stargazers_count, info.forks_count));
            }
            Err(e) => {
                tracing::warn!("GitHub context: repository info unavailable: {}", e);
                context.push_str(&format!("Couldn't retrieve repository information for {repo}.\n\n"));
            }
        }

        match self.client.list_issues(repo, "open", 5).await {
            Ok(issues) => {
                context.push_str(&format!("Recent open issues ({}):\n", issues.len()));
                context.push_str(&Self::item_lines(&issues));
                context.push('\n');
            }
            Err(e) => {
                tracing::warn!("GitHub context: issues unavailable: {}", e);
                context.push_str("Couldn't retrieve open issues.\n\n");
            }
        }

        match self.client.list_pulls(repo, "open", 5).await {
            Ok(pulls) => {
                context.push_str(&format!("Recent open pull requests ({}):\n", pulls.len()));
                context.push_str(&Self::item_lines(&pulls));
            }
            Err(e) => {
                tracing::warn!("GitHub context: pull requests unavailable: {}", e);
                context.push_str("Couldn't retrieve open pull requests.\n");
            }
        }
        context
    }
}

#[async_trait]
impl Agent for GithubAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Github
    }

    async fn process_query(&self, query: &str, tool_params: &Value) -> DockResult<QueryResponse> {
        tracing::info!("GitHub agent {} processing query: {}", self.name(), preview(query, 80));
        let context = self.context().await;
        self.core.escalate(query, tool_params, &context).await
    }

    delegate_tool_belt!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DockError;
    use crate::llm::{CompletionOptions, MockLlmClient};
    use crate::providers::github::{GithubComment, GithubRepo, GithubUser};

    struct FakeGithub {
        pulls_down: bool,
    }

    fn item(number: u64, title: &str) -> GithubItem {
        GithubItem {
            number,
            title: title.into(),
            state: "open".into(),
            body: None,
            user: GithubUser { login: "octo".into() },
            created_at: None,
            updated_at: None,
            html_url: String::new(),
            pull_request: None,
            merged: None,
            mergeable: None,
        }
    }

    #[async_trait]
    impl GithubApi for FakeGithub {
        async fn get_repo(&self, repo: &RepoRef) -> DockResult<GithubRepo> {
            Ok(GithubRepo {
                full_name: repo.to_string(),
                description: None,
                stargazers_count: 120,
                forks_count: 8,
            })
        }

        async fn list_issues(&self, _repo: &RepoRef, _state: &str, _per_page: u64) -> DockResult<Vec<GithubItem>> {
            Ok(vec![item(12, "Crash on start")])
        }

        async fn list_pulls(&self, _repo: &RepoRef, _state: &str, _per_page: u64) -> DockResult<Vec<GithubItem>> {
            if self.pulls_down {
                return Err(DockError::external("GitHub API /pulls", "HTTP 502"));
            }
            Ok(vec![item(13, "Fix crash")])
        }

        async fn get_issue(&self, _repo: &RepoRef, number: u64) -> DockResult<GithubItem> {
            Ok(item(number, "issue"))
        }

        async fn get_pull(&self, _repo: &RepoRef, number: u64) -> DockResult<GithubItem> {
            Ok(item(number, "pull"))
        }

        async fn list_comments(&self, _repo: &RepoRef, _number: u64) -> DockResult<Vec<GithubComment>> {
            Ok(Vec::new())
        }

        async fn create_comment(&self, _repo: &RepoRef, _number: u64, _body: &str) -> DockResult<GithubComment> {
            Err(DockError::external("GitHub API /comments", "read only"))
        }
    }

    fn repo() -> RepoRef {
        RepoRef {
            owner: "acme".into(),
            name: "web".into(),
        }
    }

    #[tokio::test]
    async fn test_context_and_prompt() {
        let llm = Arc::new(MockLlmClient::with_reply("One open PR fixes the crash."));
        let core = AgentCore::new("Hub", GithubAgent::persona(Some(&repo())), llm.clone(), CompletionOptions::default());
        let agent = GithubAgent::new(core, Arc::new(FakeGithub { pulls_down: false }), Some(repo()));

        let out = agent.process_query("what is being worked on?", &Value::Null).await.unwrap();
        assert_eq!(out.response, "One open PR fixes the crash.");
        let prompt = &llm.prompts()[0];
        assert!(prompt.starts_with("You are Hub, a GitHub assistant working with the repository acme/web."));
        assert!(prompt.contains(
            "Repository: acme/web\nDescription: None\nStars: 120, Forks: 8\n\nRecent open issues (1):\n- #12: Crash on start\n\nRecent open pull requests (1):\n- #13: Fix crash\n"
        ));
    }

    #[tokio::test]
    async fn test_context_without_repo_or_with_failing_section() {
        let llm = Arc::new(MockLlmClient::new());
        let core = AgentCore::new("Hub", GithubAgent::persona(None), llm.clone(), CompletionOptions::default());
        let agent = GithubAgent::new(core, Arc::new(FakeGithub { pulls_down: true }), None);
        assert_eq!(agent.context().await, "No GitHub repository configured.");

        let core = AgentCore::new("Hub", GithubAgent::persona(Some(&repo())), llm, CompletionOptions::default());
        let agent = GithubAgent::new(core, Arc::new(FakeGithub { pulls_down: true }), Some(repo()));
        let context = agent.context().await;
        assert!(context.contains("Recent open issues (1):"));
        assert!(context.ends_with("Couldn't retrieve open pull requests.\n"));
    }
}
