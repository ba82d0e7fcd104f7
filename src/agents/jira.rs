//! Jira Agent：建单、按项目搜索、查看单个 Issue 三种直达模式

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::agents::core::{AgentCore, Persona};
use crate::agents::patterns::{group, PatternTable};
use crate::agents::{delegate_tool_belt, Agent, QueryResponse};
use crate::core::{preview, DockError, DockResult, EntityKind};
use crate::descriptor::AgentDescriptor;
use crate::providers::jira::{JiraApi, JiraIssue, JiraRestClient, NewIssue};
use crate::registry::resolver::{require_setting, setting, ProviderContext, ProviderKind};

const ROLE: &str = "a Jira assistant that helps users manage projects, tickets, and workflows";

#[derive(Debug, Clone, PartialEq)]
enum JiraIntent {
    CreateIssue { project: String, summary: String },
    SearchIssues { project: String, conditions: String },
    GetIssue { key: String },
}

fn intents() -> DockResult<PatternTable<JiraIntent>> {
    PatternTable::compile(&[
        (
            r#"create (?:a )?(?:new )?(?:issue|ticket|task) (?:in|for) (?:project )?([A-Z0-9]+) (?:with )?(?:summary|title) ["']?([^"']+)["']?"#,
            |c| JiraIntent::CreateIssue {
                project: group(c, 1),
                summary: group(c, 2),
            },
        ),
        (
            r"(?:find|search|list|show) (?:all )?issues (?:in|for) (?:project )?([A-Z0-9]+)(?: where | with )?(.*)?",
            |c| JiraIntent::SearchIssues {
                project: group(c, 1),
                conditions: group(c, 2),
            },
        ),
        (r"(?:get|show|tell me about) (?:issue|ticket) ([A-Z]+-\d+)", |c| JiraIntent::GetIssue { key: group(c, 1) }),
    ])
}

/// 搜索条件里的关键词 -> JQL 片段（区分大小写的子串匹配）
fn search_jql(project: &str, conditions: &str) -> String {
    let mut jql = format!("project = {project}");
    if !conditions.is_empty() {
        if conditions.contains("open") || conditions.contains("unresolved") {
            jql.push_str(" AND status != Done AND status != Closed AND status != Resolved");
        }
        if conditions.contains("my") || conditions.contains("assigned to me") {
            jql.push_str(" AND assignee = currentUser()");
        }
        if conditions.contains("bug") {
            jql.push_str(" AND issuetype = Bug");
        }
    }
    jql.push_str(" ORDER BY created DESC");
    jql
}

fn issue_line(issue: &JiraIssue) -> String {
    format!("- {}: {} ({})\n", issue.key, issue.fields.summary, issue.status_name())
}

pub struct JiraAgent {
    core: AgentCore,
    client: Arc<dyn JiraApi>,
    default_project: Option<String>,
    patterns: PatternTable<JiraIntent>,
}

impl JiraAgent {
    pub fn new(core: AgentCore, client: Arc<dyn JiraApi>, default_project: Option<String>) -> DockResult<Self> {
        Ok(Self {
            core,
            client,
            default_project,
            patterns: intents()?,
        })
    }

    pub fn persona() -> Persona {
        Persona::provider("Jira", ROLE)
    }

    /// 凭据取 config.host / username / apiToken，缺省回落到 [providers.jira]
    pub fn from_descriptor(descriptor: &AgentDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let defaults = &ctx.providers.jira;
        let config = &descriptor.config;
        let need = |key: &str, value: Option<String>| require_setting(EntityKind::Agent, &descriptor.id, key, value);
        let host = need("host", setting(config, "host", defaults.host.as_deref()))?;
        let username = need("username", setting(config, "username", defaults.username.as_deref()))?;
        let token = need("apiToken", setting(config, "apiToken", defaults.api_token.as_deref()))?;
        let client = JiraRestClient::new(&host, &username, &token, ctx.providers.http_timeout_secs)?;
        let default_project = setting(config, "defaultProject", defaults.default_project.as_deref());
        tracing::info!("Jira agent initialized for host: {}", host);
        Self::new(
            AgentCore::from_descriptor(descriptor, Self::persona(), ctx),
            Arc::new(client),
            default_project,
        )
    }

    async fn handle(&self, intent: JiraIntent) -> DockResult<String> {
        match intent {
            JiraIntent::CreateIssue { project, summary } => {
                let created = self
                    .client
                    .create_issue(NewIssue {
                        project_key: project.clone(),
                        summary: summary.clone(),
                        description: "Created via AgentDock Jira Agent".to_string(),
                        issue_type: "Task".to_string(),
                        priority: None,
                        assignee: None,
                        labels: None,
                        extra_fields: Map::new(),
                    })
                    .await
                    .map_err(|e| DockError::external("Failed to create issue", e))?;
                tracing::info!("Issue created: {}", created.key);
                Ok(format!(
                    "Issue {} created successfully in project {} with summary \"{}\".",
                    created.key, project, summary
                ))
            }
            JiraIntent::SearchIssues { project, conditions } => {
                let jql = search_jql(&project, &conditions);
                let found = self
                    .client
                    .search(&jql, 10, None)
                    .await
                    .map_err(|e| DockError::external("Failed to search issues", e))?;
                tracing::info!("Found {} issues matching JQL: {}", found.total, jql);

                let mut response = format!("Found {} issues in project {}", found.issues.len(), project);
                if !conditions.is_empty() {
                    response.push_str(&format!(" matching \"{conditions}\""));
                }
                response.push_str(":\n\n");
                for issue in &found.issues {
                    response.push_str(&issue_line(issue));
                }
                Ok(response)
            }
            JiraIntent::GetIssue { key } => {
                let issue = self
                    .client
                    .get_issue(&key, None)
                    .await
                    .map_err(|e| DockError::external(format!("Failed to get issue {key}"), e))?;
                let f = &issue.fields;
                let mut response = format!("Issue {}: {}\n\n", issue.key, f.summary);
                response.push_str(&format!("Status: {}\n", issue.status_name()));
                response.push_str(&format!(
                    "Type: {}\n",
                    f.issuetype.as_ref().map_or("Unknown", |t| t.name.as_str())
                ));
                response.push_str(&format!(
                    "Assignee: {}\n",
                    f.assignee.as_ref().map_or("Unassigned", |a| a.display_name.as_str())
                ));
                if let Some(description) = issue.description_text().filter(|d| !d.is_empty()) {
                    response.push_str(&format!("\nDescription:\n{}\n", preview(&description, 200)));
                }
                Ok(response)
            }
        }
    }

    /// 项目列表（前 5 个）+ 默认项目的最近 Issue；每段失败只替换该段
    pub async fn context(&self) -> String {
        let mut context = String::from("Jira Information:\n");

        match self.client.list_projects().await {
            Ok(projects) => {
                context.push_str(&format!("\nProjects ({}):\n", projects.len()));
                for project in projects.iter().take(5) {
                    context.push_str(&format!("- {}: {}\n", project.key, project.name));
                }
                if projects.len() > 5 {
                    context.push_str(&format!("- ... and {} more\n", projects.len() - 5));
                }
            }
            Err(e) => {
                tracing::warn!("Jira context: project list unavailable: {}", e);
                context.push_str("\nCouldn't retrieve projects.\n");
            }
        }

        if let Some(project) = &self.default_project {
            let jql = format!("project = {project} ORDER BY created DESC");
            match self.client.search(&jql, 5, None).await {
                Ok(recent) => {
                    context.push_str(&format!("\nRecent issues in {} ({} total):\n", project, recent.total));
                    for issue in &recent.issues {
                        context.push_str(&issue_line(issue));
                    }
                }
                Err(e) => {
                    tracing::warn!("Jira context: recent issues unavailable: {}", e);
                    context.push_str(&format!("\nCouldn't retrieve issues from {project}.\n"));
                }
            }
        }
        context
    }
}

#[async_trait]
impl Agent for JiraAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Jira
    }

    async fn process_query(&self, query: &str, tool_params: &Value) -> DockResult<QueryResponse> {
        tracing::info!("Jira agent {} processing query: {}", self.name(), preview(query, 80));
        if let Some(intent) = self.patterns.recognize(query) {
            return Ok(QueryResponse::direct(self.handle(intent).await?));
        }
        let context = self.context().await;
        self.core.escalate(query, tool_params, &context).await
    }

    delegate_tool_belt!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionOptions, MockLlmClient};
    use crate::providers::jira::{CreatedIssue, JiraComment, JiraIssueFields, JiraProject, JiraSearch, JiraTransition, JiraUser, Named};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeJira {
        projects: Vec<JiraProject>,
        issues: Vec<JiraIssue>,
        fail_search: bool,
        created: Mutex<Vec<NewIssue>>,
        searches: Mutex<Vec<(String, u64)>>,
    }

    fn issue(key: &str, summary: &str, status: &str) -> JiraIssue {
        JiraIssue {
            id: key.to_lowercase(),
            key: key.into(),
            fields: JiraIssueFields {
                summary: summary.into(),
                status: Some(Named { id: None, name: status.into() }),
                ..Default::default()
            },
        }
    }

    fn project(key: &str) -> JiraProject {
        JiraProject {
            id: key.to_lowercase(),
            key: key.into(),
            name: format!("{key} project"),
            description: None,
        }
    }

    #[async_trait]
    impl JiraApi for FakeJira {
        async fn list_projects(&self) -> DockResult<Vec<JiraProject>> {
            Ok(self.projects.clone())
        }

        async fn search(&self, jql: &str, max_results: u64, _fields: Option<&[String]>) -> DockResult<JiraSearch> {
            self.searches.lock().unwrap().push((jql.to_string(), max_results));
            if self.fail_search {
                return Err(DockError::external("Jira /search", "HTTP 400: bad jql"));
            }
            Ok(JiraSearch {
                total: self.issues.len() as u64,
                issues: self.issues.clone(),
            })
        }

        async fn get_issue(&self, key: &str, _fields: Option<&[String]>) -> DockResult<JiraIssue> {
            self.issues
                .iter()
                .find(|i| i.key == key)
                .cloned()
                .ok_or_else(|| DockError::external(format!("Jira /issue/{key}"), "HTTP 404: not found"))
        }

        async fn create_issue(&self, issue: NewIssue) -> DockResult<CreatedIssue> {
            self.created.lock().unwrap().push(issue);
            Ok(CreatedIssue {
                id: "10001".into(),
                key: "OPS-42".into(),
                self_url: String::new(),
            })
        }

        async fn update_issue(&self, _key: &str, _fields: Map<String, Value>) -> DockResult<()> {
            Ok(())
        }

        async fn add_comment(&self, _key: &str, _body: &str) -> DockResult<JiraComment> {
            Err(DockError::external("Jira /comment", "unsupported"))
        }

        async fn list_transitions(&self, _key: &str) -> DockResult<Vec<JiraTransition>> {
            Ok(Vec::new())
        }

        async fn transition_issue(&self, _key: &str, _id: &str, _comment: Option<&str>) -> DockResult<()> {
            Ok(())
        }
    }

    fn agent(fake: Arc<FakeJira>, llm: Arc<MockLlmClient>, default_project: Option<&str>) -> JiraAgent {
        let core = AgentCore::new("Jira Bot", JiraAgent::persona(), llm, CompletionOptions::default());
        JiraAgent::new(core, fake, default_project.map(String::from)).unwrap()
    }

    #[tokio::test]
    async fn test_create_issue_pattern_skips_completion() {
        let fake = Arc::new(FakeJira::default());
        let llm = Arc::new(MockLlmClient::new());
        let agent = agent(fake.clone(), llm.clone(), None);

        let out = agent
            .process_query("create issue in project OPS with summary 'Fix login'", &json!({}))
            .await
            .unwrap();
        assert_eq!(out.response, "Issue OPS-42 created successfully in project OPS with summary \"Fix login\".");
        assert!(out.tool_results.is_empty());
        assert_eq!(llm.call_count(), 0);

        let created = fake.created.lock().unwrap();
        assert_eq!(created[0].project_key, "OPS");
        assert_eq!(created[0].issue_type, "Task");
        assert_eq!(created[0].description, "Created via AgentDock Jira Agent");
    }

    #[tokio::test]
    async fn test_search_pattern_builds_jql() {
        let fake = Arc::new(FakeJira {
            issues: vec![issue("OPS-1", "Login broken", "To Do"), issue("OPS-2", "Crash", "In Progress")],
            ..Default::default()
        });
        let agent = agent(fake.clone(), Arc::new(MockLlmClient::new()), None);

        let out = agent.process_query("list issues in OPS where open bugs", &Value::Null).await.unwrap();
        assert_eq!(
            out.response,
            "Found 2 issues in project OPS matching \"open bugs\":\n\n- OPS-1: Login broken (To Do)\n- OPS-2: Crash (In Progress)\n"
        );
        let (jql, max) = fake.searches.lock().unwrap()[0].clone();
        assert_eq!(
            jql,
            "project = OPS AND status != Done AND status != Closed AND status != Resolved AND issuetype = Bug ORDER BY created DESC"
        );
        assert_eq!(max, 10);
    }

    #[tokio::test]
    async fn test_get_issue_pattern_and_provider_error() {
        let mut detailed = issue("OPS-7", "Slow dashboard", "Done");
        detailed.fields.assignee = Some(JiraUser { display_name: "Mei".into() });
        detailed.fields.issuetype = Some(Named { id: None, name: "Bug".into() });
        let fake = Arc::new(FakeJira {
            issues: vec![detailed],
            ..Default::default()
        });
        let agent = agent(fake, Arc::new(MockLlmClient::new()), None);

        let out = agent.process_query("tell me about issue OPS-7", &Value::Null).await.unwrap();
        assert_eq!(out.response, "Issue OPS-7: Slow dashboard\n\nStatus: Done\nType: Bug\nAssignee: Mei\n");

        let err = agent.process_query("show ticket OPS-99", &Value::Null).await.unwrap_err();
        assert!(matches!(err, DockError::ExternalService { .. }));
        assert!(err.to_string().starts_with("Failed to get issue OPS-99"));
    }

    #[tokio::test]
    async fn test_escalation_context_tolerates_partial_failure() {
        let fake = Arc::new(FakeJira {
            projects: (1..=7).map(|i| project(&format!("P{i}"))).collect(),
            fail_search: true,
            ..Default::default()
        });
        let llm = Arc::new(MockLlmClient::with_reply("Try the OPS board."));
        let agent = agent(fake, llm.clone(), Some("OPS"));

        let out = agent.process_query("how is the sprint going?", &Value::Null).await.unwrap();
        assert_eq!(out.response, "Try the OPS board.");
        assert_eq!(llm.call_count(), 1);

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Projects (7):\n- P1: P1 project\n"));
        assert!(prompt.contains("- ... and 2 more\n"));
        assert!(prompt.contains("Couldn't retrieve issues from OPS."));
        assert!(prompt.contains("User query: how is the sprint going?"));
    }
}
