//! Jira Tool：项目、Issue 查询 / 创建 / 更新、评论、状态流转

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::core::{DockError, DockResult, EntityKind};
use crate::descriptor::ToolDescriptor;
use crate::providers::jira::{JiraApi, JiraIssue, JiraRestClient, NewIssue};
use crate::registry::resolver::{require_setting, setting, ProviderContext};
use crate::tools::contract::{
    provider_error, unimplemented_action, ActionParams, ActionSpec, ParamSpec, ParamType, Tool, ToolOutput,
};

const DEFAULT_ISSUE_FIELDS: [&str; 6] = ["summary", "status", "assignee", "priority", "created", "updated"];

pub struct JiraTool {
    name: String,
    description: String,
    client: Arc<dyn JiraApi>,
    default_project: Option<String>,
    actions: Vec<ActionSpec>,
}

impl JiraTool {
    pub fn new(name: impl Into<String>, client: Arc<dyn JiraApi>, default_project: Option<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("{name} tool"),
            name,
            client,
            default_project,
            actions: catalogue(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 凭据取 authConfig.host / username / apiToken，缺省回落到 [providers.jira]
    pub fn from_descriptor(descriptor: &ToolDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let defaults = &ctx.providers.jira;
        let auth = &descriptor.auth_config;
        let need = |key: &str, value: Option<String>| require_setting(EntityKind::Tool, &descriptor.id, key, value);
        let host = need("host", setting(auth, "host", defaults.host.as_deref()))?;
        let username = need("username", setting(auth, "username", defaults.username.as_deref()))?;
        let token = need("apiToken", setting(auth, "apiToken", defaults.api_token.as_deref()))?;
        let client = JiraRestClient::new(&host, &username, &token, ctx.providers.http_timeout_secs)?;
        let default_project = setting(&descriptor.config, "defaultProject", defaults.default_project.as_deref());
        tracing::info!("Jira tool initialized for host: {}", host);
        Ok(Self::new(descriptor.name.clone(), Arc::new(client), default_project)
            .with_description(descriptor_description(descriptor)))
    }

    async fn get_projects(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let max = params.u64("maxResults")? as usize;
        let projects = self
            .client
            .list_projects()
            .await
            .map_err(provider_error("Failed to get Jira projects"))?;
        let data: Vec<Value> = projects
            .into_iter()
            .take(max)
            .map(|p| json!({ "id": p.id, "key": p.key, "name": p.name, "description": p.description }))
            .collect();
        Ok(ToolOutput::ok(json!(data)))
    }

    async fn get_issues(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let fields = field_list(params)?;
        let result = self
            .client
            .search(params.str("jql")?, params.u64("maxResults")?, Some(&fields))
            .await
            .map_err(provider_error("Failed to search Jira issues"))?;
        let issues: Vec<Value> = result.issues.iter().map(|i| format_issue(i, false)).collect();
        Ok(ToolOutput::ok(json!({ "total": result.total, "issues": issues })))
    }

    async fn get_issue(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let issue = self
            .client
            .get_issue(params.str("issueKey")?, params.opt_str_list("fields")?.as_deref())
            .await
            .map_err(provider_error("Failed to get Jira issue"))?;
        Ok(ToolOutput::ok(format_issue(&issue, true)))
    }

    async fn create_issue(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let project_key = params
            .opt_str("projectKey")?
            .map(String::from)
            .or_else(|| self.default_project.clone())
            .ok_or_else(|| DockError::MissingParameter {
                action: "createIssue".into(),
                parameter: "projectKey".into(),
            })?;
        let extra_fields = match params.get("customFields") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let issue = NewIssue {
            project_key,
            summary: params.str("summary")?.to_string(),
            description: params.str("description")?.to_string(),
            issue_type: params.str("issueType")?.to_string(),
            priority: params.opt_str("priority")?.map(String::from),
            assignee: params.opt_str("assignee")?.map(String::from),
            labels: params.opt_str_list("labels")?,
            extra_fields,
        };
        let created = self
            .client
            .create_issue(issue)
            .await
            .map_err(provider_error("Failed to create Jira issue"))?;
        ToolOutput::from_serialize(&created)
    }

    async fn update_issue(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let key = params.str("issueKey")?;
        let mut fields = match params.get("fields") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        for name in ["summary", "description"] {
            if let Some(v) = params.opt_str(name)? {
                fields.insert(name.into(), json!(v));
            }
        }
        if let Some(assignee) = params.opt_str("assignee")? {
            fields.insert("assignee".into(), json!({ "id": assignee }));
        }
        if let Some(priority) = params.opt_str("priority")? {
            fields.insert("priority".into(), json!({ "name": priority }));
        }

        if let Some(status) = params.opt_str("status")? {
            let transitions = self
                .client
                .list_transitions(key)
                .await
                .map_err(provider_error("Failed to update Jira issue"))?;
            let transition = transitions
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(status))
                .ok_or_else(|| {
                    DockError::external(
                        "Failed to update Jira issue",
                        format!("Status '{status}' is not a valid transition for issue {key}"),
                    )
                })?;
            self.client
                .transition_issue(key, &transition.id, None)
                .await
                .map_err(provider_error("Failed to update Jira issue"))?;
        }

        if !fields.is_empty() {
            self.client
                .update_issue(key, fields)
                .await
                .map_err(provider_error("Failed to update Jira issue"))?;
        }
        let updated = self
            .client
            .get_issue(key, None)
            .await
            .map_err(provider_error("Failed to update Jira issue"))?;
        Ok(ToolOutput::ok(format_issue(&updated, false)))
    }

    async fn add_comment(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let body = params.str("body")?;
        let comment = self
            .client
            .add_comment(params.str("issueKey")?, body)
            .await
            .map_err(provider_error("Failed to add comment"))?;
        Ok(ToolOutput::ok(json!({
            "id": comment.id,
            "author": comment.author.map(|a| a.display_name),
            "body": body,
            "created": comment.created,
        })))
    }

    async fn get_transitions(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let transitions = self
            .client
            .list_transitions(params.str("issueKey")?)
            .await
            .map_err(provider_error("Failed to get transitions"))?;
        ToolOutput::from_serialize(&transitions)
    }

    async fn transition_issue(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let key = params.str("issueKey")?;
        let comment = params.opt_str("comment")?;
        self.client
            .transition_issue(key, params.str("transitionId")?, comment)
            .await
            .map_err(provider_error("Failed to transition issue"))?;
        let issue = self
            .client
            .get_issue(key, None)
            .await
            .map_err(provider_error("Failed to transition issue"))?;
        Ok(ToolOutput::ok(json!({
            "key": issue.key,
            "status": issue.status_name(),
            "comment": comment.map(|c| json!({ "added": true, "body": c })),
        })))
    }
}

pub(crate) fn descriptor_description(descriptor: &ToolDescriptor) -> String {
    if descriptor.description.is_empty() {
        format!("{} tool", descriptor.name)
    } else {
        descriptor.description.clone()
    }
}

fn field_list(params: &ActionParams) -> DockResult<Vec<String>> {
    Ok(params
        .opt_str_list("fields")?
        .unwrap_or_else(|| DEFAULT_ISSUE_FIELDS.iter().map(|f| f.to_string()).collect()))
}

/// 统一的 Issue 输出结构；detailed 时附带描述、类型与标签
pub(crate) fn format_issue(issue: &JiraIssue, detailed: bool) -> Value {
    let f = &issue.fields;
    let mut out = json!({
        "id": issue.id,
        "key": issue.key,
        "summary": f.summary,
        "status": f.status.as_ref().map(|s| &s.name),
        "priority": f.priority.as_ref().map(|p| &p.name),
        "assignee": f.assignee.as_ref().map(|a| &a.display_name),
        "reporter": f.reporter.as_ref().map(|r| &r.display_name),
        "created": f.created,
        "updated": f.updated,
    });
    if detailed {
        out["description"] = json!(issue.description_text());
        out["issuetype"] = json!(f.issuetype.as_ref().map(|t| &t.name));
        out["labels"] = json!(f.labels);
    }
    out
}

fn catalogue() -> Vec<ActionSpec> {
    use ParamType::*;
    let issue_key = || ParamSpec::required("issueKey", String, "Issue key (e.g., PROJECT-123)");
    vec![
        ActionSpec::info(),
        ActionSpec::new("getProjects", "Get a list of accessible projects")
            .param(ParamSpec::optional("maxResults", Number, "Maximum number of projects to return").with_default(json!(50))),
        ActionSpec::new("getIssues", "Search for issues with JQL")
            .param(ParamSpec::required("jql", String, "JQL query string"))
            .param(ParamSpec::optional("maxResults", Number, "Maximum number of issues to return").with_default(json!(20)))
            .param(ParamSpec::optional("fields", Array, "Fields to include in the result")),
        ActionSpec::new("getIssue", "Get details of a specific issue")
            .param(issue_key())
            .param(ParamSpec::optional("fields", Array, "Fields to include in the result")),
        ActionSpec::new("createIssue", "Create a new issue")
            .param(ParamSpec::optional("projectKey", String, "Project key"))
            .param(ParamSpec::required("summary", String, "Issue summary"))
            .param(ParamSpec::required("description", String, "Issue description"))
            .param(ParamSpec::required("issueType", String, "Issue type name (e.g., Bug, Task)"))
            .param(ParamSpec::optional("priority", String, "Priority name (e.g., High, Medium)"))
            .param(ParamSpec::optional("assignee", String, "Account id of assignee"))
            .param(ParamSpec::optional("labels", Array, "Array of label strings"))
            .param(ParamSpec::optional("customFields", Object, "Custom fields as key-value pairs")),
        ActionSpec::new("updateIssue", "Update an existing issue")
            .param(issue_key())
            .param(ParamSpec::optional("summary", String, "Updated summary"))
            .param(ParamSpec::optional("description", String, "Updated description"))
            .param(ParamSpec::optional("assignee", String, "Account id of assignee"))
            .param(ParamSpec::optional("status", String, "New status name"))
            .param(ParamSpec::optional("priority", String, "New priority name"))
            .param(ParamSpec::optional("fields", Object, "Fields to update as key-value pairs")),
        ActionSpec::new("addComment", "Add a comment to an issue")
            .param(issue_key())
            .param(ParamSpec::required("body", String, "Comment text")),
        ActionSpec::new("getTransitions", "Get available transitions for an issue").param(issue_key()),
        ActionSpec::new("transitionIssue", "Transition an issue to a new status")
            .param(issue_key())
            .param(ParamSpec::required("transitionId", String, "Transition ID"))
            .param(ParamSpec::optional("comment", String, "Comment for the transition")),
    ]
}

#[async_trait]
impl Tool for JiraTool {
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
            "getProjects" => self.get_projects(&params).await,
            "getIssues" => self.get_issues(&params).await,
            "getIssue" => self.get_issue(&params).await,
            "createIssue" => self.create_issue(&params).await,
            "updateIssue" => self.update_issue(&params).await,
            "addComment" => self.add_comment(&params).await,
            "getTransitions" => self.get_transitions(&params).await,
            "transitionIssue" => self.transition_issue(&params).await,
            other => Err(unimplemented_action(&self.name, other)),
        }
    }
}
