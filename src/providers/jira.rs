//! Jira Provider：REST API v3（Basic 鉴权，用户名 + API token）

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::DockResult;
use crate::providers::http::{Auth, HttpProvider};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraProject {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JiraIssueFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: Option<Named>,
    #[serde(default)]
    pub issuetype: Option<Named>,
    #[serde(default)]
    pub priority: Option<Named>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(default)]
    pub reporter: Option<JiraUser>,
    /// v3 中为 ADF 文档，旧实例为纯文本
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraIssue {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub fields: JiraIssueFields,
}

impl JiraIssue {
    pub fn status_name(&self) -> &str {
        self.fields.status.as_ref().map_or("Unknown", |s| s.name.as_str())
    }

    /// 描述的纯文本（ADF 文档取所有 text 节点拼接）
    pub fn description_text(&self) -> Option<String> {
        fn collect(v: &Value, out: &mut String) {
            match v {
                Value::String(s) => out.push_str(s),
                Value::Object(map) => {
                    if let Some(Value::String(t)) = map.get("text") {
                        out.push_str(t);
                    }
                    if let Some(content) = map.get("content") {
                        collect(content, out);
                    }
                }
                Value::Array(items) => items.iter().for_each(|i| collect(i, out)),
                _ => {}
            }
        }
        let mut text = String::new();
        collect(self.fields.description.as_ref()?, &mut text);
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraSearch {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<JiraIssue>,
}

/// 新建 Issue 的字段（extra_fields 原样合并进 fields）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewIssue {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub extra_fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default)]
    pub self_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraComment {
    pub id: String,
    #[serde(default)]
    pub author: Option<JiraUser>,
    #[serde(default)]
    pub created: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraTransition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub to: Named,
}

#[async_trait]
pub trait JiraApi: Send + Sync {
    async fn list_projects(&self) -> DockResult<Vec<JiraProject>>;

    async fn search(&self, jql: &str, max_results: u64, fields: Option<&[String]>) -> DockResult<JiraSearch>;

    /// fields 为 None 时返回全部字段
    async fn get_issue(&self, key: &str, fields: Option<&[String]>) -> DockResult<JiraIssue>;

    async fn create_issue(&self, issue: NewIssue) -> DockResult<CreatedIssue>;

    async fn update_issue(&self, key: &str, fields: Map<String, Value>) -> DockResult<()>;

    async fn add_comment(&self, key: &str, body: &str) -> DockResult<JiraComment>;

    async fn list_transitions(&self, key: &str) -> DockResult<Vec<JiraTransition>>;

    async fn transition_issue(&self, key: &str, transition_id: &str, comment: Option<&str>) -> DockResult<()>;
}

/// 纯文本包成 ADF 段落
fn adf(text: &str) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": [{ "type": "paragraph", "content": [{ "type": "text", "text": text }] }]
    })
}

pub struct JiraRestClient {
    http: HttpProvider,
}

impl JiraRestClient {
    pub fn new(host: &str, username: &str, api_token: &str, timeout_secs: u64) -> DockResult<Self> {
        let base = if host.starts_with("http") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let auth = Auth::Basic {
            username: username.to_string(),
            password: api_token.to_string(),
        };
        Ok(Self {
            http: HttpProvider::new("Jira API", base, auth, timeout_secs)?,
        })
    }
}

#[async_trait]
impl JiraApi for JiraRestClient {
    async fn list_projects(&self) -> DockResult<Vec<JiraProject>> {
        self.http.get("rest/api/3/project", &[]).await
    }

    async fn search(&self, jql: &str, max_results: u64, fields: Option<&[String]>) -> DockResult<JiraSearch> {
        let mut query = vec![("jql", jql.to_string()), ("maxResults", max_results.to_string())];
        if let Some(fields) = fields {
            query.push(("fields", fields.join(",")));
        }
        self.http.get("rest/api/3/search", &query).await
    }

    async fn get_issue(&self, key: &str, fields: Option<&[String]>) -> DockResult<JiraIssue> {
        let query: Vec<(&str, String)> = fields.map(|f| ("fields", f.join(","))).into_iter().collect();
        self.http.get(&format!("rest/api/3/issue/{key}"), &query).await
    }

    async fn create_issue(&self, issue: NewIssue) -> DockResult<CreatedIssue> {
        let mut fields = Map::new();
        fields.insert("project".into(), json!({ "key": issue.project_key }));
        fields.insert("summary".into(), json!(issue.summary));
        fields.insert("description".into(), adf(&issue.description));
        fields.insert("issuetype".into(), json!({ "name": issue.issue_type }));
        if let Some(priority) = issue.priority {
            fields.insert("priority".into(), json!({ "name": priority }));
        }
        if let Some(assignee) = issue.assignee {
            fields.insert("assignee".into(), json!({ "id": assignee }));
        }
        if let Some(labels) = issue.labels {
            fields.insert("labels".into(), json!(labels));
        }
        fields.extend(issue.extra_fields);
        self.http
            .post("rest/api/3/issue", &json!({ "fields": fields }))
            .await
    }

    async fn update_issue(&self, key: &str, mut fields: Map<String, Value>) -> DockResult<()> {
        let description = fields.get("description").and_then(Value::as_str).map(adf);
        if let Some(description) = description {
            fields.insert("description".into(), description);
        }
        self.http
            .send_no_content(Method::PUT, &format!("rest/api/3/issue/{key}"), &json!({ "fields": fields }))
            .await
    }

    async fn add_comment(&self, key: &str, body: &str) -> DockResult<JiraComment> {
        self.http
            .post(&format!("rest/api/3/issue/{key}/comment"), &json!({ "body": adf(body) }))
            .await
    }

    async fn list_transitions(&self, key: &str) -> DockResult<Vec<JiraTransition>> {
        #[derive(Deserialize)]
        struct Transitions {
            transitions: Vec<JiraTransition>,
        }
        let result: Transitions = self
            .http
            .get(&format!("rest/api/3/issue/{key}/transitions"), &[])
            .await?;
        Ok(result.transitions)
    }

    async fn transition_issue(&self, key: &str, transition_id: &str, comment: Option<&str>) -> DockResult<()> {
        let mut body = json!({ "transition": { "id": transition_id } });
        if let Some(comment) = comment {
            body["update"] = json!({ "comment": [{ "add": { "body": adf(comment) } }] });
        }
        self.http
            .send_no_content(Method::POST, &format!("rest/api/3/issue/{key}/transitions"), &body)
            .await
    }
}
