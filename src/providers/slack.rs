//! Slack Provider：Web API（Bearer bot token）
//!
//! Web API 即使失败也返回 200，需检查响应体中的 ok / error。

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::{DockError, DockResult};
use crate::providers::http::{Auth, HttpProvider};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlackChannel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub num_members: Option<u64>,
    #[serde(default)]
    pub topic: TextValue,
    #[serde(default)]
    pub purpose: TextValue,
    #[serde(default)]
    pub creator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub reply_count: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlackHistory {
    #[serde(default)]
    pub messages: Vec<SlackMessage>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
    #[serde(default)]
    pub text: String,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str, blocks: Option<&Value>) -> DockResult<PostedMessage>;

    async fn list_channels(&self, limit: u64) -> DockResult<Vec<SlackChannel>>;

    async fn history(&self, channel: &str, limit: u64) -> DockResult<SlackHistory>;

    async fn channel_info(&self, channel: &str) -> DockResult<SlackChannel>;

    async fn create_channel(&self, name: &str, is_private: bool) -> DockResult<SlackChannel>;

    async fn set_topic(&self, channel_id: &str, topic: &str) -> DockResult<()>;
}

/// 频道名规范化：小写，非 [a-z0-9_-] 替换为 -，最长 79 字符
pub fn normalize_channel_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' { c } else { '-' })
        .take(79)
        .collect()
}

pub struct SlackWebClient {
    http: HttpProvider,
}

impl SlackWebClient {
    pub fn new(token: &str, timeout_secs: u64) -> DockResult<Self> {
        Self::with_base_url("https://slack.com/api", token, timeout_secs)
    }

    pub fn with_base_url(base_url: &str, token: &str, timeout_secs: u64) -> DockResult<Self> {
        Ok(Self {
            http: HttpProvider::new("Slack API", base_url, Auth::Bearer(token.to_string()), timeout_secs)?,
        })
    }

    /// 调用 Web API 方法，检查 ok 后取出 field 字段（None 表示整个响应体）
    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value, field: Option<&str>) -> DockResult<T> {
        let mut resp: Value = self.http.post(method, &body).await?;
        if !resp.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = resp.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
            return Err(DockError::external(format!("Slack API {method}"), error));
        }
        let value = match field {
            Some(f) => resp.get_mut(f).map(Value::take).unwrap_or(Value::Null),
            None => resp,
        };
        serde_json::from_value(value).map_err(|e| DockError::external(format!("Slack API {method}"), e))
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn post_message(&self, channel: &str, text: &str, blocks: Option<&Value>) -> DockResult<PostedMessage> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(blocks) = blocks {
            body["blocks"] = blocks.clone();
        }
        let resp: Value = self.call("chat.postMessage", body, None).await?;
        Ok(PostedMessage {
            channel: resp["channel"].as_str().unwrap_or(channel).to_string(),
            ts: resp["ts"].as_str().unwrap_or_default().to_string(),
            text: resp["message"]["text"].as_str().unwrap_or(text).to_string(),
        })
    }

    async fn list_channels(&self, limit: u64) -> DockResult<Vec<SlackChannel>> {
        self.call(
            "conversations.list",
            json!({ "limit": limit, "exclude_archived": true }),
            Some("channels"),
        )
        .await
    }

    async fn history(&self, channel: &str, limit: u64) -> DockResult<SlackHistory> {
        self.call("conversations.history", json!({ "channel": channel, "limit": limit }), None)
            .await
    }

    async fn channel_info(&self, channel: &str) -> DockResult<SlackChannel> {
        self.call(
            "conversations.info",
            json!({ "channel": channel, "include_num_members": true }),
            Some("channel"),
        )
        .await
    }

    async fn create_channel(&self, name: &str, is_private: bool) -> DockResult<SlackChannel> {
        self.call(
            "conversations.create",
            json!({ "name": name, "is_private": is_private }),
            Some("channel"),
        )
        .await
    }

    async fn set_topic(&self, channel_id: &str, topic: &str) -> DockResult<()> {
        let _: Value = self
            .call("conversations.setTopic", json!({ "channel": channel_id, "topic": topic }), None)
            .await?;
        Ok(())
    }
}
