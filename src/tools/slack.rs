//! Slack Tool：发消息、频道列表 / 历史、建频道

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::{DockResult, EntityKind};
use crate::descriptor::ToolDescriptor;
use crate::providers::slack::{normalize_channel_name, SlackApi, SlackWebClient};
use crate::registry::resolver::{require_setting, setting, ProviderContext};
use crate::tools::contract::{
    provider_error, unimplemented_action, ActionParams, ActionSpec, ParamSpec, ParamType, Tool, ToolOutput,
};
use crate::tools::jira::descriptor_description;

pub struct SlackTool {
    name: String,
    description: String,
    client: Arc<dyn SlackApi>,
    default_channel: String,
    actions: Vec<ActionSpec>,
}

impl SlackTool {
    pub fn new(name: impl Into<String>, client: Arc<dyn SlackApi>, default_channel: Option<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("{name} tool"),
            name,
            client,
            default_channel: default_channel.unwrap_or_else(|| "general".to_string()),
            actions: catalogue(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn from_descriptor(descriptor: &ToolDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let defaults = &ctx.providers.slack;
        let token = require_setting(
            EntityKind::Tool,
            &descriptor.id,
            "token",
            setting(&descriptor.auth_config, "token", defaults.token.as_deref()),
        )?;
        let client = SlackWebClient::new(&token, ctx.providers.http_timeout_secs)?;
        let channel = setting(&descriptor.config, "defaultChannel", defaults.default_channel.as_deref());
        tracing::info!("Slack tool initialized: {}", descriptor.name);
        Ok(Self::new(descriptor.name.clone(), Arc::new(client), channel)
            .with_description(descriptor_description(descriptor)))
    }

    async fn send_message(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let channel = params.opt_str("channel")?.unwrap_or(self.default_channel.as_str());
        let posted = self
            .client
            .post_message(channel, params.str("text")?, params.get("blocks"))
            .await
            .map_err(provider_error("Failed to send Slack message"))?;
        Ok(ToolOutput::ok(json!({
            "channel": posted.channel,
            "ts": posted.ts,
            "message": { "text": posted.text },
        })))
    }

    async fn get_channels(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let channels = self
            .client
            .list_channels(params.u64("limit")?)
            .await
            .map_err(provider_error("Failed to get Slack channels"))?;
        let data: Vec<Value> = channels
            .into_iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "name": c.name,
                    "isPrivate": c.is_private,
                    "numMembers": c.num_members,
                    "topic": c.topic.value,
                    "purpose": c.purpose.value,
                })
            })
            .collect();
        Ok(ToolOutput::ok(json!(data)))
    }

    async fn get_channel_history(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let history = self
            .client
            .history(params.str("channel")?, params.u64("limit")?)
            .await
            .map_err(provider_error("Failed to get channel history"))?;
        let messages: Vec<Value> = history
            .messages
            .into_iter()
            .map(|m| json!({ "text": m.text, "user": m.user, "ts": m.ts, "threadReplies": m.reply_count }))
            .collect();
        Ok(ToolOutput::ok(json!({ "messages": messages, "hasMore": history.has_more })))
    }

    async fn create_channel(&self, params: &ActionParams) -> DockResult<ToolOutput> {
        let name = normalize_channel_name(params.str("name")?);
        let is_private = params.get("isPrivate").and_then(Value::as_bool).unwrap_or(false);
        let channel = self
            .client
            .create_channel(&name, is_private)
            .await
            .map_err(provider_error("Failed to create Slack channel"))?;
        if let Some(topic) = params.opt_str("description")?.filter(|d| !d.is_empty()) {
            self.client
                .set_topic(&channel.id, topic)
                .await
                .map_err(provider_error("Failed to create Slack channel"))?;
        }
        Ok(ToolOutput::ok(json!({
            "id": channel.id,
            "name": channel.name,
            "isPrivate": channel.is_private,
            "creator": channel.creator,
        })))
    }
}

fn catalogue() -> Vec<ActionSpec> {
    vec![
        ActionSpec::info(),
        ActionSpec::new("sendMessage", "Send a message to a Slack channel")
            .param(ParamSpec::required("channel", ParamType::String, "Channel name or ID"))
            .param(ParamSpec::required("text", ParamType::String, "Message text"))
            .param(ParamSpec::optional("blocks", ParamType::Array, "Message blocks (formatted content)")),
        ActionSpec::new("getChannels", "List all accessible channels").param(
            ParamSpec::optional("limit", ParamType::Number, "Maximum number of channels to return").with_default(json!(100)),
        ),
        ActionSpec::new("getChannelHistory", "Get message history for a channel")
            .param(ParamSpec::required("channel", ParamType::String, "Channel name or ID"))
            .param(
                ParamSpec::optional("limit", ParamType::Number, "Maximum number of messages to return")
                    .with_default(json!(20)),
            ),
        ActionSpec::new("createChannel", "Create a new Slack channel")
            .param(ParamSpec::required("name", ParamType::String, "Channel name"))
            .param(ParamSpec::optional("isPrivate", ParamType::Boolean, "Whether the channel should be private"))
            .param(ParamSpec::optional("description", ParamType::String, "Channel description")),
    ]
}

#[async_trait]
impl Tool for SlackTool {
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
            "sendMessage" => self.send_message(&params).await,
            "getChannels" => self.get_channels(&params).await,
            "getChannelHistory" => self.get_channel_history(&params).await,
            "createChannel" => self.create_channel(&params).await,
            other => Err(unimplemented_action(&self.name, other)),
        }
    }
}
