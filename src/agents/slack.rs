//! Slack Agent：发消息、频道信息、建频道

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::core::{AgentCore, Persona};
use crate::agents::patterns::{group, PatternTable};
use crate::agents::{delegate_tool_belt, Agent, QueryResponse};
use crate::core::{preview, DockError, DockResult, EntityKind};
use crate::descriptor::AgentDescriptor;
use crate::providers::slack::{SlackApi, SlackWebClient};
use crate::registry::resolver::{require_setting, setting, ProviderContext, ProviderKind};

const ROLE: &str = "a Slack assistant that helps users manage communication, channels, and messages";

#[derive(Debug, Clone, PartialEq)]
enum SlackIntent {
    SendMessage { channel: String, text: String },
    ChannelInfo { channel: String },
    CreateChannel { name: String },
}

fn intents() -> DockResult<PatternTable<SlackIntent>> {
    PatternTable::compile(&[
        (r"send (?:a )?message to (?:channel )?(?:#)?(\w+) saying (.+)", |c| SlackIntent::SendMessage {
            channel: group(c, 1),
            text: group(c, 2),
        }),
        (r"(?:get|show|tell me about) (?:channel|conversation) (?:#)?(\w+)", |c| SlackIntent::ChannelInfo {
            channel: group(c, 1),
        }),
        (r"create (?:a )?(?:new )?channel (?:called )?(?:#)?(\w+)", |c| SlackIntent::CreateChannel {
            name: group(c, 1).to_lowercase(),
        }),
    ])
}

pub struct SlackAgent {
    core: AgentCore,
    client: Arc<dyn SlackApi>,
    default_channel: String,
    patterns: PatternTable<SlackIntent>,
}

impl SlackAgent {
    pub fn new(core: AgentCore, client: Arc<dyn SlackApi>, default_channel: Option<String>) -> DockResult<Self> {
        Ok(Self {
            core,
            client,
            default_channel: default_channel.unwrap_or_else(|| "general".to_string()),
            patterns: intents()?,
        })
    }

    pub fn persona() -> Persona {
        Persona::provider("Slack", ROLE)
    }

    pub fn from_descriptor(descriptor: &AgentDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let defaults = &ctx.providers.slack;
        let token = require_setting(
            EntityKind::Agent,
            &descriptor.id,
            "slackToken",
            setting(&descriptor.config, "slackToken", defaults.token.as_deref()),
        )?;
        let client = SlackWebClient::new(&token, ctx.providers.http_timeout_secs)?;
        let channel = setting(&descriptor.config, "defaultChannel", defaults.default_channel.as_deref());
        let agent = Self::new(
            AgentCore::from_descriptor(descriptor, Self::persona(), ctx),
            Arc::new(client),
            channel,
        )?;
        tracing::info!("Slack agent initialized for default channel: {}", agent.default_channel);
        Ok(agent)
    }

    async fn handle(&self, intent: SlackIntent) -> DockResult<String> {
        match intent {
            SlackIntent::SendMessage { channel, text } => {
                self.client
                    .post_message(&channel, &text, None)
                    .await
                    .map_err(|e| DockError::external(format!("Failed to send message to #{channel}"), e))?;
                tracing::info!("Message sent to channel {}", channel);
                Ok(format!("Message sent to #{channel}: \"{text}\""))
            }
            SlackIntent::ChannelInfo { channel } => {
                let fail = |e: DockError| DockError::external(format!("Couldn't get information for channel #{channel}"), e);
                let info = self.client.channel_info(&channel).await.map_err(fail)?;
                let history = self.client.history(&channel, 5).await.map_err(fail)?;
                let count = history.messages.len();
                Ok(format!(
                    "Channel #{} has {} members. Recent messages: {} in the last {}.",
                    info.name,
                    info.num_members.unwrap_or(0),
                    count,
                    if count > 0 { "period" } else { "day" }
                ))
            }
            SlackIntent::CreateChannel { name } => {
                let created = self
                    .client
                    .create_channel(&name, false)
                    .await
                    .map_err(|e| DockError::external(format!("Failed to create channel #{name}"), e))?;
                Ok(format!("Channel #{} has been created successfully!", created.name))
            }
        }
    }

    /// 频道列表（最多 10 个）+ 默认频道最近 5 条消息
    pub async fn context(&self) -> String {
        let mut context = String::from("Slack Information:\n");

        match self.client.list_channels(10).await {
            Ok(channels) => {
                context.push_str(&format!("\nChannels ({}):\n", channels.len()));
                for channel in &channels {
                    let private = if channel.is_private { " (private)" } else { "" };
                    context.push_str(&format!("- #{}{}\n", channel.name, private));
                }
            }
            Err(e) => {
                tracing::warn!("Slack context: channel list unavailable: {}", e);
                context.push_str("\nCouldn't retrieve channels.\n");
            }
        }

        match self.client.history(&self.default_channel, 5).await {
            Ok(history) => {
                context.push_str(&format!(
                    "\nRecent messages in #{} ({}):\n",
                    self.default_channel,
                    history.messages.len()
                ));
                for message in &history.messages {
                    context.push_str(&format!("- {}\n", preview(&message.text, 50)));
                }
            }
            Err(e) => {
                tracing::warn!("Slack context: history unavailable: {}", e);
                context.push_str(&format!("\nCouldn't retrieve messages from #{}.\n", self.default_channel));
            }
        }
        context
    }
}

#[async_trait]
impl Agent for SlackAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Slack
    }

    async fn process_query(&self, query: &str, tool_params: &Value) -> DockResult<QueryResponse> {
        tracing::info!("Slack agent {} processing query: {}", self.name(), preview(query, 80));
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
    use crate::providers::slack::{PostedMessage, SlackChannel, SlackHistory, SlackMessage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSlack {
        posted: Mutex<Vec<(String, String)>>,
        created: Mutex<Vec<String>>,
        channels_down: bool,
    }

    fn channel(name: &str, is_private: bool) -> SlackChannel {
        SlackChannel {
            id: format!("C{}", name.to_uppercase()),
            name: name.into(),
            is_private,
            num_members: Some(12),
            ..Default::default()
        }
    }

    #[async_trait]
    impl SlackApi for FakeSlack {
        async fn post_message(&self, channel: &str, text: &str, _blocks: Option<&Value>) -> DockResult<PostedMessage> {
            self.posted.lock().unwrap().push((channel.into(), text.into()));
            Ok(PostedMessage {
                channel: channel.into(),
                ts: "1700000000.0001".into(),
                text: text.into(),
            })
        }

        async fn list_channels(&self, _limit: u64) -> DockResult<Vec<SlackChannel>> {
            if self.channels_down {
                return Err(DockError::external("Slack conversations.list", "ratelimited"));
            }
            Ok(vec![channel("general", false), channel("leads", true)])
        }

        async fn history(&self, channel: &str, _limit: u64) -> DockResult<SlackHistory> {
            if channel == "nowhere" {
                return Err(DockError::external("Slack conversations.history", "channel_not_found"));
            }
            Ok(SlackHistory {
                messages: vec![SlackMessage {
                    text: "x".repeat(60),
                    ..Default::default()
                }],
                has_more: false,
            })
        }

        async fn channel_info(&self, channel: &str) -> DockResult<SlackChannel> {
            if channel == "nowhere" {
                return Err(DockError::external("Slack conversations.info", "channel_not_found"));
            }
            Ok(channel_named(channel))
        }

        async fn create_channel(&self, name: &str, is_private: bool) -> DockResult<SlackChannel> {
            self.created.lock().unwrap().push(name.into());
            Ok(channel(name, is_private))
        }

        async fn set_topic(&self, _channel_id: &str, _topic: &str) -> DockResult<()> {
            Ok(())
        }
    }

    fn channel_named(name: &str) -> SlackChannel {
        channel(name, false)
    }

    fn agent(fake: Arc<FakeSlack>, llm: Arc<MockLlmClient>) -> SlackAgent {
        let core = AgentCore::new("Slack Bot", SlackAgent::persona(), llm, CompletionOptions::default());
        SlackAgent::new(core, fake, None).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_pattern() {
        let fake = Arc::new(FakeSlack::default());
        let llm = Arc::new(MockLlmClient::new());
        let agent = agent(fake.clone(), llm.clone());

        let out = agent
            .process_query("send a message to #ops saying deploy finished", &Value::Null)
            .await
            .unwrap();
        assert_eq!(out.response, "Message sent to #ops: \"deploy finished\"");
        assert_eq!(fake.posted.lock().unwrap()[0], ("ops".to_string(), "deploy finished".to_string()));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_info_and_create_channel() {
        let fake = Arc::new(FakeSlack::default());
        let agent = agent(fake.clone(), Arc::new(MockLlmClient::new()));

        let out = agent.process_query("tell me about channel #random", &Value::Null).await.unwrap();
        assert_eq!(out.response, "Channel #random has 12 members. Recent messages: 1 in the last period.");

        let err = agent.process_query("show channel nowhere", &Value::Null).await.unwrap_err();
        assert!(err.to_string().starts_with("Couldn't get information for channel #nowhere"));

        let out = agent.process_query("Create a new channel called Launch", &Value::Null).await.unwrap();
        assert_eq!(out.response, "Channel #launch has been created successfully!");
        assert_eq!(fake.created.lock().unwrap()[0], "launch");
    }

    #[tokio::test]
    async fn test_context_marks_failed_sections() {
        let fake = Arc::new(FakeSlack {
            channels_down: true,
            ..Default::default()
        });
        let llm = Arc::new(MockLlmClient::with_reply("All quiet."));
        let agent = agent(fake, llm.clone());

        let out = agent.process_query("anything new today?", &Value::Null).await.unwrap();
        assert_eq!(out.response, "All quiet.");
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Couldn't retrieve channels."));
        assert!(prompt.contains("Recent messages in #general (1):"));
        assert!(prompt.contains(&format!("- {}...", "x".repeat(50))));
    }
}
