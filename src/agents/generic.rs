//! 通用 Agent：custom 及未知类型标签，没有直达模式，上下文只有描述符本身

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::core::{AgentCore, Persona};
use crate::agents::{delegate_tool_belt, Agent, QueryResponse};
use crate::core::{preview, DockResult};
use crate::descriptor::AgentDescriptor;
use crate::registry::resolver::{ProviderContext, ProviderKind};

pub struct GenericAgent {
    core: AgentCore,
    context: String,
}

impl GenericAgent {
    pub fn new(core: AgentCore, context: impl Into<String>) -> Self {
        Self {
            core,
            context: context.into(),
        }
    }

    pub fn from_descriptor(descriptor: &AgentDescriptor, ctx: &ProviderContext) -> Self {
        let persona = Persona::general(format!("a {} assistant", descriptor.kind));
        let core = AgentCore::from_descriptor(descriptor, persona, ctx);
        Self::new(core, describe(descriptor))
    }
}

/// 描述符 -> 上下文段落
fn describe(descriptor: &AgentDescriptor) -> String {
    let mut context = format!("Agent type: {}\n", descriptor.kind);
    if !descriptor.description.is_empty() {
        context.push_str(&format!("Description: {}\n", descriptor.description));
    }
    if !descriptor.capabilities.is_empty() {
        context.push_str(&format!("Capabilities: {}\n", descriptor.capabilities.join(", ")));
    }
    context
}

#[async_trait]
impl Agent for GenericAgent {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Generic
    }

    async fn process_query(&self, query: &str, tool_params: &Value) -> DockResult<QueryResponse> {
        tracing::info!("Agent {} processing query: {}", self.name(), preview(query, 80));
        self.core.escalate(query, tool_params, &self.context).await
    }

    delegate_tool_belt!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionOptions, MockLlmClient};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_every_query_escalates_with_tool_params() {
        let llm = Arc::new(MockLlmClient::with_reply("Done."));
        let ctx = ProviderContext::new(llm.clone(), CompletionOptions::default());
        let mut d = AgentDescriptor::new("a1", "custom", "Helper");
        d.capabilities = vec!["summaries".into()];
        let agent = GenericAgent::from_descriptor(&d, &ctx);

        let out = agent.process_query("summarize the week", &json!({ "days": 7 })).await.unwrap();
        assert_eq!(out.response, "Done.");
        assert!(out.tool_results.is_empty());

        let prompt = &llm.prompts()[0];
        assert!(prompt.starts_with("You are Helper, a custom assistant."));
        assert!(prompt.contains("Capabilities: summaries"));
        assert!(prompt.contains("Tool parameters: {\"days\":7}"));
    }
}
