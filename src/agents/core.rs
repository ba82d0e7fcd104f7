//! Agent 公共部分：人设、prompt 模板与补全升级路径
//!
//! 直达模式没有命中时，各变体都走 escalate：拼装 prompt（人设 + Provider 上下文 + 可用工具 + 用户问题）
//! -> 单次补全 -> 可选地执行回复中的 TOOL_ACTION 标记。

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::agents::toolbelt::ToolBelt;
use crate::agents::QueryResponse;
use crate::core::{DockError, DockResult};
use crate::descriptor::AgentDescriptor;
use crate::llm::{CompletionClient, CompletionOptions};
use crate::registry::resolver::ProviderContext;

/// 人设：Provider 名（None 表示通用助手）与一句角色描述
#[derive(Debug, Clone, PartialEq)]
pub struct Persona {
    pub domain: Option<String>,
    pub role: String,
}

impl Persona {
    pub fn provider(domain: &str, role: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.to_string()),
            role: role.into(),
        }
    }

    pub fn general(role: impl Into<String>) -> Self {
        Self {
            domain: None,
            role: role.into(),
        }
    }
}

/// 补全 prompt；tool_params 为非空对象时附在用户问题之后
pub fn render_prompt(name: &str, persona: &Persona, context: &str, tools: &str, query: &str, tool_params: &Value) -> String {
    let mut prompt = format!("You are {}, {}.\n\n", name, persona.role);
    match &persona.domain {
        Some(d) => prompt.push_str(&format!("{d} context:\n{context}\n\n")),
        None => prompt.push_str(&format!("Context:\n{context}\n\n")),
    }
    prompt.push_str(&format!("Available tools:\n{tools}\n\nUser query: {query}\n"));
    if let Some(params) = tool_params.as_object().filter(|m| !m.is_empty()) {
        prompt.push_str(&format!("Tool parameters: {}\n", Value::Object(params.clone())));
    }
    prompt.push_str("\nInstructions:\n");
    match &persona.domain {
        Some(d) => prompt.push_str(&format!(
            "1. Analyze the {d}-related query\n\
             2. Use {d} information to provide a helpful response\n\
             3. If tools are needed, include [TOOL_ACTION:tool_name:action:parameters] in your response\n\
             4. Provide a helpful and informative response about {d}\n"
        )),
        None => prompt.push_str(
            "1. Analyze the query\n\
             2. Use the context above to provide a helpful response\n\
             3. If tools are needed, include [TOOL_ACTION:tool_name:action:parameters] in your response\n\
             4. Provide a helpful and informative response\n",
        ),
    }
    prompt.push_str("\nYour response:");
    prompt
}

pub struct AgentCore {
    name: String,
    persona: Persona,
    llm: Arc<dyn CompletionClient>,
    options: CompletionOptions,
    tools: ToolBelt,
    execute_tool_actions: bool,
}

impl AgentCore {
    pub fn new(name: impl Into<String>, persona: Persona, llm: Arc<dyn CompletionClient>, options: CompletionOptions) -> Self {
        Self {
            name: name.into(),
            persona,
            llm,
            options,
            tools: ToolBelt::new(Vec::new()),
            execute_tool_actions: false,
        }
    }

    pub fn from_descriptor(descriptor: &AgentDescriptor, persona: Persona, ctx: &ProviderContext) -> Self {
        Self {
            tools: ToolBelt::new(descriptor.tools.clone()),
            execute_tool_actions: ctx.execute_tool_actions,
            ..Self::new(descriptor.name.clone(), persona, ctx.llm.clone(), ctx.options.clone())
        }
    }

    pub fn with_tool_actions(mut self, enabled: bool) -> Self {
        self.execute_tool_actions = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn tools(&self) -> &ToolBelt {
        &self.tools
    }

    /// 补全升级：失败统一包成 "Failed to generate {domain} response"
    pub async fn escalate(&self, query: &str, tool_params: &Value, context: &str) -> DockResult<QueryResponse> {
        let prompt = render_prompt(&self.name, &self.persona, context, &self.tools.context(), query, tool_params);
        tracing::debug!("{} escalating query to completion ({} chars prompt)", self.name, prompt.len());

        let response = self.llm.complete(&prompt, &self.options).await.map_err(|e| {
            let context = match &self.persona.domain {
                Some(d) => format!("Failed to generate {d} response"),
                None => "Failed to generate response".to_string(),
            };
            tracing::error!("{}: {}", context, e);
            DockError::external(context, e)
        })?;

        let tool_results = if self.execute_tool_actions {
            self.tools.run_markers(&response).await
        } else {
            Map::new()
        };
        Ok(QueryResponse { response, tool_results })
    }
}
