//! 通用 Tool：未知类型标签的兜底实现
//!
//! 只有 info；描述符声明了 endpoint 时另有 invoke，参数表即描述符的 parameters。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::DockResult;
use crate::descriptor::ToolDescriptor;
use crate::providers::endpoint::{EndpointApi, HttpEndpoint};
use crate::registry::resolver::ProviderContext;
use crate::tools::contract::{
    provider_error, unimplemented_action, ActionParams, ActionSpec, ParamSpec, Tool, ToolOutput,
};
use crate::tools::jira::descriptor_description;

pub struct GenericTool {
    name: String,
    description: String,
    endpoint: Option<Arc<dyn EndpointApi>>,
    actions: Vec<ActionSpec>,
}

impl GenericTool {
    /// 仅含 info 的最小 Tool
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            endpoint: None,
            actions: vec![ActionSpec::info()],
        }
    }

    pub fn with_endpoint(mut self, endpoint: Arc<dyn EndpointApi>, invoke: ActionSpec) -> Self {
        self.endpoint = Some(endpoint);
        self.actions.push(invoke);
        self
    }

    pub fn from_descriptor(descriptor: &ToolDescriptor, ctx: &ProviderContext) -> DockResult<Self> {
        let tool = Self::new(descriptor.name.clone(), descriptor_description(descriptor));
        if descriptor.endpoint.is_empty() {
            return Ok(tool);
        }
        let endpoint = HttpEndpoint::from_descriptor(descriptor, ctx.providers.http_timeout_secs)?;
        Ok(tool.with_endpoint(Arc::new(endpoint), invoke_spec(descriptor)))
    }
}

/// 描述符 parameters -> invoke 动作的参数表
pub fn invoke_spec(descriptor: &ToolDescriptor) -> ActionSpec {
    descriptor.parameters.iter().fold(
        ActionSpec::new("invoke", format!("Call {}", descriptor.endpoint)),
        |spec, p| {
            spec.param(ParamSpec {
                name: p.name.clone(),
                kind: p.kind,
                description: p.description.clone(),
                required: p.required,
                default: None,
            })
        },
    )
}

#[async_trait]
impl Tool for GenericTool {
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
        match (action, &self.endpoint) {
            ("invoke", Some(endpoint)) => {
                let payload = Value::Object(params.into_map());
                let data = endpoint
                    .invoke(&payload)
                    .await
                    .map_err(provider_error("Failed to invoke tool endpoint"))?;
                Ok(ToolOutput::ok(data))
            }
            (other, _) => Err(unimplemented_action(&self.name, other)),
        }
    }
}
