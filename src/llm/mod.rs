//! 生成式补全层：客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{CompletionClient, CompletionOptions};

use crate::config::LlmSection;

/// 按 [llm].provider 创建补全客户端：mock 走本地回显，其余均视为 OpenAI 兼容端点
pub fn create_client_from_config(section: &LlmSection) -> Arc<dyn CompletionClient> {
    match section.provider.as_str() {
        "mock" => Arc::new(MockLlmClient::new()),
        _ => Arc::new(OpenAiClient::from_config(section)),
    }
}

/// [llm] 段的默认采样参数
pub fn options_from_config(section: &LlmSection) -> CompletionOptions {
    CompletionOptions {
        model: section.model.clone(),
        temperature: section.temperature,
        max_tokens: section.max_tokens,
    }
}
