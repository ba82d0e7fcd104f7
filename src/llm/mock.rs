//! Mock 补全客户端（用于测试，无需 API）
//!
//! 记录每次收到的 prompt 与调用次数；可配置固定回复或固定失败。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{CompletionClient, CompletionOptions};

/// Mock 客户端：默认回显 prompt 最后一行非空文本
#[derive(Debug, Default)]
pub struct MockLlmClient {
    reply: Option<String>,
    fail_with: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockLlmClient {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(message) = &self.fail_with {
            return Err(message.clone());
        }
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }
        let last_line = prompt
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_line))
    }
}
