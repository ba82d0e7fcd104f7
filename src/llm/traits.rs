//! 生成式补全客户端抽象
//!
//! 单次、无状态调用：complete(prompt, options) -> text。所有后端（OpenAI 兼容 / Mock）实现 CompletionClient。

use async_trait::async_trait;

/// 单次补全的采样参数
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "llama3-70b-8192".to_string(),
            temperature: 0.5,
            max_tokens: 1024,
        }
    }
}

/// 补全客户端 trait：错误以字符串返回，由调用方包上操作上下文
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, String>;
}
