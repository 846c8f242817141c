//! LLM client abstraction: the runtime streams `text_chunk` segments
//! directly off `invoke_stream` instead of re-chunking a complete response.

mod mock;
mod openai;

pub use mock::MockLlm;
pub use openai::ChatOpenAi;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(String),
}

#[derive(Clone, Debug, Default)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cache_read_tokens: u32,
    pub cache_write_tokens: u32,
    pub cost_usd: f64,
}

#[derive(Clone, Debug)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: LlmUsage,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: "tool".into(), content: content.into() }
    }
}

/// LLM client: given messages, returns assistant text and any tool calls.
/// Implementations: [`ChatOpenAi`], an OpenAI-compatible HTTP backend, in
/// production; [`MockLlm`] in tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<LlmResponse, LlmError>;

    /// Streaming variant; default calls `invoke` and emits the full content
    /// as one chunk, a usable fallback for non-streaming implementations.
    async fn invoke_stream(
        &self,
        messages: &[ChatMessage],
        chunk_tx: Option<mpsc::Sender<String>>,
    ) -> Result<LlmResponse, LlmError> {
        let response = self.invoke(messages).await?;
        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                let _ = tx.send(response.content.clone()).await;
            }
        }
        Ok(response)
    }
}
