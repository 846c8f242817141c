//! OpenAI-compatible HTTP backend, built on the same `reqwest::Client`
//! request/response shape as `gigi_tools::WebFetchTool`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, LlmClient, LlmError, LlmResponse, LlmUsage, ToolCallRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct ChatOpenAi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    prompt_cost_per_1k: f64,
    completion_cost_per_1k: f64,
}

impl ChatOpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            prompt_cost_per_1k: 0.0,
            completion_cost_per_1k: 0.0,
        }
    }

    pub fn with_pricing(mut self, prompt_cost_per_1k: f64, completion_cost_per_1k: f64) -> Self {
        self.prompt_cost_per_1k = prompt_cost_per_1k;
        self.completion_cost_per_1k = completion_cost_per_1k;
        self
    }

    /// Reads `OPENAI_API_KEY` (required), `OPENAI_MODEL`, `OPENAI_BASE_URL`,
    /// `OPENAI_PROMPT_COST_PER_1K`/`OPENAI_COMPLETION_COST_PER_1K` (all
    /// optional, the cost pair defaulting to 0 so an unpriced deployment
    /// doesn't fail budget checks on a missing env var).
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::Request("OPENAI_API_KEY not set".into()))?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let prompt_cost_per_1k = env_f64("OPENAI_PROMPT_COST_PER_1K").unwrap_or(0.0);
        let completion_cost_per_1k = env_f64("OPENAI_COMPLETION_COST_PER_1K").unwrap_or(0.0);
        Ok(Self::with_base_url(api_key, model, base_url).with_pricing(prompt_cost_per_1k, completion_cost_per_1k))
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireAssistantMessage,
}

#[derive(Deserialize, Default)]
struct WireAssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl LlmClient for ChatOpenAi {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<LlmResponse, LlmError> {
        let wire_messages: Vec<WireMessage> =
            messages.iter().map(|m| WireMessage { role: &m.role, content: &m.content }).collect();
        let request = ChatRequest { model: &self.model, messages: wire_messages };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Request(format!("http {status}: {body}")));
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|e| LlmError::Request(format!("decoding response failed: {e}")))?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| LlmError::Request("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let arguments: Value = serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null);
                ToolCallRequest { id: tc.id, name: tc.function.name, arguments }
            })
            .collect();

        let wire_usage = parsed.usage.unwrap_or_default();
        let cost_usd = (wire_usage.prompt_tokens as f64 / 1000.0) * self.prompt_cost_per_1k
            + (wire_usage.completion_tokens as f64 / 1000.0) * self.completion_cost_per_1k;
        let usage = LlmUsage {
            prompt_tokens: wire_usage.prompt_tokens,
            completion_tokens: wire_usage.completion_tokens,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            cost_usd,
        };

        Ok(LlmResponse { content: choice.message.content.unwrap_or_default(), tool_calls, usage })
    }
}
