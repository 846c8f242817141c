use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ChatMessage, LlmClient, LlmError, LlmResponse};

/// Fixed queue of canned responses, popped one per call — enough to drive a
/// multi-round tool loop in tests without a real backend.
pub struct MockLlm {
    responses: Mutex<Vec<LlmResponse>>,
}

impl MockLlm {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        let mut responses = responses;
        responses.reverse();
        Self { responses: Mutex::new(responses) }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, _messages: &[ChatMessage]) -> Result<LlmResponse, LlmError> {
        self.responses
            .lock()
            .await
            .pop()
            .ok_or_else(|| LlmError::Request("MockLlm exhausted".into()))
    }
}
