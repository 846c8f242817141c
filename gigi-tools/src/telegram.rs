//! Outbound Telegram notification tool, built on `teloxide-core`. Writes are
//! logged via `record_action` so the webhook ingester (forge side) and this
//! tool (chat side) share one dedup mechanism, even though Telegram itself
//! has no webhook echo to suppress.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use teloxide_core::prelude::*;
use teloxide_core::types::ChatId;

use crate::registry::{Tool, ToolCallContext, ToolError, ToolSpec};

pub const TOOL_TELEGRAM_SEND: &str = "telegram_send";

pub struct TelegramSendTool {
    bot: Bot,
    store: Arc<gigi_store::Store>,
}

impl TelegramSendTool {
    pub fn new(token: String, store: Arc<gigi_store::Store>) -> Self {
        Self { bot: Bot::new(token), store }
    }
}

#[async_trait]
impl Tool for TelegramSendTool {
    fn name(&self) -> &str {
        TOOL_TELEGRAM_SEND
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_TELEGRAM_SEND.into(),
            description: Some("Send a Telegram message to a chat.".into()),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["chat_id", "text"],
                "properties": {
                    "chat_id": { "type": "integer" },
                    "text": { "type": "string" },
                },
            }),
        }
    }

    async fn call(&self, input: Value, ctx: &ToolCallContext) -> Result<String, ToolError> {
        let chat_id = input["chat_id"]
            .as_i64()
            .ok_or_else(|| ToolError::InvalidInput("chat_id must be an integer".into()))?;
        let text = input["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidInput("text must be a string".into()))?;

        let message = self
            .bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| ToolError::ToolFailure(format!("send_message failed: {e}")))?;

        self.store
            .record_action(
                "telegram.send",
                Some(&ctx.thread_id),
                Some(&ctx.tool_use_id),
                None,
                &format!("telegram_send:{chat_id}:{text}"),
                None,
            )
            .await
            .map_err(|e| ToolError::ToolFailure(format!("record_action failed: {e}")))?;

        Ok(format!("sent message {}", message.id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_requires_chat_id_and_text() {
        let store = Arc::new(gigi_store::Store::in_memory().unwrap());
        let tool = TelegramSendTool::new("dummy:token".into(), store);
        let required = tool.spec().input_schema["required"].clone();
        assert_eq!(required, serde_json::json!(["chat_id", "text"]));
    }
}
