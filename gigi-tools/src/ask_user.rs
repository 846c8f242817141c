//! The suspending `ask_user` tool (spec §4.4.4): parks the turn until an
//! inbound answer arrives on any channel bound to the thread, or the park
//! times out. Built around the durable park state already in
//! `gigi_store::pending_questions`.
//!
//! The broker is the missing half of that durable record: an in-process map
//! from `tool_use_id` to a waiting `oneshot::Sender`, so whichever task
//! receives the answer (the gateway's recv loop, the router dispatching a
//! webhook/telegram message) can wake the parked call without going through
//! the event bus.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use gigi_store::{PendingQuestionStatus, Store};

use crate::registry::{Tool, ToolCallContext, ToolError, ToolSpec};

pub const TOOL_ASK_USER: &str = "ask_user";

#[derive(Default)]
pub struct AskUserBroker {
    pending: DashMap<String, oneshot::Sender<String>>,
}

impl AskUserBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, tool_use_id: &str) -> oneshot::Receiver<String> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(tool_use_id.to_string(), tx);
        rx
    }

    /// Resolves a parked question with the given answer. Returns `false` if
    /// no turn is parked on this id (already answered, timed out, or never
    /// asked).
    pub fn resolve(&self, tool_use_id: &str, answer: String) -> bool {
        match self.pending.remove(tool_use_id) {
            Some((_, tx)) => tx.send(answer).is_ok(),
            None => false,
        }
    }

    /// Drops the waiting sender so the parked call observes a closed
    /// channel (used when `chat.stop` cancels a park).
    pub fn cancel(&self, tool_use_id: &str) {
        self.pending.remove(tool_use_id);
    }
}

pub struct AskUserTool {
    store: Arc<Store>,
    broker: Arc<AskUserBroker>,
    timeout: std::time::Duration,
}

impl AskUserTool {
    pub fn new(store: Arc<Store>, broker: Arc<AskUserBroker>) -> Self {
        Self { store, broker, timeout: std::time::Duration::from_secs(5 * 60) }
    }
}

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        TOOL_ASK_USER
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_ASK_USER.into(),
            description: Some("Ask the user a question and wait for their answer.".into()),
            input_schema: serde_json::json!({
                "type": "object",
                "required": ["question"],
                "properties": {
                    "question": { "type": "string" },
                    "options": { "type": "array", "items": { "type": "string" } },
                },
            }),
        }
    }

    async fn call(&self, input: Value, ctx: &ToolCallContext) -> Result<String, ToolError> {
        let question = input["question"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidInput("question must be a string".into()))?;
        let options: Vec<String> = input["options"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        self.store
            .park_question(&ctx.thread_id, &ctx.tool_use_id, question, options)
            .await
            .map_err(|e| ToolError::ToolFailure(format!("park_question failed: {e}")))?;

        let rx = self.broker.register(&ctx.tool_use_id);

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(answer)) => {
                self.store
                    .resolve_question(&ctx.thread_id, &ctx.tool_use_id, PendingQuestionStatus::Answered)
                    .await
                    .map_err(|e| ToolError::ToolFailure(format!("resolve_question failed: {e}")))?;
                Ok(answer)
            }
            Ok(Err(_closed)) => {
                self.store
                    .resolve_question(&ctx.thread_id, &ctx.tool_use_id, PendingQuestionStatus::Cancelled)
                    .await
                    .map_err(|e| ToolError::ToolFailure(format!("resolve_question failed: {e}")))?;
                Err(ToolError::ToolFailure("cancelled".into()))
            }
            Err(_elapsed) => {
                self.broker.cancel(&ctx.tool_use_id);
                self.store
                    .resolve_question(&ctx.thread_id, &ctx.tool_use_id, PendingQuestionStatus::TimedOut)
                    .await
                    .map_err(|e| ToolError::ToolFailure(format!("resolve_question failed: {e}")))?;
                Err(ToolError::ToolFailure("timeout".into()))
            }
        }
    }
}
