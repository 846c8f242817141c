//! Server-to-client stream segments (spec §4.4.1, §6.2): the blocks an agent
//! turn emits to the Event bus as it runs, plus the gateway-level control
//! segments that ride the same socket.

use serde::Serialize;
use serde_json::Value;

/// One stream segment, discriminated on `type` per §6.2. Envelope fields
/// (thread id, seq, server timestamp) are injected separately by
/// [`crate::envelope::Envelope`].
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// Turn accepted.
    AgentStart { turn_id: String },
    /// Partial assistant text; chunks concatenate within the current span.
    TextChunk { content: String },
    /// A tool invocation has been requested.
    ToolUse {
        tool_use_id: String,
        name: String,
        input: Value,
    },
    /// Optional progress notification published by a long-running tool.
    ToolProgress { tool_use_id: String, message: String },
    /// A tool invocation has terminated.
    ToolResult {
        tool_use_id: String,
        status: ToolResultStatus,
        output: Value,
    },
    /// The turn is parked waiting for a user answer (§4.4.4).
    AskUser {
        question_id: String,
        question: String,
        options: Vec<String>,
    },
    /// Turn finished cleanly, including final usage totals.
    AgentDone { usage: UsageSummary },
    /// Turn aborted with a reason.
    AgentError { reason: String },
    /// Cooperative cancellation acknowledged.
    AgentStopped,
    /// Thread metadata changed (status, topic, tags, usage).
    ConversationUpdate { thread: Value },
    /// A thread's topic was updated.
    TitleUpdate { topic: String },
    /// UI navigation hint mirrored to other clients of the same user.
    ViewCommand { target: String, id: Option<String> },
    /// Snapshot of threads for a list view.
    ConversationList { threads: Vec<Value> },
    /// A page of historical events for a thread.
    MessageHistory { events: Vec<Value> },
    /// Keepalive reply to a client `ping`.
    Pong,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultStatus {
    Success,
    Failure,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct UsageSummary {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: f64,
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
