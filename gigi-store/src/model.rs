//! Entity types for the data model (spec §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Active,
    Paused,
    Stopped,
    Archived,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Active => "active",
            ThreadStatus::Paused => "paused",
            ThreadStatus::Stopped => "stopped",
            ThreadStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ThreadStatus::Active),
            "paused" => Some(ThreadStatus::Paused),
            "stopped" => Some(ThreadStatus::Stopped),
            "archived" => Some(ThreadStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageTotals {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cache_tokens: i64,
    pub cost_usd: f64,
    pub duration_ms: i64,
}

impl Default for UsageTotals {
    fn default() -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            cache_tokens: 0,
            cost_usd: 0.0,
            duration_ms: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub topic: String,
    pub channel: String,
    pub status: ThreadStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub parent_id: Option<String>,
    pub fork_point_seq: Option<i64>,
    pub usage: UsageTotals,
    pub running_agent: bool,
    pub repo: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDirection {
    Inbound,
    Outbound,
}

impl EventDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventDirection::Inbound => "inbound",
            EventDirection::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inbound" => Some(EventDirection::Inbound),
            "outbound" => Some(EventDirection::Outbound),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    ToolUse,
    ToolResult,
    StatusChange,
    Summary,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::ToolUse => "tool_use",
            MessageType::ToolResult => "tool_result",
            MessageType::StatusChange => "status_change",
            MessageType::Summary => "summary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(MessageType::Text),
            "tool_use" => Some(MessageType::ToolUse),
            "tool_result" => Some(MessageType::ToolResult),
            "status_change" => Some(MessageType::StatusChange),
            "summary" => Some(MessageType::Summary),
            _ => None,
        }
    }
}

/// A new event to append; `seq` and `id` are assigned by the Store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewEvent {
    pub direction: EventDirection,
    pub actor: String,
    pub channel: String,
    pub message_type: MessageType,
    pub content: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub usage: Option<UsageTotals>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub thread_id: String,
    pub seq: i64,
    pub created_at_ms: i64,
    pub direction: EventDirection,
    pub actor: String,
    pub channel: String,
    pub message_type: MessageType,
    pub content: Value,
    pub metadata: Option<Value>,
    pub usage: Option<UsageTotals>,
    pub is_compacted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Issue,
    Pr,
    Commit,
    Branch,
}

impl RefType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefType::Issue => "issue",
            RefType::Pr => "pr",
            RefType::Commit => "commit",
            RefType::Branch => "branch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "issue" => Some(RefType::Issue),
            "pr" => Some(RefType::Pr),
            "commit" => Some(RefType::Commit),
            "branch" => Some(RefType::Branch),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefStatus {
    Open,
    Closed,
    Merged,
    Unknown,
}

impl RefStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefStatus::Open => "open",
            RefStatus::Closed => "closed",
            RefStatus::Merged => "merged",
            RefStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(RefStatus::Open),
            "closed" => Some(RefStatus::Closed),
            "merged" => Some(RefStatus::Merged),
            "unknown" => Some(RefStatus::Unknown),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub thread_id: String,
    pub ref_type: RefType,
    pub repo: String,
    pub number: String,
    pub status: RefStatus,
    pub url: Option<String>,
    pub created_at_ms: i64,
}
