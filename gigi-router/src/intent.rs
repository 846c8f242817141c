//! Inbound intent: the router's normalized view of a message arriving from
//! any transport (spec §2: "turns incoming messages from heterogeneous
//! sources into a single linearized sequence per thread").

use serde_json::Value;

/// One inbound message, already stripped of its transport-specific framing
/// (WS envelope, Telegram update, webhook payload) by the caller.
#[derive(Debug, Clone)]
pub struct InboundIntent {
    /// `web` | `telegram` | `webhook` | `gitea_comment` | `gitea_review` (spec §3 channel enum).
    pub channel: String,
    /// Opaque actor string, e.g. `"user"`, `"forge:<login>"`.
    pub actor: String,
    /// Existing thread to attach to; `None` means "create a new thread".
    pub thread_id: Option<String>,
    /// Topic for a newly created thread. Ignored when `thread_id` is set.
    pub new_topic: Option<String>,
    /// Event content (spec §3: text span, or interleaved blocks).
    pub content: Value,
}

impl InboundIntent {
    pub fn text(channel: impl Into<String>, actor: impl Into<String>, thread_id: Option<String>, text: impl Into<String>) -> Self {
        InboundIntent {
            channel: channel.into(),
            actor: actor.into(),
            thread_id,
            new_topic: None,
            content: serde_json::json!({ "text": text.into() }),
        }
    }
}
