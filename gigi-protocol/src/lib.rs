//! # Protocol module
//!
//! Wire types for the bidirectional gateway socket (spec §6.1, §6.2).
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      gigi-protocol (this crate)                    │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  Client → Server                       Server → Client             │
//! │  ──────────────                        ──────────────              │
//! │  ClientMessage:                        ServerMessage:               │
//! │    ChatSend                              wraps stream_event::ProtocolEvent │
//! │    ChatNew                               (AgentStart, TextChunk, ToolUse, │
//! │    ChatResume                             ToolResult, AskUser, AgentDone, │
//! │    ChatStop                               AgentError, AgentStopped,       │
//! │    ViewNavigate                           ConversationUpdate, TitleUpdate, │
//! │    TitleUpdate                            ViewCommand, ConversationList,   │
//! │    Ping                                   MessageHistory, Pong)           │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `ServerMessage` is kept as a thin re-export of `stream_event::ProtocolEvent`
//! rather than a second parallel enum: every server→client variant in §6.2 is
//! already a stream segment, so duplicating the tag set would just be two
//! copies of the same discriminated union to keep in sync.

pub use stream_event::envelope::{to_json, Envelope, EnvelopeState};
pub use stream_event::event::{ProtocolEvent as ServerMessage, ToolResultStatus, UsageSummary};

use serde::{Deserialize, Serialize};

/// `chat.send` {conversation_id?, message, tags[]?, repo?} — start or continue a turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// `chat.new` {channel, topic?, tags[]?} — create a thread; returns the id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatNew {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `chat.resume` {conversation_id} — subscribe to a thread's live event stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResume {
    pub conversation_id: String,
}

/// `chat.stop` {conversation_id} — cooperative cancel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatStop {
    pub conversation_id: String,
}

/// `view.navigate` {target, id?} — UI hint to the SPA; mirrored to other
/// clients of the same user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewNavigate {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `title.update` {conversation_id, topic}.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TitleUpdateRequest {
    pub conversation_id: String,
    pub topic: String,
}

/// Client-to-server message envelope (spec §6.1).
///
/// Each variant maps to a JSON object with `"type": "<variant_name>"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename = "chat.send")]
    ChatSend(ChatSend),
    #[serde(rename = "chat.new")]
    ChatNew(ChatNew),
    #[serde(rename = "chat.resume")]
    ChatResume(ChatResume),
    #[serde(rename = "chat.stop")]
    ChatStop(ChatStop),
    #[serde(rename = "view.navigate")]
    ViewNavigate(ViewNavigate),
    #[serde(rename = "title.update")]
    TitleUpdate(TitleUpdateRequest),
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_send_roundtrip() {
        let msg = ClientMessage::ChatSend(ChatSend {
            conversation_id: Some("t-1".to_string()),
            message: "hello".to_string(),
            tags: vec!["urgent".to_string()],
            repo: None,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"chat.send\""));
        assert!(json.contains("\"message\":\"hello\""));
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ClientMessage::ChatSend(_)));
    }

    #[test]
    fn chat_new_without_optional_fields() {
        let json = r#"{"type":"chat.new","channel":"web"}"#;
        let parsed: ClientMessage = serde_json::from_str(json).unwrap();
        match parsed {
            ClientMessage::ChatNew(req) => {
                assert_eq!(req.channel, "web");
                assert_eq!(req.topic, None);
                assert!(req.tags.is_empty());
            }
            _ => panic!("expected ChatNew"),
        }
    }

    #[test]
    fn ping_roundtrip() {
        let json = r#"{"type":"ping"}"#;
        let parsed: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, ClientMessage::Ping));
        let back = serde_json::to_string(&parsed).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn server_message_agent_done_roundtrip() {
        let msg = ServerMessage::AgentDone {
            usage: UsageSummary {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
                cost_usd: 0.02,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"agent_done\""));
        assert!(json.contains("\"cost_usd\":0.02"));
    }
}
