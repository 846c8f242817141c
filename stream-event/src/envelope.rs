//! Envelope (thread id, event seq, server timestamp) per spec §6.2.
//! `EnvelopeState` tracks the next seq for a thread's live stream and injects
//! the envelope into each outbound event.

use crate::event::ProtocolEvent;
use serde_json::Value;

/// Envelope fields carried on every outbound message (spec §6.2): "Each
/// carries the thread id, the event seq (where applicable), and a monotonic
/// server timestamp."
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    pub thread_id: Option<String>,
    pub seq: Option<i64>,
    pub server_ts_ms: Option<i64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread_id(mut self, id: impl Into<String>) -> Self {
        self.thread_id = Some(id.into());
        self
    }

    pub fn with_seq(mut self, seq: i64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn with_server_ts_ms(mut self, ts: i64) -> Self {
        self.server_ts_ms = Some(ts);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.thread_id {
            obj.entry("thread_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(seq) = self.seq {
            obj.entry("seq")
                .or_insert_with(|| Value::Number(serde_json::Number::from(seq)));
        }
        if let Some(ts) = self.server_ts_ms {
            obj.entry("server_ts_ms")
                .or_insert_with(|| Value::Number(serde_json::Number::from(ts)));
        }
    }
}

/// Envelope state for one thread's live stream: thread id and the next seq
/// to stamp on a segment that corresponds to a durable event (segments with
/// no durable counterpart, e.g. `text_chunk`, carry `seq: None`).
pub struct EnvelopeState {
    pub thread_id: String,
    pub next_seq: i64,
}

impl EnvelopeState {
    pub fn new(thread_id: String, next_seq: i64) -> Self {
        Self {
            thread_id,
            next_seq,
        }
    }

    /// Injects the envelope into the event value. `seq` is consumed (and the
    /// counter advanced) only for segments that represent a persisted event
    /// (`ToolUse`, `ToolResult`, `AgentDone`, `AgentError`, `AgentStopped`,
    /// `AskUser`); transient segments (`TextChunk`, `ToolProgress`, `Pong`,
    /// view/control segments) get a timestamp but no seq.
    pub fn inject_into(&mut self, event: &ProtocolEvent, value: &mut Value, now_ms: i64) {
        let mut env = Envelope::new()
            .with_thread_id(&self.thread_id)
            .with_server_ts_ms(now_ms);
        if matches!(
            event,
            ProtocolEvent::ToolUse { .. }
                | ProtocolEvent::ToolResult { .. }
                | ProtocolEvent::AgentDone { .. }
                | ProtocolEvent::AgentError { .. }
                | ProtocolEvent::AgentStopped
                | ProtocolEvent::AskUser { .. }
        ) {
            env = env.with_seq(self.next_seq);
            self.next_seq += 1;
        }
        env.inject_into(value);
    }
}

/// Converts a protocol event to JSON and injects the envelope using the
/// given state and timestamp.
pub fn to_json(
    event: &ProtocolEvent,
    state: &mut EnvelopeState,
    now_ms: i64,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(event, &mut value, now_ms);
    Ok(value)
}
