//! Stream event protocol: type + payload + envelope (spec §4.4.1, §6.2).
//!
//! Defines the wire shape of a single stream segment and envelope injection.
//! `gigi-agent` produces `ProtocolEvent`s; `gigi-gateway` calls `to_json` to
//! serialize them onto the socket.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProtocolEvent;
