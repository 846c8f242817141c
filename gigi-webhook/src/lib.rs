//! Forge webhook ingester (spec §4.6): verify the HMAC signature, drop
//! self-authored echoes, parse and route to a thread, sync reference/thread
//! status on close/merge.

mod ingest;
mod payload;
mod verify;

pub use ingest::{IngestError, IngestOutcome, WebhookIngester, DEDUP_WINDOW_MS};
pub use payload::{parse, ParsedEvent, PayloadError};
pub use verify::verify_signature;
