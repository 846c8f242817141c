//! SQLite schema (spec §6.5) plus the pending-question and enforcement-task
//! supplement tables.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::StoreError;

/// SQLite-backed conversation store. A single connection guarded by a mutex:
/// every public method wraps its blocking `rusqlite` call in
/// `tokio::task::block_in_place`, so the mutex also acts as the store's
/// single-writer serialization point.
pub struct Store {
    pub(crate) db: Arc<Mutex<rusqlite::Connection>>,
}

impl Store {
    /// Opens or creates the database and tables.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS threads (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    channel TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    parent_id TEXT,
    fork_point_seq INTEGER,
    usage_json TEXT NOT NULL,
    running_agent INTEGER NOT NULL DEFAULT 0,
    repo TEXT,
    tags_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_threads_parent ON threads(parent_id);
CREATE INDEX IF NOT EXISTS idx_threads_status ON threads(status);

CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    thread_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    direction TEXT NOT NULL,
    actor TEXT NOT NULL,
    channel TEXT NOT NULL,
    message_type TEXT NOT NULL,
    content_json TEXT NOT NULL,
    metadata_json TEXT,
    usage_json TEXT,
    is_compacted INTEGER NOT NULL DEFAULT 0,
    UNIQUE(thread_id, seq)
);
CREATE INDEX IF NOT EXISTS idx_events_thread_created ON events(thread_id, created_at);
CREATE INDEX IF NOT EXISTS idx_events_message_type ON events(message_type);

CREATE TABLE IF NOT EXISTS references_ (
    id TEXT PRIMARY KEY,
    thread_id TEXT NOT NULL,
    ref_type TEXT NOT NULL,
    repo TEXT NOT NULL,
    number TEXT NOT NULL,
    status TEXT NOT NULL,
    url TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE(thread_id, ref_type, repo, number)
);
CREATE INDEX IF NOT EXISTS idx_references_lookup ON references_(repo, ref_type, number);

CREATE TABLE IF NOT EXISTS usage_rollups (
    thread_id TEXT NOT NULL,
    period TEXT NOT NULL,
    prompt_tokens INTEGER NOT NULL DEFAULT 0,
    completion_tokens INTEGER NOT NULL DEFAULT 0,
    cache_tokens INTEGER NOT NULL DEFAULT 0,
    cost_usd REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (thread_id, period)
);

CREATE TABLE IF NOT EXISTS action_log (
    id TEXT PRIMARY KEY,
    thread_id TEXT,
    tool_use_id TEXT,
    kind TEXT NOT NULL,
    repo TEXT,
    content_digest TEXT NOT NULL,
    metadata_json TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_action_log_digest ON action_log(content_digest, created_at);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_questions (
    thread_id TEXT NOT NULL,
    tool_use_id TEXT NOT NULL,
    question TEXT NOT NULL,
    options_json TEXT NOT NULL,
    asked_at INTEGER NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (thread_id, tool_use_id)
);

CREATE TABLE IF NOT EXISTS enforcement_tasks (
    thread_id TEXT NOT NULL,
    repo TEXT NOT NULL,
    issue_number TEXT NOT NULL,
    state TEXT NOT NULL,
    workspace_fingerprint TEXT,
    cycle_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (thread_id, repo, issue_number)
);

CREATE TABLE IF NOT EXISTS webhook_deliveries (
    delivery_id TEXT PRIMARY KEY,
    received_at INTEGER NOT NULL
);
"#;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
