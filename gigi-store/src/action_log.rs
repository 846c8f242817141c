//! Action log (spec §4.1 `record_action`, §4.6 webhook dedup).
//!
//! Tools that perform outbound writes (`gitea`, `telegram_send`) call
//! [`Store::record_action`] so the webhook ingester can recognize its own
//! echo coming back as a forge event and suppress it (spec §4.6: dedup
//! by content digest within a 30s window, not by action-log key alone).

use rusqlite::params;
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::schema::{now_ms, Store};

/// Computes the sha256 content digest of a normalized outbound payload.
pub fn content_digest(normalized_payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_payload.as_bytes());
    hex::encode(hasher.finalize())
}

impl Store {
    pub async fn record_action(
        &self,
        kind: &str,
        thread_id: Option<&str>,
        tool_use_id: Option<&str>,
        repo: Option<&str>,
        normalized_payload: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let kind = kind.to_string();
        let thread_id = thread_id.map(|s| s.to_string());
        let tool_use_id = tool_use_id.map(|s| s.to_string());
        let repo = repo.map(|s| s.to_string());
        let digest = content_digest(normalized_payload);
        let metadata_json = metadata.map(|v| serde_json::to_string(&v).unwrap());
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            conn.execute(
                "INSERT INTO action_log (id, thread_id, tool_use_id, kind, repo, content_digest, metadata_json, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![id, thread_id, tool_use_id, kind, repo, digest, metadata_json, now_ms()],
            )?;
            Ok(id)
        })
    }

    /// Whether an action of `kind` for `thread_id`/`repo` was recorded at or
    /// after `since_ms` (spec §4.4.3 enforcement detectors: presence of a
    /// `create_pr`/`telegram_send` action log entry). `repo` is matched
    /// loosely (`repo = ?2 OR repo IS NULL`): some action kinds, like
    /// `telegram.send`, have no repo concept and always log `repo = NULL`,
    /// so a plain equality would never match them against the enforcement
    /// task's real repo string.
    pub async fn has_action_since(
        &self,
        thread_id: &str,
        repo: &str,
        kind: &str,
        since_ms: i64,
    ) -> Result<bool, StoreError> {
        let thread_id = thread_id.to_string();
        let repo = repo.to_string();
        let kind = kind.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM action_log \
                 WHERE thread_id = ?1 AND (repo = ?2 OR repo IS NULL) AND kind = ?3 AND created_at >= ?4",
                params![thread_id, repo, kind, since_ms],
                |r| r.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Whether an action with this content digest was recorded within
    /// `window_ms` of `at_ms` (spec §4.6 dedup window, default 30s).
    pub async fn has_recent_action(&self, normalized_payload: &str, at_ms: i64, window_ms: i64) -> Result<bool, StoreError> {
        let digest = content_digest(normalized_payload);
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM action_log WHERE content_digest = ?1 AND created_at BETWEEN ?2 AND ?3",
                params![digest, at_ms - window_ms, at_ms + window_ms],
                |r| r.get(0),
            )?;
            Ok(count > 0)
        })
    }
}
