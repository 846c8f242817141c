//! Thread operations (spec §4.1): create, update, archive/unarchive/delete,
//! lineage.

use rusqlite::{params, OptionalExtension};

use crate::error::StoreError;
use crate::model::{Thread, ThreadStatus, UsageTotals};
use crate::schema::{now_ms, Store};

fn row_to_thread(row: &rusqlite::Row) -> rusqlite::Result<Thread> {
    let status: String = row.get("status")?;
    let usage_json: String = row.get("usage_json")?;
    let tags_json: String = row.get("tags_json")?;
    Ok(Thread {
        id: row.get("id")?,
        topic: row.get("topic")?,
        channel: row.get("channel")?,
        status: ThreadStatus::parse(&status).unwrap_or(ThreadStatus::Active),
        created_at_ms: row.get("created_at")?,
        updated_at_ms: row.get("updated_at")?,
        parent_id: row.get("parent_id")?,
        fork_point_seq: row.get("fork_point_seq")?,
        usage: serde_json::from_str(&usage_json).unwrap_or_default(),
        running_agent: row.get::<_, i64>("running_agent")? != 0,
        repo: row.get("repo")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
    })
}

impl Store {
    /// Creates a thread. Fails with `InvariantError` if `fork_point` does not
    /// belong to `parent`, or if `parent` does not exist.
    pub async fn create_thread(
        &self,
        channel: &str,
        topic: &str,
        parent: Option<&str>,
        fork_point_seq: Option<i64>,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();
        let channel = channel.to_string();
        let topic = topic.to_string();
        let parent = parent.map(|s| s.to_string());
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            if let Some(ref parent_id) = parent {
                let parent_exists: Option<i64> = conn
                    .query_row("SELECT 1 FROM threads WHERE id = ?1", params![parent_id], |r| r.get(0))
                    .optional()?;
                if parent_exists.is_none() {
                    return Err(StoreError::InvariantError(format!(
                        "parent thread {parent_id} does not exist"
                    )));
                }
                if let Some(seq) = fork_point_seq {
                    let belongs: Option<i64> = conn
                        .query_row(
                            "SELECT 1 FROM events WHERE thread_id = ?1 AND seq = ?2",
                            params![parent_id, seq],
                            |r| r.get(0),
                        )
                        .optional()?;
                    if belongs.is_none() {
                        return Err(StoreError::InvariantError(format!(
                            "fork_point seq {seq} does not belong to parent {parent_id}"
                        )));
                    }
                }
            } else if fork_point_seq.is_some() {
                return Err(StoreError::InvariantError(
                    "fork_point given without a parent".into(),
                ));
            }
            let usage_json = serde_json::to_string(&UsageTotals::default()).unwrap();
            // Starts paused with running_agent=0: no turn is running yet at
            // creation (spec §3 "status=active ⇔ running_agent"). The
            // runtime flips it to active via update_thread_status when a
            // turn actually starts.
            conn.execute(
                "INSERT INTO threads (id, topic, channel, status, created_at, updated_at, \
                 parent_id, fork_point_seq, usage_json, running_agent, repo, tags_json) \
                 VALUES (?1, ?2, ?3, 'paused', ?4, ?4, ?5, ?6, ?7, 0, NULL, '[]')",
                params![id, topic, channel, now, parent, fork_point_seq, usage_json],
            )?;
            Ok(id)
        })
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Thread, StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            conn.query_row(
                "SELECT * FROM threads WHERE id = ?1",
                params![thread_id],
                row_to_thread,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))
        })
    }

    pub async fn list_threads(&self, status: Option<ThreadStatus>, limit: i64) -> Result<Vec<Thread>, StoreError> {
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            match status {
                Some(s) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM threads WHERE status = ?1 ORDER BY updated_at DESC LIMIT ?2",
                    )?;
                    let rows = stmt.query_map(params![s.as_str(), limit], row_to_thread)?;
                    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
                }
                None => {
                    let mut stmt =
                        conn.prepare("SELECT * FROM threads ORDER BY updated_at DESC LIMIT ?1")?;
                    let rows = stmt.query_map(params![limit], row_to_thread)?;
                    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
                }
            }
        })
    }

    pub async fn update_thread_topic(&self, thread_id: &str, topic: &str) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let topic = topic.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let updated = conn.execute(
                "UPDATE threads SET topic = ?1, updated_at = ?2 WHERE id = ?3",
                params![topic, now_ms(), thread_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("thread {thread_id}")));
            }
            Ok(())
        })
    }

    pub async fn update_thread_tags(&self, thread_id: &str, tags: Vec<String>) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let tags_json = serde_json::to_string(&tags).unwrap();
            let updated = conn.execute(
                "UPDATE threads SET tags_json = ?1, updated_at = ?2 WHERE id = ?3",
                params![tags_json, now_ms(), thread_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("thread {thread_id}")));
            }
            Ok(())
        })
    }

    /// Updates thread status. Enforces `status=active ⇔ running_agent=true`
    /// by setting `running_agent` alongside the status transition.
    pub async fn update_thread_status(
        &self,
        thread_id: &str,
        status: ThreadStatus,
    ) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let running_agent = matches!(status, ThreadStatus::Active);
            let updated = conn.execute(
                "UPDATE threads SET status = ?1, running_agent = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.as_str(), running_agent as i64, now_ms(), thread_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("thread {thread_id}")));
            }
            Ok(())
        })
    }

    pub async fn add_usage(&self, thread_id: &str, delta: &UsageTotals) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let delta = delta.clone();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let usage_json: String = conn
                .query_row(
                    "SELECT usage_json FROM threads WHERE id = ?1",
                    params![thread_id],
                    |r| r.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("thread {thread_id}")))?;
            let mut usage: UsageTotals = serde_json::from_str(&usage_json).unwrap_or_default();
            usage.prompt_tokens += delta.prompt_tokens;
            usage.completion_tokens += delta.completion_tokens;
            usage.cache_tokens += delta.cache_tokens;
            usage.cost_usd += delta.cost_usd;
            usage.duration_ms += delta.duration_ms;
            let usage_json = serde_json::to_string(&usage).unwrap();
            conn.execute(
                "UPDATE threads SET usage_json = ?1, updated_at = ?2 WHERE id = ?3",
                params![usage_json, now_ms(), thread_id],
            )?;
            Ok(())
        })
    }

    /// Permanently deletes an archived thread. Fails with `InvariantError` if
    /// the thread is not archived (spec §4.5: delete only from archived).
    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let status: Option<String> = conn
                .query_row(
                    "SELECT status FROM threads WHERE id = ?1",
                    params![thread_id],
                    |r| r.get(0),
                )
                .optional()?;
            match status.as_deref() {
                None => return Err(StoreError::NotFound(format!("thread {thread_id}"))),
                Some("archived") => {}
                Some(other) => {
                    return Err(StoreError::InvariantError(format!(
                        "thread {thread_id} is {other}, not archived; cannot delete"
                    )))
                }
            }
            conn.execute("DELETE FROM events WHERE thread_id = ?1", params![thread_id])?;
            conn.execute("DELETE FROM references_ WHERE thread_id = ?1", params![thread_id])?;
            conn.execute("DELETE FROM threads WHERE id = ?1", params![thread_id])?;
            Ok(())
        })
    }

    /// Children of `thread_id`, for lineage queries (spec §4.5).
    pub async fn list_children(&self, thread_id: &str) -> Result<Vec<Thread>, StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let mut stmt = conn.prepare("SELECT * FROM threads WHERE parent_id = ?1 ORDER BY created_at ASC")?;
            let rows = stmt.query_map(params![thread_id], row_to_thread)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}
