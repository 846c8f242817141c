//! Event operations (spec §4.1, §8): append/list events with dense,
//! strictly increasing per-thread sequence numbers.

use rusqlite::{params, OptionalExtension};

use crate::error::StoreError;
use crate::model::{Event, EventDirection, MessageType, NewEvent, UsageTotals};
use crate::schema::{now_ms, Store};

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    let direction: String = row.get("direction")?;
    let message_type: String = row.get("message_type")?;
    let content_json: String = row.get("content_json")?;
    let metadata_json: Option<String> = row.get("metadata_json")?;
    let usage_json: Option<String> = row.get("usage_json")?;
    Ok(Event {
        id: row.get("id")?,
        thread_id: row.get("thread_id")?,
        seq: row.get("seq")?,
        created_at_ms: row.get("created_at")?,
        direction: EventDirection::parse(&direction).unwrap_or(EventDirection::Inbound),
        actor: row.get("actor")?,
        channel: row.get("channel")?,
        message_type: MessageType::parse(&message_type).unwrap_or(MessageType::Text),
        content: serde_json::from_str(&content_json).unwrap_or(serde_json::Value::Null),
        metadata: metadata_json.and_then(|s| serde_json::from_str(&s).ok()),
        usage: usage_json.and_then(|s| serde_json::from_str(&s).ok()),
        is_compacted: row.get::<_, i64>("is_compacted")? != 0,
    })
}

/// Page selector for `list_events` (spec §4.1).
#[derive(Clone, Copy, Debug, Default)]
pub struct EventPage {
    pub before_seq: Option<i64>,
    pub after_seq: Option<i64>,
    pub limit: Option<i64>,
    pub include_compacted: bool,
}

impl Store {
    /// Appends an event to a thread. The seq is computed as
    /// `max(seq) + 1` under the store's single-connection lock, so
    /// concurrent appends on the same thread serialize naturally; a caller
    /// racing on a stale expected-seq gets `ConflictError` instead (the
    /// lock makes this effectively unreachable here, but the variant exists
    /// for a future multi-writer backend per spec §7).
    pub async fn append_event(&self, thread_id: &str, event: NewEvent) -> Result<(String, i64), StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let mut conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let tx = conn.transaction()?;
            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM threads WHERE id = ?1", params![thread_id], |r| r.get(0))
                .optional()?;
            if exists.is_none() {
                return Err(StoreError::NotFound(format!("thread {thread_id}")));
            }
            let current_max: Option<i64> = tx
                .query_row(
                    "SELECT MAX(seq) FROM events WHERE thread_id = ?1",
                    params![thread_id],
                    |r| r.get(0),
                )
                .optional()?
                .flatten();
            let seq = current_max.unwrap_or(0) + 1;
            let id = uuid::Uuid::new_v4().to_string();
            let now = now_ms();
            let content_json = serde_json::to_string(&event.content).unwrap();
            let metadata_json = event.metadata.as_ref().map(|v| serde_json::to_string(v).unwrap());
            let usage_json = event.usage.as_ref().map(|v| serde_json::to_string(v).unwrap());
            let inserted = tx.execute(
                "INSERT INTO events (id, thread_id, seq, created_at, direction, actor, channel, \
                 message_type, content_json, metadata_json, usage_json, is_compacted) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)",
                params![
                    id,
                    thread_id,
                    seq,
                    now,
                    event.direction.as_str(),
                    event.actor,
                    event.channel,
                    event.message_type.as_str(),
                    content_json,
                    metadata_json,
                    usage_json,
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Conflict(format!(
                        "seq {seq} already exists for thread {thread_id}"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
            tx.execute(
                "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
                params![now, thread_id],
            )?;
            tx.commit()?;
            Ok((id, seq))
        })
    }

    pub async fn list_events(&self, thread_id: &str, page: EventPage) -> Result<Vec<Event>, StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let mut sql = String::from("SELECT * FROM events WHERE thread_id = ?1");
            if !page.include_compacted {
                sql.push_str(" AND is_compacted = 0");
            }
            if page.before_seq.is_some() {
                sql.push_str(" AND seq < ?2");
            }
            if page.after_seq.is_some() {
                sql.push_str(" AND seq > ?3");
            }
            sql.push_str(" ORDER BY seq ASC");
            if page.limit.is_some() {
                sql.push_str(" LIMIT ?4");
            }
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![
                    thread_id,
                    page.before_seq.unwrap_or(i64::MAX),
                    page.after_seq.unwrap_or(0),
                    page.limit.unwrap_or(i64::MAX),
                ],
                row_to_event,
            )?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    /// Marks the events in `[1, up_to_seq]` as compacted and inserts a
    /// `summary` event carrying `summary_content`, appended at the current
    /// tail (spec §4.5, §8: "compact(T) ... returns the original sequence
    /// plus one appended summary event").
    pub async fn compact_events(
        &self,
        thread_id: &str,
        up_to_seq: i64,
        summary_content: serde_json::Value,
        usage: Option<UsageTotals>,
    ) -> Result<(String, i64), StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let mut conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE events SET is_compacted = 1 WHERE thread_id = ?1 AND seq <= ?2",
                params![thread_id, up_to_seq],
            )?;
            let current_max: Option<i64> = tx
                .query_row(
                    "SELECT MAX(seq) FROM events WHERE thread_id = ?1",
                    params![thread_id],
                    |r| r.get(0),
                )
                .optional()?
                .flatten();
            let seq = current_max.unwrap_or(0) + 1;
            let id = uuid::Uuid::new_v4().to_string();
            let now = now_ms();
            let content_json = serde_json::to_string(&summary_content).unwrap();
            let usage_json = usage.as_ref().map(|v| serde_json::to_string(v).unwrap());
            tx.execute(
                "INSERT INTO events (id, thread_id, seq, created_at, direction, actor, channel, \
                 message_type, content_json, metadata_json, usage_json, is_compacted) \
                 VALUES (?1, ?2, ?3, ?4, 'outbound', 'gigi', 'system', 'summary', ?5, NULL, ?6, 0)",
                params![id, thread_id, seq, now, content_json, usage_json],
            )?;
            tx.commit()?;
            Ok((id, seq))
        })
    }
}
