//! Search over thread topics and event content (spec §4.5): substring
//! match, ranked topic-match first, then by recency. Minimum query length
//! (2 characters) is the caller's responsibility — `gigi-thread::search`
//! enforces it before this ever runs a scan.

use rusqlite::params;

use crate::error::StoreError;
use crate::schema::Store;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLocation {
    Topic,
    Event,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub thread_id: String,
    pub topic: String,
    pub matched_in: MatchLocation,
    pub snippet: String,
    pub updated_at_ms: i64,
}

impl Store {
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<SearchHit>, StoreError> {
        let pattern = format!("%{}%", query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let mut hits = Vec::new();

            let mut topic_stmt = conn.prepare(
                "SELECT id, topic, updated_at FROM threads WHERE topic LIKE ?1 ESCAPE '\\' \
                 ORDER BY updated_at DESC LIMIT ?2",
            )?;
            let topic_rows = topic_stmt.query_map(params![pattern, limit], |r| {
                let topic: String = r.get(1)?;
                Ok(SearchHit {
                    thread_id: r.get(0)?,
                    topic: topic.clone(),
                    matched_in: MatchLocation::Topic,
                    snippet: topic,
                    updated_at_ms: r.get(2)?,
                })
            })?;
            for row in topic_rows {
                hits.push(row?);
            }

            let mut event_stmt = conn.prepare(
                "SELECT events.thread_id, threads.topic, events.content_json, threads.updated_at \
                 FROM events JOIN threads ON threads.id = events.thread_id \
                 WHERE events.content_json LIKE ?1 ESCAPE '\\' \
                 ORDER BY threads.updated_at DESC LIMIT ?2",
            )?;
            let event_rows = event_stmt.query_map(params![pattern, limit], |r| {
                let content: String = r.get(2)?;
                Ok(SearchHit {
                    thread_id: r.get(0)?,
                    topic: r.get(1)?,
                    matched_in: MatchLocation::Event,
                    snippet: content.chars().take(200).collect(),
                    updated_at_ms: r.get(3)?,
                })
            })?;
            for row in event_rows {
                hits.push(row?);
            }

            hits.sort_by(|a, b| {
                let rank = |h: &SearchHit| match h.matched_in {
                    MatchLocation::Topic => 0,
                    MatchLocation::Event => 1,
                };
                rank(a).cmp(&rank(b)).then(b.updated_at_ms.cmp(&a.updated_at_ms))
            });
            hits.dedup_by(|a, b| a.thread_id == b.thread_id && a.matched_in == b.matched_in);
            hits.truncate(limit as usize);
            Ok(hits)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventDirection, MessageType, NewEvent};

    #[tokio::test]
    async fn topic_match_ranks_above_event_match() {
        let store = Store::in_memory().unwrap();
        let topic_thread = store.create_thread("web", "fix the flaky ingest test", None, None).await.unwrap();
        let event_thread = store.create_thread("web", "unrelated", None, None).await.unwrap();
        store
            .append_event(
                &event_thread,
                NewEvent {
                    direction: EventDirection::Inbound,
                    actor: "user".into(),
                    channel: "web".into(),
                    message_type: MessageType::Text,
                    content: serde_json::json!({"text": "the ingest test is flaky today"}),
                    metadata: None,
                    usage: None,
                },
            )
            .await
            .unwrap();

        let hits = store.search("flaky", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].thread_id, topic_thread);
        assert_eq!(hits[1].thread_id, event_thread);
    }

    #[tokio::test]
    async fn no_match_returns_empty() {
        let store = Store::in_memory().unwrap();
        store.create_thread("web", "something else entirely", None, None).await.unwrap();
        let hits = store.search("zzz_no_match", 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
