//! Webhook ingestion: dedup, routing, thread binding, status sync (spec
//! §4.6). `verify_signature` gates the HTTP layer before `ingest` is ever
//! called; this module assumes the body is already trusted.

use std::sync::Arc;

use gigi_store::{EventDirection, MessageType, NewEvent, RefStatus, Store, StoreError};
use thiserror::Error;

use crate::payload::{parse, ParsedEvent, PayloadError};

/// Self-echo dedup window (spec §4.6: "within a 30 s window").
pub const DEDUP_WINDOW_MS: i64 = 30_000;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A thread was created or appended to.
    Accepted { thread_id: String },
    /// Matched a recent self-authored action; dropped silently as an echo
    /// (spec §4.6, §8: distinct from a forge delivery-id redelivery, which
    /// the gateway layer rejects with 409 before `ingest` is ever called).
    Echo,
    /// Event kind isn't thread-routable, or concerns a reference with no
    /// existing thread and isn't an "opened" event.
    Ignored,
}

pub struct WebhookIngester {
    store: Arc<Store>,
    now_ms: fn() -> i64,
}

impl WebhookIngester {
    pub fn new(store: Arc<Store>) -> Self {
        WebhookIngester { store, now_ms: gigi_store::now_ms }
    }

    /// Candidate self-authored payload string that would collide with the
    /// one `gigi-tools::gitea` records for the matching outbound write
    /// (`comment:{repo}#{number}:{body}`). Only comment events have a
    /// well-defined echo shape in the current tool catalog.
    fn echo_candidate(parsed: &ParsedEvent) -> Option<String> {
        let body = parsed.comment_body.as_ref()?;
        Some(format!("comment:{}#{}:{}", parsed.repo, parsed.number, body))
    }

    pub async fn ingest(&self, event_kind: &str, payload: &serde_json::Value) -> Result<IngestOutcome, IngestError> {
        let Some(parsed) = parse(event_kind, payload)? else {
            return Ok(IngestOutcome::Ignored);
        };

        if let Some(candidate) = Self::echo_candidate(&parsed) {
            if self.store.has_recent_action(&candidate, (self.now_ms)(), DEDUP_WINDOW_MS).await? {
                return Ok(IngestOutcome::Echo);
            }
        }

        let existing = self.store.find_thread_by_reference(&parsed.repo, parsed.ref_type, &parsed.number).await?;
        let thread_id = match existing {
            Some(id) => id,
            None if parsed.action == "opened" => {
                let kind_label = match parsed.ref_type {
                    gigi_store::RefType::Pr => "PR",
                    _ => "Issue",
                };
                let topic = format!("{kind_label} #{}: {}", parsed.number, parsed.title);
                let thread_id = self.store.create_thread("webhook", &topic, None, None).await?;
                self.store
                    .upsert_reference(&thread_id, parsed.ref_type, &parsed.repo, &parsed.number, RefStatus::Open, Some(&parsed.url))
                    .await?;
                thread_id
            }
            None => return Ok(IngestOutcome::Ignored),
        };

        let summary = match &parsed.comment_body {
            Some(body) => format!("{} commented on {}: {} ({})", parsed.login, parsed.number, body, parsed.url),
            None => format!("{} {} {} ({})", parsed.login, parsed.action, parsed.url, parsed.title),
        };
        self.store
            .append_event(
                &thread_id,
                NewEvent {
                    direction: EventDirection::Inbound,
                    actor: format!("forge:{}", parsed.login),
                    channel: "webhook".to_string(),
                    message_type: MessageType::Text,
                    content: serde_json::json!({ "text": summary }),
                    metadata: None,
                    usage: None,
                },
            )
            .await?;

        if matches!(parsed.action.as_str(), "closed" | "merged") {
            let status = if parsed.action == "merged" { RefStatus::Merged } else { RefStatus::Closed };
            self.store
                .upsert_reference(&thread_id, parsed.ref_type, &parsed.repo, &parsed.number, status, Some(&parsed.url))
                .await?;
            if parsed.action == "closed" {
                self.store.update_thread_status(&thread_id, gigi_store::ThreadStatus::Stopped).await?;
            }
        }

        Ok(IngestOutcome::Accepted { thread_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_opened(number: i64) -> serde_json::Value {
        json!({
            "action": "opened",
            "repository": {"full_name": "gigi/gigi"},
            "sender": {"login": "alice"},
            "issue": {"number": number, "title": "bug", "html_url": "https://forge/gigi/gigi/issues/42"},
        })
    }

    fn issue_closed(number: i64) -> serde_json::Value {
        json!({
            "action": "closed",
            "repository": {"full_name": "gigi/gigi"},
            "sender": {"login": "alice"},
            "issue": {"number": number, "title": "bug", "html_url": "https://forge/gigi/gigi/issues/42"},
        })
    }

    #[tokio::test]
    async fn opened_issue_creates_thread_and_reference() {
        let store = Arc::new(Store::in_memory().unwrap());
        let ingester = WebhookIngester::new(store.clone());
        let outcome = ingester.ingest("issues", &issue_opened(42)).await.unwrap();
        let IngestOutcome::Accepted { thread_id } = outcome else { panic!("expected Accepted") };
        let thread = store.get_thread(&thread_id).await.unwrap();
        assert_eq!(thread.topic, "Issue #42: bug");
        let refs = store.list_references_by_thread(&thread_id).await.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].status, RefStatus::Open);
    }

    #[tokio::test]
    async fn closed_issue_stops_thread_and_closes_reference() {
        let store = Arc::new(Store::in_memory().unwrap());
        let ingester = WebhookIngester::new(store.clone());
        let IngestOutcome::Accepted { thread_id } = ingester.ingest("issues", &issue_opened(42)).await.unwrap() else {
            panic!("expected Accepted")
        };
        ingester.ingest("issues", &issue_closed(42)).await.unwrap();
        let thread = store.get_thread(&thread_id).await.unwrap();
        assert_eq!(thread.status, gigi_store::ThreadStatus::Stopped);
        let refs = store.list_references_by_thread(&thread_id).await.unwrap();
        assert_eq!(refs[0].status, RefStatus::Closed);
        let events = store.list_events(&thread_id, Default::default()).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn comment_without_existing_thread_is_ignored() {
        let store = Arc::new(Store::in_memory().unwrap());
        let ingester = WebhookIngester::new(store);
        let payload = json!({
            "repository": {"full_name": "gigi/gigi"},
            "sender": {"login": "bob"},
            "issue": {"number": 9, "title": "t"},
            "comment": {"body": "looks good", "html_url": "u"},
        });
        let outcome = ingester.ingest("issue_comment", &payload).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Ignored);
    }

    #[tokio::test]
    async fn comment_echo_is_dropped() {
        let store = Arc::new(Store::in_memory().unwrap());
        let ingester = WebhookIngester::new(store.clone());
        let IngestOutcome::Accepted { thread_id } = ingester.ingest("issues", &issue_opened(42)).await.unwrap() else {
            panic!("expected Accepted")
        };
        store
            .record_action("gitea.comment", Some(&thread_id), Some("tool-1"), Some("gigi/gigi"), "comment:gigi/gigi#42:nice work", None)
            .await
            .unwrap();
        let payload = json!({
            "repository": {"full_name": "gigi/gigi"},
            "sender": {"login": "gigi-bot"},
            "issue": {"number": 42, "title": "bug"},
            "comment": {"body": "nice work", "html_url": "u"},
        });
        let outcome = ingester.ingest("issue_comment", &payload).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Echo);
    }
}
