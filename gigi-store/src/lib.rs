//! Durable conversation store (spec §4.1, §6.5): threads, events,
//! references, usage rollups, action log, and process configuration, all
//! backed by a single SQLite connection behind a mutex.

mod action_log;
mod config;
mod enforcement;
mod error;
mod events;
mod model;
mod pending_questions;
mod refs;
mod schema;
mod search;
mod threads;
mod usage;
mod webhook_delivery;

pub use action_log::content_digest;
pub use enforcement::{EnforcementState, EnforcementTask};
pub use error::StoreError;
pub use events::EventPage;
pub use model::{
    Event, EventDirection, MessageType, NewEvent, RefStatus, RefType, Reference, Thread,
    ThreadStatus, UsageTotals,
};
pub use pending_questions::{PendingQuestion, PendingQuestionStatus};
pub use schema::{now_ms, Store};
pub use search::{MatchLocation, SearchHit};
pub use usage::DailyUsage;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_event_assigns_dense_seq() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "test", None, None).await.unwrap();
        let (_, seq1) = store
            .append_event(
                &thread_id,
                NewEvent {
                    direction: EventDirection::Inbound,
                    actor: "user".into(),
                    channel: "web".into(),
                    message_type: MessageType::Text,
                    content: serde_json::json!({"text": "hi"}),
                    metadata: None,
                    usage: None,
                },
            )
            .await
            .unwrap();
        let (_, seq2) = store
            .append_event(
                &thread_id,
                NewEvent {
                    direction: EventDirection::Outbound,
                    actor: "gigi".into(),
                    channel: "web".into(),
                    message_type: MessageType::Text,
                    content: serde_json::json!({"text": "hello"}),
                    metadata: None,
                    usage: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(seq1, 1);
        assert_eq!(seq2, 2);
    }

    #[tokio::test]
    async fn fork_point_must_belong_to_parent() {
        let store = Store::in_memory().unwrap();
        let parent = store.create_thread("web", "parent", None, None).await.unwrap();
        let err = store
            .create_thread("web", "child", Some(&parent), Some(5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvariantError(_)));
    }

    #[tokio::test]
    async fn delete_requires_archived() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let err = store.delete_thread(&thread_id).await.unwrap_err();
        assert!(matches!(err, StoreError::InvariantError(_)));
        store
            .update_thread_status(&thread_id, ThreadStatus::Archived)
            .await
            .unwrap();
        store.delete_thread(&thread_id).await.unwrap();
    }

    #[tokio::test]
    async fn reference_uniqueness_upserts() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let id1 = store
            .upsert_reference(&thread_id, RefType::Pr, "org/repo", "42", RefStatus::Open, None)
            .await
            .unwrap();
        let id2 = store
            .upsert_reference(&thread_id, RefType::Pr, "org/repo", "42", RefStatus::Merged, None)
            .await
            .unwrap();
        assert_eq!(id1, id2);
        let refs = store.list_references_by_thread(&thread_id).await.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].status, RefStatus::Merged);
    }

    #[tokio::test]
    async fn action_log_dedup_window() {
        let store = Store::in_memory().unwrap();
        store
            .record_action("gitea.create_pr", None, None, Some("org/repo"), "payload-a", None)
            .await
            .unwrap();
        let now = now_ms();
        assert!(store.has_recent_action("payload-a", now, 30_000).await.unwrap());
        assert!(!store.has_recent_action("payload-b", now, 30_000).await.unwrap());
    }

    #[tokio::test]
    async fn has_action_since_matches_kind_and_window() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let before = now_ms();
        store
            .record_action("gitea.create_pr", Some(&thread_id), None, Some("org/repo"), "pr-1", None)
            .await
            .unwrap();
        assert!(store.has_action_since(&thread_id, "org/repo", "gitea.create_pr", before).await.unwrap());
        assert!(!store.has_action_since(&thread_id, "org/repo", "telegram.send", before).await.unwrap());
        assert!(!store.has_action_since(&thread_id, "org/repo", "gitea.create_pr", before + 60_000).await.unwrap());
    }

    #[tokio::test]
    async fn has_action_since_matches_repo_less_actions_by_thread_alone() {
        // telegram.send (and other channel-only actions) are recorded with
        // no repo concept (repo = NULL); has_action_since must still match
        // them against an enforcement task's real repo string.
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let before = now_ms();
        store
            .record_action("telegram.send", Some(&thread_id), None, None, "telegram_send:1:hi", None)
            .await
            .unwrap();
        assert!(store.has_action_since(&thread_id, "org/repo", "telegram.send", before).await.unwrap());
    }

    #[tokio::test]
    async fn compact_events_marks_prefix_and_appends_summary() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        for i in 0..3 {
            store
                .append_event(
                    &thread_id,
                    NewEvent {
                        direction: EventDirection::Inbound,
                        actor: "user".into(),
                        channel: "web".into(),
                        message_type: MessageType::Text,
                        content: serde_json::json!({"i": i}),
                        metadata: None,
                        usage: None,
                    },
                )
                .await
                .unwrap();
        }
        store
            .compact_events(&thread_id, 3, serde_json::json!({"summary": "..."}), None)
            .await
            .unwrap();
        let all = store
            .list_events(&thread_id, EventPage { include_compacted: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        let live = store
            .list_events(&thread_id, EventPage::default())
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].message_type, MessageType::Summary);
    }
}
