//! Fork: spins off a child thread pinned to a parent event, optionally
//! seeding it with a summary of the parent's prefix up to the fork point
//! (spec §4.5).

use gigi_store::{EventDirection, EventPage, MessageType, NewEvent, Store, StoreError};

use crate::compact::{CompactError, Summarizer};

#[derive(Debug, thiserror::Error)]
pub enum ForkError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("compaction error: {0}")]
    Compact(#[from] CompactError),
}

pub struct ForkRequest<'a> {
    pub parent_thread_id: &'a str,
    pub fork_point_seq: i64,
    pub topic: Option<&'a str>,
    pub compact_parent: bool,
}

/// Creates the child thread and, if `compact_parent`, appends a `summary`
/// event built from the parent's prefix up to `fork_point_seq` (spec §4.5:
/// "the child's first inbound message may include a short 'context from
/// parent' preface" — that preface is this summary event, present before
/// any real input arrives).
pub async fn fork(store: &Store, summarizer: &dyn Summarizer, req: ForkRequest<'_>) -> Result<String, ForkError> {
    let parent = store.get_thread(req.parent_thread_id).await?;
    let topic = req.topic.map(str::to_string).unwrap_or_else(|| format!("{} (forked)", parent.topic));
    let child_id = store
        .create_thread(&parent.channel, &topic, Some(req.parent_thread_id), Some(req.fork_point_seq))
        .await?;

    if req.compact_parent {
        let prefix = store
            .list_events(
                req.parent_thread_id,
                EventPage { before_seq: Some(req.fork_point_seq + 1), ..Default::default() },
            )
            .await?;
        let summary_text = summarizer.summarize(&prefix).await?;
        store
            .append_event(
                &child_id,
                NewEvent {
                    direction: EventDirection::Outbound,
                    actor: "gigi".into(),
                    channel: parent.channel.clone(),
                    message_type: MessageType::Summary,
                    content: serde_json::json!({"text": summary_text, "context_from_parent": true}),
                    metadata: None,
                    usage: None,
                },
            )
            .await?;
    }

    Ok(child_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigi_agent::{LlmClient, LlmResponse, LlmUsage, MockLlm};
    use gigi_store::NewEvent;
    use std::sync::Arc;

    use crate::compact::LlmSummarizer;

    #[tokio::test]
    async fn fork_without_compaction_has_no_events() {
        let store = Store::in_memory().unwrap();
        let parent_id = store.create_thread("web", "parent", None, None).await.unwrap();
        for i in 0..10 {
            store
                .append_event(
                    &parent_id,
                    NewEvent {
                        direction: EventDirection::Inbound,
                        actor: "user".into(),
                        channel: "web".into(),
                        message_type: MessageType::Text,
                        content: serde_json::json!({"text": format!("msg {i}")}),
                        metadata: None,
                        usage: None,
                    },
                )
                .await
                .unwrap();
        }
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm::new(vec![]));
        let summarizer = LlmSummarizer { llm };

        let child_id = fork(
            &store,
            &summarizer,
            ForkRequest { parent_thread_id: &parent_id, fork_point_seq: 10, topic: None, compact_parent: false },
        )
        .await
        .unwrap();

        let child = store.get_thread(&child_id).await.unwrap();
        assert_eq!(child.parent_id.as_deref(), Some(parent_id.as_str()));
        assert_eq!(child.fork_point_seq, Some(10));
        let events = store.list_events(&child_id, EventPage::default()).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn fork_with_compaction_seeds_a_summary() {
        let store = Store::in_memory().unwrap();
        let parent_id = store.create_thread("web", "parent", None, None).await.unwrap();
        store
            .append_event(
                &parent_id,
                NewEvent {
                    direction: EventDirection::Inbound,
                    actor: "user".into(),
                    channel: "web".into(),
                    message_type: MessageType::Text,
                    content: serde_json::json!({"text": "hello"}),
                    metadata: None,
                    usage: None,
                },
            )
            .await
            .unwrap();

        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm::new(vec![LlmResponse {
            content: "parent talked about saying hello".into(),
            tool_calls: vec![],
            usage: LlmUsage::default(),
        }]));
        let summarizer = LlmSummarizer { llm };

        let child_id = fork(
            &store,
            &summarizer,
            ForkRequest { parent_thread_id: &parent_id, fork_point_seq: 1, topic: Some("spinoff"), compact_parent: true },
        )
        .await
        .unwrap();

        let events = store.list_events(&child_id, EventPage::default()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].message_type, MessageType::Summary));
    }
}
