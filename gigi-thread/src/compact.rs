//! Compaction: replaces a contiguous prefix of events with a single
//! `summary` event produced by asking the LLM to summarize it (spec §4.5).
//! A direct async function rather than a graph node, for the reason given
//! in [`crate`]'s module doc.

use std::sync::Arc;

use async_trait::async_trait;
use gigi_agent::{ChatMessage, LlmClient, LlmError};
use gigi_store::{Event, EventPage, Store, StoreError, UsageTotals};
use thiserror::Error;

/// Live events kept uncompacted by default (spec §4.5: "all but the last K
/// live events, K configurable, default 8").
pub const DEFAULT_KEEP_RECENT: usize = 8;

/// Event count above which compaction is recommended (spec §4.5 default).
pub const RECOMMEND_EVENT_THRESHOLD: usize = 50;

#[derive(Debug, Error)]
pub enum CompactError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
}

/// Abstracts "turn a prefix of events into a summary string" so `compact`
/// doesn't need to depend on a specific LLM backend.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, events: &[Event]) -> Result<String, CompactError>;
}

/// Default summarizer: renders the prefix as a flat transcript and asks the
/// LLM for a concise summary.
pub struct LlmSummarizer {
    pub llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, events: &[Event]) -> Result<String, CompactError> {
        let mut transcript = String::new();
        for event in events {
            let text = event
                .content
                .get("text")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| event.content.to_string());
            transcript.push_str(&format!("{:?} {}: {text}\n", event.direction, event.actor));
        }
        let messages = vec![
            ChatMessage::system(
                "Summarize this conversation prefix concisely, preserving decisions, \
                 open questions, and anything the next turn needs to know.",
            ),
            ChatMessage::user(transcript),
        ];
        let response = self.llm.invoke(&messages).await?;
        Ok(response.content)
    }
}

/// Whether compaction is recommended by event count alone (spec §4.5: "event
/// count exceeds threshold"). The companion token-ceiling trigger is left to
/// the caller, which already has the live tail's usage totals loaded.
pub fn recommend_by_event_count(total_event_count: usize) -> bool {
    total_event_count > RECOMMEND_EVENT_THRESHOLD
}

/// Compacts all but the last `keep_recent` live events of `thread_id` into
/// one summary event (spec §4.5, §8: "returns the original sequence plus
/// one appended summary event"). Threads that are themselves a fork child
/// already carry their "context from parent" summary at seq 1; compacting
/// again simply folds it into the new prefix, so parent-then-child summary
/// ordering falls out of plain seq order without special-casing it here.
pub async fn compact(
    store: &Store,
    summarizer: &dyn Summarizer,
    thread_id: &str,
    keep_recent: usize,
) -> Result<(String, i64), CompactError> {
    let live = store.list_events(thread_id, EventPage::default()).await?;
    if live.len() <= keep_recent {
        return Err(CompactError::Store(StoreError::InvariantError(
            "nothing to compact: fewer live events than keep_recent".into(),
        )));
    }
    let cutoff = live.len() - keep_recent;
    let prefix = &live[..cutoff];
    let up_to_seq = prefix.last().map(|e| e.seq).unwrap_or(0);
    let summary_text = summarizer.summarize(prefix).await?;
    let usage = sum_usage(prefix);
    store
        .compact_events(thread_id, up_to_seq, serde_json::json!({"text": summary_text}), Some(usage))
        .await
        .map_err(CompactError::from)
}

fn sum_usage(events: &[Event]) -> UsageTotals {
    let mut total = UsageTotals::default();
    for event in events {
        if let Some(usage) = &event.usage {
            total.prompt_tokens += usage.prompt_tokens;
            total.completion_tokens += usage.completion_tokens;
            total.cache_tokens += usage.cache_tokens;
            total.cost_usd += usage.cost_usd;
            total.duration_ms += usage.duration_ms;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigi_agent::{LlmResponse, LlmUsage, MockLlm};
    use gigi_store::{EventDirection, MessageType, NewEvent};

    async fn seed(store: &Store, thread_id: &str, n: usize) {
        for i in 0..n {
            store
                .append_event(
                    thread_id,
                    NewEvent {
                        direction: EventDirection::Inbound,
                        actor: "user".into(),
                        channel: "web".into(),
                        message_type: MessageType::Text,
                        content: serde_json::json!({"text": format!("message {i}")}),
                        metadata: None,
                        usage: None,
                    },
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn compacts_all_but_keep_recent() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        seed(&store, &thread_id, 10).await;

        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm::new(vec![LlmResponse {
            content: "summary of the first 8 messages".into(),
            tool_calls: vec![],
            usage: LlmUsage::default(),
        }]));
        let summarizer = LlmSummarizer { llm };

        compact(&store, &summarizer, &thread_id, 2).await.unwrap();

        let live = store.list_events(&thread_id, EventPage::default()).await.unwrap();
        assert_eq!(live.len(), 3); // 2 kept live + 1 summary
        // compact_events appends the summary at the current tail (spec §4.5,
        // §8: "returns the original sequence plus one appended summary
        // event"), so it sorts after the kept-live tail under seq ASC, not
        // before it.
        assert!(matches!(live.last().unwrap().message_type, MessageType::Summary));

        let all = store
            .list_events(&thread_id, EventPage { include_compacted: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(all.len(), 11); // original 10 + 1 summary
    }

    #[tokio::test]
    async fn refuses_when_nothing_to_compact() {
        let store = Store::in_memory().unwrap();
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        seed(&store, &thread_id, 3).await;
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm::new(vec![]));
        let summarizer = LlmSummarizer { llm };
        let err = compact(&store, &summarizer, &thread_id, 8).await.unwrap_err();
        assert!(matches!(err, CompactError::Store(StoreError::InvariantError(_))));
    }

    #[test]
    fn recommends_past_threshold() {
        assert!(!recommend_by_event_count(50));
        assert!(recommend_by_event_count(51));
    }
}
