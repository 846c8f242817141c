//! The turn state machine (spec §4.4.1-§4.4.4). A think → act → observe
//! cycle driven by an explicit loop rather than a general graph compiler —
//! the turn protocol already names its own fixed transitions (`agent_start`
//! → text/tool segments → `agent_done`|`agent_error`|`agent_stopped`), so a
//! compilation layer for arbitrary DAGs is more machinery than this
//! fixed-shape loop needs.

use std::sync::Arc;

use gigi_eventbus::EventBus;
use gigi_protocol::{ServerMessage, ToolResultStatus, UsageSummary};
use gigi_store::{EventDirection, EventPage, MessageType, NewEvent, Store, StoreError, ThreadStatus};
use gigi_tools::{CancelToken, ToolCallContext, ToolRegistry};
use thiserror::Error;
use uuid::Uuid;

use crate::cost::CostMeter;
use crate::enforcement::{EnforcementEngine, EnforcementEvidence, EnforcementOutcome};
use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::retry::RetryCounter;

/// Safety bound on LLM round-trips within a single turn. Not named by the
/// spec; without it a model that never stops requesting tools would hold
/// the thread's single-writer lock forever.
const MAX_TURN_STEPS: u32 = 50;

/// Bound on enforcement-triggered follow-up turns chained after one
/// `run_turn` call, independent of the engine's own `MAX_CYCLES` (spec
/// §4.4.3): keeps one gateway request from blocking on an unbounded chain.
const MAX_FOLLOWUP_TURNS: u32 = 8;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("budget exceeded")]
    BudgetExceeded,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
}

/// Evidence for the optional completion-enforcement pass after a turn
/// finishes cleanly. `None` means this thread has no enforcement task
/// (most chat threads; enforcement only applies to "work on issue X").
#[derive(Clone)]
pub struct EnforcementContext {
    pub repo: String,
    pub issue_number: String,
    pub workspace_fingerprint: Option<String>,
    pub pushed: bool,
}

enum TurnOutcome {
    Done,
    Stopped,
    StepLimitExceeded,
}

pub struct TurnRuntime {
    store: Arc<Store>,
    bus: Arc<EventBus>,
    tools: Arc<ToolRegistry>,
    llm: Arc<dyn LlmClient>,
    cost: CostMeter,
    enforcement: EnforcementEngine,
}

impl TurnRuntime {
    pub fn new(
        store: Arc<Store>,
        bus: Arc<EventBus>,
        tools: Arc<ToolRegistry>,
        llm: Arc<dyn LlmClient>,
        daily_budget_usd: f64,
    ) -> Self {
        Self {
            cost: CostMeter::new(store.clone(), daily_budget_usd),
            enforcement: EnforcementEngine::new(store.clone()),
            store,
            bus,
            tools,
            llm,
        }
    }

    fn publish(&self, thread_id: &str, message: ServerMessage) {
        self.bus.publish(thread_id, message);
    }

    async fn persist(&self, thread_id: &str, event: NewEvent) -> Result<i64, StoreError> {
        let (_, seq) = self.store.append_event(thread_id, event).await?;
        Ok(seq)
    }

    async fn load_history(&self, thread_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let events = self.store.list_events(thread_id, EventPage::default()).await?;
        Ok(events.iter().map(event_to_chat_message).collect())
    }

    /// Runs a turn to completion, then chases any completion-enforcement
    /// follow-up turns triggered by it (spec §4.4.1, §4.4.3). Each follow-up
    /// is a fresh turn over the same thread, not a recursive call, so the
    /// chain is bounded by [`MAX_FOLLOWUP_TURNS`] rather than stack depth.
    pub async fn run_turn(
        &self,
        thread_id: &str,
        cancel: CancelToken,
        enforcement_ctx: Option<EnforcementContext>,
    ) -> Result<(), AgentError> {
        let mut ctx = enforcement_ctx;
        for _ in 0..MAX_FOLLOWUP_TURNS {
            let outcome = self.run_one_turn(thread_id, cancel.clone()).await?;
            let TurnOutcome::Done = outcome else {
                return Ok(());
            };
            let Some(current) = ctx.take() else {
                return Ok(());
            };
            match self.advance_enforcement(thread_id, &current).await? {
                None => return Ok(()),
                Some(next_ctx) => ctx = Some(next_ctx),
            }
        }
        Ok(())
    }

    /// Runs one LLM-driven turn: `agent_start` through the text/tool loop to
    /// `agent_done`, `agent_error`, or `agent_stopped` (spec §4.4.1).
    async fn run_one_turn(&self, thread_id: &str, mut cancel: CancelToken) -> Result<TurnOutcome, AgentError> {
        let now = gigi_store::now_ms();
        self.cost.check_budget(now).await.map_err(|_| AgentError::BudgetExceeded)?;

        let turn_id = Uuid::new_v4().to_string();
        self.persist(
            thread_id,
            status_event("agent_start", serde_json::json!({"turn_id": turn_id})),
        )
        .await?;
        self.publish(thread_id, ServerMessage::AgentStart { turn_id: turn_id.clone() });
        self.store.update_thread_status(thread_id, ThreadStatus::Active).await?;

        let mut messages = self.load_history(thread_id).await?;
        let mut retry_counter = RetryCounter::new();
        let mut total_usage = UsageSummary::default();

        for _step in 0..MAX_TURN_STEPS {
            if cancel.is_cancelled() {
                return self.stop_turn(thread_id).await.map(|_| TurnOutcome::Stopped);
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.stop_turn(thread_id).await.map(|_| TurnOutcome::Stopped),
                res = self.llm.invoke(&messages) => res?,
            };

            self.cost.record(thread_id, now, &response.usage).await?;
            total_usage.prompt_tokens += response.usage.prompt_tokens;
            total_usage.completion_tokens += response.usage.completion_tokens;
            total_usage.total_tokens += response.usage.prompt_tokens + response.usage.completion_tokens;
            total_usage.cost_usd += response.usage.cost_usd;

            if !response.content.is_empty() {
                self.publish(thread_id, ServerMessage::TextChunk { content: response.content.clone() });
                self.persist(
                    thread_id,
                    NewEvent {
                        direction: EventDirection::Outbound,
                        actor: "gigi".into(),
                        channel: "system".into(),
                        message_type: MessageType::Text,
                        content: serde_json::json!({"text": response.content}),
                        metadata: None,
                        usage: None,
                    },
                )
                .await?;
                messages.push(ChatMessage::assistant(response.content.clone()));
            }

            if response.tool_calls.is_empty() {
                self.persist(thread_id, status_event("agent_done", serde_json::json!({}))).await?;
                self.publish(thread_id, ServerMessage::AgentDone { usage: total_usage });
                self.store.update_thread_status(thread_id, ThreadStatus::Paused).await?;
                return Ok(TurnOutcome::Done);
            }

            for call in &response.tool_calls {
                if cancel.is_cancelled() {
                    return self.stop_turn(thread_id).await.map(|_| TurnOutcome::Stopped);
                }

                self.persist(
                    thread_id,
                    NewEvent {
                        direction: EventDirection::Outbound,
                        actor: "gigi".into(),
                        channel: "system".into(),
                        message_type: MessageType::ToolUse,
                        content: serde_json::json!({"tool_use_id": call.id, "name": call.name, "input": call.arguments}),
                        metadata: None,
                        usage: None,
                    },
                )
                .await?;
                self.publish(
                    thread_id,
                    ServerMessage::ToolUse { tool_use_id: call.id.clone(), name: call.name.clone(), input: call.arguments.clone() },
                );

                let mut call_ctx = ToolCallContext {
                    thread_id: thread_id.to_string(),
                    tool_use_id: call.id.clone(),
                    cancel: cancel.clone(),
                };
                let result = self.tools.invoke(&call.name, call.arguments.clone(), &mut call_ctx).await;

                let (status, output, feedback) = match result {
                    Ok(text) => (ToolResultStatus::Success, serde_json::json!({"text": text}), None),
                    Err(err) => {
                        let attempts = retry_counter.record_failure(&call.name, &call.arguments);
                        let directive = if retry_counter.exhausted(&call.name, &call.arguments) {
                            format!(
                                "{} failed {attempts} times ({err}). Ask the operator for guidance instead of retrying again.",
                                call.name
                            )
                        } else {
                            format!("{} failed: {err}. Try a different approach.", call.name)
                        };
                        (ToolResultStatus::Failure, serde_json::json!({"error": err.to_string()}), Some(directive))
                    }
                };

                self.persist(
                    thread_id,
                    NewEvent {
                        direction: EventDirection::Outbound,
                        actor: "gigi".into(),
                        channel: "system".into(),
                        message_type: MessageType::ToolResult,
                        content: serde_json::json!({"tool_use_id": call.id, "status": status, "output": output}),
                        metadata: None,
                        usage: None,
                    },
                )
                .await?;
                self.publish(
                    thread_id,
                    ServerMessage::ToolResult { tool_use_id: call.id.clone(), status, output: output.clone() },
                );

                let tool_message_text = feedback.unwrap_or_else(|| output.to_string());
                messages.push(ChatMessage::tool(tool_message_text));
            }
        }

        self.persist(
            thread_id,
            status_event("agent_error", serde_json::json!({"reason": "step limit exceeded"})),
        )
        .await?;
        self.publish(thread_id, ServerMessage::AgentError { reason: "step limit exceeded".into() });
        self.store.update_thread_status(thread_id, ThreadStatus::Paused).await?;
        Ok(TurnOutcome::StepLimitExceeded)
    }

    async fn stop_turn(&self, thread_id: &str) -> Result<(), AgentError> {
        self.persist(thread_id, status_event("agent_stopped", serde_json::json!({}))).await?;
        self.publish(thread_id, ServerMessage::AgentStopped);
        self.store.update_thread_status(thread_id, ThreadStatus::Paused).await?;
        Ok(())
    }

    /// Runs the enforcement engine once after a clean `agent_done`. Returns
    /// `Some(ctx)` (unchanged) when a synthetic directive was injected and
    /// another turn should run; `None` once nothing further is needed.
    async fn advance_enforcement(
        &self,
        thread_id: &str,
        ctx: &EnforcementContext,
    ) -> Result<Option<EnforcementContext>, AgentError> {
        let now = gigi_store::now_ms();
        let evidence = EnforcementEvidence {
            workspace_fingerprint: ctx.workspace_fingerprint.clone(),
            pushed: ctx.pushed,
        };
        let outcome = self
            .enforcement
            .advance(thread_id, &ctx.repo, &ctx.issue_number, &evidence, now)
            .await?;

        match outcome {
            EnforcementOutcome::Unchanged => Ok(None),
            EnforcementOutcome::Stopped { surface_to_operator: false } => Ok(None),
            EnforcementOutcome::Stopped { surface_to_operator: true } => {
                self.persist(
                    thread_id,
                    status_event(
                        "enforcement_escalated",
                        serde_json::json!({"repo": ctx.repo, "issue_number": ctx.issue_number}),
                    ),
                )
                .await?;
                Ok(None)
            }
            EnforcementOutcome::Advanced { directive, .. } => {
                self.persist(
                    thread_id,
                    NewEvent {
                        direction: EventDirection::Inbound,
                        actor: "enforcement".into(),
                        channel: "system".into(),
                        message_type: MessageType::Text,
                        content: serde_json::json!({"text": directive}),
                        metadata: None,
                        usage: None,
                    },
                )
                .await?;
                Ok(Some(ctx.clone()))
            }
        }
    }
}

fn status_event(event: &str, mut extra: serde_json::Value) -> NewEvent {
    if let Some(obj) = extra.as_object_mut() {
        obj.insert("event".into(), serde_json::json!(event));
    }
    NewEvent {
        direction: EventDirection::Outbound,
        actor: "gigi".into(),
        channel: "system".into(),
        message_type: MessageType::StatusChange,
        content: extra,
        metadata: None,
        usage: None,
    }
}

fn event_to_chat_message(event: &gigi_store::Event) -> ChatMessage {
    let text = event
        .content
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| event.content.to_string());
    match event.message_type {
        MessageType::Text => match event.direction {
            EventDirection::Inbound => ChatMessage::user(text),
            EventDirection::Outbound => ChatMessage::assistant(text),
        },
        MessageType::Summary => ChatMessage::system(format!("summary: {text}")),
        MessageType::ToolUse | MessageType::ToolResult | MessageType::StatusChange => {
            ChatMessage::tool(event.content.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, LlmUsage, MockLlm};
    use gigi_tools::{AllowAll, CancelHandle};

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new(Arc::new(AllowAll)))
    }

    #[tokio::test]
    async fn simple_turn_reaches_agent_done() {
        let store = Arc::new(Store::in_memory().unwrap());
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let bus = Arc::new(EventBus::new());
        let mut sub = bus.subscribe(&thread_id);
        let llm = Arc::new(MockLlm::new(vec![LlmResponse {
            content: "hello there".into(),
            tool_calls: vec![],
            usage: LlmUsage::default(),
        }]));
        let runtime = TurnRuntime::new(store.clone(), bus, registry(), llm, 100.0);
        let (_handle, cancel) = CancelHandle::new();

        runtime.run_turn(&thread_id, cancel, None).await.unwrap();

        let mut saw_done = false;
        while let Ok(Some(Ok(event))) = tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv()).await {
            if matches!(event.message, ServerMessage::AgentDone { .. }) {
                saw_done = true;
            }
        }
        assert!(saw_done);

        let thread = store.get_thread(&thread_id).await.unwrap();
        assert_eq!(thread.status, ThreadStatus::Paused);
    }

    #[tokio::test]
    async fn budget_exceeded_refuses_turn() {
        let store = Arc::new(Store::in_memory().unwrap());
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        store
            .add_usage_rollup(
                &thread_id,
                &crate::cost::period_key(gigi_store::now_ms()),
                &gigi_store::UsageTotals { cost_usd: 5.0, ..Default::default() },
            )
            .await
            .unwrap();
        let bus = Arc::new(EventBus::new());
        let llm = Arc::new(MockLlm::new(vec![]));
        let runtime = TurnRuntime::new(store, bus, registry(), llm, 1.0);
        let (_handle, cancel) = CancelHandle::new();

        let err = runtime.run_turn(&thread_id, cancel, None).await.unwrap_err();
        assert!(matches!(err, AgentError::BudgetExceeded));
    }

    #[tokio::test]
    async fn cancelled_before_start_emits_agent_stopped() {
        let store = Arc::new(Store::in_memory().unwrap());
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let bus = Arc::new(EventBus::new());
        let llm = Arc::new(MockLlm::new(vec![LlmResponse {
            content: "unused".into(),
            tool_calls: vec![],
            usage: LlmUsage::default(),
        }]));
        let runtime = TurnRuntime::new(store.clone(), bus, registry(), llm, 100.0);
        let (handle, cancel) = CancelHandle::new();
        handle.cancel();

        runtime.run_turn(&thread_id, cancel, None).await.unwrap();
        let thread = store.get_thread(&thread_id).await.unwrap();
        assert_eq!(thread.status, ThreadStatus::Paused);
    }

    #[tokio::test]
    async fn enforcement_followup_runs_another_turn() {
        let store = Arc::new(Store::in_memory().unwrap());
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let bus = Arc::new(EventBus::new());
        let llm = Arc::new(MockLlm::new(vec![
            LlmResponse { content: "working on it".into(), tool_calls: vec![], usage: LlmUsage::default() },
            LlmResponse { content: "pushed now".into(), tool_calls: vec![], usage: LlmUsage::default() },
        ]));
        let runtime = TurnRuntime::new(store.clone(), bus, registry(), llm, 100.0);
        let (_handle, cancel) = CancelHandle::new();

        let ctx = EnforcementContext {
            repo: "org/repo".into(),
            issue_number: "7".into(),
            workspace_fingerprint: Some("fp-1".into()),
            pushed: false,
        };
        runtime.run_turn(&thread_id, cancel, Some(ctx)).await.unwrap();

        let events = store.list_events(&thread_id, EventPage::default()).await.unwrap();
        let starts = events
            .iter()
            .filter(|e| e.content.get("event").and_then(|v| v.as_str()) == Some("agent_start"))
            .count();
        assert_eq!(starts, 2, "enforcement directive should trigger a second turn");
    }
}
