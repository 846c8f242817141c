//! Router dispatch (spec §2: "Router and channel fan-out... turns incoming
//! messages from heterogeneous sources into a single linearized sequence per
//! thread"). Grounded on `serve/src/run/mod.rs`'s `handle_run`/`prepare_run`
//! shape: prepare (resolve thread, append the message) then spawn the agent
//! task and return immediately, rather than blocking the caller on the full
//! turn.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::warn;

use gigi_agent::TurnRuntime;
use gigi_store::{EventDirection, MessageType, NewEvent, PendingQuestionStatus, Store, StoreError, ThreadStatus};
use gigi_tools::{AskUserBroker, CancelHandle, CancelToken};

use crate::intent::InboundIntent;
use crate::policy::ChannelPolicy;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Why a turn did not start, for callers that want to surface a reason
/// (e.g. the gateway answering a `chat.send` with no stream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoRunReason {
    ThreadNotRunnable(ThreadStatus),
    ChannelPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A turn was spawned in the background.
    Running,
    /// The event was appended but no turn was started.
    NoRun(NoRunReason),
}

/// Normalizes inbound intents, binds them to a thread, and decides whether
/// to run the agent (spec §2 Router, 10% share). Holds one cancel handle per
/// in-flight turn so `stop` can cancel cooperatively (spec §9 open question
/// #4: `chat.stop` during an `ask_user` park cancels the turn).
pub struct Router {
    store: Arc<Store>,
    runtime: Arc<TurnRuntime>,
    policy: Box<dyn ChannelPolicy>,
    active: Arc<DashMap<String, CancelHandle>>,
    ask_user_broker: Arc<AskUserBroker>,
}

impl Router {
    pub fn new(store: Arc<Store>, runtime: Arc<TurnRuntime>, policy: Box<dyn ChannelPolicy>, ask_user_broker: Arc<AskUserBroker>) -> Self {
        Router {
            store,
            runtime,
            policy,
            active: Arc::new(DashMap::new()),
            ask_user_broker,
        }
    }

    /// Resolves the target thread (creating one if the intent carries none),
    /// appends the normalized event, and — if the thread is runnable and the
    /// channel policy agrees — spawns a turn. Returns as soon as dispatch
    /// decisions are made; does not wait for the turn to finish.
    pub async fn route(&self, intent: InboundIntent) -> Result<(String, RouteOutcome), RouterError> {
        let thread_id = match intent.thread_id {
            Some(id) => id,
            None => {
                self.store
                    .create_thread(
                        &intent.channel,
                        intent.new_topic.as_deref().unwrap_or("New conversation"),
                        None,
                        None,
                    )
                    .await?
            }
        };

        self.store
            .append_event(
                &thread_id,
                NewEvent {
                    direction: EventDirection::Inbound,
                    actor: intent.actor,
                    channel: intent.channel.clone(),
                    message_type: MessageType::Text,
                    content: intent.content,
                    metadata: None,
                    usage: None,
                },
            )
            .await?;

        let thread = self.store.get_thread(&thread_id).await?;
        if !matches!(thread.status, ThreadStatus::Active | ThreadStatus::Paused) {
            return Ok((thread_id, RouteOutcome::NoRun(NoRunReason::ThreadNotRunnable(thread.status))));
        }
        if !self.policy.should_run_agent(&intent.channel) {
            return Ok((thread_id, RouteOutcome::NoRun(NoRunReason::ChannelPolicy)));
        }

        let (handle, token) = CancelHandle::new();
        self.active.insert(thread_id.clone(), handle);
        self.spawn_turn(thread_id.clone(), token);
        Ok((thread_id, RouteOutcome::Running))
    }

    fn spawn_turn(&self, thread_id: String, cancel: CancelToken) {
        let runtime = self.runtime.clone();
        let active = self.active.clone();
        let id_for_cleanup = thread_id.clone();
        tokio::spawn(async move {
            if let Err(err) = runtime.run_turn(&thread_id, cancel, None).await {
                warn!(thread_id = %thread_id, error = %err, "turn ended with an error");
            }
            active.remove(&id_for_cleanup);
        });
    }

    /// Cancels the in-flight turn for `thread_id`, if any, and directly
    /// cancels any `ask_user` park on that thread (spec §9 open question #4).
    /// Flipping the turn's `CancelToken` alone is not enough: `ToolRegistry::
    /// invoke`'s `select!` drops the losing `call` future as soon as
    /// cancellation is observed, so `AskUserTool::call`'s own cleanup branch
    /// never runs. Resolving the pending question here, before the tool
    /// future is dropped, is the only thing that actually clears it.
    pub async fn stop(&self, thread_id: &str) -> bool {
        let was_running = match self.active.remove(thread_id) {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        };
        if let Ok(pending) = self.store.list_pending_questions(thread_id).await {
            for question in pending {
                self.ask_user_broker.cancel(&question.tool_use_id);
                let _ = self
                    .store
                    .resolve_question(thread_id, &question.tool_use_id, PendingQuestionStatus::Cancelled)
                    .await;
            }
        }
        was_running
    }

    pub fn is_running(&self, thread_id: &str) -> bool {
        self.active.contains_key(thread_id)
    }
}
