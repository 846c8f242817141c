//! Completion enforcement (spec §4.4.3): drives a task context through
//! `initial → changed → pushed → pr_opened → notified → done` by observing
//! action-log evidence, injecting a synthetic inbound event when milestones
//! lag behind the workspace delta.

use std::sync::Arc;

use gigi_store::{EnforcementState, Store, StoreError};

/// Hard cap on enforcement cycles per task (spec §4.4.3 livelock guard).
pub const MAX_CYCLES: i64 = 8;

/// Tasks idle longer than this are surfaced to the operator rather than
/// auto-advanced further (spec §4.4.3).
pub const STALE_AFTER_MS: i64 = 60 * 60 * 1000;

/// Evidence the runtime has already gathered this turn; kept separate from
/// `EnforcementEngine` so the engine doesn't need to know how "pushed"
/// is detected (a bash `git push`, a CI webhook, ...).
pub struct EnforcementEvidence {
    pub workspace_fingerprint: Option<String>,
    pub pushed: bool,
}

pub enum EnforcementOutcome {
    /// No milestone advanced; nothing to inject.
    Unchanged,
    /// Milestone advanced to `next`; the caller should inject a synthetic
    /// inbound event describing what's still missing and start a new turn.
    Advanced { next: EnforcementState, directive: String },
    /// Already done, or cycle cap / staleness reached; caller should not
    /// inject anything further (and should surface to the operator if
    /// `surface_to_operator` is set).
    Stopped { surface_to_operator: bool },
}

pub struct EnforcementEngine {
    store: Arc<Store>,
}

impl EnforcementEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Advances the task context for `(thread_id, repo, issue_number)` by at
    /// most one milestone (spec §4.4.3: "at most one enforcement injection
    /// per turn").
    pub async fn advance(
        &self,
        thread_id: &str,
        repo: &str,
        issue_number: &str,
        evidence: &EnforcementEvidence,
        now_ms: i64,
    ) -> Result<EnforcementOutcome, StoreError> {
        let task = self.store.get_enforcement_task(thread_id, repo, issue_number).await?;

        if let Some(task) = &task {
            if task.state == EnforcementState::Done {
                return Ok(EnforcementOutcome::Stopped { surface_to_operator: false });
            }
            if task.cycle_count >= MAX_CYCLES {
                return Ok(EnforcementOutcome::Stopped { surface_to_operator: true });
            }
            if now_ms - task.created_at_ms > STALE_AFTER_MS {
                return Ok(EnforcementOutcome::Stopped { surface_to_operator: true });
            }
        }

        let current = task.as_ref().map(|t| t.state).unwrap_or(EnforcementState::Initial);
        let prior_fingerprint = task.as_ref().and_then(|t| t.workspace_fingerprint.clone());

        let detected = self
            .detect(current, repo, thread_id, evidence, prior_fingerprint.as_deref(), now_ms)
            .await?;

        match detected {
            None => Ok(EnforcementOutcome::Unchanged),
            Some(next) => {
                self.store
                    .upsert_enforcement_task(
                        thread_id,
                        repo,
                        issue_number,
                        next,
                        evidence.workspace_fingerprint.as_deref(),
                    )
                    .await?;
                Ok(EnforcementOutcome::Advanced { next, directive: directive_for(next) })
            }
        }
    }

    async fn detect(
        &self,
        current: EnforcementState,
        repo: &str,
        thread_id: &str,
        evidence: &EnforcementEvidence,
        prior_fingerprint: Option<&str>,
        now_ms: i64,
    ) -> Result<Option<EnforcementState>, StoreError> {
        match current {
            EnforcementState::Initial => {
                let changed = evidence.workspace_fingerprint.as_deref() != prior_fingerprint
                    && evidence.workspace_fingerprint.is_some();
                Ok(changed.then_some(EnforcementState::Changed))
            }
            EnforcementState::Changed => Ok(evidence.pushed.then_some(EnforcementState::Pushed)),
            EnforcementState::Pushed => {
                let opened = self.store.has_action_since(thread_id, repo, "gitea.create_pr", now_ms - STALE_AFTER_MS).await?;
                Ok(opened.then_some(EnforcementState::PrOpened))
            }
            EnforcementState::PrOpened => {
                let notified = self.store.has_action_since(thread_id, repo, "telegram.send", now_ms - STALE_AFTER_MS).await?;
                Ok(notified.then_some(EnforcementState::Notified))
            }
            EnforcementState::Notified => Ok(Some(EnforcementState::Done)),
            EnforcementState::Done => Ok(None),
        }
    }
}

fn directive_for(state: EnforcementState) -> String {
    match state {
        EnforcementState::Changed => "You changed code; now push a branch.".into(),
        EnforcementState::Pushed => "You pushed a branch; now open a PR.".into(),
        EnforcementState::PrOpened => "You opened a PR; now notify the operator.".into(),
        EnforcementState::Notified => "Operator notified; wrapping up.".into(),
        EnforcementState::Done | EnforcementState::Initial => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn advances_one_milestone_per_call() {
        let store = Arc::new(Store::in_memory().unwrap());
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        let engine = EnforcementEngine::new(store.clone());
        let now = gigi_store::now_ms();

        let evidence = EnforcementEvidence { workspace_fingerprint: Some("fp-1".into()), pushed: false };
        let outcome = engine.advance(&thread_id, "org/repo", "42", &evidence, now).await.unwrap();
        assert!(matches!(outcome, EnforcementOutcome::Advanced { next: EnforcementState::Changed, .. }));

        // Same fingerprint again: no further advance from `changed` without a push.
        let outcome = engine.advance(&thread_id, "org/repo", "42", &evidence, now).await.unwrap();
        assert!(matches!(outcome, EnforcementOutcome::Unchanged));

        let pushed = EnforcementEvidence { workspace_fingerprint: Some("fp-1".into()), pushed: true };
        let outcome = engine.advance(&thread_id, "org/repo", "42", &pushed, now).await.unwrap();
        assert!(matches!(outcome, EnforcementOutcome::Advanced { next: EnforcementState::Pushed, .. }));
    }

    #[tokio::test]
    async fn stops_once_done() {
        let store = Arc::new(Store::in_memory().unwrap());
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        store
            .upsert_enforcement_task(&thread_id, "org/repo", "42", EnforcementState::Done, None)
            .await
            .unwrap();
        let engine = EnforcementEngine::new(store);
        let evidence = EnforcementEvidence { workspace_fingerprint: None, pushed: false };
        let outcome = engine.advance(&thread_id, "org/repo", "42", &evidence, gigi_store::now_ms()).await.unwrap();
        assert!(matches!(outcome, EnforcementOutcome::Stopped { surface_to_operator: false }));
    }

    #[tokio::test]
    async fn stops_at_cycle_cap() {
        let store = Arc::new(Store::in_memory().unwrap());
        let thread_id = store.create_thread("web", "t", None, None).await.unwrap();
        for _ in 0..MAX_CYCLES {
            store
                .upsert_enforcement_task(&thread_id, "org/repo", "42", EnforcementState::Changed, None)
                .await
                .unwrap();
        }
        let engine = EnforcementEngine::new(store);
        let evidence = EnforcementEvidence { workspace_fingerprint: Some("fp".into()), pushed: true };
        let outcome = engine.advance(&thread_id, "org/repo", "42", &evidence, gigi_store::now_ms()).await.unwrap();
        assert!(matches!(outcome, EnforcementOutcome::Stopped { surface_to_operator: true }));
    }
}
