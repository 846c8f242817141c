//! Durable completion-enforcement task state (spec §4.4.3, §3
//! supplement): milestones for a (thread, repo, issue) keyed task context,
//! surviving process restart.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::schema::{now_ms, Store};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementState {
    Initial,
    Changed,
    Pushed,
    PrOpened,
    Notified,
    Done,
}

impl EnforcementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementState::Initial => "initial",
            EnforcementState::Changed => "changed",
            EnforcementState::Pushed => "pushed",
            EnforcementState::PrOpened => "pr_opened",
            EnforcementState::Notified => "notified",
            EnforcementState::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "changed" => EnforcementState::Changed,
            "pushed" => EnforcementState::Pushed,
            "pr_opened" => EnforcementState::PrOpened,
            "notified" => EnforcementState::Notified,
            "done" => EnforcementState::Done,
            _ => EnforcementState::Initial,
        }
    }

    /// Next milestone in the fixed progression, or `None` if already done.
    pub fn next(&self) -> Option<EnforcementState> {
        match self {
            EnforcementState::Initial => Some(EnforcementState::Changed),
            EnforcementState::Changed => Some(EnforcementState::Pushed),
            EnforcementState::Pushed => Some(EnforcementState::PrOpened),
            EnforcementState::PrOpened => Some(EnforcementState::Notified),
            EnforcementState::Notified => Some(EnforcementState::Done),
            EnforcementState::Done => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnforcementTask {
    pub thread_id: String,
    pub repo: String,
    pub issue_number: String,
    pub state: EnforcementState,
    pub workspace_fingerprint: Option<String>,
    pub cycle_count: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Store {
    pub async fn upsert_enforcement_task(
        &self,
        thread_id: &str,
        repo: &str,
        issue_number: &str,
        state: EnforcementState,
        workspace_fingerprint: Option<&str>,
    ) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let repo = repo.to_string();
        let issue_number = issue_number.to_string();
        let workspace_fingerprint = workspace_fingerprint.map(|s| s.to_string());
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let now = now_ms();
            let existing_cycles: Option<i64> = conn
                .query_row(
                    "SELECT cycle_count FROM enforcement_tasks WHERE thread_id = ?1 AND repo = ?2 AND issue_number = ?3",
                    params![thread_id, repo, issue_number],
                    |r| r.get(0),
                )
                .optional()?;
            match existing_cycles {
                Some(cycles) => {
                    conn.execute(
                        "UPDATE enforcement_tasks SET state = ?1, workspace_fingerprint = ?2, \
                         cycle_count = ?3, updated_at = ?4 \
                         WHERE thread_id = ?5 AND repo = ?6 AND issue_number = ?7",
                        params![state.as_str(), workspace_fingerprint, cycles + 1, now, thread_id, repo, issue_number],
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO enforcement_tasks (thread_id, repo, issue_number, state, \
                         workspace_fingerprint, cycle_count, created_at, updated_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                        params![thread_id, repo, issue_number, state.as_str(), workspace_fingerprint, now],
                    )?;
                }
            }
            Ok(())
        })
    }

    pub async fn get_enforcement_task(
        &self,
        thread_id: &str,
        repo: &str,
        issue_number: &str,
    ) -> Result<Option<EnforcementTask>, StoreError> {
        let thread_id = thread_id.to_string();
        let repo = repo.to_string();
        let issue_number = issue_number.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            conn.query_row(
                "SELECT * FROM enforcement_tasks WHERE thread_id = ?1 AND repo = ?2 AND issue_number = ?3",
                params![thread_id, repo, issue_number],
                |r| {
                    let state: String = r.get("state")?;
                    Ok(EnforcementTask {
                        thread_id: r.get("thread_id")?,
                        repo: r.get("repo")?,
                        issue_number: r.get("issue_number")?,
                        state: EnforcementState::parse(&state),
                        workspace_fingerprint: r.get("workspace_fingerprint")?,
                        cycle_count: r.get("cycle_count")?,
                        created_at_ms: r.get("created_at")?,
                        updated_at_ms: r.get("updated_at")?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
    }
}
