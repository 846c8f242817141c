//! Durable `ask_user` park state (spec §3 supplement), so a crash
//! mid-park doesn't orphan the tool_use waiting on an answer.

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::schema::{now_ms, Store};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingQuestionStatus {
    Pending,
    Answered,
    TimedOut,
    Cancelled,
}

impl PendingQuestionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            PendingQuestionStatus::Pending => "pending",
            PendingQuestionStatus::Answered => "answered",
            PendingQuestionStatus::TimedOut => "timed_out",
            PendingQuestionStatus::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "answered" => PendingQuestionStatus::Answered,
            "timed_out" => PendingQuestionStatus::TimedOut,
            "cancelled" => PendingQuestionStatus::Cancelled,
            _ => PendingQuestionStatus::Pending,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub thread_id: String,
    pub tool_use_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub asked_at_ms: i64,
    pub status: PendingQuestionStatus,
}

impl Store {
    pub async fn park_question(
        &self,
        thread_id: &str,
        tool_use_id: &str,
        question: &str,
        options: Vec<String>,
    ) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let tool_use_id = tool_use_id.to_string();
        let question = question.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let options_json = serde_json::to_string(&options).unwrap();
            conn.execute(
                "INSERT INTO pending_questions (thread_id, tool_use_id, question, options_json, asked_at, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                params![thread_id, tool_use_id, question, options_json, now_ms()],
            )?;
            Ok(())
        })
    }

    pub async fn resolve_question(
        &self,
        thread_id: &str,
        tool_use_id: &str,
        status: PendingQuestionStatus,
    ) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let tool_use_id = tool_use_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            conn.execute(
                "UPDATE pending_questions SET status = ?1 WHERE thread_id = ?2 AND tool_use_id = ?3",
                params![status.as_str(), thread_id, tool_use_id],
            )?;
            Ok(())
        })
    }

    pub async fn list_pending_questions(&self, thread_id: &str) -> Result<Vec<PendingQuestion>, StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let mut stmt = conn.prepare(
                "SELECT thread_id, tool_use_id, question, options_json, asked_at, status \
                 FROM pending_questions WHERE thread_id = ?1 AND status = 'pending'",
            )?;
            let rows = stmt.query_map(params![thread_id], |r| {
                let options_json: String = r.get(3)?;
                let status: String = r.get(5)?;
                Ok(PendingQuestion {
                    thread_id: r.get(0)?,
                    tool_use_id: r.get(1)?,
                    question: r.get(2)?,
                    options: serde_json::from_str(&options_json).unwrap_or_default(),
                    asked_at_ms: r.get(4)?,
                    status: PendingQuestionStatus::parse(&status),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}
