//! Reference operations (spec §4.1, §3): links from a thread to an external
//! forge artifact.

use rusqlite::{params, OptionalExtension};

use crate::error::StoreError;
use crate::model::{RefStatus, RefType, Reference};
use crate::schema::{now_ms, Store};

fn row_to_reference(row: &rusqlite::Row) -> rusqlite::Result<Reference> {
    let ref_type: String = row.get("ref_type")?;
    let status: String = row.get("status")?;
    Ok(Reference {
        id: row.get("id")?,
        thread_id: row.get("thread_id")?,
        ref_type: RefType::parse(&ref_type).unwrap_or(RefType::Issue),
        repo: row.get("repo")?,
        number: row.get("number")?,
        status: RefStatus::parse(&status).unwrap_or(RefStatus::Unknown),
        url: row.get("url")?,
        created_at_ms: row.get("created_at")?,
    })
}

impl Store {
    /// Upserts `(thread, ref_type, repo, number)`; updates `status`/`url` if
    /// the tuple already exists (spec §3 uniqueness invariant).
    pub async fn upsert_reference(
        &self,
        thread_id: &str,
        ref_type: RefType,
        repo: &str,
        number: &str,
        status: RefStatus,
        url: Option<&str>,
    ) -> Result<String, StoreError> {
        let thread_id = thread_id.to_string();
        let repo = repo.to_string();
        let number = number.to_string();
        let url = url.map(|s| s.to_string());
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM references_ WHERE thread_id = ?1 AND ref_type = ?2 AND repo = ?3 AND number = ?4",
                    params![thread_id, ref_type.as_str(), repo, number],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                conn.execute(
                    "UPDATE references_ SET status = ?1, url = ?2 WHERE id = ?3",
                    params![status.as_str(), url, id],
                )?;
                Ok(id)
            } else {
                let id = uuid::Uuid::new_v4().to_string();
                conn.execute(
                    "INSERT INTO references_ (id, thread_id, ref_type, repo, number, status, url, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![id, thread_id, ref_type.as_str(), repo, number, status.as_str(), url, now_ms()],
                )?;
                Ok(id)
            }
        })
    }

    pub async fn list_references_by_thread(&self, thread_id: &str) -> Result<Vec<Reference>, StoreError> {
        let thread_id = thread_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let mut stmt = conn.prepare("SELECT * FROM references_ WHERE thread_id = ?1 ORDER BY created_at ASC")?;
            let rows = stmt.query_map(params![thread_id], row_to_reference)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    /// Finds the thread bound to `(repo, ref_type, number)`, if any (spec
    /// §4.1: "find thread by reference").
    pub async fn find_thread_by_reference(
        &self,
        repo: &str,
        ref_type: RefType,
        number: &str,
    ) -> Result<Option<String>, StoreError> {
        let repo = repo.to_string();
        let number = number.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            conn.query_row(
                "SELECT thread_id FROM references_ WHERE repo = ?1 AND ref_type = ?2 AND number = ?3",
                params![repo, ref_type.as_str(), number],
                |r| r.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
    }
}
