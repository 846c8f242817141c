//! Process-wide configuration key/value store (spec §3, §4.1): credentials,
//! webhook secret, budget ceiling, chat id. Values are opaque strings;
//! callers encrypt secrets before storing them here.

use rusqlite::{params, OptionalExtension};

use crate::error::StoreError;
use crate::schema::Store;

impl Store {
    pub async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            conn.query_row("SELECT value FROM config WHERE key = ?1", params![key], |r| r.get(0))
                .optional()
                .map_err(StoreError::from)
        })
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            conn.execute(
                "INSERT INTO config (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
    }
}
