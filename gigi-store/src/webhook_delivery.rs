//! Webhook delivery-id dedup (spec §6.4: "409 on duplicate delivery id
//! (idempotent)"), distinct from the content-hash echo dedup in
//! `action_log`: this tracks the forge's own redelivery identifier, not
//! whether the payload matches something this process wrote.

use rusqlite::params;

use crate::error::StoreError;
use crate::schema::{now_ms, Store};

impl Store {
    /// Records `delivery_id` as seen. Returns `true` the first time a given
    /// id is recorded, `false` if it was already present (a redelivery).
    pub async fn record_webhook_delivery(&self, delivery_id: &str) -> Result<bool, StoreError> {
        let delivery_id = delivery_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO webhook_deliveries (delivery_id, received_at) VALUES (?1, ?2)",
                params![delivery_id, now_ms()],
            )?;
            Ok(inserted > 0)
        })
    }
}
