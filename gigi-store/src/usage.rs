//! Usage rollups and budget checks (spec §4.4.4, §6.3 `/api/usage/*`).

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::UsageTotals;
use crate::schema::Store;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyUsage {
    pub period: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cache_tokens: i64,
    pub cost_usd: f64,
}

impl Store {
    /// Adds a usage delta to the per-thread, per-day rollup (the `period`
    /// key is the caller-supplied day string, e.g. `"2026-07-26"`, derived
    /// on write so `usage/stats` queries stay O(1)).
    pub async fn add_usage_rollup(
        &self,
        thread_id: &str,
        period: &str,
        delta: &UsageTotals,
    ) -> Result<(), StoreError> {
        let thread_id = thread_id.to_string();
        let period = period.to_string();
        let delta = delta.clone();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            conn.execute(
                "INSERT INTO usage_rollups (thread_id, period, prompt_tokens, completion_tokens, cache_tokens, cost_usd) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(thread_id, period) DO UPDATE SET \
                   prompt_tokens = prompt_tokens + excluded.prompt_tokens, \
                   completion_tokens = completion_tokens + excluded.completion_tokens, \
                   cache_tokens = cache_tokens + excluded.cache_tokens, \
                   cost_usd = cost_usd + excluded.cost_usd",
                params![
                    thread_id,
                    period,
                    delta.prompt_tokens,
                    delta.completion_tokens,
                    delta.cache_tokens,
                    delta.cost_usd
                ],
            )?;
            Ok(())
        })
    }

    /// Sum of cost across all rollups for `period` (used for budget checks).
    pub async fn cost_for_period(&self, period: &str) -> Result<f64, StoreError> {
        let period = period.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let total: Option<f64> = conn
                .query_row(
                    "SELECT SUM(cost_usd) FROM usage_rollups WHERE period = ?1",
                    params![period],
                    |r| r.get(0),
                )
                .optional()?
                .flatten();
            Ok(total.unwrap_or(0.0))
        })
    }

    pub async fn usage_stats(&self, days: i64) -> Result<Vec<DailyUsage>, StoreError> {
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("poisoned lock".into()))?;
            let mut stmt = conn.prepare(
                "SELECT period, SUM(prompt_tokens), SUM(completion_tokens), SUM(cache_tokens), SUM(cost_usd) \
                 FROM usage_rollups GROUP BY period ORDER BY period DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![days], |r| {
                Ok(DailyUsage {
                    period: r.get(0)?,
                    prompt_tokens: r.get(1)?,
                    completion_tokens: r.get(2)?,
                    cache_tokens: r.get(3)?,
                    cost_usd: r.get(4)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}
