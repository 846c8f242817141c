//! Cost metering and budget enforcement (spec §4.4.4).

use std::sync::Arc;

use gigi_store::{Store, StoreError, UsageTotals};

use crate::llm::LlmUsage;

/// Period key derivation is intentionally a pure function of a caller-
/// supplied day string rather than `chrono::Utc::now()`, so tests (and the
/// runtime, which receives `now_ms` from `gigi_store::now_ms()`) can pin it.
pub fn period_key(now_ms: i64) -> String {
    let days_since_epoch = now_ms.div_euclid(86_400_000);
    let days = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap()
        .checked_add_signed(chrono::Duration::days(days_since_epoch))
        .unwrap();
    days.format("%Y-%m-%d").to_string()
}

pub struct CostMeter {
    store: Arc<Store>,
    daily_budget_usd: f64,
}

impl CostMeter {
    pub fn new(store: Arc<Store>, daily_budget_usd: f64) -> Self {
        Self { store, daily_budget_usd }
    }

    /// Refuses a new turn if the configured period's cost already exceeds
    /// budget; already-running turns are unaffected (checked only before a
    /// turn starts, per §4.4.4).
    pub async fn check_budget(&self, now_ms: i64) -> Result<(), StoreError> {
        let spent = self.store.cost_for_period(&period_key(now_ms)).await?;
        if spent >= self.daily_budget_usd {
            return Err(StoreError::InvariantError(format!(
                "budget exceeded: {spent:.4} >= {:.4}",
                self.daily_budget_usd
            )));
        }
        Ok(())
    }

    /// Attaches usage to the thread aggregate and the period rollup
    /// (spec §4.4.4 (a)/(b)/(c) minus the per-event attach, done by the
    /// caller when it persists the assistant event).
    pub async fn record(&self, thread_id: &str, now_ms: i64, usage: &LlmUsage) -> Result<(), StoreError> {
        let delta = UsageTotals {
            prompt_tokens: usage.prompt_tokens as i64,
            completion_tokens: usage.completion_tokens as i64,
            cache_tokens: (usage.cache_read_tokens + usage.cache_write_tokens) as i64,
            cost_usd: usage.cost_usd,
            duration_ms: 0,
        };
        self.store.add_usage(thread_id, &delta).await?;
        self.store.add_usage_rollup(thread_id, &period_key(now_ms), &delta).await?;
        Ok(())
    }
}
