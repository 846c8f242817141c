//! Boot-time configuration, read from the environment after
//! `gigi_config::load_and_apply` has applied `.env`/XDG overrides. No
//! variable is required; unset ones fall back to a dev-friendly default or
//! disable the feature they gate.

/// Reads: `DB_PATH`, `LISTEN_ADDR`, `DAILY_BUDGET_USD`, `WEBHOOK_SECRET`,
/// `OPENAI_API_KEY`, `OPENAI_MODEL`, `OPENAI_BASE_URL`,
/// `OPENAI_PROMPT_COST_PER_1K`, `OPENAI_COMPLETION_COST_PER_1K`,
/// `GITEA_BASE_URL`, `GITEA_TOKEN`, `TELEGRAM_BOT_TOKEN`.
#[derive(Clone, Debug)]
pub struct BootConfig {
    /// SQLite database path. Defaults to `"gigi.db"`.
    pub db_path: String,
    /// Daily cost budget in USD, enforced per spec §4.4.4. Defaults to 5.0.
    pub daily_budget_usd: f64,
    /// HMAC secret for the forge webhook endpoint. `None` disables it.
    pub webhook_secret: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_prompt_cost_per_1k: f64,
    pub openai_completion_cost_per_1k: f64,
    pub gitea_base_url: Option<String>,
    pub gitea_token: Option<String>,
    pub telegram_bot_token: Option<String>,
}

impl BootConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "gigi.db".to_string()),
            daily_budget_usd: env_f64("DAILY_BUDGET_USD").unwrap_or(5.0),
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_base_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_prompt_cost_per_1k: env_f64("OPENAI_PROMPT_COST_PER_1K").unwrap_or(0.0),
            openai_completion_cost_per_1k: env_f64("OPENAI_COMPLETION_COST_PER_1K").unwrap_or(0.0),
            gitea_base_url: std::env::var("GITEA_BASE_URL").ok(),
            gitea_token: std::env::var("GITEA_TOKEN").ok(),
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        for key in ["DB_PATH", "DAILY_BUDGET_USD", "OPENAI_MODEL", "OPENAI_BASE_URL"] {
            std::env::remove_var(key);
        }
        let config = BootConfig::from_env();
        assert_eq!(config.db_path, "gigi.db");
        assert_eq!(config.daily_budget_usd, 5.0);
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
    }
}
