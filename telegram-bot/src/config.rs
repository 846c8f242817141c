//! Boot-time configuration, read from the environment.
//! Reads: `TELEGRAM_BOT_TOKEN` (required), `DB_PATH`, `DAILY_BUDGET_USD`,
//! `OPENAI_API_KEY`, `OPENAI_MODEL`, `OPENAI_BASE_URL`,
//! `OPENAI_PROMPT_COST_PER_1K`, `OPENAI_COMPLETION_COST_PER_1K`,
//! `GITEA_BASE_URL`, `GITEA_TOKEN`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TELEGRAM_BOT_TOKEN must be set")]
    MissingToken,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub telegram_bot_token: String,
    pub db_path: String,
    pub daily_budget_usd: f64,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_prompt_cost_per_1k: f64,
    pub openai_completion_cost_per_1k: f64,
    pub gitea_base_url: Option<String>,
    pub gitea_token: Option<String>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").map_err(|_| ConfigError::MissingToken)?,
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "gigi.db".to_string()),
            daily_budget_usd: env_f64("DAILY_BUDGET_USD").unwrap_or(5.0),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_base_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_prompt_cost_per_1k: env_f64("OPENAI_PROMPT_COST_PER_1K").unwrap_or(0.0),
            openai_completion_cost_per_1k: env_f64("OPENAI_COMPLETION_COST_PER_1K").unwrap_or(0.0),
            gitea_base_url: std::env::var("GITEA_BASE_URL").ok(),
            gitea_token: std::env::var("GITEA_TOKEN").ok(),
        })
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_an_error() {
        std::env::remove_var("TELEGRAM_BOT_TOKEN");
        assert!(matches!(BotConfig::from_env(), Err(ConfigError::MissingToken)));
    }

    #[test]
    fn defaults_apply_when_optional_env_unset() {
        std::env::set_var("TELEGRAM_BOT_TOKEN", "test-token");
        std::env::remove_var("DB_PATH");
        std::env::remove_var("DAILY_BUDGET_USD");
        let config = BotConfig::from_env().unwrap();
        assert_eq!(config.db_path, "gigi.db");
        assert_eq!(config.daily_budget_usd, 5.0);
        std::env::remove_var("TELEGRAM_BOT_TOKEN");
    }
}
