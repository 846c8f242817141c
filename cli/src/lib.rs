//! Process boot for the `gigi-cli` binary (spec §1 ambient process shape):
//! load config, open the store, wire the tool registry/turn runtime/router,
//! and serve the WS+REST+webhook gateway with a bind-then-serve-until-shutdown
//! shape.

mod config;

pub use config::BootConfig;

use std::sync::Arc;

use gigi_agent::{ChatOpenAi, LlmClient, MockLlm, TurnRuntime};
use gigi_eventbus::EventBus;
use gigi_gateway::GatewayState;
use gigi_router::{Router, StandardPolicy};
use gigi_store::Store;
use gigi_tools::{AllowAll, AskUserBroker, AskUserTool, BashTool, GiteaTool, TelegramSendTool, ToolRegistry, WebFetchTool};
use tokio::net::TcpListener;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Builds the LLM backend named by `config`: a real HTTP client when
/// `OPENAI_API_KEY` is set, [`MockLlm`] (empty queue) otherwise — enough to
/// boot and exercise the gateway surface without a key.
fn build_llm(config: &BootConfig) -> Arc<dyn LlmClient> {
    match &config.openai_api_key {
        Some(key) => Arc::new(
            ChatOpenAi::with_base_url(key.clone(), config.openai_model.clone(), config.openai_base_url.clone())
                .with_pricing(config.openai_prompt_cost_per_1k, config.openai_completion_cost_per_1k),
        ),
        None => {
            tracing::warn!("OPENAI_API_KEY not set; using MockLlm with no canned responses");
            Arc::new(MockLlm::new(vec![]))
        }
    }
}

fn build_tool_registry(config: &BootConfig, store: Arc<Store>, broker: Arc<AskUserBroker>) -> ToolRegistry {
    let mut registry = ToolRegistry::new(Arc::new(AllowAll));
    registry.register(Arc::new(BashTool::new()));
    registry.register(Arc::new(WebFetchTool::new()));
    registry.register(Arc::new(AskUserTool::new(store.clone(), broker)));

    if let (Some(base_url), Some(token)) = (&config.gitea_base_url, &config.gitea_token) {
        match GiteaTool::new(base_url, token.clone(), store.clone()) {
            Ok(tool) => registry.register(Arc::new(tool)),
            Err(e) => tracing::warn!("gitea tool disabled: {e}"),
        }
    } else {
        tracing::info!("GITEA_BASE_URL/GITEA_TOKEN not set; gitea tool disabled");
    }

    if let Some(token) = &config.telegram_bot_token {
        registry.register(Arc::new(TelegramSendTool::new(token.clone(), store)));
    } else {
        tracing::info!("TELEGRAM_BOT_TOKEN not set; telegram_send tool disabled");
    }

    registry
}

/// Wires every shared service and returns the state the gateway router
/// needs. The `AskUserBroker` is not part of `GatewayState` — it's a
/// `cli`-private detail shared between `AskUserTool` (registered here) and
/// the `Router`, which needs it to cancel a parked question on `chat.stop`.
pub async fn build_state(config: &BootConfig) -> Result<GatewayState, gigi_store::StoreError> {
    let store = Arc::new(Store::new(&config.db_path)?);
    let bus = Arc::new(EventBus::new());
    let broker = Arc::new(AskUserBroker::new());
    let llm = build_llm(config);
    let tools = Arc::new(build_tool_registry(config, store.clone(), broker.clone()));
    let runtime = Arc::new(TurnRuntime::new(store.clone(), bus.clone(), tools, llm.clone(), config.daily_budget_usd));
    let router = Arc::new(Router::new(store.clone(), runtime, Box::new(StandardPolicy), broker));
    let webhook_secret = config.webhook_secret.clone().unwrap_or_default().into_bytes();
    if webhook_secret.is_empty() {
        tracing::warn!("WEBHOOK_SECRET not set; the forge webhook endpoint will reject every request");
    }
    Ok(GatewayState::new(store, bus, router, webhook_secret, llm, config.daily_budget_usd))
}

/// Binds `addr` (default [`DEFAULT_LISTEN_ADDR`]) and serves the gateway
/// router until `shutdown` resolves.
pub async fn serve(
    config: &BootConfig,
    addr: Option<&str>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_LISTEN_ADDR);
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("gigi-cli listening on http://{local_addr}");

    let state = build_state(config).await?;
    let app = gigi_gateway::router(state);
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
