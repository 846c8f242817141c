//! Telegram chat channel binary (spec §1 ambient process shape): a separate
//! process from `gigi-cli`, sharing the same `gigi-*` core. Ingests each
//! incoming message as an [`InboundIntent`], routes it the same way the
//! gateway's `chat.send` does, and relays the turn's text chunks back as a
//! Telegram reply.

mod config;

use std::sync::Arc;

use config::BotConfig;
use gigi_agent::{ChatOpenAi, LlmClient, MockLlm, TurnRuntime};
use gigi_eventbus::EventBus;
use gigi_protocol::ServerMessage;
use gigi_router::{InboundIntent, Router, StandardPolicy};
use gigi_store::Store;
use gigi_tools::{AllowAll, AskUserBroker, AskUserTool, BashTool, GiteaTool, ToolRegistry, WebFetchTool};
use teloxide::prelude::*;

fn build_llm(config: &BotConfig) -> Arc<dyn LlmClient> {
    if let Some(key) = &config.openai_api_key {
        Arc::new(
            ChatOpenAi::with_base_url(key.clone(), config.openai_model.clone(), config.openai_base_url.clone())
                .with_pricing(config.openai_prompt_cost_per_1k, config.openai_completion_cost_per_1k),
        )
    } else {
        tracing::warn!("OPENAI_API_KEY not set; using MockLlm with no canned responses");
        Arc::new(MockLlm::new(vec![]))
    }
}

fn build_tool_registry(config: &BotConfig, store: Arc<Store>, broker: Arc<AskUserBroker>) -> ToolRegistry {
    let mut registry = ToolRegistry::new(Arc::new(AllowAll));
    registry.register(Arc::new(BashTool::new()));
    registry.register(Arc::new(WebFetchTool::new()));
    registry.register(Arc::new(AskUserTool::new(store.clone(), broker)));
    if let (Some(base_url), Some(token)) = (&config.gitea_base_url, &config.gitea_token) {
        match GiteaTool::new(base_url, token.clone(), store) {
            Ok(tool) => registry.register(Arc::new(tool)),
            Err(e) => tracing::warn!("gitea tool disabled: {e}"),
        }
    }
    registry
}

/// Key under which this chat's thread id is persisted in `gigi_store`'s
/// opaque config table, so a returning chat resumes its own conversation.
fn thread_mapping_key(chat_id: i64) -> String {
    format!("telegram_thread:{chat_id}")
}

async fn handle_message(bot: Bot, msg: Message, store: Arc<Store>, bus: Arc<EventBus>, router: Arc<Router>) {
    let Some(text) = msg.text() else { return };
    let chat_id = msg.chat.id.0;
    let mapping_key = thread_mapping_key(chat_id);

    let existing_thread = match store.get_config(&mapping_key).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("failed to look up thread mapping: {e}");
            None
        }
    };

    // Subscribe before routing: a brand-new thread's id isn't known until
    // `route` returns, and the turn it spawns can publish before we'd be
    // able to subscribe on that id. Filtering the global stream below
    // avoids the race.
    let mut subscription = bus.subscribe_global();

    let intent = InboundIntent::text("telegram", format!("telegram:{chat_id}"), existing_thread, text);
    let (thread_id, _outcome) = match router.route(intent).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("route error: {e}");
            return;
        }
    };
    if let Err(e) = store.set_config(&mapping_key, &thread_id).await {
        tracing::warn!("failed to persist thread mapping: {e}");
    }

    let mut reply = String::new();
    loop {
        match subscription.recv().await {
            Some(Ok(event)) if event.thread_id == thread_id => match event.message {
                ServerMessage::TextChunk { content } => reply.push_str(&content),
                ServerMessage::AgentDone { .. } | ServerMessage::AgentError { .. } | ServerMessage::AgentStopped => break,
                _ => {}
            },
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => break,
        }
    }

    if !reply.is_empty() {
        if let Err(e) = bot.send_message(msg.chat.id, reply).await {
            tracing::warn!("failed to send telegram reply: {e}");
        }
    }
}

#[tokio::main]
async fn main() {
    gigi_config::load_and_apply("gigi", None::<&std::path::Path>).ok();
    let _tracing_guard =
        gigi_config::init_tracing("telegram-bot", std::path::Path::new("logs")).expect("tracing init");

    let config = BotConfig::from_env().expect("invalid configuration");
    let store = Arc::new(Store::new(&config.db_path).expect("open store"));
    let bus = Arc::new(EventBus::new());
    let broker = Arc::new(AskUserBroker::new());
    let llm = build_llm(&config);
    let tools = Arc::new(build_tool_registry(&config, store.clone(), broker.clone()));
    let runtime = Arc::new(TurnRuntime::new(store.clone(), bus.clone(), tools, llm, config.daily_budget_usd));
    let router = Arc::new(Router::new(store.clone(), runtime, Box::new(StandardPolicy), broker));

    let bot = Bot::new(config.telegram_bot_token.clone());
    tracing::info!("telegram-bot starting long-poll loop");

    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let store = store.clone();
        let bus = bus.clone();
        let router = router.clone();
        async move {
            handle_message(bot, msg, store, bus, router).await;
            respond(())
        }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_mapping_key_is_stable_per_chat() {
        assert_eq!(thread_mapping_key(42), "telegram_thread:42");
        assert_ne!(thread_mapping_key(42), thread_mapping_key(43));
    }
}
