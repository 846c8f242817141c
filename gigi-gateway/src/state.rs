//! Shared gateway state: the full set of services a WS/REST handler needs
//! (store, bus, router, LLM client, budget, webhook secret) behind one
//! cloneable handle.

use std::sync::Arc;

use gigi_agent::LlmClient;
use gigi_eventbus::EventBus;
use gigi_router::Router;
use gigi_store::Store;
use gigi_webhook::WebhookIngester;

#[derive(Clone)]
pub struct GatewayState {
    pub store: Arc<Store>,
    pub bus: Arc<EventBus>,
    pub router: Arc<Router>,
    pub webhook: Arc<WebhookIngester>,
    pub webhook_secret: Arc<Vec<u8>>,
    /// Used by the REST fork/compact routes to summarize a prefix; the turn
    /// runtime holds its own handle to the same backend.
    pub llm: Arc<dyn LlmClient>,
    pub daily_budget_usd: f64,
}

impl GatewayState {
    pub fn new(
        store: Arc<Store>,
        bus: Arc<EventBus>,
        router: Arc<Router>,
        webhook_secret: Vec<u8>,
        llm: Arc<dyn LlmClient>,
        daily_budget_usd: f64,
    ) -> Self {
        let webhook = Arc::new(WebhookIngester::new(store.clone()));
        GatewayState {
            store,
            bus,
            router,
            webhook,
            webhook_secret: Arc::new(webhook_secret),
            llm,
            daily_budget_usd,
        }
    }
}
