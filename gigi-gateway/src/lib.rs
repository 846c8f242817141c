//! Protocol gateway (spec §4.7, §6): merges the WebSocket surface, the REST
//! CRUD surface, and the forge webhook endpoint into one `axum::Router`.

mod rest;
mod state;
mod webhook;
mod ws;

pub use rest::ApiError;
pub use state::GatewayState;
pub use webhook::webhook_router;
pub use ws::ws_router;

use axum::Router;

pub fn router(state: GatewayState) -> Router {
    ws_router(state.clone())
        .merge(rest::rest_router(state.clone()))
        .merge(webhook_router(state))
}
