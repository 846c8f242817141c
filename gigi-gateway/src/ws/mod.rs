//! WebSocket surface (spec §4.7, §6.1/§6.2): an upgrade handler plus a
//! reader task and an independent writer task, so outbound stream segments
//! (agent_start/text_chunk/...) can be forwarded concurrently with reading
//! further client messages (spec §5: "Event bus subscriber send" is its own
//! suspension point, separate from client recv).

mod connection;
mod dispatch;
mod keepalive;

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Router,
};

use crate::state::GatewayState;

pub fn ws_router(state: GatewayState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, state))
}
