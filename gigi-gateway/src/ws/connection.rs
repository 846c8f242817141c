//! WebSocket connection lifecycle: three concurrent pieces — a reader that
//! dispatches `ClientMessage`s, a writer that owns the socket's send half
//! and injects envelopes, and a keep-alive timer. All three race in one
//! `tokio::select!`; any of them ending closes the connection.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use gigi_protocol::{ClientMessage, EnvelopeState};
use tokio::sync::{mpsc, Notify};

use super::dispatch::dispatch;
use super::keepalive::KeepAlive;
use crate::state::GatewayState;

/// Bounded outbound queue size (spec §4.7: gateway owns the per-socket
/// outbound queue; overflow closes with a `Lagged` reason).
pub const OUTBOUND_QUEUE_DEPTH: usize = gigi_eventbus::QUEUE_DEPTH;

/// One outbound item: a server message optionally tagged with the thread it
/// concerns, so the writer can maintain per-thread envelope sequencing.
pub struct OutboundItem {
    pub thread_id: Option<String>,
    pub message: gigi_protocol::ServerMessage,
}

pub async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundItem>(OUTBOUND_QUEUE_DEPTH);
    let keepalive = Arc::new(KeepAlive::new());

    let writer = {
        let keepalive = keepalive.clone();
        tokio::spawn(async move {
            let mut envelopes: HashMap<String, EnvelopeState> = HashMap::new();
            while let Some(item) = outbound_rx.recv().await {
                let now = now_ms();
                let value = match item.thread_id {
                    Some(thread_id) => {
                        let state = envelopes
                            .entry(thread_id.clone())
                            .or_insert_with(|| EnvelopeState::new(thread_id.clone(), 1));
                        match gigi_protocol::to_json(&item.message, state, now) {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!("envelope serialize error: {e}");
                                continue;
                            }
                        }
                    }
                    None => match item.message.to_value() {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!("serialize error: {e}");
                            continue;
                        }
                    },
                };
                let text = value.to_string();
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
                keepalive.touch();
            }
            let _ = sink.close().await;
        })
    };

    let mut active_forwarders: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();
    let close_signal = Arc::new(Notify::new());

    loop {
        tokio::select! {
            _ = keepalive.watch_for_timeout() => {
                tracing::info!("connection idle past keep-alive limit; closing");
                break;
            }
            _ = close_signal.notified() => {
                tracing::info!("outbound queue overflow or subscriber lagged; closing");
                break;
            }
            msg = stream.next() => {
                let Some(msg) = msg else { break };
                let msg = match msg {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("read error: {e}");
                        break;
                    }
                };
                keepalive.touch();
                let text = match msg {
                    Message::Text(t) => t,
                    Message::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
                    Message::Close(_) => break,
                    _ => continue,
                };
                let client_msg: ClientMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        let _ = outbound_tx
                            .send(OutboundItem {
                                thread_id: None,
                                message: gigi_protocol::ServerMessage::AgentError { reason: format!("parse error: {e}") },
                            })
                            .await;
                        continue;
                    }
                };
                dispatch(client_msg, &state, &outbound_tx, &close_signal, &mut active_forwarders).await;
            }
        }
    }

    for (_, handle) in active_forwarders.drain() {
        handle.abort();
    }
    writer.abort();
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
