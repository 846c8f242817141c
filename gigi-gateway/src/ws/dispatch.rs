//! Per-message dispatch for the WS recv loop: a match over `ClientMessage`.

use std::collections::HashMap;
use std::sync::Arc;

use gigi_protocol::{ClientMessage, ServerMessage};
use gigi_router::InboundIntent;
use gigi_store::EventPage;
use tokio::sync::{mpsc, Notify};

use super::connection::OutboundItem;
use crate::state::GatewayState;

/// Spawns a bus-forwarding task for `thread_id` if one isn't already
/// running on this connection. On outbound-queue overflow (spec §4.7:
/// "queue overflow ... socket is closed with a `Lagged` reason") or a
/// `Lagged` signal from the bus itself, it notifies `close_signal` so the
/// connection's main loop tears the whole socket down, per spec rather than
/// silently dropping just this thread's stream.
fn spawn_forwarder(
    state: &GatewayState,
    thread_id: String,
    outbound_tx: mpsc::Sender<OutboundItem>,
    close_signal: Arc<Notify>,
    active: &mut HashMap<String, tokio::task::JoinHandle<()>>,
) {
    if active.contains_key(&thread_id) {
        return;
    }
    let bus = state.bus.clone();
    let handle = tokio::spawn(async move {
        let mut sub = bus.subscribe(&thread_id);
        while let Some(res) = sub.recv().await {
            match res {
                Ok(event) => {
                    let item = OutboundItem { thread_id: Some(event.thread_id), message: event.message };
                    if outbound_tx.try_send(item).is_err() {
                        close_signal.notify_one();
                        break;
                    }
                }
                Err(_lagged) => {
                    close_signal.notify_one();
                    break;
                }
            }
        }
    });
    active.insert(thread_id, handle);
}

pub async fn dispatch(
    msg: ClientMessage,
    state: &GatewayState,
    outbound_tx: &mpsc::Sender<OutboundItem>,
    close_signal: &Arc<Notify>,
    active_forwarders: &mut HashMap<String, tokio::task::JoinHandle<()>>,
) {
    match msg {
        ClientMessage::ChatSend(req) => {
            let intent = InboundIntent::text("web", "user", req.conversation_id.clone(), req.message);
            match state.router.route(intent).await {
                Ok((thread_id, _outcome)) => {
                    spawn_forwarder(state, thread_id, outbound_tx.clone(), close_signal.clone(), active_forwarders);
                }
                Err(e) => {
                    let _ = outbound_tx
                        .send(OutboundItem { thread_id: None, message: ServerMessage::AgentError { reason: e.to_string() } })
                        .await;
                }
            }
        }
        ClientMessage::ChatNew(req) => match state.store.create_thread(&req.channel, req.topic.as_deref().unwrap_or("New conversation"), None, None).await {
            Ok(thread_id) => {
                if !req.tags.is_empty() {
                    let _ = state.store.update_thread_tags(&thread_id, req.tags).await;
                }
                if let Ok(thread) = state.store.get_thread(&thread_id).await {
                    let thread_json = serde_json::to_value(&thread).unwrap_or_default();
                    let _ = outbound_tx
                        .send(OutboundItem { thread_id: Some(thread_id), message: ServerMessage::ConversationUpdate { thread: thread_json } })
                        .await;
                }
            }
            Err(e) => {
                let _ = outbound_tx.send(OutboundItem { thread_id: None, message: ServerMessage::AgentError { reason: e.to_string() } }).await;
            }
        },
        ClientMessage::ChatResume(req) => {
            spawn_forwarder(state, req.conversation_id.clone(), outbound_tx.clone(), close_signal.clone(), active_forwarders);
            if let Ok(events) = state.store.list_events(&req.conversation_id, EventPage::default()).await {
                let events_json = events.iter().filter_map(|e| serde_json::to_value(e).ok()).collect();
                let _ = outbound_tx
                    .send(OutboundItem { thread_id: Some(req.conversation_id), message: ServerMessage::MessageHistory { events: events_json } })
                    .await;
            }
        }
        ClientMessage::ChatStop(req) => {
            state.router.stop(&req.conversation_id).await;
        }
        ClientMessage::ViewNavigate(req) => {
            let _ = outbound_tx
                .send(OutboundItem { thread_id: None, message: ServerMessage::ViewCommand { target: req.target, id: req.id } })
                .await;
        }
        ClientMessage::TitleUpdate(req) => {
            if state.store.update_thread_topic(&req.conversation_id, &req.topic).await.is_ok() {
                state.bus.publish(&req.conversation_id, ServerMessage::TitleUpdate { topic: req.topic });
            }
        }
        ClientMessage::Ping => {
            let _ = outbound_tx.send(OutboundItem { thread_id: None, message: ServerMessage::Pong }).await;
        }
    }
}
