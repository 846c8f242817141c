//! Forge webhook endpoint (spec §6.4): `POST /api/webhooks/forge`. Verifies
//! the HMAC signature header, then hands the body to `gigi_webhook`.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use gigi_webhook::IngestOutcome;

use crate::state::GatewayState;

const SIGNATURE_HEADER: &str = "x-forge-signature-256";
const EVENT_HEADER: &str = "x-forge-event";
const DELIVERY_HEADER: &str = "x-forge-delivery";

pub fn webhook_router(state: GatewayState) -> Router {
    Router::new().route("/api/webhooks/forge", post(handle_webhook)).with_state(state)
}

async fn handle_webhook(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::UNAUTHORIZED, "missing signature").into_response();
    };
    if !gigi_webhook::verify_signature(&state.webhook_secret, &body, signature) {
        return (StatusCode::UNAUTHORIZED, "bad signature").into_response();
    }

    let Some(event_kind) = headers.get(EVENT_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string) else {
        return (StatusCode::BAD_REQUEST, "missing event header").into_response();
    };

    // Redelivery of the same forge delivery id is a separate concern from
    // the self-echo check inside `ingest`: it's the forge retrying a send,
    // not our own write looping back. No delivery-id header means the
    // caller doesn't support one (e.g. a test); skip the check rather than
    // reject the request.
    if let Some(delivery_id) = headers.get(DELIVERY_HEADER).and_then(|v| v.to_str().ok()) {
        match state.store.record_webhook_delivery(delivery_id).await {
            Ok(true) => {}
            Ok(false) => return StatusCode::CONFLICT.into_response(),
            Err(e) => {
                tracing::warn!("webhook delivery dedup error: {e}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("invalid json: {e}")).into_response(),
    };

    match state.webhook.ingest(&event_kind, &payload).await {
        Ok(IngestOutcome::Accepted { .. } | IngestOutcome::Ignored | IngestOutcome::Echo) => {
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::warn!("webhook ingest error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use gigi_router::{Router as GigiRouter, StandardPolicy};
    use gigi_store::Store;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    async fn make_state() -> (GatewayState, Vec<u8>) {
        let store = Arc::new(Store::in_memory().unwrap());
        let bus = Arc::new(gigi_eventbus::EventBus::new());
        let tools = Arc::new(gigi_tools::ToolRegistry::new(Arc::new(gigi_tools::AllowAll)));
        let llm: Arc<dyn gigi_agent::LlmClient> = Arc::new(gigi_agent::MockLlm::new(vec![]));
        let runtime = Arc::new(gigi_agent::TurnRuntime::new(store.clone(), bus.clone(), tools, llm.clone(), 5.0));
        let broker = Arc::new(gigi_tools::AskUserBroker::new());
        let router = Arc::new(GigiRouter::new(store.clone(), runtime, Box::new(StandardPolicy), broker));
        let secret = b"topsecret".to_vec();
        let state = GatewayState::new(store, bus, router, secret.clone(), llm, 5.0);
        (state, secret)
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let (state, _secret) = make_state().await;
        let body = serde_json::json!({"action": "opened"}).to_string();
        let req = Request::post("/api/webhooks/forge")
            .header(SIGNATURE_HEADER, "sha256=deadbeef")
            .header(EVENT_HEADER, "issues")
            .body(Body::from(body))
            .unwrap();
        let resp = webhook_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_opened_issue_is_accepted() {
        let (state, secret) = make_state().await;
        let body = serde_json::json!({
            "action": "opened",
            "repository": {"full_name": "acme/widgets"},
            "sender": {"login": "alice"},
            "issue": {"number": 7, "title": "bug", "html_url": "https://forge/acme/widgets/issues/7"},
        })
        .to_string();
        let signature = sign(&secret, body.as_bytes());
        let req = Request::post("/api/webhooks/forge")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, "issues")
            .body(Body::from(body))
            .unwrap();
        let resp = webhook_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn redelivered_delivery_id_is_rejected_as_conflict() {
        let (state, secret) = make_state().await;
        let body = serde_json::json!({
            "action": "opened",
            "repository": {"full_name": "acme/widgets"},
            "sender": {"login": "alice"},
            "issue": {"number": 8, "title": "bug", "html_url": "https://forge/acme/widgets/issues/8"},
        })
        .to_string();
        let signature = sign(&secret, body.as_bytes());

        let req = Request::post("/api/webhooks/forge")
            .header(SIGNATURE_HEADER, signature.clone())
            .header(EVENT_HEADER, "issues")
            .header(DELIVERY_HEADER, "delivery-1")
            .body(Body::from(body.clone()))
            .unwrap();
        let resp = webhook_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let redelivered = Request::post("/api/webhooks/forge")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, "issues")
            .header(DELIVERY_HEADER, "delivery-1")
            .body(Body::from(body))
            .unwrap();
        let resp = webhook_router(state).oneshot(redelivered).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
