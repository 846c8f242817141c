//! REST CRUD surface (spec §6.3): thread listing/detail/events/lineage,
//! fork/compact, reference binding, deletion, usage. Errors map through one
//! `IntoResponse` impl into a full taxonomy (spec §7).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use gigi_store::{EventPage, RefStatus, RefType, StoreError, ThreadStatus};
use gigi_thread::{CompactError, ForkError, ForkRequest};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::GatewayState;

/// REST-surface error taxonomy (spec §7), collapsed into the status codes
/// §6.3 promises. `InvariantError` maps to 500: it signals an internal bug,
/// not a caller mistake.
pub enum ApiError {
    InvalidInput(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => ApiError::NotFound(m),
            StoreError::Conflict(m) => ApiError::Conflict(m),
            StoreError::InvariantError(m) => ApiError::Internal(m),
            StoreError::Storage(m) => ApiError::Internal(m),
        }
    }
}

impl From<ForkError> for ApiError {
    fn from(e: ForkError) -> Self {
        match e {
            ForkError::Store(e) => e.into(),
            ForkError::Compact(e) => e.into(),
        }
    }
}

impl From<CompactError> for ApiError {
    fn from(e: CompactError) -> Self {
        match e {
            CompactError::Store(e) => e.into(),
            CompactError::Llm(e) => ApiError::Internal(e.to_string()),
        }
    }
}

pub fn rest_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/threads", get(list_threads))
        .route("/api/threads/by-ref/:repo/:ref_type/:number", get(find_by_reference))
        .route("/api/threads/:id", get(get_thread))
        .route("/api/threads/:id/events", get(list_events))
        .route("/api/threads/:id/lineage", get(get_lineage))
        .route("/api/threads/:id/fork", post(fork_thread))
        .route("/api/threads/:id/compact", post(compact_thread))
        .route("/api/threads/:id/refs", post(add_reference))
        .route("/api/conversations/:id", delete(delete_conversation))
        .route("/api/usage/budget", get(usage_budget))
        .route("/api/usage/stats", get(usage_stats))
        .with_state(state)
}

#[derive(Deserialize)]
struct ListThreadsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

async fn list_threads(
    State(state): State<GatewayState>,
    Query(q): Query<ListThreadsQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = match q.status.as_deref() {
        Some(s) => Some(ThreadStatus::parse(s).ok_or_else(|| ApiError::InvalidInput(format!("unknown status {s}")))?),
        None => None,
    };
    let threads = state.store.list_threads(status, q.limit.unwrap_or(50)).await?;
    Ok(Json(json!({ "threads": threads })))
}

async fn get_thread(State(state): State<GatewayState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let thread = state.store.get_thread(&id).await?;
    Ok(Json(json!(thread)))
}

#[derive(Deserialize)]
struct EventsQuery {
    before: Option<i64>,
    after: Option<i64>,
    include_compacted: Option<bool>,
    limit: Option<i64>,
}

async fn list_events(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = EventPage {
        before_seq: q.before,
        after_seq: q.after,
        limit: q.limit,
        include_compacted: q.include_compacted.unwrap_or(false),
    };
    let events = state.store.list_events(&id, page).await?;
    Ok(Json(json!({ "events": events })))
}

async fn get_lineage(State(state): State<GatewayState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let lineage = gigi_thread::lineage(&state.store, &id).await?;
    Ok(Json(json!({
        "parent": lineage.parent,
        "children": lineage.children,
        "fork_point_seq": lineage.fork_point_seq,
    })))
}

#[derive(Deserialize, Default)]
struct ForkBody {
    topic: Option<String>,
    #[serde(default)]
    compact: bool,
}

async fn fork_thread(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ForkBody>,
) -> Result<Json<Value>, ApiError> {
    let tail = state
        .store
        .list_events(&id, EventPage::default())
        .await?
        .last()
        .map(|e| e.seq)
        .unwrap_or(0);
    let summarizer = gigi_thread::LlmSummarizer { llm: state.llm.clone() };
    let child_id = gigi_thread::fork(
        &state.store,
        &summarizer,
        ForkRequest {
            parent_thread_id: &id,
            fork_point_seq: tail,
            topic: body.topic.as_deref(),
            compact_parent: body.compact,
        },
    )
    .await?;
    Ok(Json(json!({ "thread_id": child_id })))
}

async fn compact_thread(State(state): State<GatewayState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let summarizer = gigi_thread::LlmSummarizer { llm: state.llm.clone() };
    let (event_id, seq) = gigi_thread::compact(&state.store, &summarizer, &id, gigi_thread::DEFAULT_KEEP_RECENT).await?;
    Ok(Json(json!({ "summary_event_id": event_id, "seq": seq })))
}

#[derive(Deserialize)]
struct AddReferenceBody {
    ref_type: String,
    repo: String,
    number: String,
}

async fn add_reference(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<AddReferenceBody>,
) -> Result<Json<Value>, ApiError> {
    let ref_type = RefType::parse(&body.ref_type).ok_or_else(|| ApiError::InvalidInput(format!("unknown ref_type {}", body.ref_type)))?;
    let ref_id = state
        .store
        .upsert_reference(&id, ref_type, &body.repo, &body.number, RefStatus::Open, None)
        .await?;
    Ok(Json(json!({ "reference_id": ref_id })))
}

async fn find_by_reference(
    State(state): State<GatewayState>,
    Path((repo, ref_type, number)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let ref_type = RefType::parse(&ref_type).ok_or_else(|| ApiError::InvalidInput(format!("unknown ref_type {ref_type}")))?;
    let thread_id = state.store.find_thread_by_reference(&repo, ref_type, &number).await?;
    match thread_id {
        Some(id) => Ok(Json(json!({ "thread_id": id }))),
        None => Err(ApiError::NotFound(format!("no thread bound to {repo}/{number}"))),
    }
}

async fn delete_conversation(State(state): State<GatewayState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    gigi_thread::delete(&state.store, &id).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn usage_budget(State(state): State<GatewayState>) -> Result<Json<Value>, ApiError> {
    let period = today_period();
    let spent = state.store.cost_for_period(&period).await?;
    Ok(Json(json!({
        "period": period,
        "spent_usd": spent,
        "budget_usd": state.daily_budget_usd,
        "remaining_usd": (state.daily_budget_usd - spent).max(0.0),
    })))
}

#[derive(Deserialize)]
struct UsageStatsQuery {
    days: Option<i64>,
}

async fn usage_stats(
    State(state): State<GatewayState>,
    Query(q): Query<UsageStatsQuery>,
) -> Result<Json<Value>, ApiError> {
    let stats = state.store.usage_stats(q.days.unwrap_or(30)).await?;
    Ok(Json(json!({ "stats": stats })))
}

fn today_period() -> String {
    let now = gigi_store::now_ms();
    let days_since_epoch = now / 86_400_000;
    // Civil-from-days, the same algorithm used by `std::time` internally,
    // kept local since the store treats `period` as an opaque caller string.
    civil_date(days_since_epoch)
}

fn civil_date(days_since_epoch: i64) -> String {
    let z = days_since_epoch + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn civil_date_matches_known_epoch_day() {
        // 1970-01-01 is day 0.
        assert_eq!(civil_date(0), "1970-01-01");
        // 2026-07-26 in days since epoch.
        assert_eq!(civil_date(20660), "2026-07-26");
    }
}
