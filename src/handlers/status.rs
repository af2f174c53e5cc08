use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{error_response, HandlerError};
use crate::{
    models::token::PingResponse,
    services::rate_limiter::RateLimitStatus,
    store::{
        selectors::{self, ErrorStates, LoadingStates, RefreshFlags, SearchState},
        state::{SlotKind, Slots},
    },
    AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub slots: Slots,
    pub loading: LoadingStates,
    pub errors: ErrorStates,
    pub needs_refresh: RefreshFlags,
    pub should_refresh_any: bool,
    pub search: SearchState,
    pub rate_limit: RateLimitStatus,
    pub last_update: Option<DateTime<Utc>>,
}

pub async fn health() -> &'static str {
    "ok"
}

/// Handler for GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.store.snapshot().await;
    let needs_refresh = selectors::needs_refresh(&snapshot, Utc::now().timestamp_millis());

    Json(StatusResponse {
        slots: snapshot.slots.clone(),
        loading: selectors::loading_states(&snapshot),
        errors: selectors::error_states(&snapshot),
        needs_refresh,
        should_refresh_any: needs_refresh.any(),
        search: selectors::search_state(&snapshot),
        rate_limit: state.rate_limiter.status(),
        last_update: state.store.last_update(),
    })
}

/// Handler for GET /ping: checks the market data provider is reachable
pub async fn ping(State(state): State<AppState>) -> Result<Json<PingResponse>, HandlerError> {
    state.store.ping().await.map(Json).map_err(error_response)
}

/// Handler for DELETE /errors
pub async fn clear_errors(State(state): State<AppState>) -> StatusCode {
    state.store.clear_all_errors().await;
    StatusCode::NO_CONTENT
}

/// Handler for DELETE /errors/{slot}
pub async fn clear_slot_error(
    State(state): State<AppState>,
    Path(slot): Path<SlotKind>,
) -> StatusCode {
    tracing::debug!("Clearing {:?} error", slot);
    state.store.clear_error(slot).await;
    StatusCode::NO_CONTENT
}
