use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::{error_response, not_found, HandlerError};
use crate::{
    models::{
        market::{AddWatchlistRequest, MutationResponse},
        token::Token,
    },
    services::transform,
    store::state::WalletState,
    AppState,
};

/// Handler for GET /watchlist
pub async fn get_watchlist(State(state): State<AppState>) -> Json<Vec<Token>> {
    let snapshot = state.store.snapshot().await;
    Json(snapshot.watchlist.as_ref().clone())
}

/// Handler for POST /watchlist/refresh
pub async fn refresh_watchlist(
    State(state): State<AppState>,
) -> Result<Json<Vec<Token>>, HandlerError> {
    state
        .store
        .fetch_watchlist()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Handler for POST /watchlist
///
/// Uses the market list or the last search results for display fields when
/// the id is known there; otherwise a placeholder is listed until the next
/// watchlist refresh.
pub async fn add_to_watchlist(
    State(state): State<AppState>,
    Json(request): Json<AddWatchlistRequest>,
) -> Result<(StatusCode, Json<MutationResponse>), HandlerError> {
    let id = request.id.trim().to_string();
    if id.is_empty() {
        return Err(error_response(crate::error::ApiError::Validation(
            "Token id cannot be empty".to_string(),
        )));
    }

    let snapshot = state.store.snapshot().await;
    let token = resolve_token(&snapshot, &id);
    let changed = state.store.add_to_watchlist(token).await;

    let status = if changed { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(MutationResponse { id, changed })))
}

/// Handler for DELETE /watchlist/{id}
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MutationResponse>, HandlerError> {
    if !state.store.remove_from_watchlist(&id).await {
        return Err(not_found(format!("Token '{}' is not in the watchlist", id)));
    }

    Ok(Json(MutationResponse { id, changed: true }))
}

fn resolve_token(state: &WalletState, id: &str) -> Token {
    if let Some(token) = state.market_tokens.iter().find(|t| t.id == id) {
        return token.clone();
    }

    let mut token = transform::placeholder_token(id, Utc::now());
    if let Some(found) = state.search_results.iter().find(|c| c.id == id) {
        token.name = found.name.clone();
        token.symbol = found.symbol.clone();
        token.image = found.large.clone();
        token.market_cap_rank = found.market_cap_rank;
    }
    token
}
