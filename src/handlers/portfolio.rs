use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{error_response, not_found, HandlerError};
use crate::{
    models::{
        market::MutationResponse,
        portfolio::{
            AddPortfolioTokenRequest, AllocationEntry, PortfolioMetrics, PortfolioSummary,
            PortfolioToken, UpdateHoldingsRequest,
        },
    },
    AppState,
};

/// Handler for GET /portfolio
pub async fn get_portfolio(State(state): State<AppState>) -> Json<Vec<PortfolioToken>> {
    let snapshot = state.store.snapshot().await;
    Json(snapshot.portfolio.as_ref().clone())
}

/// Handler for GET /portfolio/summary
pub async fn get_summary(State(state): State<AppState>) -> Json<PortfolioSummary> {
    Json(state.store.portfolio_summary().await)
}

/// Handler for GET /portfolio/allocation
pub async fn get_allocation(State(state): State<AppState>) -> Json<Vec<AllocationEntry>> {
    Json(state.store.portfolio_allocation().await)
}

pub async fn get_metrics(State(state): State<AppState>) -> Json<PortfolioMetrics> {
    Json(state.store.portfolio_metrics().await)
}

/// Handler for POST /portfolio/refresh
pub async fn refresh_portfolio(
    State(state): State<AppState>,
) -> Result<Json<Vec<PortfolioToken>>, HandlerError> {
    state
        .store
        .fetch_portfolio()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Handler for POST /portfolio/tokens
pub async fn add_token(
    State(state): State<AppState>,
    Json(request): Json<AddPortfolioTokenRequest>,
) -> Result<(StatusCode, Json<PortfolioToken>), HandlerError> {
    tracing::info!("Adding {} to portfolio ({} units)", request.id, request.holdings);

    match state
        .store
        .add_token_to_portfolio(&request.id, request.holdings)
        .await
    {
        Ok(token) => Ok((StatusCode::CREATED, Json(token))),
        Err(e) => {
            tracing::error!("Failed to add {} to portfolio: {}", request.id, e);
            Err(error_response(e))
        }
    }
}

/// Handler for PUT /portfolio/tokens/{id}
pub async fn update_holdings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateHoldingsRequest>,
) -> Result<Json<MutationResponse>, HandlerError> {
    let found = state
        .store
        .update_holdings(&id, request.holdings)
        .await
        .map_err(error_response)?;

    if !found {
        return Err(not_found(format!("Token '{}' is not in the portfolio", id)));
    }

    Ok(Json(MutationResponse { id, changed: true }))
}

/// Handler for DELETE /portfolio/tokens/{id}
pub async fn remove_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MutationResponse>, HandlerError> {
    if !state.store.remove_from_portfolio(&id).await {
        return Err(not_found(format!("Token '{}' is not in the portfolio", id)));
    }

    Ok(Json(MutationResponse { id, changed: true }))
}
