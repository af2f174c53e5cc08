use axum::{
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error::ApiError, models::token::ErrorResponse, AppState};

pub mod market;
pub mod portfolio;
pub mod status;
pub mod wallet;
pub mod watchlist;

pub type HandlerError = (StatusCode, HeaderMap, Json<ErrorResponse>);

/// Map a store/client failure to the HTTP status the dashboard sees
pub fn error_response(e: ApiError) -> HandlerError {
    let status = match &e {
        ApiError::Validation(_) => StatusCode::BAD_REQUEST,
        ApiError::UnknownToken(_) => StatusCode::NOT_FOUND,
        ApiError::RateLimitExceeded { .. } | ApiError::RateLimited => {
            StatusCode::TOO_MANY_REQUESTS
        }
        ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };

    let mut headers = HeaderMap::new();
    if let ApiError::RateLimitExceeded { wait_ms } = &e {
        headers.insert(RETRY_AFTER, HeaderValue::from(wait_ms.div_ceil(1000)));
    }

    (
        status,
        headers,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub fn not_found(message: String) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        HeaderMap::new(),
        Json(ErrorResponse { error: message }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .route("/ping", get(status::ping))
        .route("/status", get(status::get_status))
        .route("/errors", delete(status::clear_errors))
        .route("/errors/{slot}", delete(status::clear_slot_error))
        .route("/portfolio", get(portfolio::get_portfolio))
        .route("/portfolio/summary", get(portfolio::get_summary))
        .route("/portfolio/allocation", get(portfolio::get_allocation))
        .route("/portfolio/metrics", get(portfolio::get_metrics))
        .route("/portfolio/refresh", post(portfolio::refresh_portfolio))
        .route("/portfolio/tokens", post(portfolio::add_token))
        .route(
            "/portfolio/tokens/{id}",
            put(portfolio::update_holdings).delete(portfolio::remove_token),
        )
        .route(
            "/watchlist",
            get(watchlist::get_watchlist).post(watchlist::add_to_watchlist),
        )
        .route("/watchlist/refresh", post(watchlist::refresh_watchlist))
        .route(
            "/watchlist/{id}",
            delete(watchlist::remove_from_watchlist),
        )
        .route("/market", get(market::get_market))
        .route("/search", get(market::search).delete(market::clear_search))
        .route("/trending", get(market::get_trending))
        .route("/tokens", get(market::get_all_tokens))
        .route("/coins/{id}", get(market::get_coin))
        .route("/prices", get(market::get_prices))
        .route(
            "/wallet",
            get(wallet::get_wallet)
                .put(wallet::set_wallet)
                .delete(wallet::disconnect_wallet),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
