use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::{error_response, HandlerError};
use crate::{
    models::{
        market::{MarketQuery, PriceQuery, SearchQuery},
        token::{CoinDetail, SearchCoin, SimplePrices, Token, TrendingCoin},
    },
    store::selectors::{self, ListedToken},
    AppState,
};

/// Handler for GET /market
pub async fn get_market(
    State(state): State<AppState>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<Vec<Token>>, HandlerError> {
    tracing::debug!("Fetching market list with query: {:?}", query);

    state
        .store
        .fetch_market_list(query.page, query.per_page)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Handler for GET /search
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchCoin>>, HandlerError> {
    state
        .store
        .search(&query.query)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Handler for DELETE /search
pub async fn clear_search(State(state): State<AppState>) -> StatusCode {
    state.store.clear_search_results().await;
    StatusCode::NO_CONTENT
}

/// Handler for GET /trending
pub async fn get_trending(
    State(state): State<AppState>,
) -> Result<Json<Vec<TrendingCoin>>, HandlerError> {
    state
        .store
        .fetch_trending()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Handler for GET /coins/{id}
pub async fn get_coin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CoinDetail>, HandlerError> {
    state
        .store
        .coin_detail(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Handler for GET /prices?ids=bitcoin,ethereum
pub async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<SimplePrices>, HandlerError> {
    state
        .store
        .simple_prices(&query.id_list())
        .await
        .map(Json)
        .map_err(error_response)
}

/// Handler for GET /tokens: portfolio, watchlist and market tokens, one entry per id
pub async fn get_all_tokens(State(state): State<AppState>) -> Json<Vec<ListedToken>> {
    let snapshot = state.store.snapshot().await;
    Json(selectors::all_tokens(&snapshot))
}
