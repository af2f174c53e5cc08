//! Async portfolio store.
//!
//! All mutations go through [`state::reduce`] under a single write lock, so
//! they apply one at a time, and persistence happens under that same lock.
//! Network calls happen outside the lock. Each fetch records the request id
//! it was issued under, and its completion is dropped if a newer fetch for
//! the same slot has started since.

pub mod selectors;
pub mod state;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::models::portfolio::{
    AllocationEntry, HoldingMeta, PortfolioMetrics, PortfolioSeed, PortfolioSummary,
    PortfolioToken,
};
use crate::models::token::{
    CoinDetail, MarketCoin, PingResponse, SearchCoin, SimplePrices, Token, TrendingCoin,
};
use crate::models::wallet::WalletConnection;
use crate::services::market_data::{self, MarketDataApi, MarketsParams};
use crate::services::storage::PortfolioStorage;
use crate::services::transform;

use selectors::{RefreshFlags, Selectors};
use state::{reduce, Action, SlotKind, WalletState, MIN_SEARCH_QUERY_LEN};

pub const DEFAULT_MARKET_PAGE_SIZE: u32 = 50;

#[derive(Clone)]
pub struct PortfolioStore {
    api: Arc<dyn MarketDataApi>,
    storage: PortfolioStorage,
    state: Arc<RwLock<Arc<WalletState>>>,
    selectors: Arc<Selectors>,
}

impl PortfolioStore {
    pub fn new(api: Arc<dyn MarketDataApi>, storage: PortfolioStorage) -> Self {
        Self {
            api,
            storage,
            state: Arc::new(RwLock::new(Arc::new(WalletState::default()))),
            selectors: Arc::new(Selectors::new()),
        }
    }

    /// Current immutable snapshot
    pub async fn snapshot(&self) -> Arc<WalletState> {
        Arc::clone(&*self.state.read().await)
    }

    /// Apply one action and return the resulting snapshot.
    pub async fn dispatch(&self, action: Action) -> Arc<WalletState> {
        self.apply(action).await.1
    }

    /// Reduce under the write lock and return the snapshots before and after.
    /// A changed portfolio or watchlist is persisted before the lock is released,
    /// so storage sees changes in the order they were applied.
    async fn apply(&self, action: Action) -> (Arc<WalletState>, Arc<WalletState>) {
        let mut guard = self.state.write().await;
        let before = Arc::clone(&*guard);
        let next = Arc::new(reduce(WalletState::clone(&before), action));

        if !Arc::ptr_eq(&before.portfolio, &next.portfolio)
            || !Arc::ptr_eq(&before.watchlist, &next.watchlist)
        {
            self.persist(&next);
        }

        *guard = Arc::clone(&next);
        (before, next)
    }

    async fn start(&self, slot: SlotKind) -> u64 {
        self.dispatch(Action::FetchStarted(slot))
            .await
            .slots
            .get(slot)
            .request_id
    }

    async fn fail(&self, slot: SlotKind, request_id: u64, error: &ApiError) {
        tracing::warn!("{:?} fetch failed: {}", slot, error);
        self.dispatch(Action::FetchFailed {
            slot,
            request_id,
            error: error.to_string(),
        })
        .await;
    }

    /// Seed the portfolio and watchlist from persisted ids, holdings and metadata.
    pub async fn hydrate(&self) {
        let now = Utc::now();
        let holdings = self.storage.holdings();
        let meta = self.storage.meta();
        let watchlist_ids = self.storage.watchlist();

        let seeds: Vec<PortfolioSeed> = holdings
            .iter()
            .map(|(id, amount)| {
                let meta = meta.get(id);
                PortfolioSeed {
                    id: id.clone(),
                    holdings: *amount,
                    color: meta.and_then(|m| m.color.clone()),
                    date_added: meta.map(|m| m.date_added),
                }
            })
            .collect();

        let portfolio = transform::build_portfolio(&seeds, &[], now);
        let watchlist: Vec<Token> = watchlist_ids
            .iter()
            .filter(|id| !holdings.contains_key(*id))
            .map(|id| transform::placeholder_token(id, now))
            .collect();

        tracing::info!(
            "Hydrated {} holdings and {} watchlist ids from storage",
            portfolio.len(),
            watchlist.len()
        );

        self.dispatch(Action::Hydrate {
            portfolio,
            watchlist,
        })
        .await;
    }

    /// Re-price every held token. Changes made while the request is out are
    /// kept; only prices come from the response.
    pub async fn fetch_portfolio(&self) -> Result<Vec<PortfolioToken>, ApiError> {
        let ids: Vec<String> = self
            .snapshot()
            .await
            .portfolio
            .iter()
            .map(|t| t.token.id.clone())
            .collect();

        let request_id = self.start(SlotKind::Portfolio).await;
        let market = match self.markets_for(&ids).await {
            Ok(market) => market,
            Err(e) => {
                self.fail(SlotKind::Portfolio, request_id, &e).await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let state = self
            .dispatch(Action::PortfolioLoaded {
                request_id,
                market,
                requested: ids.clone(),
                at: now.timestamp_millis(),
            })
            .await;

        if !ids.is_empty() {
            tracing::info!("Refreshed {} portfolio tokens", ids.len());
            self.storage.save_last_update(now);
        }
        Ok(state.portfolio.as_ref().clone())
    }

    pub async fn fetch_watchlist(&self) -> Result<Vec<Token>, ApiError> {
        let ids: Vec<String> = self
            .snapshot()
            .await
            .watchlist
            .iter()
            .map(|t| t.id.clone())
            .collect();

        let request_id = self.start(SlotKind::Watchlist).await;
        let market = match self.markets_for(&ids).await {
            Ok(market) => market,
            Err(e) => {
                self.fail(SlotKind::Watchlist, request_id, &e).await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let state = self
            .dispatch(Action::WatchlistLoaded {
                request_id,
                market,
                requested: ids.clone(),
                at: now.timestamp_millis(),
            })
            .await;

        if !ids.is_empty() {
            tracing::info!("Refreshed {} watchlist tokens", ids.len());
            self.storage.save_last_update(now);
        }
        Ok(state.watchlist.as_ref().clone())
    }

    /// Market records for `ids`; an empty list needs no request.
    async fn markets_for(&self, ids: &[String]) -> Result<Vec<MarketCoin>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        market_data::markets_for_ids(self.api.as_ref(), ids).await
    }

    pub async fn fetch_market_list(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Vec<Token>, ApiError> {
        let params = MarketsParams::page(
            page.unwrap_or(1).max(1),
            page_size.unwrap_or(DEFAULT_MARKET_PAGE_SIZE).clamp(1, 250),
        );

        let request_id = self.start(SlotKind::MarketTokens).await;

        match self.api.coins_markets(&params).await {
            Ok(market) => {
                let tokens: Vec<Token> = market.iter().map(transform::to_token).collect();
                self.dispatch(Action::MarketTokensLoaded {
                    request_id,
                    tokens: tokens.clone(),
                    at: Utc::now().timestamp_millis(),
                })
                .await;
                Ok(tokens)
            }
            Err(e) => {
                self.fail(SlotKind::MarketTokens, request_id, &e).await;
                Err(e)
            }
        }
    }

    /// Queries shorter than two characters clear the results without a request.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchCoin>, ApiError> {
        self.dispatch(Action::SetSearchQuery(query.to_string())).await;

        if query.trim().chars().count() < MIN_SEARCH_QUERY_LEN {
            return Ok(Vec::new());
        }

        let request_id = self.start(SlotKind::Search).await;

        match self.api.search(query.trim()).await {
            Ok(results) => {
                self.dispatch(Action::SearchLoaded {
                    request_id,
                    results: results.clone(),
                    at: Utc::now().timestamp_millis(),
                })
                .await;
                Ok(results)
            }
            Err(e) => {
                self.fail(SlotKind::Search, request_id, &e).await;
                Err(e)
            }
        }
    }

    pub async fn fetch_trending(&self) -> Result<Vec<TrendingCoin>, ApiError> {
        let request_id = self.start(SlotKind::Trending).await;

        match self.api.trending().await {
            Ok(coins) => {
                self.dispatch(Action::TrendingLoaded {
                    request_id,
                    coins: coins.clone(),
                    at: Utc::now().timestamp_millis(),
                })
                .await;
                Ok(coins)
            }
            Err(e) => {
                self.fail(SlotKind::Trending, request_id, &e).await;
                Err(e)
            }
        }
    }

    pub async fn add_token_to_portfolio(
        &self,
        id: &str,
        holdings: f64,
    ) -> Result<PortfolioToken, ApiError> {
        let id = id.trim();
        let request_id = self.start(SlotKind::AddToken).await;

        let result = match validate_holdings(holdings).and_then(|_| validate_id(id)) {
            Ok(()) => self.api.coins_markets(&MarketsParams::for_ids(vec![id.to_string()])).await,
            Err(e) => Err(e),
        };

        let market = match result {
            Ok(market) => market,
            Err(e) => {
                self.fail(SlotKind::AddToken, request_id, &e).await;
                return Err(e);
            }
        };

        let Some(data) = market.iter().find(|c| c.id == id) else {
            let e = ApiError::UnknownToken(id.to_string());
            self.fail(SlotKind::AddToken, request_id, &e).await;
            return Err(e);
        };

        // colour is assigned when the entry lands, from the portfolio it lands in
        let token = transform::to_portfolio_token(data, holdings, None, Utc::now());

        let state = self
            .dispatch(Action::TokenAdded {
                request_id,
                token,
                at: Utc::now().timestamp_millis(),
            })
            .await;

        tracing::info!("Added {} ({} units) to portfolio", id, holdings);

        selectors::portfolio_token_by_id(&state, id)
            .cloned()
            .ok_or_else(|| ApiError::UnknownToken(id.to_string()))
    }

    /// Returns whether the token was in the portfolio.
    pub async fn update_holdings(&self, id: &str, holdings: f64) -> Result<bool, ApiError> {
        validate_holdings(holdings)?;

        let state = self
            .dispatch(Action::UpdateHoldings {
                id: id.to_string(),
                holdings,
            })
            .await;

        Ok(selectors::is_token_in_portfolio(&state, id))
    }

    pub async fn remove_from_portfolio(&self, id: &str) -> bool {
        let (before, after) = self.apply(Action::RemoveFromPortfolio(id.to_string())).await;
        !Arc::ptr_eq(&before.portfolio, &after.portfolio)
    }

    /// No-op if the token is already listed or held.
    pub async fn add_to_watchlist(&self, token: Token) -> bool {
        let id = token.id.clone();
        let (before, after) = self.apply(Action::AddToWatchlist(token)).await;
        let added = !Arc::ptr_eq(&before.watchlist, &after.watchlist);
        if added {
            tracing::info!("Added {} to watchlist", id);
        }
        added
    }

    pub async fn remove_from_watchlist(&self, id: &str) -> bool {
        let (before, after) = self.apply(Action::RemoveFromWatchlist(id.to_string())).await;
        !Arc::ptr_eq(&before.watchlist, &after.watchlist)
    }

    pub async fn reset(&self, slot: SlotKind) {
        self.dispatch(Action::Reset(slot)).await;
    }

    pub async fn clear_error(&self, slot: SlotKind) {
        self.dispatch(Action::ClearError(slot)).await;
    }

    pub async fn clear_all_errors(&self) {
        self.dispatch(Action::ClearAllErrors).await;
    }

    pub async fn clear_search_results(&self) {
        self.dispatch(Action::ClearSearchResults).await;
    }

    pub async fn set_wallet_connection(&self, connection: WalletConnection) {
        self.dispatch(Action::SetWalletConnection(connection)).await;
    }

    pub async fn disconnect_wallet(&self) {
        self.dispatch(Action::DisconnectWallet).await;
    }

    pub async fn portfolio_summary(&self) -> PortfolioSummary {
        let state = self.snapshot().await;
        self.selectors.portfolio_summary(&state)
    }

    pub async fn portfolio_allocation(&self) -> Vec<AllocationEntry> {
        let state = self.snapshot().await;
        self.selectors.portfolio_allocation(&state)
    }

    pub async fn portfolio_metrics(&self) -> PortfolioMetrics {
        selectors::portfolio_metrics(&*self.snapshot().await)
    }

    pub async fn needs_refresh(&self) -> RefreshFlags {
        selectors::needs_refresh(&*self.snapshot().await, Utc::now().timestamp_millis())
    }

    /// When a portfolio or watchlist refresh last succeeded, as persisted
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.storage.last_update()
    }

    pub async fn coin_detail(&self, id: &str) -> Result<CoinDetail, ApiError> {
        let id = id.trim();
        validate_id(id)?;
        self.api.coin_detail(id).await
    }

    pub async fn simple_prices(&self, ids: &[String]) -> Result<SimplePrices, ApiError> {
        let ids: Vec<String> = ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(ApiError::Validation("Token IDs array cannot be empty".to_string()));
        }
        self.api.simple_prices(&ids).await
    }

    /// Upstream reachability
    pub async fn ping(&self) -> Result<PingResponse, ApiError> {
        self.api.ping().await
    }

    fn persist(&self, state: &WalletState) {
        let watchlist: Vec<String> = state.watchlist.iter().map(|t| t.id.clone()).collect();
        let holdings: BTreeMap<String, f64> = state
            .portfolio
            .iter()
            .map(|t| (t.token.id.clone(), t.holdings()))
            .collect();
        let meta: BTreeMap<String, HoldingMeta> = state
            .portfolio
            .iter()
            .map(|t| (t.token.id.clone(), HoldingMeta::from(t)))
            .collect();

        self.storage.save_watchlist(&watchlist);
        self.storage.save_holdings(&holdings);
        self.storage.save_meta(&meta);
    }
}

fn validate_holdings(holdings: f64) -> Result<(), ApiError> {
    if holdings.is_finite() && holdings >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Holdings must be a non-negative number, got {}",
            holdings
        )))
    }
}

fn validate_id(id: &str) -> Result<(), ApiError> {
    if id.is_empty() {
        Err(ApiError::Validation("Token id cannot be empty".to_string()))
    } else {
        Ok(())
    }
}
