//! Store state and its only transition function, [`reduce`].

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::portfolio::PortfolioToken;
use crate::models::token::{MarketCoin, SearchCoin, Token, TrendingCoin};
use crate::models::wallet::WalletConnection;
use crate::services::transform;

pub const MIN_SEARCH_QUERY_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotKind {
    Portfolio,
    Watchlist,
    MarketTokens,
    AddToken,
    Search,
    Trending,
}

impl SlotKind {
    /// Slots holding a fetched collection subject to the staleness policy
    pub const REFRESHABLE: [SlotKind; 3] =
        [SlotKind::Portfolio, SlotKind::Watchlist, SlotKind::MarketTokens];

    pub const ALL: [SlotKind; 6] = [
        SlotKind::Portfolio,
        SlotKind::Watchlist,
        SlotKind::MarketTokens,
        SlotKind::AddToken,
        SlotKind::Search,
        SlotKind::Trending,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotState {
    pub status: SlotStatus,
    pub error: Option<String>,
    /// Epoch millis of the last successful fetch
    pub last_success: Option<i64>,
    /// Id of the most recently started request; older completions are dropped
    pub request_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slots {
    pub portfolio: SlotState,
    pub watchlist: SlotState,
    pub market_tokens: SlotState,
    pub add_token: SlotState,
    pub search: SlotState,
    pub trending: SlotState,
}

impl Slots {
    pub fn get(&self, kind: SlotKind) -> &SlotState {
        match kind {
            SlotKind::Portfolio => &self.portfolio,
            SlotKind::Watchlist => &self.watchlist,
            SlotKind::MarketTokens => &self.market_tokens,
            SlotKind::AddToken => &self.add_token,
            SlotKind::Search => &self.search,
            SlotKind::Trending => &self.trending,
        }
    }

    fn get_mut(&mut self, kind: SlotKind) -> &mut SlotState {
        match kind {
            SlotKind::Portfolio => &mut self.portfolio,
            SlotKind::Watchlist => &mut self.watchlist,
            SlotKind::MarketTokens => &mut self.market_tokens,
            SlotKind::AddToken => &mut self.add_token,
            SlotKind::Search => &mut self.search,
            SlotKind::Trending => &mut self.trending,
        }
    }
}

/// Everything the dashboard reads. Collections are `Arc`s so unchanged ones
/// keep their identity across snapshots.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub portfolio: Arc<Vec<PortfolioToken>>,
    pub watchlist: Arc<Vec<Token>>,
    pub market_tokens: Arc<Vec<Token>>,
    pub search_results: Arc<Vec<SearchCoin>>,
    pub trending_tokens: Arc<Vec<TrendingCoin>>,
    pub search_query: String,
    pub slots: Slots,
    pub wallet: WalletConnection,
}

#[derive(Debug, Clone)]
pub enum Action {
    FetchStarted(SlotKind),
    FetchFailed {
        slot: SlotKind,
        request_id: u64,
        error: String,
    },
    /// Market records for the `requested` ids, merged into the current portfolio
    PortfolioLoaded {
        request_id: u64,
        market: Vec<MarketCoin>,
        requested: Vec<String>,
        at: i64,
    },
    WatchlistLoaded {
        request_id: u64,
        market: Vec<MarketCoin>,
        requested: Vec<String>,
        at: i64,
    },
    MarketTokensLoaded {
        request_id: u64,
        tokens: Vec<Token>,
        at: i64,
    },
    SearchLoaded {
        request_id: u64,
        results: Vec<SearchCoin>,
        at: i64,
    },
    TrendingLoaded {
        request_id: u64,
        coins: Vec<TrendingCoin>,
        at: i64,
    },
    /// Always applied; `request_id` only decides whether the slot status moves
    TokenAdded {
        request_id: u64,
        token: PortfolioToken,
        at: i64,
    },
    UpdateHoldings {
        id: String,
        holdings: f64,
    },
    RemoveFromPortfolio(String),
    AddToWatchlist(Token),
    RemoveFromWatchlist(String),
    SetSearchQuery(String),
    ClearSearchResults,
    ClearError(SlotKind),
    ClearAllErrors,
    Reset(SlotKind),
    Hydrate {
        portfolio: Vec<PortfolioToken>,
        watchlist: Vec<Token>,
    },
    SetWalletConnection(WalletConnection),
    DisconnectWallet,
}

/// Apply one action. A superseded fetch completion changes neither data nor
/// slot status; a superseded `TokenAdded` still adds its token.
pub fn reduce(mut state: WalletState, action: Action) -> WalletState {
    match action {
        Action::FetchStarted(slot) => {
            let s = state.slots.get_mut(slot);
            s.status = SlotStatus::Loading;
            s.error = None;
            s.request_id += 1;
        }

        Action::FetchFailed {
            slot,
            request_id,
            error,
        } => {
            if is_current(&state, slot, request_id) {
                let s = state.slots.get_mut(slot);
                s.status = SlotStatus::Failed;
                s.error = Some(error);
            }
        }

        Action::PortfolioLoaded {
            request_id,
            market,
            requested,
            at,
        } => {
            if is_current(&state, SlotKind::Portfolio, request_id) {
                let now = DateTime::from_timestamp_millis(at).unwrap_or_default();
                let tokens = transform::refresh_portfolio(&state.portfolio, &market, &requested, now);
                state.portfolio = Arc::new(tokens);
                succeed(&mut state, SlotKind::Portfolio, at);
            }
        }

        Action::WatchlistLoaded {
            request_id,
            market,
            requested,
            at,
        } => {
            if is_current(&state, SlotKind::Watchlist, request_id) {
                let now = DateTime::from_timestamp_millis(at).unwrap_or_default();
                let tokens = transform::refresh_watchlist(&state.watchlist, &market, &requested, now);
                state.watchlist = Arc::new(tokens);
                succeed(&mut state, SlotKind::Watchlist, at);
            }
        }

        Action::MarketTokensLoaded {
            request_id,
            tokens,
            at,
        } => {
            if is_current(&state, SlotKind::MarketTokens, request_id) {
                state.market_tokens = Arc::new(tokens);
                succeed(&mut state, SlotKind::MarketTokens, at);
            }
        }

        Action::SearchLoaded {
            request_id,
            results,
            at,
        } => {
            if is_current(&state, SlotKind::Search, request_id) {
                state.search_results = Arc::new(results);
                succeed(&mut state, SlotKind::Search, at);
            }
        }

        Action::TrendingLoaded {
            request_id,
            coins,
            at,
        } => {
            if is_current(&state, SlotKind::Trending, request_id) {
                state.trending_tokens = Arc::new(coins);
                succeed(&mut state, SlotKind::Trending, at);
            }
        }

        Action::TokenAdded {
            request_id,
            mut token,
            at,
        } => {
            // The token is already validated against market data, so an add
            // always lands. Only the slot status follows the latest request.
            let id = token.token.id.clone();

            if state.watchlist.iter().any(|t| t.id == id) {
                Arc::make_mut(&mut state.watchlist).retain(|t| t.id != id);
            }

            let portfolio = Arc::make_mut(&mut state.portfolio);
            match portfolio.iter_mut().find(|t| t.token.id == id) {
                Some(existing) => {
                    token.date_added = existing.date_added;
                    if existing.color.is_some() {
                        token.color = existing.color.clone();
                    }
                    *existing = token;
                }
                None => {
                    if token.color.is_none() {
                        token.color = Some(transform::palette_color(portfolio.len()));
                    }
                    portfolio.push(token);
                }
            }

            if state.slots.add_token.request_id == request_id {
                succeed(&mut state, SlotKind::AddToken, at);
            }
        }

        Action::UpdateHoldings { id, holdings } => {
            if let Some(index) = state.portfolio.iter().position(|t| t.token.id == id) {
                Arc::make_mut(&mut state.portfolio)[index].set_holdings(holdings);
            }
        }

        Action::RemoveFromPortfolio(id) => {
            if state.portfolio.iter().any(|t| t.token.id == id) {
                Arc::make_mut(&mut state.portfolio).retain(|t| t.token.id != id);
            }
        }

        Action::AddToWatchlist(token) => {
            let listed = state.watchlist.iter().any(|t| t.id == token.id);
            let held = state.portfolio.iter().any(|t| t.token.id == token.id);
            if !listed && !held {
                Arc::make_mut(&mut state.watchlist).push(token);
            }
        }

        Action::RemoveFromWatchlist(id) => {
            if state.watchlist.iter().any(|t| t.id == id) {
                Arc::make_mut(&mut state.watchlist).retain(|t| t.id != id);
            }
        }

        Action::SetSearchQuery(query) => {
            if query.trim().chars().count() < MIN_SEARCH_QUERY_LEN {
                state.search_results = Arc::new(Vec::new());
            }
            state.search_query = query;
        }

        Action::ClearSearchResults => {
            state.search_results = Arc::new(Vec::new());
            state.search_query.clear();
        }

        Action::ClearError(slot) => {
            state.slots.get_mut(slot).error = None;
        }

        Action::ClearAllErrors => {
            for slot in SlotKind::ALL {
                state.slots.get_mut(slot).error = None;
            }
        }

        Action::Reset(slot) => {
            // Keep the request counter so in-flight responses stay superseded
            let request_id = state.slots.get(slot).request_id;
            *state.slots.get_mut(slot) = SlotState {
                request_id: request_id + 1,
                ..Default::default()
            };

            match slot {
                SlotKind::Portfolio => state.portfolio = Arc::new(Vec::new()),
                SlotKind::Watchlist => state.watchlist = Arc::new(Vec::new()),
                SlotKind::MarketTokens => state.market_tokens = Arc::new(Vec::new()),
                SlotKind::Search => {
                    state.search_results = Arc::new(Vec::new());
                    state.search_query.clear();
                }
                SlotKind::Trending => state.trending_tokens = Arc::new(Vec::new()),
                SlotKind::AddToken => {}
            }
        }

        Action::Hydrate {
            portfolio,
            watchlist,
        } => {
            state.portfolio = Arc::new(portfolio);
            state.watchlist = Arc::new(watchlist);
        }

        Action::SetWalletConnection(connection) => {
            state.wallet = connection;
        }

        Action::DisconnectWallet => {
            state.wallet = WalletConnection::default();
        }
    }

    state
}

fn is_current(state: &WalletState, slot: SlotKind, request_id: u64) -> bool {
    let current = state.slots.get(slot).request_id;
    if current != request_id {
        tracing::debug!(
            "Dropping superseded {:?} response (request {}, current {})",
            slot,
            request_id,
            current
        );
        return false;
    }
    true
}

fn succeed(state: &mut WalletState, slot: SlotKind, at: i64) {
    let s = state.slots.get_mut(slot);
    s.status = SlotStatus::Succeeded;
    s.error = None;
    s.last_success = Some(at);
}
