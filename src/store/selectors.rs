//! Derived views over store snapshots.
//!
//! Every function here is pure over a [`WalletState`]. `Selectors` memoizes
//! the two aggregate views by identity of the portfolio collection, so a
//! snapshot whose portfolio `Arc` did not change reuses the previous result.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::state::{SlotKind, SlotStatus, WalletState, MIN_SEARCH_QUERY_LEN};
use crate::models::portfolio::{AllocationEntry, PortfolioMetrics, PortfolioSummary, PortfolioToken};
use crate::models::token::{SearchCoin, Token};
use crate::services::{aggregate, transform};

/// A fetched slot older than this is due for refresh
pub const STALENESS_THRESHOLD: Duration = Duration::from_secs(5 * 60);

type Memo<T> = Mutex<Option<(Arc<Vec<PortfolioToken>>, T)>>;

#[derive(Default)]
pub struct Selectors {
    summary: Memo<PortfolioSummary>,
    allocation: Memo<Vec<AllocationEntry>>,
}

impl Selectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn portfolio_summary(&self, state: &WalletState) -> PortfolioSummary {
        memoized(&self.summary, &state.portfolio, |tokens| {
            aggregate::summarize(tokens, Utc::now())
        })
    }

    pub fn portfolio_allocation(&self, state: &WalletState) -> Vec<AllocationEntry> {
        memoized(&self.allocation, &state.portfolio, |tokens| transform::allocation(tokens))
    }
}

fn memoized<T: Clone>(
    memo: &Memo<T>,
    portfolio: &Arc<Vec<PortfolioToken>>,
    compute: impl FnOnce(&[PortfolioToken]) -> T,
) -> T {
    let mut slot = memo.lock();
    if let Some((input, output)) = slot.as_ref() {
        if Arc::ptr_eq(input, portfolio) {
            return output.clone();
        }
    }

    let output = compute(portfolio);
    *slot = Some((Arc::clone(portfolio), output.clone()));
    output
}

pub fn portfolio_metrics(state: &WalletState) -> PortfolioMetrics {
    aggregate::metrics(&state.portfolio)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFlags {
    pub portfolio: bool,
    pub watchlist: bool,
    pub market_tokens: bool,
}

impl RefreshFlags {
    pub fn any(&self) -> bool {
        self.portfolio || self.watchlist || self.market_tokens
    }

    pub fn get(&self, slot: SlotKind) -> bool {
        match slot {
            SlotKind::Portfolio => self.portfolio,
            SlotKind::Watchlist => self.watchlist,
            SlotKind::MarketTokens => self.market_tokens,
            _ => false,
        }
    }
}

/// True if the slot never succeeded or its last success is older than the threshold.
pub fn slot_needs_refresh(state: &WalletState, slot: SlotKind, now_ms: i64) -> bool {
    match state.slots.get(slot).last_success {
        None => true,
        Some(at) => now_ms.saturating_sub(at) > STALENESS_THRESHOLD.as_millis() as i64,
    }
}

pub fn needs_refresh(state: &WalletState, now_ms: i64) -> RefreshFlags {
    RefreshFlags {
        portfolio: slot_needs_refresh(state, SlotKind::Portfolio, now_ms),
        watchlist: slot_needs_refresh(state, SlotKind::Watchlist, now_ms),
        market_tokens: slot_needs_refresh(state, SlotKind::MarketTokens, now_ms),
    }
}

pub fn is_token_in_portfolio(state: &WalletState, id: &str) -> bool {
    state.portfolio.iter().any(|t| t.token.id == id)
}

pub fn is_token_in_watchlist(state: &WalletState, id: &str) -> bool {
    state.watchlist.iter().any(|t| t.id == id)
}

pub fn portfolio_token_by_id<'a>(state: &'a WalletState, id: &str) -> Option<&'a PortfolioToken> {
    state.portfolio.iter().find(|t| t.token.id == id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingStates {
    pub slots: HashMap<SlotKind, SlotStatus>,
    pub is_any_loading: bool,
}

pub fn loading_states(state: &WalletState) -> LoadingStates {
    let slots: HashMap<SlotKind, SlotStatus> = SlotKind::ALL
        .iter()
        .map(|kind| (*kind, state.slots.get(*kind).status))
        .collect();
    let is_any_loading = slots.values().any(|s| *s == SlotStatus::Loading);

    LoadingStates {
        slots,
        is_any_loading,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStates {
    pub errors: HashMap<SlotKind, String>,
    pub has_errors: bool,
}

pub fn error_states(state: &WalletState) -> ErrorStates {
    let errors: HashMap<SlotKind, String> = SlotKind::ALL
        .iter()
        .filter_map(|kind| state.slots.get(*kind).error.clone().map(|e| (*kind, e)))
        .collect();
    let has_errors = !errors.is_empty();

    ErrorStates { errors, has_errors }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    Portfolio,
    Watchlist,
    Market,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedToken {
    #[serde(flatten)]
    pub token: Token,
    pub source: TokenSource,
    pub in_portfolio: bool,
    pub in_watchlist: bool,
}

/// Portfolio, then watchlist, then market tokens, one entry per id.
pub fn all_tokens(state: &WalletState) -> Vec<ListedToken> {
    let mut listed: Vec<ListedToken> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for held in state.portfolio.iter() {
        index.insert(held.token.id.as_str(), listed.len());
        listed.push(ListedToken {
            token: held.token.clone(),
            source: TokenSource::Portfolio,
            in_portfolio: true,
            in_watchlist: false,
        });
    }

    for token in state.watchlist.iter() {
        match index.get(token.id.as_str()) {
            Some(&i) => listed[i].in_watchlist = true,
            None => {
                index.insert(token.id.as_str(), listed.len());
                listed.push(ListedToken {
                    token: token.clone(),
                    source: TokenSource::Watchlist,
                    in_portfolio: false,
                    in_watchlist: true,
                });
            }
        }
    }

    for token in state.market_tokens.iter() {
        if !index.contains_key(token.id.as_str()) {
            index.insert(token.id.as_str(), listed.len());
            listed.push(ListedToken {
                token: token.clone(),
                source: TokenSource::Market,
                in_portfolio: false,
                in_watchlist: false,
            });
        }
    }

    listed
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    pub results: Vec<SearchCoin>,
    pub has_results: bool,
    pub is_searching: bool,
}

pub fn search_state(state: &WalletState) -> SearchState {
    SearchState {
        query: state.search_query.clone(),
        results: state.search_results.as_ref().clone(),
        has_results: !state.search_results.is_empty(),
        is_searching: state.search_query.trim().chars().count() >= MIN_SEARCH_QUERY_LEN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::state::{reduce, Action};

    fn token(id: &str, price: f64, change: f64) -> Token {
        Token {
            id: id.to_string(),
            name: id.to_string(),
            symbol: id.to_string(),
            image: String::new(),
            current_price: price,
            market_cap: 0.0,
            market_cap_rank: None,
            price_change_percentage_24h: change,
            sparkline_in_7d: None,
            last_updated: None,
        }
    }

    fn with_portfolio(tokens: Vec<PortfolioToken>) -> WalletState {
        reduce(
            WalletState::default(),
            Action::Hydrate {
                portfolio: tokens,
                watchlist: vec![],
            },
        )
    }

    #[test]
    fn test_summary_memoized_by_identity() {
        let selectors = Selectors::new();
        let state = with_portfolio(vec![PortfolioToken::new(
            token("btc", 50_000.0, 10.0),
            0.1,
            None,
            Utc::now(),
        )]);

        let first = selectors.portfolio_summary(&state);
        let second = selectors.portfolio_summary(&state);
        // Same input collection: cached value including its timestamp
        assert_eq!(first, second);

        let state = reduce(
            state,
            Action::UpdateHoldings {
                id: "btc".to_string(),
                holdings: 0.2,
            },
        );
        let third = selectors.portfolio_summary(&state);
        assert!((third.total_value - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_allocation_recomputed_after_change() {
        let selectors = Selectors::new();
        let state = with_portfolio(vec![
            PortfolioToken::new(token("a", 1.0, 0.0), 1.0, None, Utc::now()),
            PortfolioToken::new(token("b", 1.0, 0.0), 3.0, None, Utc::now()),
        ]);

        let allocation = selectors.portfolio_allocation(&state);
        assert_eq!(allocation[0].id, "b");
        assert!((allocation[0].percentage - 75.0).abs() < 1e-9);

        let state = reduce(state, Action::RemoveFromPortfolio("b".to_string()));
        let allocation = selectors.portfolio_allocation(&state);
        assert_eq!(allocation.len(), 1);
        assert!((allocation[0].percentage - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_needs_refresh_threshold() {
        let mut state = WalletState::default();
        let flags = needs_refresh(&state, 0);
        assert!(flags.portfolio && flags.watchlist && flags.market_tokens);

        state.slots.watchlist.last_success = Some(1_000);
        let threshold = STALENESS_THRESHOLD.as_millis() as i64;

        assert!(!needs_refresh(&state, 1_000 + threshold).watchlist);
        assert!(needs_refresh(&state, 1_000 + threshold + 1).watchlist);
        assert!(needs_refresh(&state, 1_000).any());
    }

    #[test]
    fn test_all_tokens_merges_sources() {
        let state = with_portfolio(vec![PortfolioToken::new(
            token("btc", 1.0, 0.0),
            1.0,
            None,
            Utc::now(),
        )]);
        let mut state = reduce(state, Action::AddToWatchlist(token("eth", 1.0, 0.0)));
        state.market_tokens = Arc::new(vec![token("btc", 1.0, 0.0), token("sol", 1.0, 0.0)]);

        let listed = all_tokens(&state);
        let sources: Vec<(&str, TokenSource)> =
            listed.iter().map(|t| (t.token.id.as_str(), t.source)).collect();
        assert_eq!(
            sources,
            vec![
                ("btc", TokenSource::Portfolio),
                ("eth", TokenSource::Watchlist),
                ("sol", TokenSource::Market),
            ]
        );
    }

    #[test]
    fn test_loading_and_error_states() {
        let state = reduce(WalletState::default(), Action::FetchStarted(SlotKind::Trending));
        assert!(loading_states(&state).is_any_loading);

        let id = state.slots.trending.request_id;
        let state = reduce(
            state,
            Action::FetchFailed {
                slot: SlotKind::Trending,
                request_id: id,
                error: "down".to_string(),
            },
        );
        let errors = error_states(&state);
        assert!(errors.has_errors);
        assert_eq!(errors.errors.get(&SlotKind::Trending).map(String::as_str), Some("down"));
        assert!(!loading_states(&state).is_any_loading);
    }

    #[test]
    fn test_membership_lookups() {
        let state = with_portfolio(vec![PortfolioToken::new(
            token("btc", 2.0, 0.0),
            3.0,
            None,
            Utc::now(),
        )]);

        assert!(is_token_in_portfolio(&state, "btc"));
        assert!(!is_token_in_watchlist(&state, "btc"));
        assert_eq!(portfolio_token_by_id(&state, "btc").map(|t| t.value()), Some(6.0));
        assert!(portfolio_token_by_id(&state, "eth").is_none());
    }
}
