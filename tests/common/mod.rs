#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use portfolio_tracker::{
    error::ApiError,
    handlers,
    models::token::{
        CoinDetail, CoinImage, CoinMarketData, MarketCoin, PingResponse, SearchCoin, SimplePrices,
        Sparkline, TrendingCoin, TrendingItem,
    },
    services::{
        market_data::{MarketDataApi, MarketsParams},
        rate_limiter::RateLimiter,
        storage::{KeyValueStore, MemoryStore, PortfolioStorage},
    },
    store::PortfolioStore,
    AppState,
};

/// Holds one `coins_markets` call open until released.
///
/// The first request whose ids include `id` signals `entered` and waits on
/// `release`; the response is built from the catalogue as it is at release.
pub struct Gate {
    pub id: String,
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

/// Market data provider backed by a fixed catalogue.
///
/// `coins_markets` answers id-filtered requests from the catalogue and
/// unfiltered ones with the whole catalogue. Setting `fail_with` makes every
/// call return that error.
#[derive(Default)]
pub struct MockMarketApi {
    pub catalogue: Mutex<Vec<MarketCoin>>,
    pub search_results: Mutex<Vec<SearchCoin>>,
    pub trending: Mutex<Vec<TrendingCoin>>,
    pub fail_with: Mutex<Option<ApiError>>,
    pub markets_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub trending_calls: AtomicUsize,
    pub last_params: Mutex<Option<MarketsParams>>,
    pub gate: Mutex<Option<Arc<Gate>>>,
}

impl MockMarketApi {
    pub fn with_catalogue(coins: Vec<MarketCoin>) -> Self {
        Self {
            catalogue: Mutex::new(coins),
            ..Default::default()
        }
    }

    pub fn set_price(&self, id: &str, price: f64) {
        if let Some(coin) = self.catalogue.lock().iter_mut().find(|c| c.id == id) {
            coin.current_price = Some(price);
        }
    }

    pub fn fail(&self, error: ApiError) {
        *self.fail_with.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.fail_with.lock() = None;
    }

    pub fn markets_calls(&self) -> usize {
        self.markets_calls.load(Ordering::SeqCst)
    }

    /// Gate the next markets request that asks for `id`
    pub fn hold(&self, id: &str) -> Arc<Gate> {
        let gate = Gate::new(id);
        *self.gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), ApiError> {
        match self.fail_with.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataApi for MockMarketApi {
    async fn coins_markets(&self, params: &MarketsParams) -> Result<Vec<MarketCoin>, ApiError> {
        self.markets_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock() = Some(params.clone());

        let gate = {
            let mut slot = self.gate.lock();
            match slot.as_ref() {
                Some(gate) if params.ids.contains(&gate.id) => slot.take(),
                _ => None,
            }
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.check_failure()?;

        let catalogue = self.catalogue.lock();
        if params.ids.is_empty() {
            return Ok(catalogue.iter().take(params.per_page as usize).cloned().collect());
        }

        Ok(catalogue
            .iter()
            .filter(|c| params.ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchCoin>, ApiError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.search_results.lock().clone())
    }

    async fn trending(&self) -> Result<Vec<TrendingCoin>, ApiError> {
        self.trending_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.trending.lock().clone())
    }

    async fn coin_detail(&self, id: &str) -> Result<CoinDetail, ApiError> {
        self.check_failure()?;
        let catalogue = self.catalogue.lock();
        let coin = catalogue
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ApiError::UnknownToken(id.to_string()))?;

        Ok(CoinDetail {
            id: coin.id.clone(),
            symbol: coin.symbol.clone(),
            name: coin.name.clone(),
            market_cap_rank: coin.market_cap_rank,
            image: CoinImage {
                thumb: coin.image.clone(),
                small: coin.image.clone(),
                large: coin.image.clone(),
            },
            market_data: Some(CoinMarketData {
                current_price: HashMap::from([("usd".to_string(), coin.current_price.unwrap_or_default())]),
                market_cap: HashMap::from([("usd".to_string(), coin.market_cap.unwrap_or_default())]),
                price_change_percentage_24h: coin.price_change_percentage_24h,
            }),
            last_updated: coin.last_updated.clone(),
        })
    }

    async fn simple_prices(&self, ids: &[String]) -> Result<SimplePrices, ApiError> {
        self.check_failure()?;
        Ok(self
            .catalogue
            .lock()
            .iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| {
                let fields = HashMap::from([
                    ("usd".to_string(), c.current_price),
                    ("usd_24h_change".to_string(), c.price_change_percentage_24h),
                ]);
                (c.id.clone(), fields)
            })
            .collect())
    }

    async fn ping(&self) -> Result<PingResponse, ApiError> {
        self.check_failure()?;
        Ok(PingResponse {
            gecko_says: "(V3) To the Moon!".to_string(),
        })
    }
}

pub fn market_coin(id: &str, price: f64, change_24h: f64) -> MarketCoin {
    MarketCoin {
        id: id.to_string(),
        symbol: id.chars().take(3).collect(),
        name: format!("{} coin", id),
        image: format!("https://assets.example.com/{}.png", id),
        current_price: Some(price),
        market_cap: Some(price * 1_000_000.0),
        market_cap_rank: Some(1),
        price_change_percentage_24h: Some(change_24h),
        sparkline_in_7d: Some(Sparkline {
            price: vec![price * 0.9, price],
        }),
        last_updated: Some("2024-01-01T00:00:00Z".to_string()),
    }
}

pub fn search_coin(id: &str) -> SearchCoin {
    SearchCoin {
        id: id.to_string(),
        name: format!("{} coin", id),
        symbol: id.to_uppercase(),
        market_cap_rank: Some(7),
        thumb: format!("https://assets.example.com/{}-thumb.png", id),
        large: format!("https://assets.example.com/{}-large.png", id),
    }
}

pub fn trending_coin(id: &str, score: u32) -> TrendingCoin {
    TrendingCoin {
        item: TrendingItem {
            id: id.to_string(),
            coin_id: 1,
            name: format!("{} coin", id),
            symbol: id.to_uppercase(),
            market_cap_rank: Some(10),
            thumb: String::new(),
            small: String::new(),
            large: String::new(),
            slug: id.to_string(),
            price_btc: 0.0001,
            score,
        },
    }
}

/// Catalogue with three coins: bitcoin, ethereum, solana
pub fn default_catalogue() -> Vec<MarketCoin> {
    vec![
        market_coin("bitcoin", 50_000.0, 10.0),
        market_coin("ethereum", 3_000.0, -5.0),
        market_coin("solana", 100.0, 0.0),
    ]
}

pub struct TestContext {
    pub api: Arc<MockMarketApi>,
    pub kv: Arc<MemoryStore>,
    pub store: PortfolioStore,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_api(MockMarketApi::with_catalogue(default_catalogue()))
    }

    pub fn with_api(api: MockMarketApi) -> Self {
        let api = Arc::new(api);
        let kv = Arc::new(MemoryStore::new());
        let store = Self::store_over(&api, &kv);
        Self { api, kv, store }
    }

    /// A second store sharing this context's storage, as after a restart
    pub fn restarted(&self) -> PortfolioStore {
        Self::store_over(&self.api, &self.kv)
    }

    /// Typed view of what this context's store has persisted
    pub fn storage(&self) -> PortfolioStorage {
        let kv: Arc<dyn KeyValueStore> = self.kv.clone();
        PortfolioStorage::new(kv)
    }

    fn store_over(api: &Arc<MockMarketApi>, kv: &Arc<MemoryStore>) -> PortfolioStore {
        let kv: Arc<dyn KeyValueStore> = kv.clone();
        let api: Arc<dyn MarketDataApi> = api.clone();
        PortfolioStore::new(api, PortfolioStorage::new(kv))
    }

    pub fn router(&self) -> Router {
        handlers::router(AppState {
            store: self.store.clone(),
            rate_limiter: Arc::new(RateLimiter::default()),
        })
    }
}
