use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::token::{CoinDetail, MarketCoin, PingResponse, SearchCoin, SimplePrices, TrendingCoin};

pub const DEFAULT_VS_CURRENCY: &str = "usd";

/// Largest page `/coins/markets` serves; id lists beyond this are fetched in chunks
pub const MAX_IDS_PER_REQUEST: usize = 250;

/// Parameters for `/coins/markets`. Defaults match the provider's dashboard usage.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketsParams {
    pub vs_currency: String,
    pub ids: Vec<String>,
    pub order: String,
    pub per_page: u32,
    pub page: u32,
    pub sparkline: bool,
    pub price_change_percentage: String,
}

impl Default for MarketsParams {
    fn default() -> Self {
        Self {
            vs_currency: DEFAULT_VS_CURRENCY.to_string(),
            ids: Vec::new(),
            order: "market_cap_desc".to_string(),
            per_page: 10,
            page: 1,
            sparkline: true,
            price_change_percentage: "24h".to_string(),
        }
    }
}

impl MarketsParams {
    /// One page containing exactly the given ids. Callers split lists longer
    /// than [`MAX_IDS_PER_REQUEST`].
    pub fn for_ids(ids: Vec<String>) -> Self {
        let per_page = ids.len().clamp(1, MAX_IDS_PER_REQUEST) as u32;
        Self {
            ids,
            per_page,
            ..Default::default()
        }
    }

    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            ..Default::default()
        }
    }

    /// Query pairs in provider naming; empty values are dropped later.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("vs_currency", self.vs_currency.clone()),
            ("ids", self.ids.join(",")),
            ("order", self.order.clone()),
            ("per_page", self.per_page.to_string()),
            ("page", self.page.to_string()),
            ("sparkline", self.sparkline.to_string()),
            ("price_change_percentage", self.price_change_percentage.clone()),
        ]
    }
}

/// The market-data operations the store depends on
#[async_trait]
pub trait MarketDataApi: Send + Sync {
    async fn coins_markets(&self, params: &MarketsParams) -> Result<Vec<MarketCoin>, ApiError>;

    async fn search(&self, query: &str) -> Result<Vec<SearchCoin>, ApiError>;

    async fn trending(&self) -> Result<Vec<TrendingCoin>, ApiError>;

    /// Default-option detail for one coin
    async fn coin_detail(&self, id: &str) -> Result<CoinDetail, ApiError>;

    /// USD price and 24h change for the given ids
    async fn simple_prices(&self, ids: &[String]) -> Result<SimplePrices, ApiError>;

    async fn ping(&self) -> Result<PingResponse, ApiError>;
}

/// Fetch market records for any number of ids, one request per
/// [`MAX_IDS_PER_REQUEST`] ids. The first failing chunk fails the whole fetch.
pub async fn markets_for_ids(
    api: &dyn MarketDataApi,
    ids: &[String],
) -> Result<Vec<MarketCoin>, ApiError> {
    let mut coins = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
        let params = MarketsParams::for_ids(chunk.to_vec());
        coins.extend(api.coins_markets(&params).await?);
    }
    Ok(coins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markets_defaults() {
        let params = MarketsParams::default();
        let pairs = params.query_pairs();

        assert!(pairs.contains(&("vs_currency", "usd".to_string())));
        assert!(pairs.contains(&("order", "market_cap_desc".to_string())));
        assert!(pairs.contains(&("per_page", "10".to_string())));
        assert!(pairs.contains(&("page", "1".to_string())));
        assert!(pairs.contains(&("sparkline", "true".to_string())));
        assert!(pairs.contains(&("price_change_percentage", "24h".to_string())));
        assert!(pairs.contains(&("ids", String::new())));
    }

    #[test]
    fn test_for_ids_sizes_page() {
        let params = MarketsParams::for_ids(vec!["bitcoin".into(), "ethereum".into()]);
        assert_eq!(params.per_page, 2);
        assert_eq!(params.ids.join(","), "bitcoin,ethereum");
    }

    #[test]
    fn test_for_ids_page_never_exceeds_provider_max() {
        let ids: Vec<String> = (0..MAX_IDS_PER_REQUEST + 10).map(|i| format!("coin-{}", i)).collect();
        assert_eq!(MarketsParams::for_ids(ids).per_page, 250);
        assert_eq!(MarketsParams::for_ids(Vec::new()).per_page, 1);
    }
}
