use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{header::ACCEPT, Client, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::token::{
    CoinDetail, MarketCoin, PingResponse, SearchCoin, SearchResponse, SimplePrices, TrendingCoin,
    TrendingResponse,
};
use crate::services::market_data::{MarketDataApi, MarketsParams, DEFAULT_VS_CURRENCY};
use crate::services::rate_limiter::{RateLimitStatus, RateLimiter};

pub const MIN_SEARCH_QUERY_LEN: usize = 2;

#[derive(Clone)]
pub struct CoinGeckoService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_key_header: String,
    limiter: Arc<RateLimiter>,
    detail_cache: Arc<Cache<String, CoinDetail>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplePriceOptions {
    pub vs_currencies: Vec<String>,
    pub include_market_cap: bool,
    pub include_24hr_vol: bool,
    pub include_24hr_change: bool,
    pub include_last_updated_at: bool,
}

impl Default for SimplePriceOptions {
    fn default() -> Self {
        Self {
            vs_currencies: vec![DEFAULT_VS_CURRENCY.to_string()],
            include_market_cap: false,
            include_24hr_vol: false,
            include_24hr_change: true,
            include_last_updated_at: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoinDetailOptions {
    pub localization: bool,
    pub tickers: bool,
    pub market_data: bool,
    pub community_data: bool,
    pub developer_data: bool,
    pub sparkline: bool,
}

impl Default for CoinDetailOptions {
    fn default() -> Self {
        Self {
            localization: false,
            tickers: false,
            market_data: true,
            community_data: false,
            developer_data: false,
            sparkline: false,
        }
    }
}

impl CoinDetailOptions {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("localization", self.localization.to_string()),
            ("tickers", self.tickers.to_string()),
            ("market_data", self.market_data.to_string()),
            ("community_data", self.community_data.to_string()),
            ("developer_data", self.developer_data.to_string()),
            ("sparkline", self.sparkline.to_string()),
        ]
    }
}

/// Join base and endpoint path and append only the non-empty query parameters.
pub fn build_url(
    base_url: &str,
    path: &str,
    params: &[(&'static str, String)],
) -> Result<Url, ApiError> {
    let mut url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), path))
        .map_err(|e| ApiError::Validation(format!("Invalid request url: {}", e)))?;

    let present: Vec<&(&str, String)> = params
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect();

    if !present.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in present {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Coin ids are used as a path segment, so only the provider's id alphabet is allowed.
pub fn validate_coin_id(id: &str) -> Result<(), ApiError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("Invalid token id '{}'", id)))
    }
}

impl CoinGeckoService {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let limiter = RateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window);
        Self::with_limiter(config, Arc::new(limiter))
    }

    pub fn with_limiter(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::from)?;

        let cache = Cache::builder()
            .max_capacity(200)
            .time_to_live(config.detail_cache_ttl)
            .build();

        Ok(Self {
            client,
            base_url: config.coingecko_base_url.clone(),
            api_key: config.coingecko_api_key.clone().filter(|k| !k.is_empty()),
            api_key_header: config.api_key_header.clone(),
            limiter,
            detail_cache: Arc::new(cache),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limit_status(&self) -> RateLimitStatus {
        self.limiter.status()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        self.limiter.check_and_record()?;

        let url = build_url(&self.base_url, path, params)?;
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header(self.api_key_header.as_str(), key.as_str());
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("Market data API error {} on {}: {}", status, path, error_text);
            return Err(ApiError::from_status(status));
        }

        let body = response.text().await?;
        let data = serde_json::from_str(&body)?;
        Ok(data)
    }

    pub async fn ping(&self) -> Result<PingResponse, ApiError> {
        self.get_json("/ping", &[]).await
    }

    pub async fn get_coins_markets(
        &self,
        params: &MarketsParams,
    ) -> Result<Vec<MarketCoin>, ApiError> {
        tracing::info!(
            "Fetching market data (page {}, per_page {}, {} ids)",
            params.page,
            params.per_page,
            params.ids.len()
        );

        let coins: Vec<MarketCoin> = self.get_json("/coins/markets", &params.query_pairs()).await?;

        for coin in &coins {
            coin.validate().map_err(ApiError::Decode)?;
        }

        tracing::info!("Fetched {} market records", coins.len());
        Ok(coins)
    }

    pub async fn get_simple_price(
        &self,
        ids: &[String],
        options: &SimplePriceOptions,
    ) -> Result<SimplePrices, ApiError> {
        if ids.is_empty() {
            return Err(ApiError::Validation("Token IDs array cannot be empty".to_string()));
        }

        let params = [
            ("ids", ids.join(",")),
            ("vs_currencies", options.vs_currencies.join(",")),
            ("include_market_cap", options.include_market_cap.to_string()),
            ("include_24hr_vol", options.include_24hr_vol.to_string()),
            ("include_24hr_change", options.include_24hr_change.to_string()),
            ("include_last_updated_at", options.include_last_updated_at.to_string()),
        ];

        self.get_json("/simple/price", &params).await
    }

    pub async fn search_coins(&self, query: &str) -> Result<Vec<SearchCoin>, ApiError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_QUERY_LEN {
            return Err(ApiError::Validation(
                "Search query must be at least 2 characters".to_string(),
            ));
        }

        let response: SearchResponse = self
            .get_json("/search", &[("query", query.to_string())])
            .await?;

        tracing::info!("Search '{}' returned {} coins", query, response.coins.len());
        Ok(response.coins)
    }

    pub async fn get_trending_coins(&self) -> Result<Vec<TrendingCoin>, ApiError> {
        let response: TrendingResponse = self.get_json("/search/trending", &[]).await?;
        tracing::info!("Fetched {} trending coins", response.coins.len());
        Ok(response.coins)
    }

    pub async fn get_coin_detail(
        &self,
        id: &str,
        options: &CoinDetailOptions,
    ) -> Result<CoinDetail, ApiError> {
        validate_coin_id(id)?;

        let cacheable = *options == CoinDetailOptions::default();
        if cacheable {
            if let Some(cached) = self.detail_cache.get(id).await {
                tracing::debug!("Cache hit for coin detail {}", id);
                return Ok(cached);
            }
        }

        let path = format!("/coins/{}", id);
        let detail: CoinDetail = self.get_json(&path, &options.query_pairs()).await?;

        if detail.id.is_empty() {
            return Err(ApiError::Decode(format!("coin detail for '{}' without id", id)));
        }

        if cacheable {
            self.detail_cache.insert(id.to_string(), detail.clone()).await;
        }

        Ok(detail)
    }
}

#[async_trait]
impl MarketDataApi for CoinGeckoService {
    async fn coins_markets(&self, params: &MarketsParams) -> Result<Vec<MarketCoin>, ApiError> {
        self.get_coins_markets(params).await
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchCoin>, ApiError> {
        self.search_coins(query).await
    }

    async fn trending(&self) -> Result<Vec<TrendingCoin>, ApiError> {
        self.get_trending_coins().await
    }

    async fn coin_detail(&self, id: &str) -> Result<CoinDetail, ApiError> {
        self.get_coin_detail(id, &CoinDetailOptions::default()).await
    }

    async fn simple_prices(&self, ids: &[String]) -> Result<SimplePrices, ApiError> {
        self.get_simple_price(ids, &SimplePriceOptions::default()).await
    }

    async fn ping(&self) -> Result<PingResponse, ApiError> {
        CoinGeckoService::ping(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> Config {
        Config {
            coingecko_base_url: base_url.to_string(),
            request_timeout: Duration::from_secs(2),
            ..Config::default()
        }
    }

    #[test]
    fn test_build_url_skips_empty_params() {
        let url = build_url(
            "https://api.example.com/api/v3/",
            "/coins/markets",
            &[
                ("vs_currency", "usd".to_string()),
                ("ids", String::new()),
                ("order", "  ".to_string()),
                ("page", "1".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v3/coins/markets?vs_currency=usd&page=1"
        );
    }

    #[test]
    fn test_build_url_without_params_has_no_query() {
        let url = build_url("https://api.example.com/api/v3", "/ping", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/api/v3/ping");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_build_url_encodes_values() {
        let url = build_url(
            "https://api.example.com",
            "/search",
            &[("query", "shiba inu".to_string())],
        )
        .unwrap();
        assert_eq!(url.query(), Some("query=shiba+inu"));
    }

    #[test]
    fn test_validate_coin_id() {
        assert!(validate_coin_id("bitcoin").is_ok());
        assert!(validate_coin_id("usd-coin").is_ok());
        assert!(validate_coin_id("").is_err());
        assert!(validate_coin_id("../admin").is_err());
        assert!(validate_coin_id("a b").is_err());
    }

    #[tokio::test]
    async fn test_short_search_does_not_touch_limiter() {
        let service = CoinGeckoService::new(&test_config("http://127.0.0.1:9")).unwrap();

        let result = service.search_coins(" e ").await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(service.rate_limit_status().requests, 0);
    }

    #[tokio::test]
    async fn test_empty_simple_price_ids_rejected() {
        let service = CoinGeckoService::new(&test_config("http://127.0.0.1:9")).unwrap();

        let result = service.get_simple_price(&[], &SimplePriceOptions::default()).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_aborts_before_request() {
        let limiter = Arc::new(RateLimiter::new(0, Duration::from_secs(60)));
        let service =
            CoinGeckoService::with_limiter(&test_config("http://127.0.0.1:9"), limiter).unwrap();

        let result = service.get_coins_markets(&MarketsParams::default()).await;
        assert!(matches!(result, Err(ApiError::RateLimitExceeded { wait_ms }) if wait_ms > 0));
    }
}
