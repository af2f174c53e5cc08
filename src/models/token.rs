use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered price history, most recent last
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sparkline {
    #[serde(default)]
    pub price: Vec<f64>,
}

/// Raw record returned by `/coins/markets`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub sparkline_in_7d: Option<Sparkline>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl MarketCoin {
    /// Reject records that would poison derived values downstream.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("market record without id".to_string());
        }

        if let Some(price) = self.current_price {
            if !price.is_finite() || price < 0.0 {
                return Err(format!("market record '{}' has invalid price {}", self.id, price));
            }
        }

        if let Some(change) = self.price_change_percentage_24h {
            if !change.is_finite() {
                return Err(format!("market record '{}' has invalid 24h change", self.id));
            }
        }

        Ok(())
    }
}

/// Token as held in the watchlist and market list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub image: String,
    pub current_price: f64,
    pub market_cap: f64,
    /// `None` means unranked
    pub market_cap_rank: Option<u32>,
    pub price_change_percentage_24h: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparkline_in_7d: Option<Sparkline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Entry of the `/search` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub large: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub coins: Vec<SearchCoin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingItem {
    pub id: String,
    #[serde(default)]
    pub coin_id: u64,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub small: String,
    #[serde(default)]
    pub large: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub price_btc: f64,
    #[serde(default)]
    pub score: u32,
}

/// Entry of the `/search/trending` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub item: TrendingItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingResponse {
    #[serde(default)]
    pub coins: Vec<TrendingCoin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub gecko_says: String,
}

/// `/simple/price` body: coin id -> field (e.g. "usd", "usd_24h_change") -> value
pub type SimplePrices = HashMap<String, HashMap<String, Option<f64>>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinImage {
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub small: String,
    #[serde(default)]
    pub large: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinMarketData {
    #[serde(default)]
    pub current_price: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap: HashMap<String, f64>,
    pub price_change_percentage_24h: Option<f64>,
}

/// `/coins/{id}` body, reduced to the fields the tracker reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub image: CoinImage,
    #[serde(default)]
    pub market_data: Option<CoinMarketData>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_coin_accepts_nulls() {
        let raw = r#"{
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "image": "https://example.com/btc.png",
            "current_price": null,
            "market_cap": null,
            "market_cap_rank": null,
            "price_change_percentage_24h": null
        }"#;

        let coin: MarketCoin = serde_json::from_str(raw).unwrap();
        assert!(coin.validate().is_ok());
        assert!(coin.sparkline_in_7d.is_none());
    }

    #[test]
    fn test_market_coin_rejects_negative_price() {
        let raw = r#"{"id":"x","symbol":"x","name":"X","current_price":-1.0}"#;
        let coin: MarketCoin = serde_json::from_str(raw).unwrap();
        assert!(coin.validate().is_err());
    }

    #[test]
    fn test_market_coin_requires_id() {
        let raw = r#"{"symbol":"x","name":"X","current_price":1.0}"#;
        assert!(serde_json::from_str::<MarketCoin>(raw).is_err());
    }
}
