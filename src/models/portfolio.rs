use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::Token;

/// A held token. `value` always equals `current_price * holdings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioToken {
    #[serde(flatten)]
    pub token: Token,
    holdings: f64,
    value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "dateAdded")]
    pub date_added: DateTime<Utc>,
}

impl PortfolioToken {
    pub fn new(
        token: Token,
        holdings: f64,
        color: Option<String>,
        date_added: DateTime<Utc>,
    ) -> Self {
        let value = token.current_price * holdings;
        Self {
            token,
            holdings,
            value,
            color,
            date_added,
        }
    }

    pub fn id(&self) -> &str {
        &self.token.id
    }

    pub fn holdings(&self) -> f64 {
        self.holdings
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_holdings(&mut self, holdings: f64) {
        self.holdings = holdings;
        self.value = self.token.current_price * holdings;
    }
}

/// Share of total portfolio value held in one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub value: f64,
    pub percentage: f64,
    pub holdings: f64,
    pub current_price: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub total_change_24h: f64,
    pub total_change_percent_24h: f64,
    pub token_count: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub total_tokens: usize,
    pub gainers: usize,
    pub losers: usize,
    pub neutral: usize,
}

/// What a portfolio refresh is rebuilt from
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSeed {
    pub id: String,
    pub holdings: f64,
    pub color: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
}

/// Display fields persisted alongside the holdings map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingMeta {
    pub color: Option<String>,
    pub date_added: DateTime<Utc>,
}

impl From<&PortfolioToken> for HoldingMeta {
    fn from(token: &PortfolioToken) -> Self {
        Self {
            color: token.color.clone(),
            date_added: token.date_added,
        }
    }
}

/// Request body for POST /portfolio/tokens
#[derive(Debug, Clone, Deserialize)]
pub struct AddPortfolioTokenRequest {
    pub id: String,
    pub holdings: f64,
}

/// Request body for PUT /portfolio/tokens/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateHoldingsRequest {
    pub holdings: f64,
}
