use serde::{Deserialize, Serialize};

/// Query parameters for GET /market
#[derive(Debug, Clone, Deserialize)]
pub struct MarketQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Query parameters for GET /search
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Query parameters for GET /prices, ids comma-separated
#[derive(Debug, Clone, Deserialize)]
pub struct PriceQuery {
    #[serde(default)]
    pub ids: String,
}

impl PriceQuery {
    pub fn id_list(&self) -> Vec<String> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Request body for POST /watchlist
#[derive(Debug, Clone, Deserialize)]
pub struct AddWatchlistRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationResponse {
    pub id: String,
    pub changed: bool,
}
