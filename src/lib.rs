// src/lib.rs

use std::sync::Arc;

use services::rate_limiter::RateLimiter;
use store::PortfolioStore;

#[derive(Clone)]
pub struct AppState {
    pub store: PortfolioStore,
    pub rate_limiter: Arc<RateLimiter>,
}

pub mod services {
    pub mod aggregate;
    pub mod coingecko;
    pub mod market_data;
    pub mod rate_limiter;
    pub mod storage;
    pub mod transform;
}

pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod store;
