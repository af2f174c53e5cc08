use std::sync::Arc;

use portfolio_tracker::{
    config::Config,
    handlers,
    jobs::refresh_sync::start_refresh_sync_job,
    services::{
        coingecko::CoinGeckoService,
        rate_limiter::RateLimiter,
        storage::{FileStore, PortfolioStorage},
    },
    store::PortfolioStore,
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,portfolio_tracker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    let config = Config::from_env();

    tracing::info!("Opening storage at {}", config.storage_path.display());
    let file_store = FileStore::open(&config.storage_path).expect("Failed to open storage file");
    let storage = PortfolioStorage::new(Arc::new(file_store));

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window,
    ));
    let coingecko = CoinGeckoService::with_limiter(&config, Arc::clone(&rate_limiter))
        .expect("Failed to build market data client");
    tracing::info!("Using market data API at {}", coingecko.base_url());

    let store = PortfolioStore::new(Arc::new(coingecko), storage);
    store.hydrate().await;

    // Start background jobs
    start_refresh_sync_job(store.clone(), config.refresh_interval).await;

    let state = AppState {
        store,
        rate_limiter,
    };
    let app = handlers::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listener");

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Server listening on {}", addr);
    }

    axum::serve(listener, app).await.expect("Server error");
}
