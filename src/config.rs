// Configuration loading and settings
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_API_KEY_HEADER: &str = "x-cg-demo-api-key";

#[derive(Debug, Clone)]
pub struct Config {
    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,
    pub api_key_header: String,
    pub request_timeout: Duration,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window: Duration,
    pub detail_cache_ttl: Duration,
    pub refresh_interval: Duration,
    pub storage_path: PathBuf,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coingecko_base_url: DEFAULT_BASE_URL.to_string(),
            coingecko_api_key: None,
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            request_timeout: Duration::from_secs(15),
            rate_limit_max_requests: 25,
            rate_limit_window: Duration::from_millis(60_000),
            detail_cache_ttl: Duration::from_secs(60),
            refresh_interval: Duration::from_secs(60),
            storage_path: PathBuf::from("portfolio-store.json"),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Config {
            coingecko_base_url: env::var("COINGECKO_BASE_URL")
                .unwrap_or(defaults.coingecko_base_url),
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty()),
            api_key_header: env::var("COINGECKO_API_KEY_HEADER")
                .unwrap_or(defaults.api_key_header),
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            rate_limit_max_requests: parse_or(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_window: Duration::from_millis(parse_or(
                "RATE_LIMIT_WINDOW_MS",
                defaults.rate_limit_window.as_millis() as u64,
            )),
            detail_cache_ttl: Duration::from_secs(parse_or(
                "DETAIL_CACHE_TTL_SECS",
                defaults.detail_cache_ttl.as_secs(),
            )),
            refresh_interval: Duration::from_secs(parse_or(
                "REFRESH_INTERVAL_SECS",
                defaults.refresh_interval.as_secs(),
            )),
            storage_path: env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value '{}' for {}, using {}", raw, key, default);
            default
        }),
        Err(_) => default,
    }
}
