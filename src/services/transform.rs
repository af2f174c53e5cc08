//! Pure mappers from raw market records into the tracker's token shapes.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::portfolio::{AllocationEntry, PortfolioSeed, PortfolioToken};
use crate::models::token::{MarketCoin, Sparkline, Token};

pub const PORTFOLIO_PALETTE: [&str; 15] = [
    "#F7931A", "#627EEA", "#9945FF", "#00D4AA", "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4",
    "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E9", "#F8C471",
];

pub const FALLBACK_COLOR: &str = "#666666";

pub fn palette_color(index: usize) -> String {
    PORTFOLIO_PALETTE[index % PORTFOLIO_PALETTE.len()].to_string()
}

pub fn to_token(data: &MarketCoin) -> Token {
    Token {
        id: data.id.clone(),
        name: data.name.clone(),
        symbol: data.symbol.clone(),
        image: data.image.clone(),
        current_price: data.current_price.unwrap_or(0.0),
        market_cap: data.market_cap.unwrap_or(0.0),
        market_cap_rank: data.market_cap_rank,
        price_change_percentage_24h: data.price_change_percentage_24h.unwrap_or(0.0),
        sparkline_in_7d: data.sparkline_in_7d.clone(),
        last_updated: data.last_updated.clone(),
    }
}

pub fn to_portfolio_token(
    data: &MarketCoin,
    holdings: f64,
    palette_index: Option<usize>,
    now: DateTime<Utc>,
) -> PortfolioToken {
    PortfolioToken::new(to_token(data), holdings, palette_index.map(palette_color), now)
}

/// Zero-valued stand-in for an id the market data did not resolve
pub fn placeholder_token(id: &str, now: DateTime<Utc>) -> Token {
    Token {
        id: id.to_string(),
        name: id.to_string(),
        symbol: id.to_string(),
        image: String::new(),
        current_price: 0.0,
        market_cap: 0.0,
        market_cap_rank: None,
        price_change_percentage_24h: 0.0,
        sparkline_in_7d: Some(Sparkline::default()),
        last_updated: Some(now.to_rfc3339()),
    }
}

/// Rebuild portfolio entries from their seeds and fresh market data.
///
/// Every seed yields exactly one entry, in seed order before the final sort.
/// Seeds keep their colour and `dateAdded`; a seed without a colour gets the
/// palette colour of its position. The result is sorted by value, descending,
/// with ties keeping seed order.
pub fn build_portfolio(
    seeds: &[PortfolioSeed],
    market: &[MarketCoin],
    now: DateTime<Utc>,
) -> Vec<PortfolioToken> {
    let by_id: HashMap<&str, &MarketCoin> = market.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut tokens: Vec<PortfolioToken> = seeds
        .iter()
        .enumerate()
        .map(|(index, seed)| {
            let token = match by_id.get(seed.id.as_str()) {
                Some(data) => to_token(data),
                None => {
                    tracing::warn!("No market data for '{}', using placeholder", seed.id);
                    placeholder_token(&seed.id, now)
                }
            };

            let color = seed.color.clone().unwrap_or_else(|| palette_color(index));
            PortfolioToken::new(token, seed.holdings, Some(color), seed.date_added.unwrap_or(now))
        })
        .collect();

    tokens.sort_by(|a, b| b.value().total_cmp(&a.value()));
    tokens
}

/// Re-price the current portfolio from a fetch issued for `requested` ids.
///
/// Entries keep their holdings, colour and `dateAdded`. An entry without a
/// market record becomes a placeholder only if it was part of the request;
/// entries added after the request went out are kept as they are.
pub fn refresh_portfolio(
    current: &[PortfolioToken],
    market: &[MarketCoin],
    requested: &[String],
    now: DateTime<Utc>,
) -> Vec<PortfolioToken> {
    let by_id: HashMap<&str, &MarketCoin> = market.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut tokens: Vec<PortfolioToken> = current
        .iter()
        .enumerate()
        .map(|(index, held)| {
            let token = match by_id.get(held.id()) {
                Some(data) => to_token(data),
                None if requested.iter().any(|id| id == held.id()) => {
                    tracing::warn!("No market data for '{}', using placeholder", held.id());
                    placeholder_token(held.id(), now)
                }
                None => return held.clone(),
            };

            let color = held.color.clone().unwrap_or_else(|| palette_color(index));
            PortfolioToken::new(token, held.holdings(), Some(color), held.date_added)
        })
        .collect();

    tokens.sort_by(|a, b| b.value().total_cmp(&a.value()));
    tokens
}

/// Re-price the current watchlist, in order. Requested ids with no market
/// record become placeholders; ids added after the request are left alone.
pub fn refresh_watchlist(
    current: &[Token],
    market: &[MarketCoin],
    requested: &[String],
    now: DateTime<Utc>,
) -> Vec<Token> {
    let by_id: HashMap<&str, &MarketCoin> = market.iter().map(|c| (c.id.as_str(), c)).collect();

    current
        .iter()
        .map(|token| match by_id.get(token.id.as_str()) {
            Some(data) => to_token(data),
            None if requested.contains(&token.id) => placeholder_token(&token.id, now),
            None => token.clone(),
        })
        .collect()
}

/// Percentage-of-total breakdown over tokens with positive value, largest first.
pub fn allocation(tokens: &[PortfolioToken]) -> Vec<AllocationEntry> {
    let held: Vec<&PortfolioToken> = tokens.iter().filter(|t| t.value() > 0.0).collect();
    let total_value: f64 = held.iter().map(|t| t.value()).sum();

    if total_value <= 0.0 || !total_value.is_finite() {
        return Vec::new();
    }

    let mut entries: Vec<AllocationEntry> = held
        .into_iter()
        .map(|t| AllocationEntry {
            id: t.token.id.clone(),
            name: t.token.name.clone(),
            symbol: t.token.symbol.to_uppercase(),
            value: t.value(),
            percentage: t.value() / total_value * 100.0,
            holdings: t.holdings(),
            current_price: t.token.current_price,
            color: t.color.clone().unwrap_or_else(|| FALLBACK_COLOR.to_string()),
        })
        .collect();

    // sort_by is stable: equal percentages keep input order
    entries.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    entries
}
