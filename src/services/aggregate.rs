use chrono::{DateTime, Utc};

use crate::models::portfolio::{PortfolioMetrics, PortfolioSummary, PortfolioToken};

/// Portfolio totals and 24h change.
///
/// The percent change is relative to the implied prior-day value
/// (`total_value - total_change_24h`). When that value is not positive the
/// percentage is undefined and reported as 0.
pub fn summarize(tokens: &[PortfolioToken], now: DateTime<Utc>) -> PortfolioSummary {
    let total_value: f64 = tokens.iter().map(|t| t.value()).sum();

    let total_change_24h: f64 = tokens
        .iter()
        .map(|t| t.token.price_change_percentage_24h / 100.0 * t.value())
        .sum();

    let total_change_percent_24h = if total_value > 0.0 {
        let prior_value = total_value - total_change_24h;
        let percent = total_change_24h / prior_value * 100.0;
        if prior_value > 0.0 && percent.is_finite() {
            percent
        } else {
            tracing::debug!(
                "Prior-day value {} is not positive, reporting 0% change",
                prior_value
            );
            0.0
        }
    } else {
        0.0
    };

    PortfolioSummary {
        total_value,
        total_change_24h,
        total_change_percent_24h,
        token_count: tokens.len(),
        last_updated: now,
    }
}

pub fn metrics(tokens: &[PortfolioToken]) -> PortfolioMetrics {
    tokens.iter().fold(
        PortfolioMetrics {
            total_tokens: tokens.len(),
            ..Default::default()
        },
        |mut acc, t| {
            let change = t.token.price_change_percentage_24h;
            if change > 0.0 {
                acc.gainers += 1;
            } else if change < 0.0 {
                acc.losers += 1;
            } else {
                acc.neutral += 1;
            }
            acc
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token::Token;

    fn held(id: &str, price: f64, holdings: f64, change: f64) -> PortfolioToken {
        let token = Token {
            id: id.to_string(),
            name: id.to_string(),
            symbol: id.to_string(),
            image: String::new(),
            current_price: price,
            market_cap: 0.0,
            market_cap_rank: None,
            price_change_percentage_24h: change,
            sparkline_in_7d: None,
            last_updated: None,
        };
        PortfolioToken::new(token, holdings, None, Utc::now())
    }

    #[test]
    fn test_single_token_summary() {
        let summary = summarize(&[held("btc", 50_000.0, 0.1, 10.0)], Utc::now());

        assert!((summary.total_value - 5_000.0).abs() < 1e-9);
        assert!((summary.total_change_24h - 500.0).abs() < 1e-9);
        assert!((summary.total_change_percent_24h - 500.0 / 4_500.0 * 100.0).abs() < 1e-9);
        assert!((summary.total_change_percent_24h - 11.11).abs() < 0.01);
        assert_eq!(summary.token_count, 1);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[], Utc::now());
        assert_eq!(summary.total_value, 0.0);
        assert_eq!(summary.total_change_24h, 0.0);
        assert_eq!(summary.total_change_percent_24h, 0.0);
        assert_eq!(summary.token_count, 0);
    }

    #[test]
    fn test_zero_prior_value_guarded() {
        // +100% on the whole portfolio makes value equal to the change
        let summary = summarize(&[held("x", 10.0, 1.0, 100.0)], Utc::now());
        assert_eq!(summary.total_value, 10.0);
        assert_eq!(summary.total_change_24h, 10.0);
        assert_eq!(summary.total_change_percent_24h, 0.0);

        let summary = summarize(&[held("y", 10.0, 1.0, 250.0)], Utc::now());
        assert_eq!(summary.total_change_percent_24h, 0.0);
    }

    #[test]
    fn test_summary_is_deterministic() {
        let tokens = vec![
            held("a", 1.1, 3.3, -4.2),
            held("b", 0.07, 1234.5, 12.5),
            held("c", 61_000.0, 0.015, 0.3),
        ];

        let first = summarize(&tokens, Utc::now());
        let second = summarize(&tokens, Utc::now());
        assert_eq!(first.total_value.to_bits(), second.total_value.to_bits());
        assert_eq!(
            first.total_change_percent_24h.to_bits(),
            second.total_change_percent_24h.to_bits()
        );
    }

    #[test]
    fn test_metrics_counts_direction() {
        let tokens = vec![
            held("a", 1.0, 1.0, 2.0),
            held("b", 1.0, 1.0, -1.0),
            held("c", 1.0, 1.0, 0.0),
            held("d", 1.0, 1.0, 5.0),
        ];

        let m = metrics(&tokens);
        assert_eq!(
            m,
            PortfolioMetrics {
                total_tokens: 4,
                gainers: 2,
                losers: 1,
                neutral: 1
            }
        );
    }
}
