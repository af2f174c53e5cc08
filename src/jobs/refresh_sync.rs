use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::store::selectors;
use crate::store::state::SlotKind;
use crate::store::PortfolioStore;

pub async fn start_refresh_sync_job(store: PortfolioStore, every: Duration) {
    tokio::spawn(async move {
        let mut interval = interval(every);

        loop {
            // First tick completes immediately, so this also runs on startup
            interval.tick().await;
            tracing::info!("Checking for stale slots");

            let refreshed = refresh_stale_slots(&store).await;
            if !refreshed.is_empty() {
                tracing::info!("Refreshed slots: {:?}", refreshed);
            }
        }
    });
}

/// Re-fetch every refreshable slot whose data is missing or stale.
/// Returns the slots that refreshed successfully.
pub async fn refresh_stale_slots(store: &PortfolioStore) -> Vec<SlotKind> {
    let state = store.snapshot().await;
    let flags = selectors::needs_refresh(&state, Utc::now().timestamp_millis());
    let mut refreshed = Vec::new();

    for slot in SlotKind::REFRESHABLE {
        if !flags.get(slot) {
            continue;
        }

        let result = match slot {
            SlotKind::Portfolio => store.fetch_portfolio().await.map(|_| ()),
            SlotKind::Watchlist => store.fetch_watchlist().await.map(|_| ()),
            SlotKind::MarketTokens => store.fetch_market_list(None, None).await.map(|_| ()),
            _ => Ok(()),
        };

        match result {
            Ok(()) => refreshed.push(slot),
            Err(e) => tracing::error!("Failed to refresh {:?}: {}", slot, e),
        }
    }

    refreshed
}
