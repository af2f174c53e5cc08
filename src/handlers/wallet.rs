use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{models::wallet::WalletConnection, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    #[serde(flatten)]
    pub connection: WalletConnection,
    pub display_name: Option<String>,
}

/// Handler for GET /wallet
pub async fn get_wallet(State(state): State<AppState>) -> Json<WalletResponse> {
    let connection = state.store.snapshot().await.wallet.clone();
    let display_name = connection.display_name();
    Json(WalletResponse {
        connection,
        display_name,
    })
}

/// Handler for PUT /wallet, called by the wallet-connection layer on changes
pub async fn set_wallet(
    State(state): State<AppState>,
    Json(connection): Json<WalletConnection>,
) -> StatusCode {
    tracing::info!(
        "Wallet connection updated (connected: {}, chain: {:?})",
        connection.is_connected,
        connection.chain_id
    );
    state.store.set_wallet_connection(connection).await;
    StatusCode::NO_CONTENT
}

/// Handler for DELETE /wallet
pub async fn disconnect_wallet(State(state): State<AppState>) -> StatusCode {
    state.store.disconnect_wallet().await;
    StatusCode::NO_CONTENT
}
