use serde::{Deserialize, Serialize};

/// Connection details pushed in by the wallet-connection layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConnection {
    pub is_connected: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub chain: Option<String>,
    /// Native balance as formatted by the wallet library
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub ens_name: Option<String>,
    #[serde(default)]
    pub connector: Option<String>,
}

impl WalletConnection {
    /// ENS name if present, otherwise the shortened address (`0x1234...abcd`).
    pub fn display_name(&self) -> Option<String> {
        if let Some(ens) = self.ens_name.as_ref().filter(|s| !s.is_empty()) {
            return Some(ens.clone());
        }

        let address = self.address.as_ref()?;
        if address.len() <= 10 {
            return Some(address.clone());
        }

        match (address.get(..6), address.get(address.len() - 4..)) {
            (Some(head), Some(tail)) => Some(format!("{}...{}", head, tail)),
            _ => Some(address.clone()),
        }
    }
}
