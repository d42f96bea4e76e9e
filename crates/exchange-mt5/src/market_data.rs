//! Market data: quotes and symbol specifications.

use tracing::debug;

use hedger_core::{GatewayError, SymbolInfo, Tick};

use crate::client::Mt5BridgeClient;

impl Mt5BridgeClient {
    /// Latest bid/ask for a symbol, `None` if the terminal does not know it.
    pub async fn tick(&self, symbol: &str) -> Result<Option<Tick>, GatewayError> {
        debug!(symbol, "Fetching tick");
        self.get_optional(&["symbols", symbol, "tick"]).await
    }

    /// Volume limits and visibility for a symbol.
    pub async fn symbol(&self, symbol: &str) -> Result<Option<SymbolInfo>, GatewayError> {
        debug!(symbol, "Fetching symbol info");
        self.get_optional(&["symbols", symbol]).await
    }
}
