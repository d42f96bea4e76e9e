//! Account queries: balance, equity, open positions.

use tracing::debug;

use hedger_core::{AccountSummary, GatewayError, Position};

use crate::client::Mt5BridgeClient;

impl Mt5BridgeClient {
    /// Fetch balance, equity and free margin.
    pub async fn account(&self) -> Result<AccountSummary, GatewayError> {
        let summary: AccountSummary = self.get_json(&["account"]).await?;
        debug!(
            balance = %summary.balance,
            equity = %summary.equity,
            margin_free = %summary.margin_free,
            "Account summary retrieved"
        );
        Ok(summary)
    }

    /// Fetch every open position on the account.
    pub async fn positions(&self) -> Result<Vec<Position>, GatewayError> {
        let positions: Vec<Position> = self.get_json(&["positions"]).await?;
        debug!(count = positions.len(), "Open positions retrieved");
        Ok(positions)
    }
}
