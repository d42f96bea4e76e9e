use crate::events::{MarketOrderRequest, OrderResult};
use crate::position::{AccountSummary, Direction, Position, SymbolInfo, Tick};
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures talking to the trading terminal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Terminal unreachable or timed out. Worth retrying next cycle.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// Terminal answered with something we could not interpret.
    #[error("Broker protocol error: {0}")]
    Protocol(String),

    /// Terminal detached or not initialised; needs a fresh session.
    #[error("Terminal error: {0}")]
    Terminal(String),
}

impl GatewayError {
    /// Whether the failure should only skip the current step.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Protocol(_))
    }
}

/// Everything the hedger needs from a trading terminal.
///
/// Implementations are expected to be cheap to call repeatedly; the supervisor polls them
/// every few seconds.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// All open positions. An `Err` means the fetch failed, not that there are none.
    async fn list_open_positions(&self) -> Result<Vec<Position>, GatewayError>;

    async fn account_summary(&self) -> Result<AccountSummary, GatewayError>;

    /// Latest quote, `None` if the symbol is unknown to the terminal.
    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>, GatewayError>;

    async fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, GatewayError>;

    /// Margin required to open `volume` lots of `symbol` at `price`.
    async fn estimate_margin(
        &self,
        direction: Direction,
        symbol: &str,
        volume: Decimal,
        price: Decimal,
    ) -> Result<Decimal, GatewayError>;

    async fn submit_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderResult, GatewayError>;
}
