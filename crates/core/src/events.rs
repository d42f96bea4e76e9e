use crate::position::{Direction, Ticket};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Terminal return code for a request that was executed.
pub const RETCODE_DONE: u32 = 10009;

/// Market order sent to the terminal.
///
/// With `position` set the order flattens that position instead of opening a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub price: Decimal,
    /// Maximum accepted slippage in points.
    pub deviation: u32,
    /// Comment stored on the resulting position.
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Ticket>,
}

impl MarketOrderRequest {
    #[must_use]
    pub fn open(
        symbol: impl Into<String>,
        direction: Direction,
        volume: Decimal,
        price: Decimal,
        deviation: u32,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            volume,
            price,
            deviation,
            tag: tag.into(),
            position: None,
        }
    }

    #[must_use]
    pub const fn closing(mut self, ticket: Ticket) -> Self {
        self.position = Some(ticket);
        self
    }
}

/// Terminal answer to a [`MarketOrderRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub retcode: u32,
    /// Ticket of the position opened (or closed) by the order.
    #[serde(default)]
    pub position_id: Option<Ticket>,
    #[serde(default)]
    pub comment: String,
}

impl OrderResult {
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.retcode == RETCODE_DONE
    }
}

/// A parsed trading instruction from a chat channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub direction: Direction,
    pub entry: Option<Decimal>,
    pub received_at: DateTime<Utc>,
}
