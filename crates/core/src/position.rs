use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broker-assigned position identifier.
pub type Ticket = u64;

/// Side of a position or market order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "long")]
    Buy,
    #[serde(alias = "short")]
    Sell,
}

impl Direction {
    /// The direction that offsets (or flattens) this one.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// An open position as reported by the terminal.
///
/// Positions are owned by the broker; everything on this side only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: Ticket,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub open_price: Decimal,
    /// Floating profit in account currency.
    pub profit: Decimal,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    /// Free-text tag attached when the order was submitted.
    #[serde(default)]
    pub comment: String,
}

impl Position {
    /// Tickets are positive on every terminal we talk to; zero marks a malformed row.
    #[must_use]
    pub const fn has_valid_ticket(&self) -> bool {
        self.ticket > 0
    }
}

/// Account balance snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin_free: Decimal,
}

impl AccountSummary {
    /// Floating P&L across all open positions (`equity - balance`).
    #[must_use]
    pub fn total_profit(&self) -> Decimal {
        self.equity - self.balance
    }
}

/// Best bid/ask for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Tick {
    /// Price a market order in `direction` executes at: buys lift the ask, sells hit the bid.
    ///
    /// Returns `None` when the terminal reports a zero quote.
    #[must_use]
    pub fn price_for(&self, direction: Direction) -> Option<Decimal> {
        let price = match direction {
            Direction::Buy => self.ask,
            Direction::Sell => self.bid,
        };
        (price > Decimal::ZERO).then_some(price)
    }
}

/// Tradable-symbol metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub visible: bool,
    pub volume_min: Decimal,
    pub volume_step: Decimal,
    pub volume_max: Decimal,
}
