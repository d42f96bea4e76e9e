//! Wire types specific to the terminal bridge.

use hedger_core::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /margin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginRequest {
    pub direction: Direction,
    pub symbol: String,
    pub volume: Decimal,
    pub price: Decimal,
}

/// Answer of `POST /margin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginResponse {
    pub margin: Decimal,
}
