use rust_decimal::Decimal;
use thiserror::Error;

use hedger_core::{GatewayError, Ticket};

/// Why a hedge or close order was not placed.
///
/// None of these stop the loop on their own; only a non-transient [`GatewayError`] does.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("Position {0} already has a hedge")]
    AlreadyHedged(Ticket),

    #[error("Position {0} is a hedge and cannot be hedged")]
    IsHedge(Ticket),

    #[error("Insufficient margin: required {required}, free {free}")]
    InsufficientMargin { required: Decimal, free: Decimal },

    #[error("Order rejected (retcode {retcode}): {comment}")]
    OrderRejected { retcode: u32, comment: String },

    #[error("No price available for {symbol}")]
    PriceUnavailable { symbol: String },

    #[error("Invalid position ticket {0}")]
    InvalidTicket(Ticket),

    #[error("Order executed but no position ticket was returned")]
    Unconfirmed,

    /// The hedge filled but the ledger refused it. The position carries the hedge tag and is
    /// picked up as an orphan on the next reconciliation.
    #[error("Hedge {hedge} for position {original} filled but could not be recorded")]
    Untracked { original: Ticket, hedge: Ticket },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl OrderError {
    /// Whether the terminal is gone and the loop instance should be torn down.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Gateway(e) if !e.is_transient())
    }
}

/// A failure that ends one poll cycle early.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SupervisorError {
    /// Position list could not be fetched. Distinct from "no positions".
    #[error("Failed to fetch open positions: {0}")]
    FetchFailure(GatewayError),

    #[error("Failed to fetch account summary: {0}")]
    AccountUnavailable(GatewayError),

    /// Escapes the cycle; the restart wrapper takes over.
    #[error("Supervisor loop failed: {0}")]
    LoopFatal(String),
}

impl SupervisorError {
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::LoopFatal(_))
    }

    pub(crate) fn fetch(err: GatewayError) -> Self {
        if err.is_transient() {
            Self::FetchFailure(err)
        } else {
            Self::LoopFatal(err.to_string())
        }
    }

    pub(crate) fn account(err: GatewayError) -> Self {
        if err.is_transient() {
            Self::AccountUnavailable(err)
        } else {
            Self::LoopFatal(err.to_string())
        }
    }
}

impl From<OrderError> for SupervisorError {
    fn from(err: OrderError) -> Self {
        Self::LoopFatal(err.to_string())
    }
}
