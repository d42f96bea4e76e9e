use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use hedger_core::{Direction, GatewayError, SignalConfig, TradeSignal};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SignalError {
    #[error("Received empty message")]
    Empty,

    #[error("Unknown action in message: {0}")]
    UnknownAction(String),

    #[error("Failed to parse symbol from message: {0}")]
    MissingSymbol(String),

    #[error("Symbol {0} is not available or not visible on the terminal")]
    SymbolUnavailable(String),

    #[error("No price available for {0}")]
    PriceUnavailable(String),

    #[error("Insufficient margin for minimum lot size {volume_min} (free {free})")]
    InsufficientMargin { volume_min: Decimal, free: Decimal },

    #[error("Order for {symbol} rejected (retcode {retcode}): {comment}")]
    OrderRejected {
        symbol: String,
        retcode: u32,
        comment: String,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Parse a signal message.
///
/// The first non-empty line carries the action and symbol (`BUY XAUUSD`, `sell us30:`); an
/// optional `ENTRY: <price>` line follows. Everything else is ignored. Symbols are mapped to
/// their broker names through `config`.
///
/// # Errors
///
/// `Empty`, `UnknownAction` or `MissingSymbol` when the first line cannot be read.
pub fn parse_signal(
    text: &str,
    config: &SignalConfig,
    received_at: DateTime<Utc>,
) -> Result<TradeSignal, SignalError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let action_line = lines.next().ok_or(SignalError::Empty)?.to_uppercase();

    let direction = if action_line.contains("BUY") {
        Direction::Buy
    } else if action_line.contains("SELL") {
        Direction::Sell
    } else {
        return Err(SignalError::UnknownAction(action_line));
    };

    let symbol = action_line
        .split_whitespace()
        .nth(1)
        .map(|s| s.trim_end_matches(':'))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SignalError::MissingSymbol(action_line.clone()))?;

    let entry = lines.find_map(parse_entry);

    Ok(TradeSignal {
        symbol: config.map_symbol(symbol),
        direction,
        entry,
        received_at,
    })
}

fn parse_entry(line: &str) -> Option<Decimal> {
    let (key, value) = line.split_once(':')?;
    if !key.trim().eq_ignore_ascii_case("entry") {
        return None;
    }
    Decimal::from_str(value.trim()).ok()
}
