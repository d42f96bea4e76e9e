//! Signal intake.
//!
//! Turns chat messages of the form `BUY XAUUSD` into margin-sized market orders and makes sure
//! the equity monitor is watching the account afterwards.

pub mod parser;
pub mod processor;

pub use parser::{parse_signal, SignalError};
pub use processor::{PlacedOrder, SignalProcessor, ORIGINAL_TAG};
