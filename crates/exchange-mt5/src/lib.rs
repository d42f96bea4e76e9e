//! MetaTrader 5 terminal integration.
//!
//! Two [`BrokerGateway`](hedger_core::BrokerGateway) implementations: an HTTP client for the
//! bridge process that sits next to a live terminal, and an in-memory paper terminal for
//! dry runs and tests.

pub mod account;
pub mod client;
pub mod execution;
pub mod market_data;
pub mod paper;
pub mod types;

pub use client::{BridgeConfig, Mt5BridgeClient};
pub use paper::PaperTerminal;
