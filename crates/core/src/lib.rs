pub mod config;
pub mod config_loader;
pub mod events;
pub mod position;
pub mod traits;

pub use config::{
    AppConfig, BrokerConfig, BrokerMode, HedgingConfig, PaperQuote, RestartBackoff, SignalConfig,
};
pub use config_loader::{ConfigLoader, DEFAULT_CONFIG_PATH};
pub use events::{MarketOrderRequest, OrderResult, TradeSignal, RETCODE_DONE};
pub use position::{AccountSummary, Direction, Position, SymbolInfo, Ticket, Tick};
pub use traits::{BrokerGateway, GatewayError};
