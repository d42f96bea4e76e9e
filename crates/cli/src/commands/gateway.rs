use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use hedger_core::{AppConfig, BrokerGateway, BrokerMode, ConfigLoader};
use hedger_mt5::{BridgeConfig, Mt5BridgeClient, PaperTerminal};

/// Load configuration, forcing paper mode when asked.
pub fn load_config(path: &str, paper: bool) -> Result<AppConfig> {
    let mut config = ConfigLoader::load_from(path)?;
    if paper {
        config.broker.mode = BrokerMode::Paper;
    }
    Ok(config)
}

/// Build the terminal gateway selected by `broker.mode`.
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn BrokerGateway>> {
    match config.broker.mode {
        BrokerMode::Paper => {
            info!(
                balance = %config.broker.paper_balance,
                symbols = config.broker.paper_quotes.len(),
                "Using paper terminal"
            );
            let terminal = config
                .broker
                .paper_quotes
                .iter()
                .fold(PaperTerminal::new(config.broker.paper_balance), |t, (symbol, quote)| {
                    t.with_symbol(symbol, quote.bid, quote.ask)
                });
            Ok(Arc::new(terminal))
        }
        BrokerMode::Bridge => {
            let client = Mt5BridgeClient::connect(BridgeConfig::from(&config.broker))
                .await
                .context("Failed to connect to terminal bridge")?;
            Ok(Arc::new(client))
        }
    }
}
