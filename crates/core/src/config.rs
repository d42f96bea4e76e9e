use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub hedging: HedgingConfig,
    #[serde(default)]
    pub signals: SignalConfig,
}

/// Which terminal implementation to talk to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerMode {
    /// In-memory simulated terminal (no real orders)
    #[default]
    Paper,
    /// HTTP bridge in front of a live terminal
    Bridge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub mode: BrokerMode,
    pub bridge_url: String,
    /// Upper bound for every bridge call so a hung terminal cannot starve the loop.
    pub request_timeout_secs: u64,
    /// Maximum slippage in points accepted on market orders.
    pub deviation: u32,
    /// Paper terminal starting balance.
    pub paper_balance: Decimal,
    /// Symbols the paper terminal quotes, keyed by broker symbol.
    pub paper_quotes: BTreeMap<String, PaperQuote>,
}

/// Fixed bid/ask for a paper-traded symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaperQuote {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mode: BrokerMode::Paper,
            bridge_url: "http://127.0.0.1:8228".to_string(),
            request_timeout_secs: 5,
            deviation: 20,
            paper_balance: dec!(10000),
            paper_quotes: BTreeMap::new(),
        }
    }
}

impl BrokerConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Cooldown growth between supervisor restarts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RestartBackoff {
    #[default]
    Fixed,
    Exponential,
}

/// Equity-protection policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgingConfig {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Close everything once floating profit reaches this amount.
    pub profit_threshold: Decimal,
    /// Hedge a position once its profit drops to this amount (negative).
    pub loss_threshold: Decimal,
    /// Lots per hedge order.
    pub hedge_volume: Decimal,
    /// Minimum seconds between "max hedges reached" warnings for one symbol.
    pub warning_cooldown_secs: u64,
    /// Flatten hedges whose original was closed instead of letting them ride.
    pub close_orphaned_hedges: bool,
    pub restart_cooldown_secs: u64,
    pub restart_backoff: RestartBackoff,
    pub max_restart_cooldown_secs: u64,
    /// `None` restarts forever.
    pub max_restarts: Option<u32>,
}

impl Default for HedgingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            profit_threshold: dec!(10),
            loss_threshold: dec!(-20),
            hedge_volume: dec!(0.1),
            warning_cooldown_secs: 60,
            close_orphaned_hedges: false,
            restart_cooldown_secs: 5,
            restart_backoff: RestartBackoff::Fixed,
            max_restart_cooldown_secs: 300,
            max_restarts: None,
        }
    }
}

impl HedgingConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub const fn warning_cooldown(&self) -> Duration {
        Duration::from_secs(self.warning_cooldown_secs)
    }

    /// Checks the thresholds point the right way.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistent setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.loss_threshold >= Decimal::ZERO {
            anyhow::bail!(
                "hedging.loss_threshold must be negative, got {}",
                self.loss_threshold
            );
        }
        if self.profit_threshold <= Decimal::ZERO {
            anyhow::bail!(
                "hedging.profit_threshold must be positive, got {}",
                self.profit_threshold
            );
        }
        if self.hedge_volume <= Decimal::ZERO {
            anyhow::bail!("hedging.hedge_volume must be positive");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("hedging.poll_interval_secs must be at least 1");
        }
        Ok(())
    }
}

/// Signal intake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Starting lot size before it is stepped down to fit free margin.
    pub fixed_lot: Decimal,
    /// Channel symbol → broker symbol.
    pub symbol_map: BTreeMap<String, String>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            fixed_lot: dec!(0.1),
            symbol_map: BTreeMap::from([("US30".to_string(), "DJ30".to_string())]),
        }
    }
}

impl SignalConfig {
    /// Broker-side name for a symbol as written in a signal.
    #[must_use]
    pub fn map_symbol(&self, symbol: &str) -> String {
        self.symbol_map
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| symbol.to_string())
    }
}
