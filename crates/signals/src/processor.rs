//! Signal → original market order.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use hedger_core::{
    AppConfig, BrokerGateway, Direction, MarketOrderRequest, SignalConfig, SymbolInfo, Ticket,
    TradeSignal,
};
use hedger_supervisor::EquityMonitor;

use crate::parser::{parse_signal, SignalError};

/// Tag attached to orders opened from signals.
pub const ORIGINAL_TAG: &str = "original";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub ticket: Option<Ticket>,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub price: Decimal,
    /// This order spawned the equity monitor.
    pub monitor_started: bool,
}

pub struct SignalProcessor {
    gateway: Arc<dyn BrokerGateway>,
    config: SignalConfig,
    deviation: u32,
    monitor: EquityMonitor,
}

impl SignalProcessor {
    #[must_use]
    pub fn new(gateway: Arc<dyn BrokerGateway>, config: &AppConfig, monitor: EquityMonitor) -> Self {
        Self {
            gateway,
            config: config.signals.clone(),
            deviation: config.broker.deviation,
            monitor,
        }
    }

    /// Parse and execute one signal message.
    ///
    /// # Errors
    ///
    /// Any [`SignalError`]; the caller logs it and keeps going.
    pub async fn process(&self, text: &str) -> Result<PlacedOrder, SignalError> {
        let signal = parse_signal(text, &self.config, Utc::now())?;
        info!(
            symbol = signal.symbol,
            direction = %signal.direction,
            entry = ?signal.entry,
            "Signal parsed"
        );
        self.execute(&signal).await
    }

    /// Size and submit the original order for a parsed signal, then make sure the equity
    /// monitor is running.
    ///
    /// # Errors
    ///
    /// `SymbolUnavailable`, `PriceUnavailable`, `InsufficientMargin`, `OrderRejected` or a
    /// gateway failure.
    pub async fn execute(&self, signal: &TradeSignal) -> Result<PlacedOrder, SignalError> {
        let symbol = signal.symbol.as_str();
        let info = self
            .gateway
            .symbol_info(symbol)
            .await?
            .filter(|info| info.visible)
            .ok_or_else(|| SignalError::SymbolUnavailable(symbol.to_string()))?;

        let price = self
            .gateway
            .symbol_tick(symbol)
            .await?
            .and_then(|tick| tick.price_for(signal.direction))
            .ok_or_else(|| SignalError::PriceUnavailable(symbol.to_string()))?;

        let volume = self.size_order(signal.direction, &info, price).await?;
        info!(symbol, %volume, %price, "Final lot size");

        let request = MarketOrderRequest::open(
            symbol,
            signal.direction,
            volume,
            price,
            self.deviation,
            ORIGINAL_TAG,
        );
        let result = self.gateway.submit_market_order(&request).await?;
        if !result.is_done() {
            error!(
                symbol,
                retcode = result.retcode,
                comment = result.comment,
                "Failed to place order"
            );
            return Err(SignalError::OrderRejected {
                symbol: symbol.to_string(),
                retcode: result.retcode,
                comment: result.comment,
            });
        }

        info!(
            symbol,
            direction = %signal.direction,
            ticket = ?result.position_id,
            "Order placed"
        );
        let monitor_started = self.monitor.ensure_running().is_some();
        if monitor_started {
            info!("Equity monitor started");
        }

        Ok(PlacedOrder {
            ticket: result.position_id,
            symbol: symbol.to_string(),
            direction: signal.direction,
            volume,
            price,
            monitor_started,
        })
    }

    /// Start from the fixed lot and step down until the margin fits.
    async fn size_order(
        &self,
        direction: Direction,
        info: &SymbolInfo,
        price: Decimal,
    ) -> Result<Decimal, SignalError> {
        let free = self.gateway.account_summary().await?.margin_free;
        let mut volume = self.config.fixed_lot.min(info.volume_max);

        while volume >= info.volume_min {
            let required = self
                .gateway
                .estimate_margin(direction, &info.symbol, volume, price)
                .await?;
            if free >= required {
                return Ok(volume);
            }
            if info.volume_step <= Decimal::ZERO {
                break;
            }
            volume -= info.volume_step;
        }

        warn!(
            symbol = info.symbol,
            volume_min = %info.volume_min,
            %free,
            "Insufficient margin for minimum lot size"
        );
        Err(SignalError::InsufficientMargin {
            volume_min: info.volume_min,
            free,
        })
    }
}
