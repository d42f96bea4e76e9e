//! Profit-target and loss-threshold rules.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use hedger_core::{HedgingConfig, Position, Ticket};

use crate::ledger::HedgeLedger;

/// What to do about one original position this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossDecision {
    /// Loss threshold not breached.
    Hold,
    /// Breached but already offset.
    AlreadyHedged(Ticket),
    PlaceHedge,
    /// Breached but every original on the symbol is already matched by a hedge.
    AtCapacity,
}

/// Close everything once floating profit reaches the target.
#[must_use]
pub fn profit_target_reached(total_profit: Decimal, config: &HedgingConfig) -> bool {
    total_profit >= config.profit_threshold
}

/// Evaluate the loss rule for a non-hedge position.
#[must_use]
pub fn evaluate_position(pos: &Position, ledger: &HedgeLedger, config: &HedgingConfig) -> LossDecision {
    if pos.profit > config.loss_threshold {
        return LossDecision::Hold;
    }

    if let Some(hedge) = ledger.hedge_for(pos.ticket) {
        return LossDecision::AlreadyHedged(hedge);
    }

    if ledger.has_capacity(&pos.symbol) {
        tracing::info!(
            ticket = pos.ticket,
            symbol = pos.symbol,
            profit = %pos.profit,
            threshold = %config.loss_threshold,
            "Loss threshold breached"
        );
        LossDecision::PlaceHedge
    } else {
        LossDecision::AtCapacity
    }
}

/// Rate limit for "max hedges reached" warnings, one per symbol per cooldown window.
#[derive(Debug, Default)]
pub struct WarningGate {
    last_warning: HashMap<String, DateTime<Utc>>,
}

impl WarningGate {
    /// Returns true (and arms the cooldown) if a warning for `symbol` may be emitted now.
    pub fn should_warn(&mut self, symbol: &str, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let cooldown = chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::zero());
        match self.last_warning.get(symbol) {
            Some(last) if now - *last <= cooldown => false,
            _ => {
                self.last_warning.insert(symbol.to_string(), now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedger_core::Direction;
    use rust_decimal_macros::dec;

    fn make_position(ticket: Ticket, symbol: &str, profit: Decimal) -> Position {
        Position {
            ticket,
            symbol: symbol.to_string(),
            direction: Direction::Buy,
            volume: dec!(0.1),
            open_price: dec!(1.1000),
            profit,
            stop_loss: None,
            take_profit: None,
            comment: String::new(),
        }
    }

    #[test]
    fn profit_target_is_inclusive() {
        let config = HedgingConfig::default();
        assert!(profit_target_reached(dec!(10), &config));
        assert!(profit_target_reached(dec!(12), &config));
        assert!(!profit_target_reached(dec!(9.99), &config));
    }

    #[test]
    fn loss_above_threshold_holds() {
        let config = HedgingConfig::default();
        let mut ledger = HedgeLedger::new();
        let pos = make_position(1, "EURUSD", dec!(-19.99));
        ledger.rebuild_counts(std::slice::from_ref(&pos));

        assert_eq!(evaluate_position(&pos, &ledger, &config), LossDecision::Hold);
    }

    #[test]
    fn loss_at_threshold_places_hedge() {
        let config = HedgingConfig::default();
        let mut ledger = HedgeLedger::new();
        let pos = make_position(1, "EURUSD", dec!(-20));
        ledger.rebuild_counts(std::slice::from_ref(&pos));

        assert_eq!(evaluate_position(&pos, &ledger, &config), LossDecision::PlaceHedge);
    }

    #[test]
    fn hedged_position_is_not_hedged_again() {
        let config = HedgingConfig::default();
        let mut ledger = HedgeLedger::new();
        ledger.record_hedge(1, 2, Utc::now());
        let pos = make_position(1, "EURUSD", dec!(-40));

        assert_eq!(
            evaluate_position(&pos, &ledger, &config),
            LossDecision::AlreadyHedged(2)
        );
    }

    #[test]
    fn full_symbol_is_at_capacity() {
        let config = HedgingConfig::default();
        let mut ledger = HedgeLedger::new();
        ledger.record_hedge(1, 2, Utc::now());
        ledger.record_hedge(4, 3, Utc::now());
        ledger.remove_hedge(4);
        let positions: Vec<Position> = [1, 2, 3, 5]
            .into_iter()
            .map(|t| make_position(t, "XAUUSD", dec!(-30)))
            .collect();
        ledger.rebuild_counts(&positions);

        assert_eq!(ledger.original_count("XAUUSD"), 2);
        assert_eq!(ledger.hedge_count("XAUUSD"), 2);
        assert_eq!(
            evaluate_position(&positions[3], &ledger, &config),
            LossDecision::AtCapacity
        );
    }

    #[test]
    fn warning_gate_limits_per_symbol() {
        let mut gate = WarningGate::default();
        let cooldown = Duration::from_secs(60);
        let t0 = Utc::now();

        assert!(gate.should_warn("XAUUSD", t0, cooldown));
        assert!(!gate.should_warn("XAUUSD", t0 + chrono::Duration::seconds(30), cooldown));
        assert!(!gate.should_warn("XAUUSD", t0 + chrono::Duration::seconds(60), cooldown));
        assert!(gate.should_warn("EURUSD", t0 + chrono::Duration::seconds(30), cooldown));
        assert!(gate.should_warn("XAUUSD", t0 + chrono::Duration::seconds(61), cooldown));
    }
}
