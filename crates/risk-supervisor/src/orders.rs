//! Hedge placement and position close-out through the broker gateway.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use hedger_core::{BrokerGateway, Direction, GatewayError, MarketOrderRequest, Position, Ticket};

use crate::error::OrderError;
use crate::ledger::{hedge_tag, HedgeLedger};

/// Tag attached to closing orders.
pub const CLOSE_TAG: &str = "close";

/// Outcome of [`OrderDesk::close_all_orders`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloseSummary {
    pub closed: Vec<Ticket>,
    pub failed: Vec<(Ticket, OrderError)>,
}

impl CloseSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builds and submits hedge and close orders.
pub struct OrderDesk<'a> {
    gateway: &'a dyn BrokerGateway,
    deviation: u32,
}

impl<'a> OrderDesk<'a> {
    #[must_use]
    pub fn new(gateway: &'a dyn BrokerGateway, deviation: u32) -> Self {
        Self { gateway, deviation }
    }

    /// Open an offsetting position for `original` and record it in the ledger.
    ///
    /// # Errors
    ///
    /// No order is sent for `AlreadyHedged`, `IsHedge`, `InvalidTicket`, `PriceUnavailable` or
    /// `InsufficientMargin`. `OrderRejected` carries the terminal retcode. `Untracked` means a
    /// live hedge exists that the ledger would not accept.
    pub async fn open_hedge_order(
        &self,
        ledger: &mut HedgeLedger,
        original: &Position,
        volume: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Ticket, OrderError> {
        if !original.has_valid_ticket() {
            return Err(OrderError::InvalidTicket(original.ticket));
        }
        if let Some(existing) = ledger.hedge_for(original.ticket) {
            warn!(ticket = original.ticket, hedge = existing, "Hedge already placed");
            return Err(OrderError::AlreadyHedged(original.ticket));
        }
        if ledger.is_hedge(original.ticket) {
            return Err(OrderError::IsHedge(original.ticket));
        }

        let symbol = original.symbol.as_str();
        let direction = original.direction.opposite();
        let price = self.price_for(symbol, direction).await?;

        let account = self.gateway.account_summary().await?;
        let required = self
            .gateway
            .estimate_margin(direction, symbol, volume, price)
            .await?;
        if required > account.margin_free {
            warn!(
                symbol,
                %required,
                free = %account.margin_free,
                "Insufficient margin to place hedge"
            );
            return Err(OrderError::InsufficientMargin {
                required,
                free: account.margin_free,
            });
        }

        let request = MarketOrderRequest::open(
            symbol,
            direction,
            volume,
            price,
            self.deviation,
            hedge_tag(original.ticket),
        );
        let result = self.gateway.submit_market_order(&request).await?;
        if !result.is_done() {
            error!(
                symbol,
                original = original.ticket,
                retcode = result.retcode,
                comment = result.comment,
                "Failed to place hedge order"
            );
            return Err(OrderError::OrderRejected {
                retcode: result.retcode,
                comment: result.comment,
            });
        }
        let hedge = result.position_id.ok_or(OrderError::Unconfirmed)?;

        if !ledger.record_hedge(original.ticket, hedge, now) {
            error!(
                symbol,
                original = original.ticket,
                hedge,
                "Hedge filled but not recorded, position is untracked"
            );
            return Err(OrderError::Untracked {
                original: original.ticket,
                hedge,
            });
        }
        ledger.note_hedge_opened(symbol);
        info!(
            symbol,
            original = original.ticket,
            hedge,
            %direction,
            %volume,
            %price,
            "Hedge order placed"
        );
        Ok(hedge)
    }

    /// Flatten one position with an opposite market order referencing its ticket.
    ///
    /// # Errors
    ///
    /// `PriceUnavailable` leaves the position open; `OrderRejected` carries the retcode.
    pub async fn close_position(
        &self,
        ledger: &mut HedgeLedger,
        position: &Position,
    ) -> Result<(), OrderError> {
        if !position.has_valid_ticket() {
            return Err(OrderError::InvalidTicket(position.ticket));
        }

        let direction = position.direction.opposite();
        let price = self.price_for(&position.symbol, direction).await?;
        let request = MarketOrderRequest::open(
            position.symbol.as_str(),
            direction,
            position.volume,
            price,
            self.deviation,
            CLOSE_TAG,
        )
        .closing(position.ticket);

        let result = self.gateway.submit_market_order(&request).await?;
        if !result.is_done() {
            error!(
                ticket = position.ticket,
                symbol = position.symbol,
                retcode = result.retcode,
                comment = result.comment,
                "Failed to close position"
            );
            return Err(OrderError::OrderRejected {
                retcode: result.retcode,
                comment: result.comment,
            });
        }

        ledger.note_closed(position);
        info!(
            ticket = position.ticket,
            symbol = position.symbol,
            profit = %position.profit,
            "Position closed"
        );
        Ok(())
    }

    /// Close every open position, continuing past individual failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the position list cannot be fetched, or immediately on a
    /// non-transient gateway failure.
    pub async fn close_all_orders(&self, ledger: &mut HedgeLedger) -> Result<CloseSummary, GatewayError> {
        let positions = self.gateway.list_open_positions().await?;
        let mut summary = CloseSummary::default();

        for position in positions.iter().filter(|p| p.has_valid_ticket()) {
            match self.close_position(ledger, position).await {
                Ok(()) => summary.closed.push(position.ticket),
                Err(OrderError::Gateway(e)) if !e.is_transient() => return Err(e),
                Err(e) => {
                    warn!(ticket = position.ticket, error = %e, "Position could not be closed");
                    summary.failed.push((position.ticket, e));
                }
            }
        }

        if !summary.is_complete() {
            let tickets: Vec<Ticket> = summary.failed.iter().map(|(t, _)| *t).collect();
            warn!(?tickets, "Some positions could not be closed");
        }
        Ok(summary)
    }

    async fn price_for(&self, symbol: &str, direction: Direction) -> Result<Decimal, OrderError> {
        self.gateway
            .symbol_tick(symbol)
            .await?
            .and_then(|tick| tick.price_for(direction))
            .ok_or_else(|| {
                warn!(symbol, "No price available");
                OrderError::PriceUnavailable {
                    symbol: symbol.to_string(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedger_mt5::PaperTerminal;
    use rust_decimal_macros::dec;

    fn terminal() -> PaperTerminal {
        PaperTerminal::new(dec!(10000))
            .with_symbol("EURUSD", dec!(1.1000), dec!(1.1002))
            .with_symbol("XAUUSD", dec!(2650.00), dec!(2650.50))
    }

    #[tokio::test]
    async fn hedge_is_opposite_at_quote_with_tag() {
        let paper = terminal();
        let original_ticket = paper.seed_position("EURUSD", Direction::Buy, dec!(0.1), dec!(-25), "");
        let original = paper.position(original_ticket).unwrap();
        let mut ledger = HedgeLedger::new();
        ledger.rebuild_counts(&paper.open_positions());
        let desk = OrderDesk::new(&paper, 20);

        let hedge = desk
            .open_hedge_order(&mut ledger, &original, dec!(0.1), Utc::now())
            .await
            .unwrap();

        let orders = paper.submitted_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].direction, Direction::Sell);
        assert_eq!(orders[0].price, dec!(1.1000));
        assert_eq!(orders[0].deviation, 20);
        assert_eq!(orders[0].tag, format!("hedge:{original_ticket}"));
        assert_eq!(ledger.hedge_for(original_ticket), Some(hedge));
        assert_eq!(ledger.hedge_count("EURUSD"), 1);
    }

    #[tokio::test]
    async fn second_hedge_for_same_original_sends_nothing() {
        let paper = terminal();
        let ticket = paper.seed_position("EURUSD", Direction::Buy, dec!(0.1), dec!(-25), "");
        let original = paper.position(ticket).unwrap();
        let mut ledger = HedgeLedger::new();
        let desk = OrderDesk::new(&paper, 20);

        desk.open_hedge_order(&mut ledger, &original, dec!(0.1), Utc::now())
            .await
            .unwrap();
        let err = desk
            .open_hedge_order(&mut ledger, &original, dec!(0.1), Utc::now())
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::AlreadyHedged(ticket));
        assert_eq!(paper.submitted_orders().len(), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn fill_the_ledger_refuses_is_an_error() {
        let paper = terminal();
        let ticket = paper.seed_position("EURUSD", Direction::Buy, dec!(0.1), dec!(-25), "");
        let original = paper.position(ticket).unwrap();
        let mut ledger = HedgeLedger::new();
        // The terminal hands out the next ticket, which the ledger already maps elsewhere.
        let reused = ticket + 1;
        assert!(ledger.record_hedge(42, reused, Utc::now()));

        let err = OrderDesk::new(&paper, 20)
            .open_hedge_order(&mut ledger, &original, dec!(0.1), Utc::now())
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::Untracked { original: ticket, hedge: reused });
        assert!(!err.is_fatal());
        assert_eq!(ledger.hedge_for(ticket), None);
        assert_eq!(ledger.hedge_count("EURUSD"), 0);
        assert_eq!(paper.submitted_orders().len(), 1);
    }

    #[tokio::test]
    async fn insufficient_margin_sends_nothing() {
        let paper = PaperTerminal::new(dec!(100)).with_symbol("XAUUSD", dec!(2650), dec!(2650.5));
        let ticket = paper.seed_position("XAUUSD", Direction::Buy, dec!(0.01), dec!(-25), "");
        let original = paper.position(ticket).unwrap();
        let mut ledger = HedgeLedger::new();

        let err = OrderDesk::new(&paper, 20)
            .open_hedge_order(&mut ledger, &original, dec!(1), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InsufficientMargin { .. }));
        assert!(paper.submitted_orders().is_empty());
        assert_eq!(ledger.hedge_for(ticket), None);
    }

    #[tokio::test]
    async fn rejected_hedge_reports_retcode() {
        let paper = terminal();
        let ticket = paper.seed_position("EURUSD", Direction::Sell, dec!(0.1), dec!(-25), "");
        let original = paper.position(ticket).unwrap();
        paper.reject_next_order(10004);
        let mut ledger = HedgeLedger::new();

        let err = OrderDesk::new(&paper, 20)
            .open_hedge_order(&mut ledger, &original, dec!(0.1), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::OrderRejected { retcode: 10004, .. }));
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn missing_quote_is_price_unavailable() {
        let paper = terminal();
        let ticket = paper.seed_position("EURUSD", Direction::Buy, dec!(0.1), dec!(-25), "");
        let original = paper.position(ticket).unwrap();
        paper.set_tick("EURUSD", dec!(0), dec!(1.1002));
        let mut ledger = HedgeLedger::new();

        let err = OrderDesk::new(&paper, 20)
            .open_hedge_order(&mut ledger, &original, dec!(0.1), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::PriceUnavailable { .. }));
        assert!(paper.submitted_orders().is_empty());
    }

    #[tokio::test]
    async fn closing_original_orphans_its_hedge() {
        let paper = terminal();
        let original_ticket = paper.seed_position("EURUSD", Direction::Buy, dec!(0.1), dec!(-25), "");
        let original = paper.position(original_ticket).unwrap();
        let mut ledger = HedgeLedger::new();
        let desk = OrderDesk::new(&paper, 20);
        let hedge = desk
            .open_hedge_order(&mut ledger, &original, dec!(0.1), Utc::now())
            .await
            .unwrap();
        ledger.rebuild_counts(&paper.open_positions());

        desk.close_position(&mut ledger, &original).await.unwrap();

        let close = paper.submitted_orders().pop().unwrap();
        assert_eq!(close.direction, Direction::Sell);
        assert_eq!(close.position, Some(original_ticket));
        assert!(ledger.is_orphan(hedge));
        assert_eq!(ledger.original_count("EURUSD"), 0);
        assert_eq!(ledger.hedge_count("EURUSD"), 1);
    }

    #[tokio::test]
    async fn close_all_reports_failures() {
        let paper = terminal();
        let a = paper.seed_position("EURUSD", Direction::Buy, dec!(0.1), dec!(5), "");
        let b = paper.seed_position("XAUUSD", Direction::Sell, dec!(0.1), dec!(7), "");
        paper.set_tick("XAUUSD", dec!(2650), dec!(0));
        let mut ledger = HedgeLedger::new();

        let summary = OrderDesk::new(&paper, 20)
            .close_all_orders(&mut ledger)
            .await
            .unwrap();

        assert_eq!(summary.closed, vec![a]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, b);
        assert!(!summary.is_complete());
        assert_eq!(paper.open_positions().len(), 1);
    }
}
