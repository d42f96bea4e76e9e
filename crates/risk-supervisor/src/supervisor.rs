//! Equity supervisor control loop.
//!
//! Every poll interval:
//! 1. Fetch open positions (a failed fetch skips the cycle without touching the counters)
//! 2. Reconcile the hedge ledger with broker state and rebuild per-symbol counters
//! 3. Close everything if floating profit reached the target
//! 4. Otherwise hedge originals whose loss breached the threshold, capacity permitting

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use hedger_core::{BrokerGateway, HedgingConfig, Position, Ticket};

use crate::clock::Clock;
use crate::error::{OrderError, SupervisorError};
use crate::events::EventSink;
use crate::ledger::{HedgeLedger, RELEASE_AFTER_MISSED_POLLS};
use crate::monitor::{SupervisorPhase, SupervisorState};
use crate::orders::{CloseSummary, OrderDesk};
use crate::thresholds::{evaluate_position, profit_target_reached, LossDecision, WarningGate};

pub const NO_POSITIONS_TEXT: &str = "No open positions.";

#[must_use]
pub fn max_hedges_text(symbol: &str) -> String {
    format!("Cannot place hedge for {symbol}. Max hedge orders reached.")
}

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No open positions.
    Idle,
    ProfitTargetHit {
        total_profit: Decimal,
        summary: CloseSummary,
        /// Positions still open after the close-out.
        remaining: Vec<Ticket>,
    },
    Evaluated(EvaluationReport),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    pub total_profit: Decimal,
    /// `(original, hedge)` pairs opened this cycle.
    pub hedges_placed: Vec<(Ticket, Ticket)>,
    pub hedge_failures: Vec<(Ticket, OrderError)>,
    /// Symbols a "max hedges reached" warning was emitted for.
    pub capacity_warnings: Vec<String>,
    pub orphans_closed: Vec<Ticket>,
}

pub struct EquitySupervisor {
    gateway: Arc<dyn BrokerGateway>,
    config: HedgingConfig,
    deviation: u32,
    clock: Arc<dyn Clock>,
    events: EventSink,
    state: Arc<SupervisorState>,
    ledger: HedgeLedger,
    warnings: WarningGate,
}

impl EquitySupervisor {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn BrokerGateway>,
        config: HedgingConfig,
        deviation: u32,
        clock: Arc<dyn Clock>,
        events: EventSink,
        state: Arc<SupervisorState>,
    ) -> Self {
        Self {
            gateway,
            config,
            deviation,
            clock,
            events,
            state,
            ledger: HedgeLedger::new(),
            warnings: WarningGate::default(),
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &HedgeLedger {
        &self.ledger
    }

    /// Run cycles until a fatal error. Transient failures skip a cycle and are logged.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::LoopFatal`] when the terminal is gone.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        info!(
            poll_secs = self.config.poll_interval_secs,
            profit_threshold = %self.config.profit_threshold,
            loss_threshold = %self.config.loss_threshold,
            hedge_volume = %self.config.hedge_volume,
            close_orphans = self.config.close_orphaned_hedges,
            "Equity supervisor started"
        );

        loop {
            match self.run_cycle().await {
                Ok(outcome) => debug!(?outcome, "Cycle complete"),
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Equity supervisor stopping");
                    self.state.set_phase(SupervisorPhase::Idle);
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "Cycle skipped"),
            }

            self.clock.sleep(self.config.poll_interval()).await;
        }
    }

    /// One poll cycle.
    ///
    /// # Errors
    ///
    /// `FetchFailure` and `AccountUnavailable` mean the cycle was skipped; `LoopFatal` means the
    /// terminal is gone.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, SupervisorError> {
        self.state.set_phase(SupervisorPhase::Polling);
        let result = self.poll().await;
        self.state.set_phase(SupervisorPhase::Idle);
        result
    }

    async fn poll(&mut self) -> Result<CycleOutcome, SupervisorError> {
        let now = self.clock.now();
        let positions = match self.gateway.list_open_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                error!(error = %e, "Failed to fetch open positions");
                return Err(SupervisorError::fetch(e));
            }
        };
        let positions: Vec<Position> = positions
            .into_iter()
            .filter(|p| {
                if !p.has_valid_ticket() {
                    warn!(symbol = p.symbol, "Ignoring position without a valid ticket");
                }
                p.has_valid_ticket()
            })
            .collect();

        let grace = self.config.poll_interval() * RELEASE_AFTER_MISSED_POLLS;
        let report = self.ledger.reconcile(&positions, now, grace);
        if !report.is_empty() {
            info!(
                adopted = ?report.adopted,
                orphaned = ?report.orphaned,
                pruned = ?report.pruned,
                "Hedge ledger reconciled"
            );
        }
        self.ledger.rebuild_counts(&positions);

        if positions.is_empty() {
            self.events.status_text(NO_POSITIONS_TEXT);
            self.state.set_running(false);
            return Ok(CycleOutcome::Idle);
        }
        self.state.set_running(true);

        let account = match self.gateway.account_summary().await {
            Ok(account) => account,
            Err(e) => {
                error!(error = %e, "Failed to fetch account summary");
                return Err(SupervisorError::account(e));
            }
        };
        let total_profit = account.total_profit();
        debug!(
            positions = positions.len(),
            equity = %account.equity,
            balance = %account.balance,
            %total_profit,
            "Polled account"
        );

        if profit_target_reached(total_profit, &self.config) {
            return self.close_out(total_profit).await;
        }

        self.state.set_phase(SupervisorPhase::Hedging);
        let mut evaluation = EvaluationReport {
            total_profit,
            ..EvaluationReport::default()
        };
        if self.config.close_orphaned_hedges {
            let desk = OrderDesk::new(self.gateway.as_ref(), self.deviation);
            let orphans: Vec<&Position> = positions
                .iter()
                .filter(|p| self.ledger.is_orphan(p.ticket))
                .collect();
            for orphan in orphans {
                match desk.close_position(&mut self.ledger, orphan).await {
                    Ok(()) => {
                        info!(ticket = orphan.ticket, symbol = orphan.symbol, "Orphaned hedge closed");
                        evaluation.orphans_closed.push(orphan.ticket);
                    }
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => warn!(ticket = orphan.ticket, error = %e, "Orphaned hedge could not be closed"),
                }
            }
        }

        for position in &positions {
            if evaluation.orphans_closed.contains(&position.ticket) {
                continue;
            }
            if !self.ledger.is_hedge(position.ticket) {
                self.evaluate(position, now, &mut evaluation).await?;
            }
            self.events
                .position_status(position, self.ledger.role_of(position.ticket));
        }

        Ok(CycleOutcome::Evaluated(evaluation))
    }

    async fn evaluate(
        &mut self,
        position: &Position,
        now: DateTime<Utc>,
        evaluation: &mut EvaluationReport,
    ) -> Result<(), SupervisorError> {
        let desk = OrderDesk::new(self.gateway.as_ref(), self.deviation);
        match evaluate_position(position, &self.ledger, &self.config) {
            LossDecision::Hold | LossDecision::AlreadyHedged(_) => {}
            LossDecision::PlaceHedge => {
                let volume = self.config.hedge_volume;
                match desk
                    .open_hedge_order(&mut self.ledger, position, volume, self.clock.now())
                    .await
                {
                    Ok(hedge) => evaluation.hedges_placed.push((position.ticket, hedge)),
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        warn!(ticket = position.ticket, symbol = position.symbol, error = %e, "No hedge this cycle");
                        evaluation.hedge_failures.push((position.ticket, e));
                    }
                }
            }
            LossDecision::AtCapacity => {
                if self
                    .warnings
                    .should_warn(&position.symbol, now, self.config.warning_cooldown())
                {
                    let counts = self.ledger.counts(&position.symbol);
                    warn!(
                        symbol = position.symbol,
                        originals = counts.originals,
                        hedges = counts.hedges,
                        "Max hedge orders reached"
                    );
                    self.events.status_text(max_hedges_text(&position.symbol));
                    evaluation.capacity_warnings.push(position.symbol.clone());
                }
            }
        }
        Ok(())
    }

    async fn close_out(&mut self, total_profit: Decimal) -> Result<CycleOutcome, SupervisorError> {
        self.state.set_phase(SupervisorPhase::ClosingAll);
        info!(
            %total_profit,
            threshold = %self.config.profit_threshold,
            "Profit target reached, closing all positions"
        );

        let desk = OrderDesk::new(self.gateway.as_ref(), self.deviation);
        let summary = match desk.close_all_orders(&mut self.ledger).await {
            Ok(summary) => summary,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Close-out aborted, will retry next cycle");
                return Err(SupervisorError::FetchFailure(e));
            }
            Err(e) => return Err(SupervisorError::LoopFatal(e.to_string())),
        };

        let remaining = match self.gateway.list_open_positions().await {
            Ok(positions) => positions,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Could not confirm close-out");
                Vec::new()
            }
            Err(e) => return Err(SupervisorError::LoopFatal(e.to_string())),
        };
        for position in &remaining {
            warn!(
                ticket = position.ticket,
                symbol = position.symbol,
                "Position could not be closed"
            );
        }
        info!(
            closed = summary.closed.len(),
            failed = summary.failed.len(),
            "Close-out finished"
        );

        self.state.set_running(false);
        Ok(CycleOutcome::ProfitTargetHit {
            total_profit,
            summary,
            remaining: remaining.iter().map(|p| p.ticket).collect(),
        })
    }
}
