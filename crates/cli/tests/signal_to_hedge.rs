//! End-to-end flow over the paper terminal: signal intake, loss hedging, profit close-out.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use hedger_core::{AppConfig, BrokerGateway, Direction};
use hedger_mt5::PaperTerminal;
use hedger_signals::SignalProcessor;
use hedger_supervisor::{
    CycleOutcome, EquityMonitor, EquitySupervisor, EventSink, ManualClock, SupervisorState,
};

#[tokio::test]
async fn signal_is_hedged_then_closed_at_target() {
    let mut config = AppConfig::default();
    config.hedging.max_restarts = Some(0);
    let paper = Arc::new(
        PaperTerminal::new(dec!(10000)).with_symbol("XAUUSD", dec!(2650.00), dec!(2650.50)),
    );
    let gateway: Arc<dyn BrokerGateway> = paper.clone();
    let clock = Arc::new(ManualClock::default());

    // The background monitor watches a detached terminal and gives up on its first poll; the
    // cycles below are driven by hand against `paper`.
    let watched = Arc::new(PaperTerminal::new(dec!(0)));
    watched.detach();
    let monitor = EquityMonitor::new(watched, &config, clock.clone(), EventSink::disabled());
    let processor = SignalProcessor::new(Arc::clone(&gateway), &config, monitor);
    let placed = processor.process("BUY XAUUSD\nENTRY: 2650").await.unwrap();
    let original = placed.ticket.unwrap();
    assert!(placed.monitor_started);

    let mut supervisor = EquitySupervisor::new(
        Arc::clone(&gateway),
        config.hedging.clone(),
        config.broker.deviation,
        clock.clone(),
        EventSink::disabled(),
        Arc::new(SupervisorState::new()),
    );

    paper.set_profit(original, dec!(-26));
    let CycleOutcome::Evaluated(report) = supervisor.run_cycle().await.unwrap() else {
        panic!("expected evaluation");
    };
    let (_, hedge) = report.hedges_placed[0];
    assert_eq!(paper.position(hedge).unwrap().direction, Direction::Sell);
    assert_eq!(paper.position(hedge).unwrap().comment, format!("hedge:{original}"));

    clock.advance(Duration::from_secs(10));
    paper.set_profit(original, dec!(-40));
    paper.set_profit(hedge, dec!(55));
    let outcome = supervisor.run_cycle().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::ProfitTargetHit { .. }));
    assert!(paper.open_positions().is_empty());
    assert_eq!(paper.balance(), dec!(10015));
}
