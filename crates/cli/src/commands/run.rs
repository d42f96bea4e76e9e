use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use hedger_core::DEFAULT_CONFIG_PATH;
use hedger_signals::SignalProcessor;
use hedger_supervisor::{EquityMonitor, EventSink, SupervisorEvent, SystemClock};

use super::gateway;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,
    /// Trade against the in-memory paper terminal regardless of config
    #[arg(long)]
    pub paper: bool,
    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<String>,
}

/// Supervise the account and execute signals read from stdin.
///
/// Signals are separated by blank lines. Closing stdin stops intake but keeps supervising.
pub async fn run(args: RunArgs) -> Result<()> {
    info!(config = args.config, paper = args.paper, "Starting signal hedger");
    let config = gateway::load_config(&args.config, args.paper)?;
    let gateway = gateway::connect(&config).await?;

    let (events, rx) = EventSink::channel();
    tokio::spawn(relay_events(rx));

    let monitor = EquityMonitor::new(Arc::clone(&gateway), &config, Arc::new(SystemClock), events);
    let _ = monitor.ensure_running();
    let processor = SignalProcessor::new(gateway, &config, monitor.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut block: Vec<String> = Vec::new();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {
                        flush(&processor, &mut block).await;
                    }
                    Ok(Some(line)) => block.push(line),
                    Ok(None) => {
                        flush(&processor, &mut block).await;
                        info!("Signal input closed, supervising until Ctrl+C");
                        stdin_open = false;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read signal input");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    let state = monitor.state();
    info!(running = state.is_running(), phase = ?state.phase(), "Signal hedger stopped");
    Ok(())
}

async fn flush(processor: &SignalProcessor, block: &mut Vec<String>) {
    if block.is_empty() {
        return;
    }
    let message = block.join("\n");
    block.clear();

    match processor.process(&message).await {
        Ok(placed) => info!(
            symbol = placed.symbol,
            direction = %placed.direction,
            volume = %placed.volume,
            ticket = ?placed.ticket,
            monitor_started = placed.monitor_started,
            "Signal executed"
        ),
        Err(e) => warn!(error = %e, "Signal not executed"),
    }
}

async fn relay_events(mut rx: UnboundedReceiver<SupervisorEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SupervisorEvent::StatusText { text } => info!(status = text, "Supervisor status"),
            SupervisorEvent::PositionStatus { position, role } => debug!(
                ticket = position.ticket,
                symbol = position.symbol,
                profit = %position.profit,
                ?role,
                "Position status"
            ),
        }
    }
}
