use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use hedger_core::{BrokerGateway, DEFAULT_CONFIG_PATH};
use hedger_supervisor::{Clock, HedgeLedger, OrderDesk, SystemClock};

use super::gateway;

#[derive(Args, Debug)]
pub struct CloseAllArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,
    #[arg(long)]
    pub paper: bool,
}

pub async fn close_all(args: CloseAllArgs) -> Result<()> {
    let config = gateway::load_config(&args.config, args.paper)?;
    let gateway = gateway::connect(&config).await?;

    let positions = gateway
        .list_open_positions()
        .await
        .context("Failed to fetch open positions")?;
    let mut ledger = HedgeLedger::new();
    ledger.reconcile(&positions, SystemClock.now(), Duration::ZERO);

    info!(count = positions.len(), "Closing all positions");
    let summary = OrderDesk::new(gateway.as_ref(), config.broker.deviation)
        .close_all_orders(&mut ledger)
        .await
        .context("Close-out failed")?;

    println!("Closed: {:?}", summary.closed);
    for (ticket, error) in &summary.failed {
        println!("Could not close {ticket}: {error}");
    }
    if !summary.is_complete() {
        anyhow::bail!("{} position(s) could not be closed", summary.failed.len());
    }
    Ok(())
}
