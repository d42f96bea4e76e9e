use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use hedger_core::{BrokerGateway, DEFAULT_CONFIG_PATH};
use hedger_supervisor::{symbol_pl_breakdown, Clock, HedgeLedger, SystemClock};

use super::gateway;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,
    #[arg(long)]
    pub paper: bool,
    /// Print the breakdown as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn status(args: StatusArgs) -> Result<()> {
    let config = gateway::load_config(&args.config, args.paper)?;
    let gateway = gateway::connect(&config).await?;

    let account = gateway
        .account_summary()
        .await
        .context("Failed to fetch account summary")?;
    let positions = gateway
        .list_open_positions()
        .await
        .context("Failed to fetch open positions")?;

    let mut ledger = HedgeLedger::new();
    ledger.reconcile(&positions, SystemClock.now(), Duration::ZERO);
    let breakdown = symbol_pl_breakdown(&positions, &ledger);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    println!(
        "Balance: {}  Equity: {}  Free margin: {}  Floating P/L: {}",
        account.balance,
        account.equity,
        account.margin_free,
        account.total_profit()
    );
    if breakdown.is_empty() {
        println!("No open positions.");
        return Ok(());
    }

    println!("{:<10} {:>12} {:>12} {:>12}", "Symbol", "Originals", "Hedges", "Net");
    for (symbol, pl) in &breakdown {
        println!(
            "{:<10} {:>12} {:>12} {:>12}",
            symbol,
            pl.originals.round_dp(2),
            pl.hedges.round_dp(2),
            pl.net().round_dp(2)
        );
    }
    Ok(())
}
