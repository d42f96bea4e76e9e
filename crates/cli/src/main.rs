use clap::{Parser, Subcommand};

mod commands;

use commands::{CloseAllArgs, RunArgs, StatusArgs};

#[derive(Parser)]
#[command(name = "hedger")]
#[command(about = "Signal-driven order entry with automatic loss hedging", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read signals from stdin and supervise open positions until Ctrl+C
    Run(RunArgs),
    /// Show account and per-symbol original/hedge P&L
    Status(StatusArgs),
    /// Close every open position
    CloseAll(CloseAllArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(RunArgs {
            log_file: Some(path),
            ..
        }) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(std::io::stderr)
                .init();
        }
    }

    match cli.command {
        Commands::Run(args) => commands::run(args).await?,
        Commands::Status(args) => commands::status(args).await?,
        Commands::CloseAll(args) => commands::close_all(args).await?,
    }

    Ok(())
}
