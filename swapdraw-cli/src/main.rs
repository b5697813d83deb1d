mod commands;
mod config;
mod units;

use clap::{Parser, Subcommand};
use config::CliConfig;
use std::path::PathBuf;
use swapdraw_core::SwapdrawError;
use swapdraw_lottery::LotteryError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "swapdraw")]
#[command(about = "Swap-triggered jackpot: thresholds, distribution and simulations")]
#[command(version)]
struct Cli {
    /// Data directory for configuration and the audit archive
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Lottery configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Win threshold for a stake, boost score and loss streak
    Threshold(commands::ThresholdArgs),

    /// Jackpot release for a given pool state
    Distribution(commands::DistributionArgs),

    /// Configuration commands
    #[command(subcommand)]
    Config(commands::ConfigCommands),

    /// Run swaps end to end through both domains
    Simulate(commands::SimulateArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "swapdraw_cli={0},swapdraw_core={0},swapdraw_lottery={0}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = CliConfig::new(cli.data_dir, cli.config);

    let result = run(cli.command, &settings).await;

    if let Err(e) = result {
        let core = e
            .downcast_ref::<SwapdrawError>()
            .or_else(|| e.downcast_ref::<LotteryError>().and_then(LotteryError::core));
        match core {
            Some(SwapdrawError::Config(msg)) => {
                eprintln!("Error: Invalid configuration: {}", msg);
                eprintln!("Use 'swapdraw config write' to start from the defaults");
            }
            Some(SwapdrawError::Storage(err)) => {
                eprintln!("Error: Audit archive unavailable: {}", err);
                eprintln!("Pass --no-archive to simulate in memory");
            }
            _ => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, settings: &CliConfig) -> anyhow::Result<()> {
    match command {
        Commands::Threshold(args) => {
            commands::handle_threshold_command(args, &settings.lottery_config()?)
        }
        Commands::Distribution(args) => {
            commands::handle_distribution_command(args, &settings.lottery_config()?)
        }
        Commands::Config(cmd) => commands::handle_config_command(cmd, settings),
        Commands::Simulate(args) => {
            let lottery = settings.lottery_config()?;
            commands::handle_simulate_command(args, lottery, settings).await
        }
    }
}
