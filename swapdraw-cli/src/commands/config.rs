use crate::config::CliConfig;
use anyhow::{bail, Result};
use clap::Subcommand;
use std::path::PathBuf;
use swapdraw_core::LotteryConfig;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as JSON
    Show,
    /// Write the default configuration to a file
    Write {
        /// Destination (defaults to config.json in the data directory)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Validate a configuration file
    Check {
        /// File to validate
        path: PathBuf,
    },
}

pub fn handle_config_command(cmd: ConfigCommands, cli: &CliConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = cli.lottery_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        ConfigCommands::Write { path, force } => {
            let path = path.unwrap_or_else(|| cli.default_config_path());
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            LotteryConfig::default().save(&path)?;
            println!("Configuration written to {}", path.display());
        }

        ConfigCommands::Check { path } => {
            LotteryConfig::load(&path)?;
            println!("{} is valid", path.display());
        }
    }

    Ok(())
}
