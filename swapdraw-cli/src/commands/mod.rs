pub mod config;
pub mod distribution;
pub mod simulate;
pub mod threshold;

pub use config::{handle_config_command, ConfigCommands};
pub use distribution::{handle_distribution_command, DistributionArgs};
pub use simulate::{handle_simulate_command, SimulateArgs};
pub use threshold::{handle_threshold_command, ThresholdArgs};

/// Basis points as a percentage string.
pub(crate) fn bps_pct(bps: u64) -> String {
    format!("{:.2}%", bps as f64 / 100.0)
}
