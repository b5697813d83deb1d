use crate::commands::bps_pct;
use crate::config::CliConfig;
use crate::units::{format_units, parse_units};
use anyhow::Result;
use chrono::Duration;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use swapdraw_core::config::BPS;
use swapdraw_core::storage::EntryStore;
use swapdraw_core::{
    Address, EntryOutcome, EventBus, LotteryConfig, ManualClock, Storage, TokenAmount, UNIT,
};
use swapdraw_lottery::{Relay, Resolution};

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of qualifying swaps
    #[arg(short, long, default_value_t = 100)]
    swaps: usize,
    /// RNG seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Starting jackpot in whole tokens
    #[arg(short, long, default_value = "10000")]
    jackpot: String,
    /// Distinct traders taking part
    #[arg(short, long, default_value_t = 25)]
    participants: u64,
    /// Share of each swap paid into the jackpot, in basis points
    #[arg(long, default_value_t = 100)]
    fee_bps: u64,
    /// SQLite audit archive (defaults to swapdraw.db in the data directory)
    #[arg(long)]
    archive: Option<PathBuf>,
    /// Keep everything in memory
    #[arg(long, conflicts_with = "archive")]
    no_archive: bool,
}

pub async fn handle_simulate_command(
    args: SimulateArgs,
    config: LotteryConfig,
    cli: &CliConfig,
) -> Result<()> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let participants = args.participants.max(1);
    let fee_bps = args.fee_bps.min(BPS);

    let storage = if args.no_archive {
        None
    } else {
        let path = args.archive.unwrap_or_else(|| cli.default_archive_path());
        println!("Archiving to {}", path.display());
        Some(Arc::new(Storage::open(&path).await?))
    };

    let clock = Arc::new(ManualClock::default());
    let relay = Relay::local(config, clock.clone(), EventBus::default(), storage.clone())?;

    for n in 1..=participants {
        let score = if rng.gen_bool(0.3) { rng.gen_range(1..=5_000u128) } else { 0 };
        relay.boost().set_score(trader(n), score);
    }

    relay.fund(parse_units(&args.jackpot)?).await?;
    println!(
        "Simulating {} swaps by {} traders (seed {}, relay {})",
        args.swaps,
        participants,
        seed,
        relay.id()
    );

    let mut resolutions: Vec<(TokenAmount, Resolution)> = Vec::with_capacity(args.swaps);
    let mut max_pity = 0u64;
    for _ in 0..args.swaps {
        let participant = trader(rng.gen_range(1..=participants));
        let stake = random_stake(&mut rng);

        let fee = stake / BPS as u128 * fee_bps as u128;
        if fee > 0 {
            relay.fund(fee).await?;
        }
        max_pity = max_pity.max(relay.origin().pity_multiplier_bps().await);
        relay.swap(participant, stake).await?;

        let report = relay.run_until_quiescent(&mut rng).await?;
        resolutions.extend(report.resolutions.into_iter().map(|r| (stake, r)));
        clock.advance(Duration::minutes(rng.gen_range(1..=180)));
    }

    tracing::info!("Simulation {} finished after {} swaps", relay.id(), args.swaps);
    let rejected =
        relay.origin().peer().rejected_count() + relay.remote().peer().rejected_count();

    print_winners(&resolutions);

    let ledger = relay.origin().ledger().await;
    let wins = resolutions
        .iter()
        .filter(|(_, r)| r.outcome == EntryOutcome::Won)
        .count();

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL);
    summary.set_header(vec!["Metric", "Value"]);
    summary.add_row(vec!["Entries resolved".to_string(), resolutions.len().to_string()]);
    summary.add_row(vec!["Wins".to_string(), wins.to_string()]);
    summary.add_row(vec![
        "Losses".to_string(),
        (resolutions.len() - wins).to_string(),
    ]);
    summary.add_row(vec![
        "Jackpot accumulated".to_string(),
        format_units(ledger.total_accumulated()),
    ]);
    summary.add_row(vec!["Paid out".to_string(), format_units(ledger.total_paid())]);
    summary.add_row(vec![
        "Undistributed".to_string(),
        format_units(ledger.undistributed()),
    ]);
    summary.add_row(vec![
        "Peak pity multiplier".to_string(),
        format!("{:.2}x", max_pity as f64 / BPS as f64),
    ]);
    summary.add_row(vec!["Rejected messages".to_string(), rejected.to_string()]);
    println!("{}", summary);

    if let Some(storage) = &storage {
        let archived = EntryStore::new(storage).count_by_outcome(EntryOutcome::Won).await?;
        println!("Archive holds {} winning entries in total", archived);
    }

    Ok(())
}

fn print_winners(resolutions: &[(TokenAmount, Resolution)]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Entry", "Winner", "Stake", "Threshold", "Draw", "Release", "Payout",
    ]);

    let mut any = false;
    for (stake, resolution) in resolutions {
        let Some(distribution) = &resolution.distribution else {
            continue;
        };
        any = true;
        table.add_row(vec![
            resolution.request_id.to_string(),
            resolution.participant.to_string(),
            format_units(*stake),
            resolution.threshold.to_string(),
            resolution.draw.to_string(),
            bps_pct(distribution.pct_bps),
            format_units(distribution.payout),
        ]);
    }

    if any {
        println!("{}", table);
    } else {
        println!("No winners this session.");
    }
}

fn trader(n: u64) -> Address {
    Address::from_low_u64(0x1_0000 + n)
}

/// Log-uniform between 1 and 20,000 tokens, so small swaps dominate.
fn random_stake<R: Rng>(rng: &mut R) -> TokenAmount {
    let exponent: f64 = rng.gen_range(0.0..4.3);
    let milli_tokens = (10f64.powf(exponent) * 1_000.0) as u128;
    (milli_tokens.max(1_000)) * (UNIT / 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_stake_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let stake = random_stake(&mut rng);
            assert!(stake >= UNIT);
            assert!(stake <= 20_000 * UNIT);
        }
    }
}
