use crate::commands::bps_pct;
use crate::units::{format_units, parse_units};
use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use swapdraw_core::{Address, DistributionEngine, JackpotLedger, LotteryConfig};

const FIXED_POINT_ONE: f64 = 1e18;

#[derive(Args)]
pub struct DistributionArgs {
    /// Undistributed jackpot in whole tokens
    #[arg(short, long)]
    undistributed: String,
    /// Entries recorded since the jackpot started
    #[arg(short, long, default_value_t = 0)]
    participants: u64,
    /// Seconds since the previous win (omit if nobody has won yet)
    #[arg(short, long)]
    since_last_win: Option<i64>,
}

pub fn handle_distribution_command(args: DistributionArgs, config: &LotteryConfig) -> Result<()> {
    let engine = DistributionEngine::new(config.distribution.clone())?;
    let undistributed = parse_units(&args.undistributed)?;

    let now = Utc::now();
    let last_win = args.since_last_win.map(|secs| now - Duration::seconds(secs.max(0)));
    let mut ledger = JackpotLedger::preview(undistributed, args.participants, last_win);

    let factors = engine.factors(&ledger, now);
    println!("Factors:");
    println!("  Participants: {:.4}", factors.participant as f64 / FIXED_POINT_ONE);
    println!("  Time:         {:.4}", factors.time as f64 / FIXED_POINT_ONE);
    println!("  Size:         {:.4}", factors.size as f64 / FIXED_POINT_ONE);

    // Preview the payout a winner would get right now.
    let outcome = engine.distribute(&mut ledger, Address::ZERO, now)?;
    println!();
    println!("Release: {} of {}", bps_pct(outcome.pct_bps), format_units(undistributed));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Pool", "Share", "Amount"]);
    let cfg = engine.config();
    table.add_row(vec![
        "main".to_string(),
        bps_pct(cfg.main_share_bps),
        format_units(outcome.split.main),
    ]);
    table.add_row(vec![
        "secondary".to_string(),
        bps_pct(cfg.secondary_share_bps),
        format_units(outcome.split.secondary),
    ]);
    table.add_row(vec![
        "participation".to_string(),
        bps_pct(cfg.participation_share_bps),
        format_units(outcome.split.participation),
    ]);
    println!("{}", table);
    println!("Remaining after payout: {}", format_units(outcome.remaining));

    Ok(())
}
