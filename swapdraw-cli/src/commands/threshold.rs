use crate::commands::bps_pct;
use crate::units::{format_units, parse_units};
use anyhow::Result;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use swapdraw_core::{LotteryConfig, ProbabilityEngine, TokenAmount, UNIT};
use swapdraw_lottery::PityAccumulator;

/// Loss streaks beyond this cannot raise the multiplier any further.
const MAX_LOSS_STREAK: u64 = 1_000_000;

#[derive(Args)]
pub struct ThresholdArgs {
    /// Stake in whole tokens (omit for a sweep from the floor to the ceiling)
    #[arg(short, long)]
    amount: Option<String>,
    /// Loyalty score of the participant
    #[arg(short, long, default_value_t = 0)]
    boost: u128,
    /// Consecutive losses before this entry
    #[arg(short, long, default_value_t = 0)]
    pity: u64,
}

pub fn handle_threshold_command(args: ThresholdArgs, config: &LotteryConfig) -> Result<()> {
    let engine = ProbabilityEngine::new(config.probability.clone())?;

    let mut pity = PityAccumulator::new(config.pity.clone());
    for _ in 0..args.pity.min(MAX_LOSS_STREAK) {
        pity.record_loss();
    }
    let pity_bps = pity.multiplier_bps();

    let amounts: Vec<TokenAmount> = match &args.amount {
        Some(amount) => vec![parse_units(amount)?],
        None => [1u128, 10, 100, 1_000, 5_000, 10_000]
            .iter()
            .map(|whole| whole * UNIT)
            .collect(),
    };

    let boost_bps = engine.boost_multiplier_bps(args.boost);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Stake",
        "Base",
        "Boost",
        "Pity",
        "Threshold",
        "Win chance",
    ]);

    for amount in amounts {
        let threshold = engine.threshold_with_pity(amount, args.boost, pity_bps);
        table.add_row(vec![
            format_units(amount),
            engine.base_threshold(amount).to_string(),
            format!("{:.2}x", boost_bps as f64 / 10_000.0),
            format!("{:.2}x", pity_bps as f64 / 10_000.0),
            threshold.to_string(),
            format!("{:.4}%", engine.win_probability_pct(threshold)),
        ]);
    }

    println!("{}", table);
    println!(
        "Thresholds are out of {}; absolute cap {} ({}).",
        engine.config().scale,
        engine.config().absolute_cap,
        bps_pct(engine.config().absolute_cap * 10_000 / engine.config().scale)
    );
    Ok(())
}
