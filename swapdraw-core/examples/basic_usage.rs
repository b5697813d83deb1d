use chrono::Utc;
use swapdraw_core::storage::LedgerStore;
use swapdraw_core::{
    Address, DistributionEngine, JackpotLedger, LotteryConfig, ProbabilityEngine, Storage, UNIT,
};
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = LotteryConfig::default();
    let probability = ProbabilityEngine::new(config.probability.clone())?;
    let distribution = DistributionEngine::new(config.distribution.clone())?;

    println!("Thresholds:");
    for whole in [1u128, 10, 100, 1_000, 10_000] {
        let threshold = probability.threshold(whole * UNIT, 0);
        println!(
            "  {:>6} tokens -> {:>6} ({:.4}%)",
            whole,
            threshold,
            probability.win_probability_pct(threshold)
        );
    }

    let mut ledger = JackpotLedger::new();
    ledger.contribute(50_000 * UNIT)?;
    for _ in 0..40 {
        ledger.record_participant();
    }

    let winner = Address::from_low_u64(0x1234);
    let outcome = distribution.distribute(&mut ledger, winner, Utc::now())?;
    println!("\nWinner {} receives {:.2}% of the jackpot", winner, outcome.pct_bps as f64 / 100.0);
    for instruction in &outcome.instructions {
        println!("  {} pool: {} base units", instruction.pool, instruction.amount);
    }

    let temp_dir = tempdir()?;
    let storage = Storage::open(&temp_dir.path().join("swapdraw.db")).await?;
    let snapshot_id = LedgerStore::new(&storage).record(&ledger, Utc::now()).await?;
    println!("\nLedger snapshot {} archived", snapshot_id);

    Ok(())
}
