//! Adaptive jackpot release.
//!
//! On every win the released fraction of the undistributed balance is
//! derived from three saturating signals (participation, time since the last
//! win, pool size). Their weighted mix goes through a concave ease-out curve
//! and is mapped into `[min_pct, max_pct]`. Fixed point uses 1e18 as one.

use crate::config::{DistributionConfig, BPS};
use crate::error::{Result, SwapdrawError};
use crate::ledger::JackpotLedger;
use crate::probability::mul_div;
use crate::types::{Address, PayoutInstruction, PoolId, PrizeSplit, TokenAmount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const ONE: u128 = 1_000_000_000_000_000_000;

/// The three normalized inputs, each in `[0, ONE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionFactors {
    pub participant: u128,
    pub time: u128,
    pub size: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub winner: Address,
    pub pct_bps: u64,
    pub payout: TokenAmount,
    pub split: PrizeSplit,
    pub instructions: Vec<PayoutInstruction>,
    pub remaining: TokenAmount,
}

#[derive(Debug, Clone)]
pub struct DistributionEngine {
    config: DistributionConfig,
}

impl DistributionEngine {
    pub fn new(config: DistributionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    pub fn factors(&self, ledger: &JackpotLedger, now: DateTime<Utc>) -> DistributionFactors {
        let cfg = &self.config;

        let participants = ledger.participant_count().min(cfg.participant_saturation);
        let participant = participants as u128 * ONE / cfg.participant_saturation as u128;

        // No previous win means no time pressure yet.
        let time = match ledger.last_win_at() {
            Some(last) => {
                let elapsed = (now - last).to_std().unwrap_or_default();
                let saturation = cfg.time_saturation.as_secs().max(1) as u128;
                let elapsed = (elapsed.as_secs() as u128).min(saturation);
                elapsed * ONE / saturation
            }
            None => 0,
        };

        let size = ratio(ledger.undistributed(), cfg.target_size);

        DistributionFactors {
            participant,
            time,
            size,
        }
    }

    /// Released fraction in bps; always inside `[min_pct, max_pct]`.
    pub fn distribution_pct(&self, ledger: &JackpotLedger, now: DateTime<Utc>) -> u64 {
        let cfg = &self.config;
        if ledger.undistributed() == 0 || ledger.participant_count() == 0 {
            return cfg.default_pct_bps;
        }

        let f = self.factors(ledger, now);
        let combined = (f.participant * cfg.participant_weight_bps as u128
            + f.time * cfg.time_weight_bps as u128
            + f.size * cfg.size_weight_bps as u128)
            / BPS as u128;
        let smoothed = smooth(combined.min(ONE));

        let range = (cfg.max_pct_bps - cfg.min_pct_bps) as u128;
        let pct = cfg.min_pct_bps + (smoothed * range / ONE) as u64;
        pct.clamp(cfg.min_pct_bps, cfg.max_pct_bps)
    }

    /// Split `payout` by the configured shares; rounding dust stays with the
    /// main prize so the parts always add back up to `payout`.
    pub fn split(&self, payout: TokenAmount) -> PrizeSplit {
        let cfg = &self.config;
        let secondary = mul_div(payout, cfg.secondary_share_bps as u128, BPS as u128).unwrap_or(0);
        let participation =
            mul_div(payout, cfg.participation_share_bps as u128, BPS as u128).unwrap_or(0);
        PrizeSplit {
            main: payout - secondary - participation,
            secondary,
            participation,
        }
    }

    /// Pays `winner` out of `ledger`. The ledger is only touched once the
    /// whole distribution has been computed.
    pub fn distribute(
        &self,
        ledger: &mut JackpotLedger,
        winner: Address,
        now: DateTime<Utc>,
    ) -> Result<Distribution> {
        let pct_bps = self.distribution_pct(ledger, now);
        let undistributed = ledger.undistributed();
        let payout = mul_div(undistributed, pct_bps as u128, BPS as u128)
            .ok_or_else(|| SwapdrawError::internal("payout computation overflow"))?
            .min(undistributed);

        let split = self.split(payout);
        let instructions = self.instructions(winner, &split);

        ledger.apply_payout(payout, now)?;

        tracing::info!(
            "Jackpot distributed to {}: {} of {} ({} bps)",
            winner,
            payout,
            undistributed,
            pct_bps
        );

        Ok(Distribution {
            winner,
            pct_bps,
            payout,
            split,
            instructions,
            remaining: ledger.undistributed(),
        })
    }

    fn instructions(&self, winner: Address, split: &PrizeSplit) -> Vec<PayoutInstruction> {
        let cfg = &self.config;
        [
            (PoolId::Main, winner, split.main),
            (
                PoolId::Secondary,
                cfg.secondary_recipient.unwrap_or(winner),
                split.secondary,
            ),
            (
                PoolId::Participation,
                cfg.participation_recipient.unwrap_or(winner),
                split.participation,
            ),
        ]
        .into_iter()
        .filter(|(_, _, amount)| *amount > 0)
        .map(|(pool, recipient, amount)| PayoutInstruction {
            recipient,
            amount,
            pool,
        })
        .collect()
    }
}

/// `min(a, d) / d` in fixed point. Both operands are shifted down together
/// until the product with `ONE` fits.
fn ratio(a: u128, d: u128) -> u128 {
    if d == 0 {
        return ONE;
    }
    let a = a.min(d);
    let shift = (128 - a.leading_zeros()).saturating_sub(68);
    let d = (d >> shift).max(1);
    ((a >> shift) * ONE / d).min(ONE)
}

/// `x * (2 - x)` on `[0, ONE]`: monotone, concave, `s(0) = 0`, `s(ONE) = ONE`.
fn smooth(x: u128) -> u128 {
    x * (2 * ONE - x) / ONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNIT;
    use chrono::Duration;

    fn engine() -> DistributionEngine {
        DistributionEngine::new(DistributionConfig::default()).unwrap()
    }

    fn ledger(undistributed: TokenAmount, participants: u64) -> JackpotLedger {
        let mut ledger = JackpotLedger::new();
        ledger.contribute(undistributed).unwrap();
        for _ in 0..participants {
            ledger.record_participant();
        }
        ledger
    }

    #[test]
    fn test_smoothing_curve_shape() {
        assert_eq!(smooth(0), 0);
        assert_eq!(smooth(ONE), ONE);
        let mut previous = 0;
        for i in 0..=100u128 {
            let x = ONE * i / 100;
            let s = smooth(x);
            assert!(s >= previous);
            assert!(s >= x, "curve must lie above the diagonal");
            previous = s;
        }
    }

    #[test]
    fn test_size_ratio_handles_large_targets() {
        assert_eq!(ratio(0, 1_000_000 * UNIT), 0);
        assert_eq!(ratio(1_000 * UNIT, 1_000_000 * UNIT), ONE / 1_000);
        assert_eq!(ratio(500_000 * UNIT, 1_000_000 * UNIT), ONE / 2);
        assert_eq!(ratio(u128::MAX, 1_000_000 * UNIT), ONE);
        assert!(ratio(u128::MAX / 2, u128::MAX).abs_diff(ONE / 2) <= 1);
    }

    #[test]
    fn test_degenerate_inputs_use_default() {
        let engine = engine();
        let now = Utc::now();
        assert_eq!(engine.distribution_pct(&ledger(0, 50), now), 6_900);
        assert_eq!(engine.distribution_pct(&ledger(1_000 * UNIT, 0), now), 6_900);
        assert_eq!(engine.distribution_pct(&JackpotLedger::new(), now), 6_900);
    }

    #[test]
    fn test_distribute_empty_jackpot_pays_nothing() {
        let engine = engine();
        let mut ledger = ledger(0, 0);
        let winner = Address::from_low_u64(1);
        let result = engine.distribute(&mut ledger, winner, Utc::now()).unwrap();

        assert_eq!(result.pct_bps, 6_900);
        assert_eq!(result.payout, 0);
        assert!(result.instructions.is_empty());
        assert_eq!(ledger.undistributed(), 0);
        assert_eq!(ledger.win_count(), 1);
    }

    #[test]
    fn test_pct_within_bounds_across_inputs() {
        let engine = engine();
        let start = Utc::now();
        for participants in [0u64, 1, 10, 50, 100, 1_000] {
            for size in [0u128, 1, UNIT, 1_000 * UNIT, 1_000_000 * UNIT, u128::MAX / 2] {
                for elapsed_days in [None, Some(0i64), Some(1), Some(15), Some(30), Some(365)] {
                    let mut l = ledger(size, participants);
                    if let Some(days) = elapsed_days {
                        l.apply_payout(0, start - Duration::days(days)).unwrap();
                    }
                    let pct = engine.distribution_pct(&l, start);
                    assert!((5_900..=7_900).contains(&pct), "pct {} out of range", pct);
                }
            }
        }
    }

    #[test]
    fn test_pct_saturates_at_max() {
        let engine = engine();
        let now = Utc::now();
        let mut l = ledger(2_000_000 * UNIT, 500);
        l.apply_payout(0, now - Duration::days(60)).unwrap();
        assert_eq!(engine.distribution_pct(&l, now), 7_900);
    }

    #[test]
    fn test_pct_grows_with_participants() {
        let engine = engine();
        let now = Utc::now();
        let low = engine.distribution_pct(&ledger(1_000 * UNIT, 1), now);
        let high = engine.distribution_pct(&ledger(1_000 * UNIT, 100), now);
        assert!(high > low);
        // combined = 0.3 + 0.0004, smoothed = 0.51055984
        assert_eq!(high, 5_900 + 1_021);
    }

    #[test]
    fn test_split_sums_to_payout() {
        let engine = engine();
        let split = engine.split(1_000);
        assert_eq!(split.main, 800);
        assert_eq!(split.secondary, 150);
        assert_eq!(split.participation, 50);

        let odd = engine.split(1_003);
        assert_eq!(odd.total(), 1_003);
        assert_eq!(odd.secondary, 150);
        assert_eq!(odd.participation, 50);
        assert_eq!(odd.main, 803);
    }

    #[test]
    fn test_distribute_updates_ledger() {
        let engine = engine();
        let now = Utc::now();
        let mut l = ledger(1_000 * UNIT, 100);
        let winner = Address::from_low_u64(42);

        let result = engine.distribute(&mut l, winner, now).unwrap();
        assert_eq!(result.pct_bps, 6_921);
        assert_eq!(result.payout, 6_921 * UNIT / 10);
        assert_eq!(result.split.total(), result.payout);
        assert_eq!(result.remaining, 3_079 * UNIT / 10);
        assert_eq!(l.undistributed(), 3_079 * UNIT / 10);
        assert_eq!(l.total_paid(), 6_921 * UNIT / 10);
        assert_eq!(l.win_count(), 1);
        assert_eq!(l.last_win_at(), Some(now));

        assert_eq!(result.instructions.len(), 3);
        assert!(result.instructions.iter().all(|i| i.recipient == winner));
        let paid: TokenAmount = result.instructions.iter().map(|i| i.amount).sum();
        assert_eq!(paid, result.payout);
    }

    #[test]
    fn test_configured_pool_recipients() {
        let mut config = DistributionConfig::default();
        let secondary = Address::from_low_u64(0x5ec);
        config.secondary_recipient = Some(secondary);
        let engine = DistributionEngine::new(config).unwrap();

        let mut l = ledger(10_000, 10);
        let winner = Address::from_low_u64(9);
        let result = engine.distribute(&mut l, winner, Utc::now()).unwrap();

        let by_pool = |pool| result.instructions.iter().find(|i| i.pool == pool).unwrap();
        assert_eq!(by_pool(PoolId::Main).recipient, winner);
        assert_eq!(by_pool(PoolId::Secondary).recipient, secondary);
        assert_eq!(by_pool(PoolId::Participation).recipient, winner);
    }

    #[test]
    fn test_ledger_never_negative_over_sequence() {
        let engine = engine();
        let mut l = JackpotLedger::new();
        let mut now = Utc::now();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;

        for _ in 0..2_000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            now += Duration::hours((seed % 72) as i64);

            match seed % 5 {
                0 => {
                    let before = l.undistributed();
                    let result = engine.distribute(&mut l, Address::from_low_u64(seed), now).unwrap();
                    assert!(result.payout <= before);
                    assert_eq!(l.undistributed(), before - result.payout);
                }
                1 => l.record_participant(),
                _ => l.contribute((seed % 10_000) as u128 * UNIT).unwrap(),
            }
            assert!(l.total_paid() + l.undistributed() == l.total_accumulated());
        }
    }
}
