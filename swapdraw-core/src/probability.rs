//! Win-threshold computation.
//!
//! A threshold `t` means a draw wins when `random mod scale < t`, so with the
//! default scale of 1,000,000 a threshold of 40,000 is a 4% chance. Every step
//! is integer arithmetic so any observer can recompute a threshold exactly.

use crate::config::{ProbabilityConfig, BPS};
use crate::error::Result;
use crate::types::{RandomValue, TokenAmount};

#[derive(Debug, Clone)]
pub struct ProbabilityEngine {
    config: ProbabilityConfig,
}

impl ProbabilityEngine {
    pub fn new(config: ProbabilityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProbabilityConfig {
        &self.config
    }

    /// Threshold for a stake given the participant's boost score.
    pub fn threshold(&self, amount: TokenAmount, boost_score: u128) -> u64 {
        self.threshold_with_pity(amount, boost_score, BPS)
    }

    /// Same as [`threshold`](Self::threshold) with an extra pity multiplier
    /// (in bps) applied before the absolute cap.
    pub fn threshold_with_pity(&self, amount: TokenAmount, boost_score: u128, pity_bps: u64) -> u64 {
        let base = self.base_threshold(amount);
        let boosted = self.apply_multiplier(base, self.boost_multiplier_bps(boost_score));
        self.apply_multiplier(boosted, pity_bps.max(BPS))
    }

    /// Linear interpolation between `min_threshold` at the floor and
    /// `max_threshold` at the ceiling.
    pub fn base_threshold(&self, amount: TokenAmount) -> u64 {
        let cfg = &self.config;
        let amount = amount.max(cfg.amount_floor);
        if amount >= cfg.amount_ceiling {
            return cfg.max_threshold;
        }

        let span = (cfg.max_threshold - cfg.min_threshold) as u128;
        let progress = amount - cfg.amount_floor;
        let range = cfg.amount_ceiling - cfg.amount_floor;

        match mul_div(progress, span, range) {
            Some(step) => cfg.min_threshold + step as u64,
            None => cfg.max_threshold,
        }
    }

    /// `1x + min(max_bonus, cbrt(score) / scale_factor)`, capped at the
    /// configured multiplier ceiling. Returned in basis points.
    pub fn boost_multiplier_bps(&self, score: u128) -> u64 {
        let cfg = &self.config;
        if score == 0 {
            return BPS;
        }

        // cbrt(score * 1e12) == cbrt(score) * 1e4, i.e. the root in bps.
        let bonus = score
            .checked_mul(1_000_000_000_000)
            .map(|scaled| icbrt(scaled) / cfg.boost_scale_factor as u128)
            .unwrap_or(u128::MAX);
        let bonus = bonus.min(cfg.max_bonus_bps as u128) as u64;

        BPS.saturating_add(bonus).min(cfg.max_multiplier_bps)
    }

    /// Scales `threshold` by `multiplier_bps` and clamps to `absolute_cap`.
    pub fn apply_multiplier(&self, threshold: u64, multiplier_bps: u64) -> u64 {
        let scaled = threshold as u128 * multiplier_bps as u128 / BPS as u128;
        scaled.min(self.config.absolute_cap as u128) as u64
    }

    pub fn is_winner(&self, threshold: u64, random: &RandomValue) -> bool {
        random.reduce(self.config.scale) < threshold
    }

    /// Threshold as a percentage, for display only.
    pub fn win_probability_pct(&self, threshold: u64) -> f64 {
        threshold as f64 * 100.0 / self.config.scale as f64
    }
}

/// `a * b / d` without intermediate overflow when the result fits.
pub(crate) fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    match a.checked_mul(b) {
        Some(product) => Some(product / d),
        None => {
            let whole = (a / d).checked_mul(b)?;
            let rest = (a % d).checked_mul(b)? / d;
            whole.checked_add(rest)
        }
    }
}

/// Integer cube root (floor), digit by digit.
pub fn icbrt(mut x: u128) -> u128 {
    let mut y: u128 = 0;
    let mut s: i32 = 126;
    while s >= 0 {
        y <<= 1;
        let b = 3 * y * (y + 1) + 1;
        if (x >> s) >= b {
            x -= b << s;
            y += 1;
        }
        s -= 3;
    }
    y
}
