use crate::error::{Result, SwapdrawError};
use crate::types::{Address, DomainId, TokenAmount, UNIT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Basis-point denominator used throughout the engines.
pub const BPS: u64 = 10_000;

/// Largest bonus any boost or pity setting may grant (+100x).
pub const MAX_BONUS_BPS: u64 = 100 * BPS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityConfig {
    /// Random draws are reduced modulo this value.
    pub scale: u64,
    pub amount_floor: TokenAmount,
    pub amount_ceiling: TokenAmount,
    /// Threshold at or below `amount_floor` (0.0004% of 1e6).
    pub min_threshold: u64,
    /// Threshold at or above `amount_ceiling` (4% of 1e6).
    pub max_threshold: u64,
    pub max_bonus_bps: u64,
    pub boost_scale_factor: u64,
    pub max_multiplier_bps: u64,
    /// No stake/boost/pity combination may exceed this (10% of 1e6).
    pub absolute_cap: u64,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            scale: 1_000_000,
            amount_floor: UNIT,
            amount_ceiling: 10_000 * UNIT,
            min_threshold: 4,
            max_threshold: 40_000,
            max_bonus_bps: 15_000,
            boost_scale_factor: 10,
            max_multiplier_bps: 25_000,
            absolute_cap: 100_000,
        }
    }
}

impl ProbabilityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 {
            return Err(SwapdrawError::config("Probability scale must be greater than 0"));
        }
        if self.amount_ceiling <= self.amount_floor {
            return Err(SwapdrawError::config(
                "Amount ceiling must be greater than amount floor",
            ));
        }
        if self.min_threshold > self.max_threshold {
            return Err(SwapdrawError::config(
                "Minimum threshold cannot exceed maximum threshold",
            ));
        }
        if self.absolute_cap > self.scale {
            return Err(SwapdrawError::config("Absolute cap cannot exceed the scale"));
        }
        if self.boost_scale_factor == 0 {
            return Err(SwapdrawError::config("Boost scale factor must be greater than 0"));
        }
        if self.max_multiplier_bps < BPS {
            return Err(SwapdrawError::config("Multiplier ceiling must be at least 1x"));
        }
        if self.max_bonus_bps > MAX_BONUS_BPS || self.max_multiplier_bps > BPS + MAX_BONUS_BPS {
            return Err(SwapdrawError::config(format!(
                "Boost bonus cannot exceed {} bps",
                MAX_BONUS_BPS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub min_pct_bps: u64,
    pub default_pct_bps: u64,
    pub max_pct_bps: u64,
    pub participant_weight_bps: u64,
    pub time_weight_bps: u64,
    pub size_weight_bps: u64,
    pub participant_saturation: u64,
    pub time_saturation: Duration,
    pub target_size: TokenAmount,
    pub main_share_bps: u64,
    pub secondary_share_bps: u64,
    pub participation_share_bps: u64,
    /// Where the secondary share is sent; the winner when unset.
    #[serde(default)]
    pub secondary_recipient: Option<Address>,
    /// Where the participation share is sent; the winner when unset.
    #[serde(default)]
    pub participation_recipient: Option<Address>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            min_pct_bps: 5_900,
            default_pct_bps: 6_900,
            max_pct_bps: 7_900,
            participant_weight_bps: 3_000,
            time_weight_bps: 3_000,
            size_weight_bps: 4_000,
            participant_saturation: 100,
            time_saturation: Duration::from_secs(30 * 24 * 3600), // 30 days
            target_size: 1_000_000 * UNIT,
            main_share_bps: 8_000,
            secondary_share_bps: 1_500,
            participation_share_bps: 500,
            secondary_recipient: None,
            participation_recipient: None,
        }
    }
}

impl DistributionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_pct_bps <= self.default_pct_bps && self.default_pct_bps <= self.max_pct_bps)
        {
            return Err(SwapdrawError::config(
                "Distribution percentages must satisfy min <= default <= max",
            ));
        }
        if self.max_pct_bps > BPS {
            return Err(SwapdrawError::config("Distribution percentage cannot exceed 100%"));
        }
        let weights = self
            .participant_weight_bps
            .checked_add(self.time_weight_bps)
            .and_then(|sum| sum.checked_add(self.size_weight_bps));
        if weights != Some(BPS) {
            return Err(SwapdrawError::config(format!(
                "Distribution weights must sum to {} bps",
                BPS
            )));
        }
        let shares = self
            .main_share_bps
            .checked_add(self.secondary_share_bps)
            .and_then(|sum| sum.checked_add(self.participation_share_bps));
        if shares != Some(BPS) {
            return Err(SwapdrawError::config(format!(
                "Prize shares must sum to {} bps",
                BPS
            )));
        }
        if self.participant_saturation == 0 || self.time_saturation.is_zero() || self.target_size == 0
        {
            return Err(SwapdrawError::config(
                "Saturation points must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PityConfig {
    pub enabled: bool,
    pub increment_bps: u64,
    pub max_bonus_bps: u64,
}

impl Default for PityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            increment_bps: 1_000,
            max_bonus_bps: 50_000,
        }
    }
}

impl PityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_bonus_bps > MAX_BONUS_BPS {
            return Err(SwapdrawError::config(format!(
                "Pity bonus cannot exceed {} bps",
                MAX_BONUS_BPS
            )));
        }
        if self.increment_bps > self.max_bonus_bps {
            return Err(SwapdrawError::config(
                "Pity increment cannot exceed the pity bonus cap",
            ));
        }
        Ok(())
    }
}

/// Identity of both bridge legs as seen from one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEndpointConfig {
    pub local_domain: DomainId,
    pub remote_domain: DomainId,
    /// The only counterpart whose messages are accepted from `remote_domain`.
    pub trusted_remote: Address,
}

impl ChainEndpointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.local_domain == self.remote_domain {
            return Err(SwapdrawError::config(
                "Local and remote domains must differ",
            ));
        }
        if self.trusted_remote == Address::ZERO {
            return Err(SwapdrawError::config("Trusted remote cannot be the zero address"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotteryConfig {
    pub min_stake: TokenAmount,
    pub probability: ProbabilityConfig,
    pub distribution: DistributionConfig,
    pub pity: PityConfig,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            min_stake: UNIT,
            probability: ProbabilityConfig::default(),
            distribution: DistributionConfig::default(),
            pity: PityConfig::default(),
        }
    }
}

impl LotteryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_stake == 0 {
            return Err(SwapdrawError::config("Minimum stake must be greater than 0"));
        }
        self.probability.validate()?;
        self.distribution.validate()?;
        self.pity.validate()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        LotteryConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_unbalanced_weights() {
        let mut config = LotteryConfig::default();
        config.distribution.size_weight_bps = 5_000;
        assert!(matches!(config.validate(), Err(SwapdrawError::Config(_))));
    }

    #[test]
    fn test_rejects_inverted_percentages() {
        let mut config = DistributionConfig::default();
        config.min_pct_bps = 8_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_overflowing_sums() {
        let mut config = LotteryConfig::default();
        config.distribution.participant_weight_bps = u64::MAX;
        assert!(matches!(config.validate(), Err(SwapdrawError::Config(_))));

        let mut config = LotteryConfig::default();
        config.distribution.main_share_bps = u64::MAX - 100;
        assert!(matches!(config.validate(), Err(SwapdrawError::Config(_))));
    }

    #[test]
    fn test_rejects_unbounded_bonuses() {
        let mut config = LotteryConfig::default();
        config.pity.increment_bps = u64::MAX;
        config.pity.max_bonus_bps = u64::MAX;
        assert!(matches!(config.validate(), Err(SwapdrawError::Config(_))));

        let mut config = LotteryConfig::default();
        config.pity.increment_bps = 2_000;
        config.pity.max_bonus_bps = 1_000;
        assert!(config.validate().is_err());

        let mut config = LotteryConfig::default();
        config.probability.max_bonus_bps = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = LotteryConfig::default();
        config.pity.max_bonus_bps = MAX_BONUS_BPS;
        config.probability.max_bonus_bps = MAX_BONUS_BPS;
        config.validate().unwrap();
    }

    #[test]
    fn test_endpoint_rejects_self_loop() {
        let endpoint = ChainEndpointConfig {
            local_domain: DomainId(1),
            remote_domain: DomainId(1),
            trusted_remote: Address::from_low_u64(7),
        };
        assert!(endpoint.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("swapdraw.json");

        let mut config = LotteryConfig::default();
        config.pity.enabled = false;
        config.save(&path).unwrap();

        let loaded = LotteryConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
