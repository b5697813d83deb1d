use swapdraw_core::config::{PityConfig, BPS};

/// Global consecutive-loss counter. Every loss raises the next entry's
/// threshold multiplier; any win resets it.
#[derive(Debug, Clone, PartialEq)]
pub struct PityAccumulator {
    config: PityConfig,
    consecutive_losses: u64,
}

impl PityAccumulator {
    pub fn new(config: PityConfig) -> Self {
        Self {
            config,
            consecutive_losses: 0,
        }
    }

    pub fn consecutive_losses(&self) -> u64 {
        self.consecutive_losses
    }

    pub fn multiplier_bps(&self) -> u64 {
        if !self.config.enabled {
            return BPS;
        }
        let bonus = self
            .consecutive_losses
            .saturating_mul(self.config.increment_bps)
            .min(self.config.max_bonus_bps);
        BPS.saturating_add(bonus)
    }

    pub fn record_loss(&mut self) {
        self.consecutive_losses = self.consecutive_losses.saturating_add(1);
    }

    pub fn record_win(&mut self) {
        if self.consecutive_losses > 0 {
            tracing::debug!("Pity reset after {} losses", self.consecutive_losses);
        }
        self.consecutive_losses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_grows_and_caps() {
        let mut pity = PityAccumulator::new(PityConfig::default());
        assert_eq!(pity.multiplier_bps(), 10_000);

        pity.record_loss();
        assert_eq!(pity.multiplier_bps(), 11_000);

        for _ in 0..100 {
            pity.record_loss();
        }
        // +500% at most.
        assert_eq!(pity.multiplier_bps(), 60_000);

        pity.record_win();
        assert_eq!(pity.consecutive_losses(), 0);
        assert_eq!(pity.multiplier_bps(), 10_000);
    }

    #[test]
    fn test_extreme_settings_saturate() {
        let mut pity = PityAccumulator::new(PityConfig {
            enabled: true,
            increment_bps: u64::MAX,
            max_bonus_bps: u64::MAX,
        });
        pity.record_loss();
        pity.record_loss();
        assert_eq!(pity.multiplier_bps(), u64::MAX);
    }

    #[test]
    fn test_disabled_pity() {
        let mut pity = PityAccumulator::new(PityConfig {
            enabled: false,
            ..PityConfig::default()
        });
        pity.record_loss();
        assert_eq!(pity.multiplier_bps(), 10_000);
    }
}
