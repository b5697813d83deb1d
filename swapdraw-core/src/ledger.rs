use crate::error::{Result, SwapdrawError};
use crate::types::TokenAmount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Jackpot accounting. Contributions come in through [`contribute`]; payouts
/// can only be applied by the distribution engine.
///
/// [`contribute`]: JackpotLedger::contribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JackpotLedger {
    total_accumulated: TokenAmount,
    undistributed: TokenAmount,
    total_paid: TokenAmount,
    last_win_at: Option<DateTime<Utc>>,
    participant_count: u64,
    win_count: u64,
}

impl JackpotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hypothetical ledger for what-if calculations: `undistributed` fresh
    /// funds, `participant_count` entries and an optional previous win.
    pub fn preview(
        undistributed: TokenAmount,
        participant_count: u64,
        last_win_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            total_accumulated: undistributed,
            undistributed,
            total_paid: 0,
            last_win_at,
            participant_count,
            win_count: u64::from(last_win_at.is_some()),
        }
    }

    pub fn total_accumulated(&self) -> TokenAmount {
        self.total_accumulated
    }

    pub fn undistributed(&self) -> TokenAmount {
        self.undistributed
    }

    pub fn total_paid(&self) -> TokenAmount {
        self.total_paid
    }

    pub fn last_win_at(&self) -> Option<DateTime<Utc>> {
        self.last_win_at
    }

    pub fn participant_count(&self) -> u64 {
        self.participant_count
    }

    pub fn win_count(&self) -> u64 {
        self.win_count
    }

    /// Fee revenue pushed in by the bookkeeping collaborator.
    pub fn contribute(&mut self, amount: TokenAmount) -> Result<()> {
        let total = self
            .total_accumulated
            .checked_add(amount)
            .ok_or_else(|| SwapdrawError::internal("jackpot total overflow"))?;
        let undistributed = self
            .undistributed
            .checked_add(amount)
            .ok_or_else(|| SwapdrawError::internal("jackpot balance overflow"))?;

        self.total_accumulated = total;
        self.undistributed = undistributed;
        Ok(())
    }

    pub fn record_participant(&mut self) {
        self.participant_count = self.participant_count.saturating_add(1);
    }

    pub(crate) fn apply_payout(&mut self, amount: TokenAmount, now: DateTime<Utc>) -> Result<()> {
        let remaining = self.undistributed.checked_sub(amount).ok_or_else(|| {
            SwapdrawError::internal(format!(
                "payout {} exceeds undistributed balance {}",
                amount, self.undistributed
            ))
        })?;

        self.undistributed = remaining;
        self.total_paid = self.total_paid.saturating_add(amount);
        self.last_win_at = Some(now);
        self.win_count += 1;
        Ok(())
    }
}
