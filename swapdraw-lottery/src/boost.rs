//! Read-only collaborators consulted when an entry opens.

use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use swapdraw_core::Address;

/// Loyalty/commitment score source.
#[async_trait]
pub trait BoostProvider: Send + Sync {
    async fn boost_score_of(&self, participant: Address) -> Result<u128>;
}

/// Tells whether an account can execute code when it receives a payout.
#[async_trait]
pub trait AccountInspector: Send + Sync {
    async fn is_code_bearing(&self, account: Address) -> Result<bool>;
}

#[derive(Debug, Default)]
pub struct StaticBoostProvider {
    scores: RwLock<HashMap<Address, u128>>,
}

impl StaticBoostProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_score(&self, participant: Address, score: u128) {
        self.scores.write().insert(participant, score);
    }
}

#[async_trait]
impl BoostProvider for StaticBoostProvider {
    async fn boost_score_of(&self, participant: Address) -> Result<u128> {
        Ok(self.scores.read().get(&participant).copied().unwrap_or(0))
    }
}

#[derive(Debug, Default)]
pub struct StaticAccountInspector {
    code_bearing: RwLock<HashSet<Address>>,
}

impl StaticAccountInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_code_bearing(&self, account: Address) {
        self.code_bearing.write().insert(account);
    }
}

#[async_trait]
impl AccountInspector for StaticAccountInspector {
    async fn is_code_bearing(&self, account: Address) -> Result<bool> {
        Ok(self.code_bearing.read().contains(&account))
    }
}
