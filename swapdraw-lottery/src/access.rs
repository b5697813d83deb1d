use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use swapdraw_core::{Address, SwapdrawError};

/// Entry points that need an allow-listed caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Classifies transfers as qualifying swaps and opens entries.
    SwapTrigger,
    /// Pushes fee revenue into the jackpot.
    FeeCollector,
    Admin,
    /// Delivers randomness on the remote domain.
    Oracle,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::SwapTrigger => "swap-trigger",
            Capability::FeeCollector => "fee-collector",
            Capability::Admin => "admin",
            Capability::Oracle => "oracle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
pub struct AccessControl {
    grants: RwLock<HashMap<Capability, HashSet<Address>>>,
}

impl AccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(admin: Address) -> Self {
        let access = Self::new();
        access.grant(Capability::Admin, admin);
        access
    }

    /// Unchecked grant, for wiring at construction time.
    pub fn grant(&self, capability: Capability, holder: Address) {
        self.grants.write().entry(capability).or_default().insert(holder);
        tracing::debug!("Granted {} to {}", capability, holder);
    }

    /// Grant on behalf of an admin.
    pub fn grant_as(&self, admin: Address, capability: Capability, holder: Address) -> Result<()> {
        self.require(Capability::Admin, admin)?;
        self.grant(capability, holder);
        Ok(())
    }

    pub fn revoke_as(&self, admin: Address, capability: Capability, holder: Address) -> Result<bool> {
        self.require(Capability::Admin, admin)?;
        let removed = self
            .grants
            .write()
            .get_mut(&capability)
            .is_some_and(|holders| holders.remove(&holder));
        if removed {
            tracing::info!("Revoked {} from {}", capability, holder);
        }
        Ok(removed)
    }

    pub fn has(&self, capability: Capability, caller: Address) -> bool {
        self.grants
            .read()
            .get(&capability)
            .is_some_and(|holders| holders.contains(&caller))
    }

    pub fn require(&self, capability: Capability, caller: Address) -> Result<()> {
        if self.has(capability, caller) {
            return Ok(());
        }
        tracing::warn!("Caller {} denied {} capability", caller, capability);
        Err(SwapdrawError::UnauthorizedCaller {
            caller,
            capability: capability.to_string(),
        }
        .into())
    }
}
