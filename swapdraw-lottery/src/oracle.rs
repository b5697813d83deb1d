use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use swapdraw_core::{Address, OracleRequestId, RandomValue};

/// Request side of the randomness oracle. Fulfillment arrives later through
/// `RemoteAgent::on_oracle_fulfilled`.
#[async_trait]
pub trait RandomnessOracle: Send + Sync {
    async fn request_randomness(&self) -> Result<OracleRequestId>;
}

/// In-process oracle that hands out sequential ids and remembers which are
/// still waiting for a value.
#[derive(Debug)]
pub struct MockOracle {
    address: Address,
    next_id: AtomicU64,
    pending: Mutex<Vec<OracleRequestId>>,
}

impl MockOracle {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Identity the oracle calls back with.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn pending(&self) -> Vec<OracleRequestId> {
        self.pending.lock().clone()
    }

    pub fn take_pending(&self) -> Vec<OracleRequestId> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn random_value<R: RngCore + ?Sized>(rng: &mut R) -> RandomValue {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        RandomValue::from_bytes(bytes)
    }
}

#[async_trait]
impl RandomnessOracle for MockOracle {
    async fn request_randomness(&self) -> Result<OracleRequestId> {
        let id = OracleRequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().push(id);
        tracing::debug!("Mock oracle accepted request {}", id);
        Ok(id)
    }
}
