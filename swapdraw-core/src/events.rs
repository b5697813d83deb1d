use crate::distribution::Distribution;
use crate::types::{
    Address, DomainId, EntryOutcome, OracleRequestId, RequestId, TokenAmount,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Observable state changes for off-chain consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    EntryOpened {
        request_id: RequestId,
        participant: Address,
        stake: TokenAmount,
        threshold: u64,
    },
    RequestRelayed {
        request_id: RequestId,
        oracle_request_id: OracleRequestId,
    },
    RandomnessForwarded {
        request_id: RequestId,
        oracle_request_id: OracleRequestId,
    },
    EntryResolved {
        request_id: RequestId,
        participant: Address,
        outcome: EntryOutcome,
        draw: Option<u64>,
    },
    JackpotWon(Distribution),
    JackpotContributed {
        amount: TokenAmount,
        undistributed: TokenAmount,
    },
    SourceRejected {
        domain: DomainId,
        sender: Address,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn publish(&self, notification: Notification) {
        // Nobody listening is fine.
        if self.sender.send(notification).is_err() {
            tracing::trace!("Notification dropped: no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
