//! Cross-domain messaging.
//!
//! Two message kinds travel between the origin and remote domains. Delivery
//! is at-least-once and unordered, so every receiver must authenticate the
//! envelope and tolerate duplicates.

pub mod auth;
pub mod memory;

pub use auth::TrustedPeer;
pub use memory::{MemoryBridge, MemoryEndpoint};

use crate::error::{Result, SwapdrawError};
use crate::types::{Address, DomainId, RandomValue, RequestId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Origin asks the remote agent for randomness on behalf of `request_id`.
    EntryRequest { request_id: RequestId },
    /// Remote agent answers with the oracle's value.
    Fulfillment {
        request_id: RequestId,
        random_value: RandomValue,
    },
}

impl BridgeMessage {
    pub fn request_id(&self) -> RequestId {
        match self {
            BridgeMessage::EntryRequest { request_id }
            | BridgeMessage::Fulfillment { request_id, .. } => *request_id,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| SwapdrawError::UnexpectedMessage(format!("undecodable payload: {}", e)))
    }
}

/// What the transport actually delivers: payload plus the claimed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub src_domain: DomainId,
    pub sender: Address,
    pub dst_domain: DomainId,
    pub receiver: Address,
    pub nonce: u64,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Stable identifier used for logging and delivery tracking.
    pub fn guid(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.src_domain.0.to_be_bytes());
        hasher.update(self.sender.as_bytes());
        hasher.update(self.dst_domain.0.to_be_bytes());
        hasher.update(self.receiver.as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(&self.payload);
        hex::encode(hasher.finalize())
    }
}

/// Outbound side of the bridge as seen by one domain.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Queues `payload` for `receiver` on `dst_domain` and returns the
    /// envelope guid.
    async fn send(&self, dst_domain: DomainId, receiver: Address, payload: Vec<u8>) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_codec() {
        let msg = BridgeMessage::Fulfillment {
            request_id: RequestId(9),
            random_value: RandomValue::from_u128(42),
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(BridgeMessage::decode(&bytes).unwrap(), msg);
        assert_eq!(msg.request_id(), RequestId(9));

        let err = BridgeMessage::decode(b"{\"type\":\"withdraw\"}").unwrap_err();
        assert!(matches!(err, SwapdrawError::UnexpectedMessage(_)));
    }

    #[test]
    fn test_guid_depends_on_nonce() {
        let envelope = Envelope {
            src_domain: DomainId(1),
            sender: Address::from_low_u64(1),
            dst_domain: DomainId(2),
            receiver: Address::from_low_u64(2),
            nonce: 0,
            payload: vec![1, 2, 3],
        };
        let mut other = envelope.clone();
        other.nonce = 1;

        assert_eq!(envelope.guid(), envelope.clone().guid());
        assert_ne!(envelope.guid(), other.guid());
        assert_eq!(envelope.guid().len(), 64);
    }
}
