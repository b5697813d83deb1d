use super::{BridgeMessage, Envelope};
use crate::config::ChainEndpointConfig;
use crate::error::{Result, SwapdrawError};
use crate::types::{Address, DomainId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Accepts messages only from the configured counterpart on the configured
/// remote domain.
#[derive(Debug)]
pub struct TrustedPeer {
    endpoint: RwLock<ChainEndpointConfig>,
    rejected: AtomicU64,
}

impl TrustedPeer {
    pub fn new(endpoint: ChainEndpointConfig) -> Result<Self> {
        endpoint.validate()?;
        Ok(Self {
            endpoint: RwLock::new(endpoint),
            rejected: AtomicU64::new(0),
        })
    }

    pub fn endpoint(&self) -> ChainEndpointConfig {
        self.endpoint.read().clone()
    }

    pub fn local_domain(&self) -> DomainId {
        self.endpoint.read().local_domain
    }

    pub fn remote_domain(&self) -> DomainId {
        self.endpoint.read().remote_domain
    }

    pub fn trusted_remote(&self) -> Address {
        self.endpoint.read().trusted_remote
    }

    /// Replaces the trusted counterpart. Callers are responsible for the
    /// admin check.
    pub fn set_trusted(&self, remote_domain: DomainId, trusted_remote: Address) -> Result<()> {
        let mut endpoint = self.endpoint.write();
        let updated = ChainEndpointConfig {
            local_domain: endpoint.local_domain,
            remote_domain,
            trusted_remote,
        };
        updated.validate()?;
        *endpoint = updated;
        tracing::info!(
            "Trusted remote set to {} on {}",
            trusted_remote,
            remote_domain
        );
        Ok(())
    }

    /// Verifies the envelope's origin and decodes its payload.
    pub fn authenticate(&self, envelope: &Envelope) -> Result<BridgeMessage> {
        let result = self.check(envelope).and_then(|_| BridgeMessage::decode(&envelope.payload));
        if let Err(e) = &result {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "Rejected envelope {} from {} on {}: {}",
                envelope.guid(),
                envelope.sender,
                envelope.src_domain,
                e
            );
        }
        result
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn check(&self, envelope: &Envelope) -> Result<()> {
        let endpoint = self.endpoint.read();
        if envelope.src_domain != endpoint.remote_domain {
            return Err(SwapdrawError::UntrustedChain {
                expected: endpoint.remote_domain,
                actual: envelope.src_domain,
            });
        }
        if envelope.sender != endpoint.trusted_remote {
            return Err(SwapdrawError::UntrustedSource {
                expected: endpoint.trusted_remote,
                actual: envelope.sender,
            });
        }
        if envelope.dst_domain != endpoint.local_domain {
            return Err(SwapdrawError::UnexpectedMessage(format!(
                "envelope addressed to {}, this is {}",
                envelope.dst_domain, endpoint.local_domain
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;

    const LOCAL: DomainId = DomainId(1);
    const REMOTE: DomainId = DomainId(2);
    const PEER: Address = Address::from_low_u64(0xaa);

    fn peer() -> TrustedPeer {
        TrustedPeer::new(ChainEndpointConfig {
            local_domain: LOCAL,
            remote_domain: REMOTE,
            trusted_remote: PEER,
        })
        .unwrap()
    }

    fn envelope(src_domain: DomainId, sender: Address) -> Envelope {
        Envelope {
            src_domain,
            sender,
            dst_domain: LOCAL,
            receiver: Address::from_low_u64(1),
            nonce: 0,
            payload: BridgeMessage::EntryRequest {
                request_id: RequestId(1),
            }
            .encode()
            .unwrap(),
        }
    }

    #[test]
    fn test_accepts_trusted_peer() {
        let peer = peer();
        let msg = peer.authenticate(&envelope(REMOTE, PEER)).unwrap();
        assert_eq!(msg.request_id(), RequestId(1));
        assert_eq!(peer.rejected_count(), 0);
    }

    #[test]
    fn test_rejects_wrong_chain_and_sender() {
        let peer = peer();

        let err = peer.authenticate(&envelope(DomainId(3), PEER)).unwrap_err();
        assert!(matches!(err, SwapdrawError::UntrustedChain { .. }));

        let err = peer
            .authenticate(&envelope(REMOTE, Address::from_low_u64(0xbb)))
            .unwrap_err();
        assert!(matches!(err, SwapdrawError::UntrustedSource { .. }));
        assert!(err.is_authentication_failure());

        assert_eq!(peer.rejected_count(), 2);
    }

    #[test]
    fn test_set_trusted() {
        let peer = peer();
        let new_peer = Address::from_low_u64(0xcc);
        peer.set_trusted(REMOTE, new_peer).unwrap();

        assert!(peer.authenticate(&envelope(REMOTE, PEER)).is_err());
        assert!(peer.authenticate(&envelope(REMOTE, new_peer)).is_ok());

        // The local domain can never be its own counterpart.
        assert!(peer.set_trusted(LOCAL, new_peer).is_err());
        assert_eq!(peer.trusted_remote(), new_peer);
    }
}
