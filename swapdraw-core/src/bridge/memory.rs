use super::{BridgeTransport, Envelope};
use crate::error::{Result, SwapdrawError};
use crate::types::{Address, DomainId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// In-process bridge connecting any number of domains.
///
/// Envelopes are queued per destination domain and handed over only when the
/// receiving side pulls them, so tests can drop, duplicate or reorder them.
#[derive(Debug, Default)]
pub struct MemoryBridge {
    routes: RwLock<HashMap<DomainId, mpsc::UnboundedSender<Envelope>>>,
    nonce: AtomicU64,
}

impl MemoryBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `domain` and returns its endpoint. Re-registering a domain
    /// replaces the previous inbox.
    pub fn endpoint(self: &Arc<Self>, domain: DomainId, address: Address) -> MemoryEndpoint {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.write().insert(domain, tx);
        tracing::debug!("Registered {} at {} on the memory bridge", address, domain);

        MemoryEndpoint {
            bridge: Arc::clone(self),
            domain,
            address,
            inbox: Mutex::new(rx),
        }
    }

    /// Delivers a fully formed envelope, including forged ones.
    pub fn inject(&self, envelope: Envelope) -> Result<()> {
        let routes = self.routes.read();
        let route = routes.get(&envelope.dst_domain).ok_or_else(|| {
            SwapdrawError::transport(format!("no route to {}", envelope.dst_domain))
        })?;
        route
            .send(envelope)
            .map_err(|e| SwapdrawError::transport(format!("inbox closed: {}", e)))
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct MemoryEndpoint {
    bridge: Arc<MemoryBridge>,
    domain: DomainId,
    address: Address,
    inbox: Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

impl MemoryEndpoint {
    pub fn domain(&self) -> DomainId {
        self.domain
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn bridge(&self) -> &Arc<MemoryBridge> {
        &self.bridge
    }

    /// Waits for the next inbound envelope.
    pub async fn recv(&self) -> Option<Envelope> {
        self.inbox.lock().await.recv().await
    }

    /// Takes every envelope currently queued, in arrival order.
    pub async fn drain(&self) -> Vec<Envelope> {
        let mut inbox = self.inbox.lock().await;
        let mut drained = Vec::new();
        while let Ok(envelope) = inbox.try_recv() {
            drained.push(envelope);
        }
        drained
    }
}

#[async_trait]
impl BridgeTransport for MemoryEndpoint {
    async fn send(&self, dst_domain: DomainId, receiver: Address, payload: Vec<u8>) -> Result<String> {
        let envelope = Envelope {
            src_domain: self.domain,
            sender: self.address,
            dst_domain,
            receiver,
            nonce: self.bridge.next_nonce(),
            payload,
        };
        let guid = envelope.guid();
        self.bridge.inject(envelope)?;
        tracing::debug!("Sent envelope {} from {} to {}", guid, self.domain, dst_domain);
        Ok(guid)
    }
}
