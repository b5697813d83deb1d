//! Single-process deployment of both domains over the in-memory bridge,
//! plus the driver that shuttles envelopes and oracle answers between them.

use crate::access::{AccessControl, Capability};
use crate::boost::{StaticAccountInspector, StaticBoostProvider};
use crate::coordinator::{OriginCoordinator, OriginServices, Resolution};
use crate::oracle::MockOracle;
use crate::remote::{RemoteAgent, RemoteServices};
use crate::Result;
use rand::RngCore;
use std::sync::Arc;
use swapdraw_core::{
    Address, ChainEndpointConfig, Clock, DomainId, EventBus, LotteryConfig, MemoryBridge,
    MemoryEndpoint, OracleRequestId, RandomValue, RequestId, Storage, TokenAmount,
};
use uuid::Uuid;

pub const ORIGIN_DOMAIN: DomainId = DomainId(1);
pub const REMOTE_DOMAIN: DomainId = DomainId(2);

pub const ORIGIN_COORDINATOR: Address = Address::from_low_u64(0x0a);
pub const REMOTE_AGENT: Address = Address::from_low_u64(0x0b);
pub const ADMIN: Address = Address::from_low_u64(0xad);
pub const SWAP_TRIGGER: Address = Address::from_low_u64(0x5a);
pub const FEE_COLLECTOR: Address = Address::from_low_u64(0xfe);
pub const ORACLE: Address = Address::from_low_u64(0x0c);

/// What one delivery pass did.
#[derive(Debug, Clone, Default)]
pub struct RelayReport {
    pub delivered: usize,
    pub rejected: usize,
    pub oracle_fulfilled: usize,
    pub resolutions: Vec<Resolution>,
}

impl RelayReport {
    fn merge(&mut self, other: RelayReport) {
        self.delivered += other.delivered;
        self.rejected += other.rejected;
        self.oracle_fulfilled += other.oracle_fulfilled;
        self.resolutions.extend(other.resolutions);
    }

    fn is_idle(&self) -> bool {
        self.delivered == 0 && self.rejected == 0 && self.oracle_fulfilled == 0
    }
}

pub struct Relay {
    id: Uuid,
    bridge: Arc<MemoryBridge>,
    origin_endpoint: Arc<MemoryEndpoint>,
    remote_endpoint: Arc<MemoryEndpoint>,
    origin: Arc<OriginCoordinator>,
    remote: Arc<RemoteAgent>,
    oracle: Arc<MockOracle>,
    access: Arc<AccessControl>,
    boost: Arc<StaticBoostProvider>,
    inspector: Arc<StaticAccountInspector>,
    events: EventBus,
}

impl Relay {
    /// Wires an origin coordinator and a remote agent that trust each other,
    /// with the well-known role addresses above already granted.
    pub fn local(
        config: LotteryConfig,
        clock: Arc<dyn Clock>,
        events: EventBus,
        storage: Option<Arc<Storage>>,
    ) -> Result<Self> {
        let bridge = MemoryBridge::new();
        let origin_endpoint = Arc::new(bridge.endpoint(ORIGIN_DOMAIN, ORIGIN_COORDINATOR));
        let remote_endpoint = Arc::new(bridge.endpoint(REMOTE_DOMAIN, REMOTE_AGENT));

        let access = Arc::new(AccessControl::with_admin(ADMIN));
        access.grant(Capability::SwapTrigger, SWAP_TRIGGER);
        access.grant(Capability::FeeCollector, FEE_COLLECTOR);
        access.grant(Capability::Oracle, ORACLE);

        let boost = Arc::new(StaticBoostProvider::new());
        let inspector = Arc::new(StaticAccountInspector::new());
        let oracle = Arc::new(MockOracle::new(ORACLE));

        let origin = OriginCoordinator::new(
            ORIGIN_COORDINATOR,
            config,
            ChainEndpointConfig {
                local_domain: ORIGIN_DOMAIN,
                remote_domain: REMOTE_DOMAIN,
                trusted_remote: REMOTE_AGENT,
            },
            OriginServices {
                transport: origin_endpoint.clone(),
                access: access.clone(),
                boost: boost.clone(),
                inspector: inspector.clone(),
                clock: clock.clone(),
                events: events.clone(),
                storage: storage.clone(),
            },
        )?;

        let remote = RemoteAgent::new(
            REMOTE_AGENT,
            ChainEndpointConfig {
                local_domain: REMOTE_DOMAIN,
                remote_domain: ORIGIN_DOMAIN,
                trusted_remote: ORIGIN_COORDINATOR,
            },
            RemoteServices {
                transport: remote_endpoint.clone(),
                oracle: oracle.clone(),
                access: access.clone(),
                clock,
                events: events.clone(),
                storage,
            },
        )?;

        let id = Uuid::new_v4();
        tracing::info!("Relay {} wired {} <-> {}", id, ORIGIN_DOMAIN, REMOTE_DOMAIN);

        Ok(Self {
            id,
            bridge,
            origin_endpoint,
            remote_endpoint,
            origin: Arc::new(origin),
            remote: Arc::new(remote),
            oracle,
            access,
            boost,
            inspector,
            events,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bridge(&self) -> &Arc<MemoryBridge> {
        &self.bridge
    }

    /// Inbox of the origin domain (fulfillments land here).
    pub fn origin_endpoint(&self) -> &Arc<MemoryEndpoint> {
        &self.origin_endpoint
    }

    /// Inbox of the remote domain (entry requests land here).
    pub fn remote_endpoint(&self) -> &Arc<MemoryEndpoint> {
        &self.remote_endpoint
    }

    pub fn origin(&self) -> &Arc<OriginCoordinator> {
        &self.origin
    }

    pub fn remote(&self) -> &Arc<RemoteAgent> {
        &self.remote
    }

    pub fn oracle(&self) -> &Arc<MockOracle> {
        &self.oracle
    }

    pub fn access(&self) -> &Arc<AccessControl> {
        &self.access
    }

    pub fn boost(&self) -> &Arc<StaticBoostProvider> {
        &self.boost
    }

    pub fn inspector(&self) -> &Arc<StaticAccountInspector> {
        &self.inspector
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Opens an entry as the swap-detection collaborator.
    pub async fn swap(&self, participant: Address, stake: TokenAmount) -> Result<RequestId> {
        self.origin.open_entry(SWAP_TRIGGER, participant, stake).await
    }

    /// Contributes to the jackpot as the fee collector.
    pub async fn fund(&self, amount: TokenAmount) -> Result<()> {
        self.origin.add_to_jackpot(FEE_COLLECTOR, amount).await
    }

    /// Delivers queued envelopes to both domains until both inboxes are
    /// empty. Rejected deliveries are counted, never fatal.
    pub async fn deliver_pending(&self) -> RelayReport {
        let mut report = RelayReport::default();
        loop {
            let to_remote = self.remote_endpoint.drain().await;
            let to_origin = self.origin_endpoint.drain().await;
            if to_remote.is_empty() && to_origin.is_empty() {
                break;
            }

            for envelope in &to_remote {
                match self.remote.on_bridge_message(envelope).await {
                    Ok(_) => report.delivered += 1,
                    Err(e) => {
                        tracing::debug!("Remote dropped envelope {}: {}", envelope.guid(), e);
                        report.rejected += 1;
                    }
                }
            }
            for envelope in &to_origin {
                match self.origin.on_bridge_message(envelope).await {
                    Ok(resolution) => {
                        report.delivered += 1;
                        report.resolutions.push(resolution);
                    }
                    Err(e) => {
                        tracing::debug!("Origin dropped envelope {}: {}", envelope.guid(), e);
                        report.rejected += 1;
                    }
                }
            }
        }
        report
    }

    /// Answers every outstanding oracle request with `value_for(id)`.
    pub async fn fulfill_oracle_with<F>(&self, mut value_for: F) -> Result<usize>
    where
        F: FnMut(OracleRequestId) -> RandomValue,
    {
        let pending = self.oracle.take_pending();
        for id in &pending {
            let value = value_for(*id);
            self.remote
                .on_oracle_fulfilled(self.oracle.address(), *id, &[value])
                .await?;
        }
        Ok(pending.len())
    }

    pub async fn fulfill_oracle<R: RngCore>(&self, rng: &mut R) -> Result<usize> {
        self.fulfill_oracle_with(|_| MockOracle::random_value(&mut *rng))
            .await
    }

    /// Alternates delivery and oracle fulfillment until nothing moves.
    pub async fn run_until_quiescent<R: RngCore>(&self, rng: &mut R) -> Result<RelayReport> {
        let mut total = RelayReport::default();
        loop {
            let mut round = self.deliver_pending().await;
            round.oracle_fulfilled = self.fulfill_oracle(rng).await?;
            let idle = round.is_idle();
            total.merge(round);
            if idle {
                break;
            }
        }
        Ok(total)
    }
}
