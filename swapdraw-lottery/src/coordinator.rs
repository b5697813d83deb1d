//! Origin-side lottery coordinator.
//!
//! Entries are opened by the swap-detection collaborator, relayed to the
//! remote domain for randomness and resolved when an authenticated
//! fulfillment arrives. Each inbound call runs to completion under the state
//! lock: new state is computed on copies, archived, and only then committed,
//! so a failure never leaves a half-applied resolution behind.

use crate::access::{AccessControl, Capability};
use crate::boost::{AccountInspector, BoostProvider};
use crate::pity::PityAccumulator;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use swapdraw_core::storage::{EntryStore, LedgerStore};
use swapdraw_core::{
    Address, BoostSample, BridgeMessage, BridgeTransport, ChainEndpointConfig, Clock, Distribution,
    DistributionEngine, DomainId, EntryOutcome, EntryRequest, EntryState, Envelope, EventBus,
    JackpotLedger, LotteryConfig, Notification, ProbabilityEngine, RandomValue, RequestId,
    Storage, SwapdrawError, TokenAmount, TrustedPeer,
};
use tokio::sync::Mutex;

/// Collaborators the coordinator talks to.
#[derive(Clone)]
pub struct OriginServices {
    pub transport: Arc<dyn BridgeTransport>,
    pub access: Arc<AccessControl>,
    pub boost: Arc<dyn BoostProvider>,
    pub inspector: Arc<dyn AccountInspector>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
    pub storage: Option<Arc<Storage>>,
}

/// Result of a processed fulfillment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub request_id: RequestId,
    pub participant: Address,
    pub outcome: EntryOutcome,
    pub draw: u64,
    pub threshold: u64,
    pub distribution: Option<Distribution>,
}

struct OriginState {
    /// Unset until the first entry opens, then seeded from the archive.
    next_request_id: Option<u64>,
    entries: HashMap<RequestId, EntryRequest>,
    ledger: JackpotLedger,
    pity: PityAccumulator,
}

pub struct OriginCoordinator {
    address: Address,
    config: LotteryConfig,
    probability: ProbabilityEngine,
    distribution: DistributionEngine,
    peer: TrustedPeer,
    services: OriginServices,
    state: Mutex<OriginState>,
}

impl OriginCoordinator {
    pub fn new(
        address: Address,
        config: LotteryConfig,
        endpoint: ChainEndpointConfig,
        services: OriginServices,
    ) -> Result<Self> {
        config.validate()?;
        let probability = ProbabilityEngine::new(config.probability.clone())?;
        let distribution = DistributionEngine::new(config.distribution.clone())?;
        let peer = TrustedPeer::new(endpoint)?;

        let state = OriginState {
            next_request_id: None,
            entries: HashMap::new(),
            ledger: JackpotLedger::new(),
            pity: PityAccumulator::new(config.pity.clone()),
        };

        Ok(Self {
            address,
            config,
            probability,
            distribution,
            peer,
            services,
            state: Mutex::new(state),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    pub fn probability(&self) -> &ProbabilityEngine {
        &self.probability
    }

    pub fn peer(&self) -> &TrustedPeer {
        &self.peer
    }

    /// Opens an entry for a qualifying swap and relays it to the remote
    /// domain. The threshold is fixed here, before any randomness exists.
    ///
    /// A request id is consumed as soon as it is handed out, even if a later
    /// step fails. If only the send fails the entry stays open and
    /// [`resend_request`](Self::resend_request) recovers it.
    pub async fn open_entry(
        &self,
        caller: Address,
        participant: Address,
        stake: TokenAmount,
    ) -> Result<RequestId> {
        self.services.access.require(Capability::SwapTrigger, caller)?;

        if stake < self.config.min_stake {
            return Err(SwapdrawError::AmountTooSmall {
                amount: stake,
                minimum: self.config.min_stake,
            }
            .into());
        }
        if self.services.inspector.is_code_bearing(participant).await? {
            return Err(SwapdrawError::IneligibleParticipant(participant).into());
        }

        let score = self.services.boost.boost_score_of(participant).await?;
        let now = self.services.clock.now();
        let boost = BoostSample {
            participant,
            score,
            sampled_at: now,
        };

        let mut state = self.state.lock().await;
        let request_id = self.reserve_request_id(&mut state).await?;
        let threshold =
            self.probability
                .threshold_with_pity(stake, score, state.pity.multiplier_bps());

        let mut ledger = state.ledger.clone();
        ledger.record_participant();
        self.archive_ledger(&ledger).await?;

        let entry = EntryRequest {
            request_id,
            participant,
            stake,
            threshold,
            boost,
            opened_at: now,
            state: EntryState::Open,
        };
        state.entries.insert(request_id, entry);
        state.ledger = ledger;
        drop(state);

        tracing::info!(
            "Entry {} opened for {} (stake {}, threshold {})",
            request_id,
            participant,
            stake,
            threshold
        );
        self.services.events.publish(Notification::EntryOpened {
            request_id,
            participant,
            stake,
            threshold,
        });

        let payload = BridgeMessage::EntryRequest { request_id }.encode()?;
        match self
            .services
            .transport
            .send(self.peer.remote_domain(), self.peer.trusted_remote(), payload)
            .await
        {
            Ok(guid) => {
                tracing::debug!("Entry {} relayed as envelope {}", request_id, guid);
                Ok(request_id)
            }
            Err(e) => {
                tracing::warn!("Entry {} is open but its request was not sent: {}", request_id, e);
                Err(e.into())
            }
        }
    }

    /// Inbound bridge delivery. Only authenticated fulfillments get past
    /// this point; anything else is rejected without touching state.
    pub async fn on_bridge_message(&self, envelope: &Envelope) -> Result<Resolution> {
        let message = match self.peer.authenticate(envelope) {
            Ok(message) => message,
            Err(e) => {
                if e.is_authentication_failure() {
                    self.services.events.publish(Notification::SourceRejected {
                        domain: envelope.src_domain,
                        sender: envelope.sender,
                        reason: e.to_string(),
                    });
                }
                return Err(e.into());
            }
        };

        match message {
            BridgeMessage::Fulfillment {
                request_id,
                random_value,
            } => self.on_fulfillment(request_id, random_value).await,
            BridgeMessage::EntryRequest { request_id } => Err(SwapdrawError::UnexpectedMessage(
                format!("entry request {} sent to the origin", request_id),
            )
            .into()),
        }
    }

    async fn on_fulfillment(&self, request_id: RequestId, random_value: RandomValue) -> Result<Resolution> {
        let mut state = self.state.lock().await;

        let entry = match state.entries.get(&request_id) {
            Some(entry) if entry.state.is_open() => entry.clone(),
            _ => {
                tracing::debug!("Dropping fulfillment for unknown or resolved entry {}", request_id);
                return Err(SwapdrawError::UnknownOrDuplicateRequest(request_id).into());
            }
        };

        let now = self.services.clock.now();
        let draw = random_value.reduce(self.probability.config().scale);
        let won = self.probability.is_winner(entry.threshold, &random_value);

        let mut ledger = state.ledger.clone();
        let mut pity = state.pity.clone();
        let (outcome, distribution) = if won {
            let distribution = self.distribution.distribute(&mut ledger, entry.participant, now)?;
            pity.record_win();
            (EntryOutcome::Won, Some(distribution))
        } else {
            pity.record_loss();
            (EntryOutcome::Lost, None)
        };

        let mut resolved = entry;
        resolved.state = EntryState::Resolved(outcome);
        if let Some(storage) = &self.services.storage {
            EntryStore::new(storage).archive(&resolved, now).await?;
        }
        if won {
            self.archive_ledger(&ledger).await?;
        }

        let participant = resolved.participant;
        let threshold = resolved.threshold;
        state.entries.insert(request_id, resolved);
        state.ledger = ledger;
        state.pity = pity;
        drop(state);

        tracing::info!(
            "Entry {} resolved as {:?} (draw {}, threshold {})",
            request_id,
            outcome,
            draw,
            threshold
        );
        self.services.events.publish(Notification::EntryResolved {
            request_id,
            participant,
            outcome,
            draw: Some(draw),
        });
        if let Some(distribution) = &distribution {
            self.services
                .events
                .publish(Notification::JackpotWon(distribution.clone()));
        }

        Ok(Resolution {
            request_id,
            participant,
            outcome,
            draw,
            threshold,
            distribution,
        })
    }

    /// Fee revenue from the bookkeeping collaborator.
    pub async fn add_to_jackpot(&self, caller: Address, amount: TokenAmount) -> Result<()> {
        self.services.access.require(Capability::FeeCollector, caller)?;

        let mut state = self.state.lock().await;
        let mut ledger = state.ledger.clone();
        ledger.contribute(amount)?;
        self.archive_ledger(&ledger).await?;
        let undistributed = ledger.undistributed();
        state.ledger = ledger;
        drop(state);

        tracing::debug!("Jackpot +{} (undistributed {})", amount, undistributed);
        self.services.events.publish(Notification::JackpotContributed {
            amount,
            undistributed,
        });
        Ok(())
    }

    pub fn set_trusted_remote(
        &self,
        caller: Address,
        remote_domain: DomainId,
        trusted_remote: Address,
    ) -> Result<()> {
        self.services.access.require(Capability::Admin, caller)?;
        self.peer.set_trusted(remote_domain, trusted_remote)?;
        Ok(())
    }

    /// Resolves a stale open entry without a draw. It never pays out and a
    /// late fulfillment for it is treated as a duplicate.
    pub async fn expire_entry(&self, caller: Address, request_id: RequestId) -> Result<()> {
        self.services.access.require(Capability::Admin, caller)?;

        let mut state = self.state.lock().await;
        let mut entry = match state.entries.get(&request_id) {
            Some(entry) if entry.state.is_open() => entry.clone(),
            _ => return Err(SwapdrawError::UnknownOrDuplicateRequest(request_id).into()),
        };

        let now = self.services.clock.now();
        entry.state = EntryState::Resolved(EntryOutcome::Expired);
        if let Some(storage) = &self.services.storage {
            EntryStore::new(storage).archive(&entry, now).await?;
        }
        let participant = entry.participant;
        state.entries.insert(request_id, entry);
        drop(state);

        tracing::warn!("Entry {} expired by {}", request_id, caller);
        self.services.events.publish(Notification::EntryResolved {
            request_id,
            participant,
            outcome: EntryOutcome::Expired,
            draw: None,
        });
        Ok(())
    }

    /// Sends the request message again for an entry still waiting on the
    /// remote side. Returns the new envelope guid.
    pub async fn resend_request(&self, caller: Address, request_id: RequestId) -> Result<String> {
        self.services.access.require(Capability::Admin, caller)?;

        let state = self.state.lock().await;
        if !state
            .entries
            .get(&request_id)
            .is_some_and(|entry| entry.state.is_open())
        {
            return Err(SwapdrawError::UnknownOrDuplicateRequest(request_id).into());
        }

        let payload = BridgeMessage::EntryRequest { request_id }.encode()?;
        let guid = self
            .services
            .transport
            .send(self.peer.remote_domain(), self.peer.trusted_remote(), payload)
            .await?;
        drop(state);

        tracing::info!("Entry {} re-sent as envelope {}", request_id, guid);
        Ok(guid)
    }

    pub async fn entry(&self, request_id: RequestId) -> Option<EntryRequest> {
        self.state.lock().await.entries.get(&request_id).cloned()
    }

    pub async fn open_entries(&self) -> Vec<EntryRequest> {
        let state = self.state.lock().await;
        let mut open: Vec<EntryRequest> = state
            .entries
            .values()
            .filter(|entry| entry.state.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|entry| entry.request_id);
        open
    }

    pub async fn ledger(&self) -> JackpotLedger {
        self.state.lock().await.ledger.clone()
    }

    pub async fn pity_multiplier_bps(&self) -> u64 {
        self.state.lock().await.pity.multiplier_bps()
    }

    async fn reserve_request_id(&self, state: &mut OriginState) -> Result<RequestId> {
        let next = match state.next_request_id {
            Some(next) => next,
            None => {
                let highest = match &self.services.storage {
                    Some(storage) => EntryStore::new(storage).highest_request_id().await?,
                    None => None,
                };
                if let Some(highest) = highest {
                    tracing::info!("Archive already holds request {}, continuing after it", highest);
                }
                highest.map_or(1, |id| id.0 + 1)
            }
        };
        state.next_request_id = Some(next + 1);
        Ok(RequestId(next))
    }

    async fn archive_ledger(&self, ledger: &JackpotLedger) -> Result<()> {
        if let Some(storage) = &self.services.storage {
            LedgerStore::new(storage)
                .record(ledger, self.services.clock.now())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{Relay, ADMIN, FEE_COLLECTOR, REMOTE_AGENT, REMOTE_DOMAIN, SWAP_TRIGGER};
    use crate::LotteryError;
    use swapdraw_core::{ManualClock, OracleRequestId, UNIT};

    fn alice() -> Address {
        Address::from_low_u64(0xa11ce)
    }

    fn fulfillment(relay: &Relay, sender: Address, request_id: RequestId, value: u128) -> Envelope {
        Envelope {
            src_domain: REMOTE_DOMAIN,
            sender,
            dst_domain: relay.origin().peer().local_domain(),
            receiver: relay.origin().address(),
            nonce: 0,
            payload: BridgeMessage::Fulfillment {
                request_id,
                random_value: RandomValue::from_u128(value),
            }
            .encode()
            .unwrap(),
        }
    }

    async fn relay() -> Relay {
        Relay::local(
            LotteryConfig::default(),
            Arc::new(ManualClock::default()),
            EventBus::default(),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_entry_rejects_small_stake() {
        let relay = relay().await;
        let err = relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), UNIT - 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LotteryError::Core(SwapdrawError::AmountTooSmall { .. })
        ));
        assert!(relay.origin().open_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_ineligible_participant_creates_no_entry() {
        let relay = relay().await;
        relay.inspector().mark_code_bearing(alice());

        let err = relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), 100 * UNIT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LotteryError::Core(SwapdrawError::IneligibleParticipant(addr)) if addr == alice()
        ));
        assert!(relay.origin().open_entries().await.is_empty());
        assert_eq!(relay.origin().ledger().await.participant_count(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_caller() {
        let relay = relay().await;
        let err = relay
            .origin()
            .open_entry(alice(), alice(), 100 * UNIT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LotteryError::Core(SwapdrawError::UnauthorizedCaller { .. })
        ));

        assert!(relay.origin().add_to_jackpot(SWAP_TRIGGER, 1).await.is_err());
        assert!(relay
            .origin()
            .set_trusted_remote(FEE_COLLECTOR, REMOTE_DOMAIN, alice())
            .is_err());
    }

    #[tokio::test]
    async fn test_threshold_uses_boost_sample() {
        let relay = relay().await;
        relay.boost().set_score(alice(), 3_375);

        let id = relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), 10_000 * UNIT)
            .await
            .unwrap();
        let entry = relay.origin().entry(id).await.unwrap();
        assert_eq!(entry.threshold, 100_000);
        assert_eq!(entry.boost.score, 3_375);
        assert_eq!(entry.state, EntryState::Open);
        assert_eq!(relay.origin().ledger().await.participant_count(), 1);
    }

    #[tokio::test]
    async fn test_untrusted_sender_leaves_entry_open() {
        let relay = relay().await;
        relay.origin().add_to_jackpot(FEE_COLLECTOR, 1_000 * UNIT).await.unwrap();
        let id = relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), 100 * UNIT)
            .await
            .unwrap();
        let before = relay.origin().ledger().await;
        let mut events = relay.events().subscribe();

        let forged = fulfillment(&relay, Address::from_low_u64(0xbad), id, 0);
        let err = relay.origin().on_bridge_message(&forged).await.unwrap_err();
        assert!(err.is_authentication_failure());

        let mut wrong_chain = fulfillment(&relay, REMOTE_AGENT, id, 0);
        wrong_chain.src_domain = DomainId(77);
        let err = relay.origin().on_bridge_message(&wrong_chain).await.unwrap_err();
        assert!(matches!(
            err,
            LotteryError::Core(SwapdrawError::UntrustedChain { .. })
        ));

        assert_eq!(relay.origin().entry(id).await.unwrap().state, EntryState::Open);
        assert_eq!(relay.origin().ledger().await, before);
        assert_eq!(relay.origin().peer().rejected_count(), 2);
        assert!(matches!(
            events.recv().await.unwrap(),
            Notification::SourceRejected { .. }
        ));
    }

    #[tokio::test]
    async fn test_replayed_fulfillment_is_rejected() {
        let relay = relay().await;
        relay.origin().add_to_jackpot(FEE_COLLECTOR, 1_000 * UNIT).await.unwrap();
        let id = relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), 10_000 * UNIT)
            .await
            .unwrap();

        // A draw of 0 always wins.
        let envelope = fulfillment(&relay, REMOTE_AGENT, id, 0);
        let resolution = relay.origin().on_bridge_message(&envelope).await.unwrap();
        assert_eq!(resolution.outcome, EntryOutcome::Won);
        let after_win = relay.origin().ledger().await;
        assert_eq!(after_win.win_count(), 1);

        let err = relay.origin().on_bridge_message(&envelope).await.unwrap_err();
        assert!(matches!(
            err,
            LotteryError::Core(SwapdrawError::UnknownOrDuplicateRequest(rid)) if rid == id
        ));
        assert_eq!(relay.origin().ledger().await, after_win);
    }

    #[tokio::test]
    async fn test_fulfillment_for_unknown_request() {
        let relay = relay().await;
        let envelope = fulfillment(&relay, REMOTE_AGENT, RequestId(42), 0);
        assert!(relay.origin().on_bridge_message(&envelope).await.is_err());
        assert_eq!(relay.origin().ledger().await.win_count(), 0);
    }

    #[tokio::test]
    async fn test_losses_raise_pity_until_a_win() {
        let relay = relay().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(
                relay
                    .origin()
                    .open_entry(SWAP_TRIGGER, alice(), 100 * UNIT)
                    .await
                    .unwrap(),
            );
        }

        // 999_999 never wins at these thresholds.
        for id in &ids[..2] {
            let envelope = fulfillment(&relay, REMOTE_AGENT, *id, 999_999);
            let resolution = relay.origin().on_bridge_message(&envelope).await.unwrap();
            assert_eq!(resolution.outcome, EntryOutcome::Lost);
        }
        assert_eq!(relay.origin().pity_multiplier_bps().await, 12_000);

        let base = relay.origin().entry(ids[0]).await.unwrap().threshold;
        let boosted = relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), 100 * UNIT)
            .await
            .unwrap();
        assert_eq!(
            relay.origin().entry(boosted).await.unwrap().threshold,
            base * 12 / 10
        );

        let envelope = fulfillment(&relay, REMOTE_AGENT, ids[2], 0);
        relay.origin().on_bridge_message(&envelope).await.unwrap();
        assert_eq!(relay.origin().pity_multiplier_bps().await, 10_000);
    }

    #[tokio::test]
    async fn test_expire_entry_blocks_late_fulfillment() {
        let relay = relay().await;
        relay.origin().add_to_jackpot(FEE_COLLECTOR, 1_000 * UNIT).await.unwrap();
        let id = relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), 100 * UNIT)
            .await
            .unwrap();

        assert!(relay.origin().expire_entry(SWAP_TRIGGER, id).await.is_err());
        relay.origin().expire_entry(ADMIN, id).await.unwrap();
        assert_eq!(
            relay.origin().entry(id).await.unwrap().state,
            EntryState::Resolved(EntryOutcome::Expired)
        );
        assert!(relay.origin().expire_entry(ADMIN, id).await.is_err());

        let envelope = fulfillment(&relay, REMOTE_AGENT, id, 0);
        assert!(relay.origin().on_bridge_message(&envelope).await.is_err());
        assert_eq!(relay.origin().ledger().await.win_count(), 0);
        assert!(relay.origin().resend_request(ADMIN, id).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_open_never_reuses_request_id() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let relay = Relay::local(
            LotteryConfig::default(),
            Arc::new(ManualClock::default()),
            EventBus::default(),
            Some(storage.clone()),
        )
        .unwrap();
        relay.fund(1_000 * UNIT).await.unwrap();

        // Snapshots cannot be written while the table is away.
        storage
            .get_connection()
            .await
            .execute("ALTER TABLE ledger_snapshots RENAME TO ledger_snapshots_offline", [])
            .unwrap();
        assert!(relay.swap(alice(), 100 * UNIT).await.is_err());
        assert!(relay.remote_endpoint().drain().await.is_empty());
        assert!(relay.origin().open_entries().await.is_empty());
        assert_eq!(relay.origin().ledger().await.participant_count(), 0);
        storage
            .get_connection()
            .await
            .execute("ALTER TABLE ledger_snapshots_offline RENAME TO ledger_snapshots", [])
            .unwrap();

        let bob = Address::from_low_u64(0xb0b);
        let id = relay.swap(bob, 100 * UNIT).await.unwrap();
        assert_eq!(id, RequestId(2));

        relay.deliver_pending().await;
        assert_eq!(relay.oracle().pending(), vec![OracleRequestId(1)]);
        relay
            .fulfill_oracle_with(|_| RandomValue::from_u128(0))
            .await
            .unwrap();
        let report = relay.deliver_pending().await;
        assert_eq!(report.resolutions.len(), 1);
        assert_eq!(report.resolutions[0].request_id, RequestId(2));
        assert_eq!(report.resolutions[0].participant, bob);
    }

    #[tokio::test]
    async fn test_unsent_entry_stays_open_for_resend() {
        let relay = relay().await;
        relay
            .origin()
            .set_trusted_remote(ADMIN, DomainId(99), REMOTE_AGENT)
            .unwrap();

        // No route to domain 99.
        assert!(relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), 100 * UNIT)
            .await
            .is_err());
        let open = relay.origin().open_entries().await;
        assert_eq!(open.len(), 1);
        let id = open[0].request_id;

        relay
            .origin()
            .set_trusted_remote(ADMIN, REMOTE_DOMAIN, REMOTE_AGENT)
            .unwrap();
        relay.origin().resend_request(ADMIN, id).await.unwrap();
        relay.deliver_pending().await;
        relay
            .fulfill_oracle_with(|_| RandomValue::from_u128(999_999))
            .await
            .unwrap();
        let report = relay.deliver_pending().await;
        assert_eq!(report.resolutions.len(), 1);
        assert_eq!(report.resolutions[0].request_id, id);

        let next = relay
            .origin()
            .open_entry(SWAP_TRIGGER, alice(), 100 * UNIT)
            .await
            .unwrap();
        assert_eq!(next, RequestId(id.0 + 1));
    }

    #[tokio::test]
    async fn test_entry_request_sent_to_origin_is_unexpected() {
        let relay = relay().await;
        let mut envelope = fulfillment(&relay, REMOTE_AGENT, RequestId(1), 0);
        envelope.payload = BridgeMessage::EntryRequest {
            request_id: RequestId(1),
        }
        .encode()
        .unwrap();

        let err = relay.origin().on_bridge_message(&envelope).await.unwrap_err();
        assert!(matches!(
            err,
            LotteryError::Core(SwapdrawError::UnexpectedMessage(_))
        ));
    }
}
