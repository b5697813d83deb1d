//! Remote-side request agent: turns authenticated entry requests into oracle
//! requests and forwards each oracle answer back to the origin exactly once.

use crate::access::{AccessControl, Capability};
use crate::oracle::RandomnessOracle;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use swapdraw_core::storage::TicketStore;
use swapdraw_core::{
    Address, BridgeMessage, BridgeTransport, ChainEndpointConfig, Clock, DomainId, Envelope,
    EventBus, Notification, OracleRequestId, RandomValue, RemoteTicket, RequestId, Storage,
    SwapdrawError, TrustedPeer,
};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct RemoteServices {
    pub transport: Arc<dyn BridgeTransport>,
    pub oracle: Arc<dyn RandomnessOracle>,
    pub access: Arc<AccessControl>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
    pub storage: Option<Arc<Storage>>,
}

#[derive(Default)]
struct RemoteState {
    tickets: HashMap<RequestId, RemoteTicket>,
    by_oracle_id: HashMap<OracleRequestId, RequestId>,
}

pub struct RemoteAgent {
    address: Address,
    peer: TrustedPeer,
    services: RemoteServices,
    state: Mutex<RemoteState>,
}

impl RemoteAgent {
    pub fn new(address: Address, endpoint: ChainEndpointConfig, services: RemoteServices) -> Result<Self> {
        Ok(Self {
            address,
            peer: TrustedPeer::new(endpoint)?,
            services,
            state: Mutex::new(RemoteState::default()),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn peer(&self) -> &TrustedPeer {
        &self.peer
    }

    pub async fn on_bridge_message(&self, envelope: &Envelope) -> Result<RemoteTicket> {
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
            BridgeMessage::EntryRequest { request_id } => self.on_request(request_id).await,
            BridgeMessage::Fulfillment { request_id, .. } => Err(SwapdrawError::UnexpectedMessage(
                format!("fulfillment {} sent to the remote agent", request_id),
            )
            .into()),
        }
    }

    /// Idempotent per origin request: a repeated request never asks the
    /// oracle twice, and a repeat for an answered ticket re-sends the answer.
    async fn on_request(&self, origin_request_id: RequestId) -> Result<RemoteTicket> {
        let mut state = self.state.lock().await;

        if let Some(ticket) = state.tickets.get(&origin_request_id).cloned() {
            drop(state);
            match ticket.random_value {
                Some(random_value) if ticket.fulfilled => {
                    tracing::info!("Request {} already fulfilled, re-sending value", origin_request_id);
                    self.send_fulfillment(origin_request_id, random_value).await?;
                }
                _ => tracing::debug!("Request {} already pending at the oracle", origin_request_id),
            }
            return Ok(ticket);
        }

        let oracle_request_id = self.services.oracle.request_randomness().await?;
        let ticket = RemoteTicket {
            origin_request_id,
            oracle_request_id,
            fulfilled: false,
            random_value: None,
            created_at: self.services.clock.now(),
        };

        // The oracle request cannot be withdrawn, so the ticket is kept even
        // when the archive write fails. Its callback and any redelivered
        // request then still find it.
        state.by_oracle_id.insert(oracle_request_id, origin_request_id);
        state.tickets.insert(origin_request_id, ticket.clone());
        if let Some(storage) = &self.services.storage {
            if let Err(e) = TicketStore::new(storage).upsert(&ticket).await {
                tracing::warn!("Ticket for request {} was not archived: {}", origin_request_id, e);
                return Err(e.into());
            }
        }
        drop(state);

        tracing::info!(
            "Request {} relayed to oracle as {}",
            origin_request_id,
            oracle_request_id
        );
        self.services.events.publish(Notification::RequestRelayed {
            request_id: origin_request_id,
            oracle_request_id,
        });
        Ok(ticket)
    }

    /// Oracle callback. Only the first value is used. The ticket is marked
    /// fulfilled before the answer is sent, so a failed send can be recovered
    /// by re-sending the origin request.
    pub async fn on_oracle_fulfilled(
        &self,
        caller: Address,
        oracle_request_id: OracleRequestId,
        random_values: &[RandomValue],
    ) -> Result<RemoteTicket> {
        self.services.access.require(Capability::Oracle, caller)?;

        let mut state = self.state.lock().await;
        let mut ticket = state
            .by_oracle_id
            .get(&oracle_request_id)
            .and_then(|origin_id| state.tickets.get(origin_id))
            .filter(|ticket| !ticket.fulfilled)
            .cloned()
            .ok_or(SwapdrawError::UnknownOracleRequest(oracle_request_id))?;

        let random_value = *random_values
            .first()
            .ok_or(SwapdrawError::EmptyRandomness(oracle_request_id))?;

        ticket.fulfilled = true;
        ticket.random_value = Some(random_value);
        if let Some(storage) = &self.services.storage {
            TicketStore::new(storage).upsert(&ticket).await?;
        }
        state.tickets.insert(ticket.origin_request_id, ticket.clone());
        drop(state);

        tracing::info!(
            "Oracle request {} fulfilled for entry {}",
            oracle_request_id,
            ticket.origin_request_id
        );
        self.send_fulfillment(ticket.origin_request_id, random_value).await?;
        self.services.events.publish(Notification::RandomnessForwarded {
            request_id: ticket.origin_request_id,
            oracle_request_id,
        });
        Ok(ticket)
    }

    pub async fn ticket(&self, origin_request_id: RequestId) -> Option<RemoteTicket> {
        self.state.lock().await.tickets.get(&origin_request_id).cloned()
    }

    pub async fn pending_tickets(&self) -> Vec<RemoteTicket> {
        let state = self.state.lock().await;
        let mut pending: Vec<RemoteTicket> = state
            .tickets
            .values()
            .filter(|ticket| !ticket.fulfilled)
            .cloned()
            .collect();
        pending.sort_by_key(|ticket| ticket.origin_request_id);
        pending
    }

    pub fn set_trusted_origin(
        &self,
        caller: Address,
        origin_domain: DomainId,
        trusted_origin: Address,
    ) -> Result<()> {
        self.services.access.require(Capability::Admin, caller)?;
        self.peer.set_trusted(origin_domain, trusted_origin)?;
        Ok(())
    }

    async fn send_fulfillment(&self, request_id: RequestId, random_value: RandomValue) -> Result<String> {
        let payload = BridgeMessage::Fulfillment {
            request_id,
            random_value,
        }
        .encode()?;
        let guid = self
            .services
            .transport
            .send(self.peer.remote_domain(), self.peer.trusted_remote(), payload)
            .await?;
        tracing::debug!("Fulfillment for entry {} sent as envelope {}", request_id, guid);
        Ok(guid)
    }
}
