//! Swapdraw core - swap-triggered jackpot engines and cross-domain plumbing
//!
//! This library holds the deterministic parts of the lottery: win
//! thresholds, adaptive jackpot release, the jackpot ledger, the bridge
//! message format and its authentication, and the SQLite audit archive.

pub mod bridge;
pub mod clock;
pub mod config;
pub mod distribution;
pub mod error;
pub mod events;
pub mod ledger;
pub mod probability;
pub mod storage;
pub mod types;

pub use bridge::{BridgeMessage, BridgeTransport, Envelope, MemoryBridge, MemoryEndpoint, TrustedPeer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ChainEndpointConfig, DistributionConfig, LotteryConfig, PityConfig, ProbabilityConfig};
pub use distribution::{Distribution, DistributionEngine, DistributionFactors};
pub use error::{Result, SwapdrawError};
pub use events::{EventBus, Notification};
pub use ledger::JackpotLedger;
pub use probability::ProbabilityEngine;
pub use storage::Storage;
pub use types::{
    Address, BoostSample, DomainId, EntryOutcome, EntryRequest, EntryState, OracleRequestId,
    PayoutInstruction, PoolId, PrizeSplit, RandomValue, RemoteTicket, RequestId, TokenAmount, UNIT,
};
