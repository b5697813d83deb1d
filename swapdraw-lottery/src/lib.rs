//! Swap-triggered jackpot lottery across two domains
//!
//! The origin domain hosts the game: it opens an entry for every qualifying
//! swap, fixes the win threshold up front and resolves the entry when the
//! remote domain answers with an oracle-supplied random value. The remote
//! domain only turns requests into oracle calls and forwards the answers.

pub mod access;
pub mod boost;
pub mod coordinator;
pub mod error;
pub mod oracle;
pub mod pity;
pub mod relay;
pub mod remote;

pub use access::{AccessControl, Capability};
pub use boost::{AccountInspector, BoostProvider, StaticAccountInspector, StaticBoostProvider};
pub use coordinator::{OriginCoordinator, OriginServices, Resolution};
pub use error::{LotteryError, Result};
pub use oracle::{MockOracle, RandomnessOracle};
pub use pity::PityAccumulator;
pub use relay::{Relay, RelayReport};
pub use remote::{RemoteAgent, RemoteServices};
