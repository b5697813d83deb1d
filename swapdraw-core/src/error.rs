use crate::types::{Address, DomainId, OracleRequestId, RequestId, TokenAmount};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SwapdrawError>;

#[derive(Error, Debug)]
pub enum SwapdrawError {
    #[error("Stake too small: {amount} below minimum {minimum}")]
    AmountTooSmall {
        amount: TokenAmount,
        minimum: TokenAmount,
    },

    #[error("Ineligible participant: {0} is a code-bearing account")]
    IneligibleParticipant(Address),

    #[error("Caller {caller} lacks the {capability} capability")]
    UnauthorizedCaller {
        caller: Address,
        capability: String,
    },

    #[error("Untrusted chain: expected {expected}, got {actual}")]
    UntrustedChain { expected: DomainId, actual: DomainId },

    #[error("Untrusted source: expected {expected}, got {actual}")]
    UntrustedSource { expected: Address, actual: Address },

    #[error("Unknown or duplicate request: {0}")]
    UnknownOrDuplicateRequest(RequestId),

    #[error("Unknown or already fulfilled oracle request: {0}")]
    UnknownOracleRequest(OracleRequestId),

    #[error("Oracle delivered no random values for request {0}")]
    EmptyRandomness(OracleRequestId),

    #[error("Unexpected bridge message: {0}")]
    UnexpectedMessage(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Bridge transport error: {0}")]
    Transport(String),

    #[error("Randomness oracle error: {0}")]
    Oracle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwapdrawError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Authentication failures are dropped without side effects but still
    /// surface to operators.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::UntrustedChain { .. } | Self::UntrustedSource { .. }
        )
    }
}
