use swapdraw_core::SwapdrawError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotteryError>;

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error("Swapdraw core error: {0}")]
    Core(#[from] SwapdrawError),

    #[error("Boost provider error: {0}")]
    BoostProvider(String),

    #[error("Account inspection failed: {0}")]
    AccountInspection(String),

    #[error("Invalid entry state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LotteryError {
    pub fn core(&self) -> Option<&SwapdrawError> {
        match self {
            LotteryError::Core(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_authentication_failure(&self) -> bool {
        self.core().is_some_and(SwapdrawError::is_authentication_failure)
    }
}
