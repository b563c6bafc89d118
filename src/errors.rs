//! Error types for ledger operations

use thiserror::Error;

/// Errors that can occur while publishing, consuming, or folding events
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transport-level send failure (transient, caller decides retry)
    #[error("transport error: {0}")]
    Transport(String),

    /// Subscription setup or delivery failure
    #[error("subscription error: {0}")]
    Subscription(String),

    /// Atomic publish rolled back cleanly; nothing became visible
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// Commit outcome unknown; the sends may or may not have landed.
    /// Must not be retried blindly without an idempotency key.
    #[error("transaction outcome unknown: {0}")]
    AmbiguousOutcome(String),

    /// An event disagrees with the state already folded for its account
    #[error("inconsistent event for account {account_id}: {reason}")]
    InconsistentEvent {
        /// Account the offending event was keyed to
        account_id: String,
        /// What disagreed
        reason: String,
    },

    /// Amount rejected before publication
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
