//! Error types for admission queue operations.

use thiserror::Error;

/// Result type alias for admission queue operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;

/// Failures reported by an [`OrderedStore`](crate::store::OrderedStore).
///
/// Both variants are retryable from the caller's point of view: the queue
/// holds no state of its own, so repeating the operation once the store is
/// reachable again is always safe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, timed out).
    #[error("Ordered store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but rejected or failed the command.
    #[error("Ordered store command failed: {0}")]
    Command(String),
}

/// Failures reported by a [`PointsLedger`](crate::ledger::PointsLedger).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The client does not hold enough points for the redemption.
    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints {
        /// Points the client tried to redeem
        requested: u64,
        /// Points the client actually holds
        available: u64,
    },

    /// The ledger refused the redemption for another reason.
    #[error("Redemption rejected: {0}")]
    Rejected(String),

    /// The ledger could not be reached.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Error taxonomy for the admission queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    // ═══════════════════════════════════════════════════════════
    // Input Errors (rejected before reaching the store)
    // ═══════════════════════════════════════════════════════════

    /// Client identifier is empty or blank.
    #[error("Client identifier must not be empty")]
    EmptyClientId,

    /// Priority weight is negative.
    #[error("Priority weight must be non-negative, got {0}")]
    NegativeWeight(i64),

    /// Priority weight exceeds the largest weight scores can order.
    #[error("Priority weight must be at most {max}, got {units}")]
    WeightTooLarge {
        /// Requested weight
        units: u64,
        /// Largest accepted weight
        max: u64,
    },

    /// Queue configuration is unusable.
    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),

    // ═══════════════════════════════════════════════════════════
    // Collaborator Errors
    // ═══════════════════════════════════════════════════════════

    /// The ordered store failed; retry with backoff.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The points ledger refused or failed the redemption.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AdmissionError {
    /// Returns `true` if the error was caused by malformed caller input.
    ///
    /// # Examples
    ///
    /// ```
    /// # use admission_core::AdmissionError;
    /// assert!(AdmissionError::EmptyClientId.is_user_error());
    /// assert!(!AdmissionError::InvalidConfig("max_active".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyClientId | Self::NegativeWeight(_) | Self::WeightTooLarge { .. }
        )
    }

    /// Returns `true` if repeating the operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Ledger(LedgerError::Unavailable(_))
        )
    }
}
