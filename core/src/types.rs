//! Domain types for the admission queue.
//!
//! Identifiers are validated once at the edge (`ClientId::parse`,
//! `PriorityWeight::try_from_i64`) so the queue itself never sees malformed
//! input and never sends it to the store.

use crate::error::{AdmissionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Divisor applied to the join timestamp when building a score.
///
/// Large enough that the timestamp term stays below one whole weight unit
/// for any realistic clock value, so it only ever breaks ties.
pub const TIE_BREAK_DIVISOR: f64 = 1e10;

/// Largest accepted priority weight.
///
/// Joins one second apart differ by `1e-10` in score. Below this bound an
/// f64 score still resolves that gap (its ulp stays under `1.5e-11`), so
/// equal weights keep join order. Sub-second order is exact only for weights
/// below 512; closer joins fall back to the store's member ordering.
pub const MAX_PRIORITY_WEIGHT: u64 = 100_000;

/// Normalized client identity (a lower-cased wallet address in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Parse and normalize a raw client identifier.
    ///
    /// Surrounding whitespace is trimmed and the value is lower-cased, so
    /// `"0xABC"` and `" 0xabc "` name the same client.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::EmptyClientId`] if nothing is left after trimming.
    ///
    /// # Examples
    ///
    /// ```
    /// # use admission_core::ClientId;
    /// let id = ClientId::parse(" 0xAbC ").unwrap();
    /// assert_eq!(id.as_str(), "0xabc");
    /// assert!(ClientId::parse("   ").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(AdmissionError::EmptyClientId);
        }
        Ok(Self(normalized))
    }

    /// Borrow the normalized identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Redeemed priority units. Higher weight ranks earlier in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityWeight(u64);

impl PriorityWeight {
    /// Weight of a client that redeemed nothing.
    pub const ZERO: Self = Self(0);

    /// Create a weight from an unsigned amount, clamped to
    /// [`MAX_PRIORITY_WEIGHT`].
    #[must_use]
    pub const fn new(units: u64) -> Self {
        if units > MAX_PRIORITY_WEIGHT {
            Self(MAX_PRIORITY_WEIGHT)
        } else {
            Self(units)
        }
    }

    /// Create a weight from a signed amount as received on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NegativeWeight`] for negative input and
    /// [`AdmissionError::WeightTooLarge`] above [`MAX_PRIORITY_WEIGHT`].
    pub fn try_from_i64(units: i64) -> Result<Self> {
        let units = u64::try_from(units).map_err(|_| AdmissionError::NegativeWeight(units))?;
        if units > MAX_PRIORITY_WEIGHT {
            return Err(AdmissionError::WeightTooLarge {
                units,
                max: MAX_PRIORITY_WEIGHT,
            });
        }
        Ok(Self(units))
    }

    /// Number of priority units.
    #[must_use]
    pub const fn units(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PriorityWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the waiting-list score for a join at `joined_at`.
///
/// `score = weight - joined_at_seconds / TIE_BREAK_DIVISOR`. Among equal
/// weights the earlier join has the larger score and therefore ranks first.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Weights and millisecond timestamps fit well inside f64 for ordering
pub fn priority_score(weight: PriorityWeight, joined_at: DateTime<Utc>) -> f64 {
    let seconds = joined_at.timestamp_millis() as f64 / 1000.0;
    weight.units() as f64 - seconds / TIE_BREAK_DIVISOR
}

/// Result of joining the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    /// Normalized client identifier
    pub client_id: ClientId,
    /// 1-indexed position in the waiting list (0 if not waiting)
    pub queue_position: u64,
    /// Weight the client joined with
    pub priority_weight: PriorityWeight,
    /// Whether the client currently holds an active slot
    pub is_active: bool,
}

/// Read-only view of a client's place in line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionReport {
    /// Normalized client identifier
    pub client_id: ClientId,
    /// 1-indexed position in the waiting list (0 if not waiting)
    pub queue_position: u64,
    /// Whether the client may purchase right now
    pub can_purchase: bool,
}

/// Status reported by [`complete`](crate::queue::AdmissionQueue::complete).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompleteStatus {
    /// The client has been removed from both containers.
    Completed,
}

/// Result of completing a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteOutcome {
    /// Always [`CompleteStatus::Completed`]
    pub status: CompleteStatus,
    /// Normalized client identifier
    pub client_id: ClientId,
}

/// Status reported by [`leave`](crate::queue::AdmissionQueue::leave).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    /// Removal went through (whether or not the client was present).
    Removed,
    /// The store failed; the client may still be present.
    Error,
}

/// Result of leaving the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveOutcome {
    /// Whether removal went through
    pub status: LeaveStatus,
    /// Normalized client identifier
    pub client_id: ClientId,
    /// Whether the client was in the waiting list before removal
    pub was_in_queue: bool,
}

/// Aggregate queue occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of clients in the waiting list
    pub queue_size: u64,
    /// Number of clients holding an active slot
    pub active_buyers: u64,
    /// Free active slots (`max_active - active_buyers`, floored at zero)
    pub available_slots: u64,
}
