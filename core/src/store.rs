//! The ordered-store seam.
//!
//! The admission queue keeps no state of its own. Everything lives in an
//! external key-value store offering a score-ordered set (the waiting list)
//! and a plain set (the active buyers). Each primitive must be atomic at the
//! store; the queue never spans a transaction across two calls.
//!
//! Production uses Redis sorted sets (`admission-redis`); tests use the
//! in-memory store from `admission-testing`.

use crate::error::StoreError;
use async_trait::async_trait;

/// Result alias for store primitives.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of [`OrderedStore::set_add_bounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundedAdd {
    /// The member was inserted.
    Added,
    /// The member was already present; nothing changed.
    AlreadyMember,
    /// The set was at capacity; nothing changed.
    Full,
    /// The member is no longer in the source set; nothing changed.
    NotWaiting,
}

/// Atomic primitives over score-ordered sets and plain sets.
///
/// Rank and range queries are by **descending** score. Ties between equal
/// scores follow the store's own member ordering.
#[async_trait]
pub trait OrderedStore: Send + Sync {
    /// Insert `member` with `score`, or replace its score if already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn score_upsert(&self, set_key: &str, member: &str, score: f64) -> StoreResult<()>;

    /// Remove `member` from a score-ordered set. Returns `true` if it was present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn score_remove(&self, set_key: &str, member: &str) -> StoreResult<bool>;

    /// 0-indexed rank of `member` by descending score, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn rank_desc(&self, set_key: &str, member: &str) -> StoreResult<Option<u64>>;

    /// Members ranked `start..=stop` by descending score (inclusive bounds).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn range_desc(&self, set_key: &str, start: u64, stop: u64) -> StoreResult<Vec<String>>;

    /// Number of members in a score-ordered set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn cardinality(&self, set_key: &str) -> StoreResult<u64>;

    /// Add `member` to a plain set. Adding an existing member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn set_add(&self, set_key: &str, member: &str) -> StoreResult<()>;

    /// Add `member` to a plain set only while it is still present in the
    /// score-ordered set `source_key` and the plain set holds fewer than
    /// `capacity` members. Checks and insert happen as one atomic step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn set_add_bounded(
        &self,
        set_key: &str,
        source_key: &str,
        member: &str,
        capacity: u64,
    ) -> StoreResult<BoundedAdd>;

    /// Remove `member` from a plain set. Returns `true` if it was present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn set_remove(&self, set_key: &str, member: &str) -> StoreResult<bool>;

    /// Whether `member` belongs to a plain set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn set_is_member(&self, set_key: &str, member: &str) -> StoreResult<bool>;

    /// Number of members in a plain set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable or rejects the command.
    async fn set_cardinality(&self, set_key: &str) -> StoreResult<u64>;

    /// Cheap round-trip used by readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is unreachable.
    async fn ping(&self) -> StoreResult<()>;
}
