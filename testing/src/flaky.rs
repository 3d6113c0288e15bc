//! Fault-injecting store wrapper.

use crate::memory_store::InMemoryOrderedStore;
use admission_core::store::{BoundedAdd, OrderedStore, StoreResult};
use admission_core::StoreError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Store primitives that can be made to fail individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// [`OrderedStore::score_upsert`]
    ScoreUpsert,
    /// [`OrderedStore::score_remove`]
    ScoreRemove,
    /// [`OrderedStore::rank_desc`]
    RankDesc,
    /// [`OrderedStore::range_desc`]
    RangeDesc,
    /// [`OrderedStore::cardinality`]
    Cardinality,
    /// [`OrderedStore::set_add`] and [`OrderedStore::set_add_bounded`]
    SetAdd,
    /// [`OrderedStore::set_remove`]
    SetRemove,
    /// [`OrderedStore::set_is_member`]
    SetIsMember,
    /// [`OrderedStore::set_cardinality`]
    SetCardinality,
    /// [`OrderedStore::ping`]
    Ping,
}

#[derive(Debug, Default)]
struct Faults {
    down: AtomicBool,
    fail_next: AtomicUsize,
    failing_ops: Mutex<HashSet<StoreOp>>,
    calls: AtomicUsize,
}

/// [`InMemoryOrderedStore`] that can simulate an unreachable store.
///
/// Three independent fault modes:
/// - [`set_down`](Self::set_down): every call fails until brought back up
/// - [`fail_next`](Self::fail_next): the next `n` calls fail, then recover
/// - [`fail_op`](Self::fail_op): one primitive fails until cleared
///
/// Injected failures are [`StoreError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: InMemoryOrderedStore,
    faults: Arc<Faults>,
}

impl FlakyStore {
    /// Wrap a fresh in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing in-memory store (shares its data).
    #[must_use]
    pub fn wrapping(inner: InMemoryOrderedStore) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    /// The wrapped store, for inspecting data without fault injection.
    #[must_use]
    pub const fn inner(&self) -> &InMemoryOrderedStore {
        &self.inner
    }

    /// Take the store down (`true`) or bring it back (`false`).
    pub fn set_down(&self, down: bool) {
        self.faults.down.store(down, Ordering::SeqCst);
    }

    /// Fail the next `count` calls of any kind.
    pub fn fail_next(&self, count: usize) {
        self.faults.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fail every call of `op` until [`clear_faults`](Self::clear_faults).
    pub fn fail_op(&self, op: StoreOp) {
        if let Ok(mut ops) = self.faults.failing_ops.lock() {
            ops.insert(op);
        }
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.set_down(false);
        self.fail_next(0);
        if let Ok(mut ops) = self.faults.failing_ops.lock() {
            ops.clear();
        }
    }

    /// Total calls received, failed or not.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.faults.calls.load(Ordering::SeqCst)
    }

    fn check(&self, op: StoreOp) -> StoreResult<()> {
        self.faults.calls.fetch_add(1, Ordering::SeqCst);

        if self.faults.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is down".into()));
        }

        let consumed = self
            .faults
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(StoreError::Unavailable("injected transient failure".into()));
        }

        let op_failing = self
            .faults
            .failing_ops
            .lock()
            .map(|ops| ops.contains(&op))
            .unwrap_or(false);
        if op_failing {
            return Err(StoreError::Unavailable(format!("{op:?} is failing")));
        }

        Ok(())
    }
}

#[async_trait]
impl OrderedStore for FlakyStore {
    async fn score_upsert(&self, set_key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.check(StoreOp::ScoreUpsert)?;
        self.inner.score_upsert(set_key, member, score).await
    }

    async fn score_remove(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        self.check(StoreOp::ScoreRemove)?;
        self.inner.score_remove(set_key, member).await
    }

    async fn rank_desc(&self, set_key: &str, member: &str) -> StoreResult<Option<u64>> {
        self.check(StoreOp::RankDesc)?;
        self.inner.rank_desc(set_key, member).await
    }

    async fn range_desc(&self, set_key: &str, start: u64, stop: u64) -> StoreResult<Vec<String>> {
        self.check(StoreOp::RangeDesc)?;
        self.inner.range_desc(set_key, start, stop).await
    }

    async fn cardinality(&self, set_key: &str) -> StoreResult<u64> {
        self.check(StoreOp::Cardinality)?;
        self.inner.cardinality(set_key).await
    }

    async fn set_add(&self, set_key: &str, member: &str) -> StoreResult<()> {
        self.check(StoreOp::SetAdd)?;
        self.inner.set_add(set_key, member).await
    }

    async fn set_add_bounded(
        &self,
        set_key: &str,
        source_key: &str,
        member: &str,
        capacity: u64,
    ) -> StoreResult<BoundedAdd> {
        self.check(StoreOp::SetAdd)?;
        self.inner
            .set_add_bounded(set_key, source_key, member, capacity)
            .await
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        self.check(StoreOp::SetRemove)?;
        self.inner.set_remove(set_key, member).await
    }

    async fn set_is_member(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        self.check(StoreOp::SetIsMember)?;
        self.inner.set_is_member(set_key, member).await
    }

    async fn set_cardinality(&self, set_key: &str) -> StoreResult<u64> {
        self.check(StoreOp::SetCardinality)?;
        self.inner.set_cardinality(set_key).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check(StoreOp::Ping)?;
        self.inner.ping().await
    }
}
