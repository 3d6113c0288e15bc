//! In-memory ordered store.
//!
//! Mirrors the Redis semantics the queue relies on: descending rank with
//! ties broken by reverse lexicographic member order (as `ZREVRANGE` does),
//! idempotent set adds, and atomic bounded adds that require the member to
//! still be waiting.

use admission_core::store::{BoundedAdd, OrderedStore, StoreResult};
use admission_core::StoreError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Collections {
    /// key -> (member -> score)
    sorted: HashMap<String, HashMap<String, f64>>,
    /// key -> members
    sets: HashMap<String, HashSet<String>>,
}

/// `HashMap`-backed [`OrderedStore`] for fast, deterministic tests.
///
/// Clones share the same data, so a test can hand one clone to the queue and
/// inspect another.
///
/// # Example
///
/// ```
/// use admission_testing::InMemoryOrderedStore;
/// use admission_core::OrderedStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryOrderedStore::new();
/// store.score_upsert("queue", "alice", 10.0).await?;
/// store.score_upsert("queue", "bob", 5.0).await?;
///
/// assert_eq!(store.rank_desc("queue", "bob").await?, Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderedStore {
    data: Arc<Mutex<Collections>>,
}

impl InMemoryOrderedStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Collections>> {
        self.data
            .lock()
            .map_err(|_| StoreError::Command("Mutex lock failed".into()))
    }

    fn sorted_desc(members: &HashMap<String, f64>) -> Vec<(&String, f64)> {
        let mut entries: Vec<(&String, f64)> =
            members.iter().map(|(member, score)| (member, *score)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));
        entries
    }

    /// Members of a score-ordered set, highest score first.
    #[must_use]
    pub fn ranked_members(&self, set_key: &str) -> Vec<String> {
        self.lock()
            .map(|data| {
                data.sorted
                    .get(set_key)
                    .map(|members| {
                        Self::sorted_desc(members)
                            .into_iter()
                            .map(|(member, _)| member.clone())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Score of `member`, if present.
    #[must_use]
    pub fn score_of(&self, set_key: &str, member: &str) -> Option<f64> {
        self.lock()
            .ok()?
            .sorted
            .get(set_key)?
            .get(member)
            .copied()
    }

    /// Members of a plain set, sorted for stable assertions.
    #[must_use]
    pub fn set_members(&self, set_key: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .lock()
            .map(|data| {
                data.sets
                    .get(set_key)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Drop all data (for test isolation).
    pub fn clear(&self) {
        if let Ok(mut data) = self.lock() {
            data.sorted.clear();
            data.sets.clear();
        }
    }
}

#[async_trait]
impl OrderedStore for InMemoryOrderedStore {
    async fn score_upsert(&self, set_key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.lock()?
            .sorted
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn score_remove(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .lock()?
            .sorted
            .get_mut(set_key)
            .is_some_and(|members| members.remove(member).is_some()))
    }

    async fn rank_desc(&self, set_key: &str, member: &str) -> StoreResult<Option<u64>> {
        let data = self.lock()?;
        let Some(members) = data.sorted.get(set_key) else {
            return Ok(None);
        };
        Ok(Self::sorted_desc(members)
            .iter()
            .position(|(candidate, _)| candidate.as_str() == member)
            .map(|rank| rank as u64))
    }

    async fn range_desc(&self, set_key: &str, start: u64, stop: u64) -> StoreResult<Vec<String>> {
        let data = self.lock()?;
        let Some(members) = data.sorted.get(set_key) else {
            return Ok(Vec::new());
        };
        if stop < start {
            return Ok(Vec::new());
        }
        let skip = usize::try_from(start).unwrap_or(usize::MAX);
        let take = usize::try_from(stop - start).map_or(usize::MAX, |n| n.saturating_add(1));
        Ok(Self::sorted_desc(members)
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|(member, _)| member.clone())
            .collect())
    }

    async fn cardinality(&self, set_key: &str) -> StoreResult<u64> {
        Ok(self
            .lock()?
            .sorted
            .get(set_key)
            .map_or(0, |members| members.len() as u64))
    }

    async fn set_add(&self, set_key: &str, member: &str) -> StoreResult<()> {
        self.lock()?
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_add_bounded(
        &self,
        set_key: &str,
        source_key: &str,
        member: &str,
        capacity: u64,
    ) -> StoreResult<BoundedAdd> {
        let mut data = self.lock()?;
        let waiting = data
            .sorted
            .get(source_key)
            .is_some_and(|members| members.contains_key(member));
        if !waiting {
            return Ok(BoundedAdd::NotWaiting);
        }
        let set = data.sets.entry(set_key.to_string()).or_default();
        if set.contains(member) {
            return Ok(BoundedAdd::AlreadyMember);
        }
        if set.len() as u64 >= capacity {
            return Ok(BoundedAdd::Full);
        }
        set.insert(member.to_string());
        Ok(BoundedAdd::Added)
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .lock()?
            .sets
            .get_mut(set_key)
            .is_some_and(|set| set.remove(member)))
    }

    async fn set_is_member(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .lock()?
            .sets
            .get(set_key)
            .is_some_and(|set| set.contains(member)))
    }

    async fn set_cardinality(&self, set_key: &str) -> StoreResult<u64> {
        Ok(self
            .lock()?
            .sets
            .get(set_key)
            .map_or(0, |set| set.len() as u64))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rank_and_range_are_descending() {
        let store = InMemoryOrderedStore::new();
        store.score_upsert("q", "low", 1.0).await.unwrap();
        store.score_upsert("q", "high", 9.0).await.unwrap();
        store.score_upsert("q", "mid", 5.0).await.unwrap();

        assert_eq!(store.rank_desc("q", "high").await.unwrap(), Some(0));
        assert_eq!(store.rank_desc("q", "low").await.unwrap(), Some(2));
        assert_eq!(store.rank_desc("q", "missing").await.unwrap(), None);
        assert_eq!(store.range_desc("q", 0, 1).await.unwrap(), vec!["high", "mid"]);
        assert_eq!(store.range_desc("q", 2, 10).await.unwrap(), vec!["low"]);
        assert!(store.range_desc("q", 5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_equal_scores_order_reverse_lexicographically() {
        let store = InMemoryOrderedStore::new();
        store.score_upsert("q", "a", 1.0).await.unwrap();
        store.score_upsert("q", "b", 1.0).await.unwrap();

        assert_eq!(store.ranked_members("q"), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_score() {
        let store = InMemoryOrderedStore::new();
        store.score_upsert("q", "a", 1.0).await.unwrap();
        store.score_upsert("q", "a", 3.0).await.unwrap();

        assert_eq!(store.cardinality("q").await.unwrap(), 1);
        assert_eq!(store.score_of("q", "a"), Some(3.0));
    }

    #[tokio::test]
    async fn test_bounded_add() {
        let store = InMemoryOrderedStore::new();
        store.score_upsert("q", "a", 2.0).await.unwrap();
        store.score_upsert("q", "b", 1.0).await.unwrap();

        assert_eq!(store.set_add_bounded("s", "q", "a", 1).await.unwrap(), BoundedAdd::Added);
        assert_eq!(
            store.set_add_bounded("s", "q", "a", 1).await.unwrap(),
            BoundedAdd::AlreadyMember
        );
        assert_eq!(store.set_add_bounded("s", "q", "b", 1).await.unwrap(), BoundedAdd::Full);
        assert_eq!(store.set_members("s"), vec!["a"]);
    }

    #[tokio::test]
    async fn test_bounded_add_requires_waiting_member() {
        let store = InMemoryOrderedStore::new();
        store.score_upsert("q", "a", 1.0).await.unwrap();
        store.score_remove("q", "a").await.unwrap();

        assert_eq!(
            store.set_add_bounded("s", "q", "a", 5).await.unwrap(),
            BoundedAdd::NotWaiting
        );
        assert!(store.set_members("s").is_empty());
    }

    #[tokio::test]
    async fn test_removals_report_presence() {
        let store = InMemoryOrderedStore::new();
        store.set_add("s", "a").await.unwrap();
        store.score_upsert("q", "a", 1.0).await.unwrap();

        assert!(store.set_remove("s", "a").await.unwrap());
        assert!(!store.set_remove("s", "a").await.unwrap());
        assert!(store.score_remove("q", "a").await.unwrap());
        assert!(!store.score_remove("q", "a").await.unwrap());
    }
}
