//! # Admission Testing
//!
//! Test doubles for the admission queue.
//!
//! This crate provides:
//! - [`InMemoryOrderedStore`]: Redis-compatible ordering without Redis
//! - [`FlakyStore`]: the same store with injectable outages
//! - [`FixedClock`] / [`ManualClock`]: deterministic join timestamps
//! - [`MockPointsLedger`]: balances and redemption log for the ledger seam
//!
//! ## Example
//!
//! ```ignore
//! use admission_testing::{InMemoryOrderedStore, ManualClock};
//!
//! #[tokio::test]
//! async fn test_alice_goes_first() {
//!     let store = InMemoryOrderedStore::new();
//!     let clock = ManualClock::ticking(chrono::Duration::seconds(1));
//!     let queue = AdmissionQueue::new(Arc::new(store), Arc::new(clock), QueueConfig::default())?;
//!
//!     queue.join(&alice, PriorityWeight::new(3)).await?;
//!     assert_eq!(queue.position(&alice).await?, 1);
//! }
//! ```

pub mod flaky;
pub mod memory_store;

pub use flaky::{FlakyStore, StoreOp};
pub use memory_store::InMemoryOrderedStore;

/// Mock implementations of environment traits
pub mod mocks {
    use admission_core::environment::Clock;
    use admission_core::error::LedgerError;
    use admission_core::ledger::PointsLedger;
    use admission_core::types::{ClientId, PriorityWeight};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use admission_testing::mocks::FixedClock;
    /// use admission_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch_2025())
    }

    fn epoch_2025() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Clock that only moves when told to.
    ///
    /// With [`ticking`](Self::ticking) it also advances by a fixed step after
    /// every read, so consecutive joins get strictly increasing timestamps.
    /// Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
        step: Duration,
    }

    impl ManualClock {
        /// Clock frozen at `start`.
        #[must_use]
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(start)),
                step: Duration::zero(),
            }
        }

        /// Clock starting at 2025-01-01 that advances `step` after each read.
        #[must_use]
        pub fn ticking(step: Duration) -> Self {
            Self {
                time: Arc::new(Mutex::new(epoch_2025())),
                step,
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            if let Ok(mut time) = self.time.lock() {
                *time += by;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            match self.time.lock() {
                Ok(mut time) => {
                    let now = *time;
                    *time += self.step;
                    now
                }
                Err(poisoned) => *poisoned.into_inner(),
            }
        }
    }

    /// In-memory points ledger.
    ///
    /// Clients start with zero points unless funded. Redemptions are logged
    /// in order for assertions.
    #[derive(Debug, Clone, Default)]
    pub struct MockPointsLedger {
        balances: Arc<Mutex<HashMap<ClientId, u64>>>,
        redemptions: Arc<Mutex<Vec<(ClientId, u64)>>>,
        unavailable: Arc<AtomicBool>,
    }

    impl MockPointsLedger {
        /// Create an empty ledger.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Credit `points` to `client_id`.
        #[must_use]
        pub fn with_balance(self, client_id: &ClientId, points: u64) -> Self {
            if let Ok(mut balances) = self.balances.lock() {
                *balances.entry(client_id.clone()).or_default() += points;
            }
            self
        }

        /// Simulate the contract layer being unreachable.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Current balance of `client_id`.
        #[must_use]
        pub fn balance(&self, client_id: &ClientId) -> u64 {
            self.balances
                .lock()
                .map(|balances| balances.get(client_id).copied().unwrap_or(0))
                .unwrap_or(0)
        }

        /// Successful redemptions so far.
        #[must_use]
        pub fn redemptions(&self) -> Vec<(ClientId, u64)> {
            self.redemptions
                .lock()
                .map(|log| log.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl PointsLedger for MockPointsLedger {
        async fn redeem(
            &self,
            client_id: &ClientId,
            points: u64,
        ) -> Result<PriorityWeight, LedgerError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(LedgerError::Unavailable("mock ledger offline".into()));
            }

            let mut balances = self
                .balances
                .lock()
                .map_err(|_| LedgerError::Rejected("Mutex lock failed".into()))?;
            let available = balances.get(client_id).copied().unwrap_or(0);
            if available < points {
                return Err(LedgerError::InsufficientPoints {
                    requested: points,
                    available,
                });
            }
            balances.insert(client_id.clone(), available - points);
            drop(balances);

            if let Ok(mut log) = self.redemptions.lock() {
                log.push((client_id.clone(), points));
            }
            Ok(PriorityWeight::new(points))
        }
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Respects `RUST_LOG`; output goes through the test harness capture.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, MockPointsLedger, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use admission_core::environment::Clock;
    use admission_core::{ClientId, LedgerError, PointsLedger};

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_ticking_clock_advances_per_read() {
        let clock = ManualClock::ticking(chrono::Duration::seconds(1));
        let first = clock.now();
        let second = clock.now();
        assert_eq!(second - first, chrono::Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_mock_ledger_debits_balance() {
        let alice = ClientId::parse("alice").unwrap();
        let ledger = MockPointsLedger::new().with_balance(&alice, 10);

        let weight = ledger.redeem(&alice, 4).await.unwrap();
        assert_eq!(weight.units(), 4);
        assert_eq!(ledger.balance(&alice), 6);

        let err = ledger.redeem(&alice, 7).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientPoints {
                requested: 7,
                available: 6
            }
        );
        assert_eq!(ledger.redemptions(), vec![(alice, 4)]);
    }
}
