//! # Admission Core
//!
//! Priority admission queue for gating a scarce action (ticket purchase)
//! under heavy demand.
//!
//! Clients join a waiting list ordered by a priority score. A bounded number
//! of them are admitted into an active set, which is what grants permission to
//! purchase. Slots are released on completion or abandonment and refilled
//! from the top of the waiting list.
//!
//! ## Core Concepts
//!
//! - **Waiting list**: score-ordered set of every client awaiting admission
//! - **Active set**: the at most `max_active` clients allowed to purchase now
//! - **Priority weight**: redeemed loyalty units; dominates the score
//! - **Admission**: moving a client from merely-waiting into the active set
//!
//! ## Architecture Principles
//!
//! - Stateless compute over an injected [`OrderedStore`](store::OrderedStore)
//! - Every mutation is a single atomic store primitive; no client-side locks
//! - Time comes from an injected [`Clock`](environment::Clock)
//! - External settlement sits behind [`PointsLedger`](ledger::PointsLedger)
//!
//! ## Example
//!
//! ```ignore
//! use admission_core::*;
//!
//! let queue = AdmissionQueue::new(store, Arc::new(SystemClock), QueueConfig::with_max_active(2))?;
//!
//! queue.join(&ClientId::parse("alice")?, PriorityWeight::new(10)).await?;
//! queue.join(&ClientId::parse("bob")?, PriorityWeight::new(5)).await?;
//! queue.join(&ClientId::parse("carol")?, PriorityWeight::new(1)).await?;
//!
//! assert!(!queue.can_purchase(&ClientId::parse("carol")?).await?);
//! assert_eq!(queue.position(&ClientId::parse("carol")?).await?, 3);
//! ```

pub mod error;
pub mod ledger;
pub mod queue;
pub mod store;
pub mod telemetry;
pub mod types;

pub use error::{AdmissionError, LedgerError, Result, StoreError};
pub use ledger::{PointsLedger, TrustedLedger};
pub use queue::{AdmissionQueue, QueueConfig};
pub use store::{BoundedAdd, OrderedStore, StoreResult};
pub use types::{
    ClientId, CompleteOutcome, CompleteStatus, JoinOutcome, LeaveOutcome, LeaveStatus,
    MAX_PRIORITY_WEIGHT, PositionReport, PriorityWeight, QueueStats,
};

/// Environment module - time abstraction
///
/// Scores carry a join timestamp, so the clock is injected to keep ordering
/// deterministic in tests.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use admission_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// assert!(clock.now().timestamp() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use environment::{Clock, SystemClock};
