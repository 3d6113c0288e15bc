//! The admission queue.
//!
//! Orders waiting clients by priority score and admits a bounded number of
//! them into the active set. All state lives in the injected
//! [`OrderedStore`]; this type is stateless compute over it, safe to share
//! behind an `Arc` and to call from many tasks at once.
//!
//! # Flow
//!
//! ```text
//! join ──► upsert score ──► activate (best effort) ──► position / is_active
//!                              ▲
//! complete / leave ──► remove ─┘ (only if the client held a slot)
//!                              ▲
//! ActivationScheduler ─────────┘ (periodic repair)
//! ```
//!
//! # Concurrency
//!
//! No in-process locks. Every store call is atomic on its own, and admission
//! goes through [`OrderedStore::set_add_bounded`], so concurrent `activate`
//! calls (from joins, completions and the scheduler) may interleave freely:
//! re-admitting an active client is a no-op and the active set never grows
//! past `max_active`. The bounded add also requires the client to still be
//! waiting, and removal takes the waiting entry before the active one, so a
//! leave racing an activation pass never leaves an orphaned active slot.

use crate::environment::Clock;
use crate::error::{AdmissionError, Result};
use crate::ledger::PointsLedger;
use crate::store::{BoundedAdd, OrderedStore};
use crate::telemetry::QueueMetrics;
use crate::types::{
    priority_score, ClientId, CompleteOutcome, CompleteStatus, JoinOutcome, LeaveOutcome,
    LeaveStatus, PositionReport, PriorityWeight, QueueStats,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default key of the waiting list (score-ordered set).
pub const DEFAULT_WAITING_KEY: &str = "ticket_queue";
/// Default key of the active set.
pub const DEFAULT_ACTIVE_KEY: &str = "active_buyers";
/// Default capacity of the active set.
pub const DEFAULT_MAX_ACTIVE: u64 = 10;
/// Lower bound of the derived activation scan window.
pub const MIN_SCAN_WINDOW: u64 = 50;

/// Admission queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Store key of the waiting list
    pub waiting_key: String,
    /// Store key of the active set
    pub active_key: String,
    /// Maximum number of clients allowed to purchase at once
    pub max_active: u64,
    /// How many top-ranked waiting clients one activation pass inspects.
    /// `None` derives it from `max_active`.
    pub scan_window: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            waiting_key: DEFAULT_WAITING_KEY.to_string(),
            active_key: DEFAULT_ACTIVE_KEY.to_string(),
            max_active: DEFAULT_MAX_ACTIVE,
            scan_window: None,
        }
    }
}

impl QueueConfig {
    /// Config with the default keys and the given capacity.
    #[must_use]
    pub fn with_max_active(max_active: u64) -> Self {
        Self {
            max_active,
            ..Self::default()
        }
    }

    /// Number of waiting clients inspected per activation pass.
    ///
    /// Defaults to `max(max_active * 5, 50)` and is never below `max_active`,
    /// so a pass can always fill an empty active set.
    #[must_use]
    pub fn effective_scan_window(&self) -> u64 {
        self.scan_window
            .unwrap_or_else(|| self.max_active.saturating_mul(5).max(MIN_SCAN_WINDOW))
            .max(self.max_active)
    }

    fn validate(&self) -> Result<()> {
        if self.max_active == 0 {
            return Err(AdmissionError::InvalidConfig(
                "max_active must be at least 1".to_string(),
            ));
        }
        if self.waiting_key.is_empty() || self.active_key.is_empty() {
            return Err(AdmissionError::InvalidConfig(
                "store keys must not be empty".to_string(),
            ));
        }
        if self.waiting_key == self.active_key {
            return Err(AdmissionError::InvalidConfig(format!(
                "waiting and active keys must differ (both are {:?})",
                self.waiting_key
            )));
        }
        Ok(())
    }
}

/// Priority queue with bounded concurrent admission.
///
/// # Example
///
/// ```ignore
/// let queue = AdmissionQueue::new(store, Arc::new(SystemClock), QueueConfig::default())?;
///
/// let client = ClientId::parse("0xAlice")?;
/// let joined = queue.join(&client, PriorityWeight::new(10)).await?;
/// if joined.is_active {
///     // purchase, then
///     queue.complete(&client).await?;
/// }
/// ```
pub struct AdmissionQueue {
    store: Arc<dyn OrderedStore>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
}

impl AdmissionQueue {
    /// Create a queue over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidConfig`] if `max_active` is zero or the
    /// store keys are empty or identical.
    pub fn new(
        store: Arc<dyn OrderedStore>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            config,
        })
    }

    /// Queue configuration.
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Underlying store (for readiness probes).
    #[must_use]
    pub fn store(&self) -> &Arc<dyn OrderedStore> {
        &self.store
    }

    /// Join the waiting list, or re-score an existing entry.
    ///
    /// Joining again replaces the previous score, including its timestamp
    /// tie-breaker. After the upsert an activation pass runs so an
    /// uncontended client is admitted immediately; that pass is best effort
    /// and its failure is only logged, since the scheduler repeats it.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] if the upsert, rank or membership
    /// lookup fails.
    pub async fn join(&self, client_id: &ClientId, weight: PriorityWeight) -> Result<JoinOutcome> {
        let score = priority_score(weight, self.clock.now());

        self.store
            .score_upsert(&self.config.waiting_key, client_id.as_str(), score)
            .await?;
        QueueMetrics::record_join();

        let queue_position = self.position(client_id).await?;

        if let Err(e) = self.activate().await {
            warn!(
                client_id = %client_id,
                error = %e,
                "Opportunistic activation after join failed; scheduler will retry"
            );
        }

        let is_active = self.can_purchase(client_id).await?;

        info!(
            client_id = %client_id,
            priority_weight = weight.units(),
            queue_position,
            is_active,
            "Client joined queue"
        );

        Ok(JoinOutcome {
            client_id: client_id.clone(),
            queue_position,
            priority_weight: weight,
            is_active,
        })
    }

    /// Redeem loyalty points on `ledger`, then join with the weight they bought.
    ///
    /// Nothing is written to the store if the redemption fails.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Ledger`] if the redemption is refused and
    /// [`AdmissionError::Store`] if the join fails afterwards.
    pub async fn redeem_and_join(
        &self,
        client_id: &ClientId,
        points: u64,
        ledger: &dyn PointsLedger,
    ) -> Result<JoinOutcome> {
        let weight = ledger.redeem(client_id, points).await.inspect_err(|e| {
            warn!(client_id = %client_id, points, error = %e, "Point redemption failed");
        })?;

        debug!(client_id = %client_id, points, weight = weight.units(), "Points redeemed");
        self.join(client_id, weight).await
    }

    /// Fill free active slots from the top of the waiting list.
    ///
    /// Scans up to [`QueueConfig::effective_scan_window`] clients in
    /// descending score order, skipping those already active, until the free
    /// slots are used up. Calling it again with nothing changed admits no one.
    ///
    /// Returns the number of newly admitted clients.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] if any store call fails. Clients
    /// admitted before the failure stay admitted.
    pub async fn activate(&self) -> Result<usize> {
        let active = self.store.set_cardinality(&self.config.active_key).await?;
        let slots = self.config.max_active.saturating_sub(active);
        if slots == 0 {
            return Ok(0);
        }

        let window = self.config.effective_scan_window();
        let candidates = self
            .store
            .range_desc(&self.config.waiting_key, 0, window - 1)
            .await?;

        let mut admitted: u64 = 0;
        for member in &candidates {
            if admitted >= slots {
                break;
            }
            match self
                .store
                .set_add_bounded(
                    &self.config.active_key,
                    &self.config.waiting_key,
                    member,
                    self.config.max_active,
                )
                .await?
            {
                BoundedAdd::Added => {
                    admitted += 1;
                    info!(client_id = %member, "Client admitted to active set");
                }
                BoundedAdd::AlreadyMember => {}
                // Left or completed after the scan.
                BoundedAdd::NotWaiting => {
                    debug!(client_id = %member, "Candidate left before admission");
                }
                // A concurrent pass filled the remaining capacity.
                BoundedAdd::Full => break,
            }
        }

        #[allow(clippy::cast_possible_truncation)] // Bounded by the scan window
        let admitted = admitted as usize;
        QueueMetrics::record_admitted(admitted);
        debug!(
            admitted,
            free_slots = slots,
            scanned = candidates.len(),
            "Activation pass finished"
        );
        Ok(admitted)
    }

    /// 1-indexed position in the waiting list, or 0 if not waiting.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] if the rank lookup fails.
    pub async fn position(&self, client_id: &ClientId) -> Result<u64> {
        let rank = self
            .store
            .rank_desc(&self.config.waiting_key, client_id.as_str())
            .await?;
        Ok(rank.map_or(0, |r| r + 1))
    }

    /// Whether the client currently holds an active slot.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] if the membership lookup fails.
    pub async fn can_purchase(&self, client_id: &ClientId) -> Result<bool> {
        Ok(self
            .store
            .set_is_member(&self.config.active_key, client_id.as_str())
            .await?)
    }

    /// Position and purchase eligibility in one report.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] if either lookup fails.
    pub async fn position_report(&self, client_id: &ClientId) -> Result<PositionReport> {
        let queue_position = self.position(client_id).await?;
        let can_purchase = self.can_purchase(client_id).await?;
        debug!(client_id = %client_id, queue_position, can_purchase, "Position lookup");
        Ok(PositionReport {
            client_id: client_id.clone(),
            queue_position,
            can_purchase,
        })
    }

    /// Remove a client after a purchase and backfill the freed slot.
    ///
    /// Idempotent: completing an unknown client succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] if a removal fails. A failed
    /// backfill is logged, not returned.
    pub async fn complete(&self, client_id: &ClientId) -> Result<CompleteOutcome> {
        let (was_waiting, was_active) = self.remove(client_id).await?;
        QueueMetrics::record_completed();
        info!(client_id = %client_id, was_waiting, was_active, "Purchase completed");

        if was_active {
            self.backfill(client_id).await;
        }

        Ok(CompleteOutcome {
            status: CompleteStatus::Completed,
            client_id: client_id.clone(),
        })
    }

    /// Give up a place in line.
    ///
    /// Same removal as [`complete`](Self::complete), but never fails: store
    /// errors are logged and reported as [`LeaveStatus::Error`], since leave
    /// is mostly called from cleanup paths.
    pub async fn leave(&self, client_id: &ClientId) -> LeaveOutcome {
        match self.remove(client_id).await {
            Ok((was_in_queue, was_active)) => {
                QueueMetrics::record_left(was_in_queue);
                info!(client_id = %client_id, was_in_queue, was_active, "Client left queue");
                if was_active {
                    self.backfill(client_id).await;
                }
                LeaveOutcome {
                    status: LeaveStatus::Removed,
                    client_id: client_id.clone(),
                    was_in_queue,
                }
            }
            Err(e) => {
                QueueMetrics::record_leave_error();
                error!(client_id = %client_id, error = %e, "Failed to remove client from queue");
                LeaveOutcome {
                    status: LeaveStatus::Error,
                    client_id: client_id.clone(),
                    was_in_queue: false,
                }
            }
        }
    }

    /// Occupancy snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Store`] if either cardinality read fails.
    pub async fn stats(&self) -> Result<QueueStats> {
        let queue_size = self.store.cardinality(&self.config.waiting_key).await?;
        let active_buyers = self.store.set_cardinality(&self.config.active_key).await?;
        QueueMetrics::record_occupancy(queue_size, active_buyers);

        Ok(QueueStats {
            queue_size,
            active_buyers,
            available_slots: self.config.max_active.saturating_sub(active_buyers),
        })
    }

    /// Remove from both containers. Returns `(was_waiting, was_active)`.
    async fn remove(&self, client_id: &ClientId) -> Result<(bool, bool)> {
        let was_waiting = self
            .store
            .score_remove(&self.config.waiting_key, client_id.as_str())
            .await?;
        let was_active = self
            .store
            .set_remove(&self.config.active_key, client_id.as_str())
            .await?;
        Ok((was_waiting, was_active))
    }

    async fn backfill(&self, freed_by: &ClientId) {
        match self.activate().await {
            Ok(admitted) => {
                debug!(freed_by = %freed_by, admitted, "Backfilled freed slot");
            }
            Err(e) => {
                warn!(
                    freed_by = %freed_by,
                    error = %e,
                    "Backfill after removal failed; scheduler will retry"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_window_defaults() {
        assert_eq!(QueueConfig::with_max_active(2).effective_scan_window(), 50);
        assert_eq!(QueueConfig::with_max_active(30).effective_scan_window(), 150);
    }

    #[test]
    fn test_scan_window_never_below_capacity() {
        let config = QueueConfig {
            scan_window: Some(5),
            ..QueueConfig::with_max_active(20)
        };
        assert_eq!(config.effective_scan_window(), 20);
    }

    #[test]
    fn test_config_validation() {
        assert!(QueueConfig::default().validate().is_ok());
        assert!(QueueConfig::with_max_active(0).validate().is_err());

        let same_keys = QueueConfig {
            active_key: DEFAULT_WAITING_KEY.to_string(),
            ..QueueConfig::default()
        };
        assert!(matches!(
            same_keys.validate(),
            Err(AdmissionError::InvalidConfig(_))
        ));
    }
}
