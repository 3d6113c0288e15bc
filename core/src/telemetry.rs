//! Queue metric names and recorders.
//!
//! Recording goes through the `metrics` facade, so nothing is exported until
//! a recorder is installed (see `admission_runtime::metrics::MetricsServer`).
//! Without one every call here is a no-op.

use metrics::{counter, gauge};

/// Counter: successful joins (including re-joins).
pub const JOINS_TOTAL: &str = "admission_joins_total";
/// Counter: clients moved into the active set.
pub const ADMITTED_TOTAL: &str = "admission_admitted_total";
/// Counter: completed purchases.
pub const COMPLETED_TOTAL: &str = "admission_completed_total";
/// Counter: leaves, labelled by `was_in_queue`.
pub const LEFT_TOTAL: &str = "admission_left_total";
/// Counter: leaves that failed against the store.
pub const LEAVE_ERRORS_TOTAL: &str = "admission_leave_errors_total";
/// Counter: scheduler ticks, labelled by `outcome`.
pub const SCHEDULER_TICKS_TOTAL: &str = "admission_scheduler_ticks_total";
/// Gauge: waiting-list size at the last stats read.
pub const WAITING_CLIENTS: &str = "admission_waiting_clients";
/// Gauge: active-set size at the last stats read.
pub const ACTIVE_BUYERS: &str = "admission_active_buyers";

/// Queue metrics recorder.
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record a join.
    pub fn record_join() {
        counter!(JOINS_TOTAL).increment(1);
    }

    /// Record admissions from one activation pass.
    pub fn record_admitted(count: usize) {
        if count > 0 {
            counter!(ADMITTED_TOTAL).increment(count as u64);
        }
    }

    /// Record a completed purchase.
    pub fn record_completed() {
        counter!(COMPLETED_TOTAL).increment(1);
    }

    /// Record a leave.
    pub fn record_left(was_in_queue: bool) {
        let label = if was_in_queue { "true" } else { "false" };
        counter!(LEFT_TOTAL, "was_in_queue" => label).increment(1);
    }

    /// Record a leave that hit a store failure.
    pub fn record_leave_error() {
        counter!(LEAVE_ERRORS_TOTAL).increment(1);
    }

    /// Record a scheduler tick outcome (`"ok"` or `"error"`).
    pub fn record_scheduler_tick(outcome: &'static str) {
        counter!(SCHEDULER_TICKS_TOTAL, "outcome" => outcome).increment(1);
    }

    /// Record current occupancy.
    #[allow(clippy::cast_precision_loss)] // Queue sizes are far below f64's exact integer range
    pub fn record_occupancy(waiting: u64, active: u64) {
        gauge!(WAITING_CLIENTS).set(waiting as f64);
        gauge!(ACTIVE_BUYERS).set(active as f64);
    }
}
