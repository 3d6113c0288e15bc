//! Application state for Axum handlers.

use admission_core::{AdmissionQueue, PointsLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// The admission queue
    pub queue: Arc<AdmissionQueue>,
    /// Ledger charged when a join asks to redeem points
    pub ledger: Arc<dyn PointsLedger>,
    /// Prometheus handle behind `/metrics`; `None` when metrics are off
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state without a metrics handle.
    #[must_use]
    pub fn new(queue: Arc<AdmissionQueue>, ledger: Arc<dyn PointsLedger>) -> Self {
        Self {
            queue,
            ledger,
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Required for Axum
        fn assert_clone<T: Clone + Send + Sync>() {}
        assert_clone::<AppState>();
    }
}
