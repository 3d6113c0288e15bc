//! Prometheus export for the queue metrics.
//!
//! The recorders live in [`admission_core::telemetry`] so the queue can
//! record without depending on this crate. This module installs the global
//! Prometheus recorder, registers descriptions for every queue metric, and
//! renders the text exposition served at `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use admission_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new();
//! server.start()?;
//!
//! let exposition = server.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use admission_core::telemetry::{
    ACTIVE_BUYERS, ADMITTED_TOTAL, COMPLETED_TOTAL, JOINS_TOTAL, LEAVE_ERRORS_TOTAL, LEFT_TOTAL,
    SCHEDULER_TICKS_TOTAL, WAITING_CLIENTS,
};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use thiserror::Error;

pub use admission_core::telemetry::QueueMetrics;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder owner.
///
/// Holds the handle used to render metrics for scraping.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl fmt::Debug for MetricsServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsServer")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

impl MetricsServer {
    /// Create a server with no recorder installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the exporter cannot be installed.
    /// A recorder that is already installed (common in tests) is not an
    /// error; [`handle`](Self::handle) stays `None` in that case.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(JOINS_TOTAL, "Total number of joins, re-joins included");
    describe_counter!(ADMITTED_TOTAL, "Total number of clients admitted to the active set");
    describe_counter!(COMPLETED_TOTAL, "Total number of completed purchases");
    describe_counter!(LEFT_TOTAL, "Total number of clients that left the queue");
    describe_counter!(LEAVE_ERRORS_TOTAL, "Total number of leaves that failed against the store");
    describe_counter!(SCHEDULER_TICKS_TOTAL, "Total number of scheduler activation passes");
    describe_gauge!(WAITING_CLIENTS, "Clients in the waiting list at the last stats read");
    describe_gauge!(ACTIVE_BUYERS, "Clients holding an active slot at the last stats read");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let server = MetricsServer::new();
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
        assert_eq!(format!("{server:?}"), "MetricsServer { installed: false }");
    }

    #[test]
    fn test_metrics_server_start_renders_queue_metrics() {
        let mut server = MetricsServer::new();
        assert!(server.start().is_ok());

        QueueMetrics::record_join();
        QueueMetrics::record_occupancy(4, 2);

        // Another test in this process may own the recorder.
        if let Some(output) = server.render() {
            assert!(output.contains(JOINS_TOTAL));
            assert!(output.contains(WAITING_CLIENTS));
        }
    }
}
