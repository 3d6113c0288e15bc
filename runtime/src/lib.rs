//! # Admission Runtime
//!
//! Background machinery around the admission queue.
//!
//! ## Core Components
//!
//! - **[`ActivationScheduler`]**: startup handshake plus a fixed-interval
//!   activation sweep, stoppable through a `watch` channel
//! - **[`RetryPolicy`]**: bounded retries for the startup handshake
//! - **[`MetricsServer`]**: Prometheus recorder and text exposition
//!
//! ## Example
//!
//! ```ignore
//! use admission_runtime::{ActivationScheduler, SchedulerConfig};
//!
//! let (scheduler, shutdown) = ActivationScheduler::new(queue, SchedulerConfig::default())?;
//! let handle = scheduler.spawn();
//!
//! // ... serve requests ...
//!
//! shutdown.send(true).ok();
//! handle.await?;
//! ```

/// Prometheus metrics for observability
pub mod metrics;

/// Retry policy for the startup handshake
pub mod retry;

/// Periodic activation sweep
pub mod scheduler;

pub use metrics::{MetricsError, MetricsServer};
pub use retry::{RetryPolicy, retry_with_predicate};
pub use scheduler::{ActivationScheduler, SchedulerConfig};
