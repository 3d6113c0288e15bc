//! Background activation sweep.
//!
//! Joins and completions already try to fill free slots themselves, but
//! those attempts are best effort. The scheduler repeats the activation pass
//! on a fixed interval so admission always makes progress: after a failed
//! backfill, after a crash between a join's upsert and its activation, or
//! after a restart.
//!
//! One pass is in flight at a time from the scheduler. Passes triggered by
//! requests may overlap with it; activation is idempotent and bounded at the
//! store, so no coordination is needed.

use crate::retry::{RetryPolicy, retry_with_predicate};
use admission_core::telemetry::QueueMetrics;
use admission_core::{AdmissionError, AdmissionQueue, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Default interval between steady-state passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default number of startup attempts.
pub const DEFAULT_STARTUP_RETRIES: usize = 5;
/// Default delay between startup attempts.
pub const DEFAULT_STARTUP_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Scheduler timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between steady-state activation passes
    pub poll_interval: Duration,
    /// Activation attempts during the startup handshake
    pub startup_retries: usize,
    /// Fixed delay between startup attempts
    pub startup_retry_delay: Duration,
}

impl SchedulerConfig {
    /// Reject timings the scheduler cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidConfig`] for a zero poll interval or
    /// zero startup attempts.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(AdmissionError::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.startup_retries == 0 {
            return Err(AdmissionError::InvalidConfig(
                "startup_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_retries: DEFAULT_STARTUP_RETRIES,
            startup_retry_delay: DEFAULT_STARTUP_RETRY_DELAY,
        }
    }
}

/// Periodic caller of [`AdmissionQueue::activate`].
///
/// # Lifecycle
///
/// 1. **Startup handshake**: up to `startup_retries` attempts,
///    `startup_retry_delay` apart, to ride out a store that is still
///    starting. If every attempt fails the scheduler logs and moves on.
/// 2. **Steady state**: one pass every `poll_interval`, forever. A failed
///    pass is logged and the loop continues.
///
/// Sending `true` on the shutdown sender stops it in either phase. Dropping
/// the sender stops it as well.
///
/// # Example
///
/// ```ignore
/// let (scheduler, shutdown) = ActivationScheduler::new(queue, SchedulerConfig::default())?;
/// let handle = scheduler.spawn();
///
/// // On SIGTERM:
/// shutdown.send(true).ok();
/// handle.await?;
/// ```
pub struct ActivationScheduler {
    queue: Arc<AdmissionQueue>,
    config: SchedulerConfig,
    shutdown: watch::Receiver<bool>,
}

impl ActivationScheduler {
    /// Create a scheduler and the sender that stops it.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidConfig`] if `config` fails
    /// [`SchedulerConfig::validate`].
    pub fn new(
        queue: Arc<AdmissionQueue>,
        config: SchedulerConfig,
    ) -> Result<(Self, watch::Sender<bool>)> {
        config.validate()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Self {
            queue,
            config,
            shutdown: shutdown_rx,
        };
        Ok((scheduler, shutdown_tx))
    }

    /// Scheduler timing.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run on a background task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until shutdown is signalled.
    pub async fn run(self) {
        let mut shutdown = self.shutdown.clone();
        info!(
            poll_interval_ms = millis(self.config.poll_interval),
            startup_retries = self.config.startup_retries,
            "Activation scheduler starting"
        );

        let completed = tokio::select! {
            () = self.startup_handshake() => true,
            () = stop_requested(&mut shutdown) => false,
        };

        if completed {
            let mut ticker = interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; the handshake just ran a pass.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Failures are logged inside; the loop never exits on them.
                        let _ = self.tick().await;
                    }
                    () = stop_requested(&mut shutdown) => break,
                }
            }
        }

        info!("Activation scheduler stopped");
    }

    /// Run a single activation pass.
    ///
    /// Records the outcome and logs admissions, then returns the result so
    /// operators and tests can inspect it.
    ///
    /// # Errors
    ///
    /// Returns the [`AdmissionError`] from the failed pass.
    pub async fn tick(&self) -> Result<usize> {
        match self.queue.activate().await {
            Ok(admitted) => {
                QueueMetrics::record_scheduler_tick("ok");
                if admitted > 0 {
                    info!(admitted, "Scheduler admitted clients");
                } else {
                    debug!("Scheduler pass admitted nobody");
                }
                Ok(admitted)
            }
            Err(e) => {
                QueueMetrics::record_scheduler_tick("error");
                error!(error = %e, "Scheduler activation pass failed");
                Err(e)
            }
        }
    }

    async fn startup_handshake(&self) {
        let policy = RetryPolicy::fixed(self.config.startup_retries, self.config.startup_retry_delay);
        let attempts = policy.attempts();

        let result = retry_with_predicate(
            policy,
            || self.queue.activate(),
            AdmissionError::is_retryable,
        )
        .await;

        match result {
            Ok(admitted) => {
                QueueMetrics::record_scheduler_tick("ok");
                info!(admitted, "Startup activation succeeded");
            }
            Err(e) => {
                QueueMetrics::record_scheduler_tick("error");
                error!(
                    attempts,
                    error = %e,
                    "Startup activation failed, continuing with periodic sweep"
                );
            }
        }
    }
}

/// Resolves once `true` is sent or the sender is dropped.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_ok() {
        info!("Shutdown signal received");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

    use super::*;
    use admission_core::queue::DEFAULT_WAITING_KEY;
    use admission_core::{ClientId, OrderedStore, QueueConfig};
    use admission_testing::{FlakyStore, ManualClock};

    fn queue_over(store: &FlakyStore) -> Arc<AdmissionQueue> {
        Arc::new(
            AdmissionQueue::new(
                Arc::new(store.clone()),
                Arc::new(ManualClock::ticking(chrono::Duration::seconds(1))),
                QueueConfig::with_max_active(2),
            )
            .unwrap(),
        )
    }

    fn scheduler_over(
        store: &FlakyStore,
    ) -> (ActivationScheduler, watch::Sender<bool>, Arc<AdmissionQueue>) {
        let queue = queue_over(store);
        let (scheduler, shutdown) =
            ActivationScheduler::new(Arc::clone(&queue), SchedulerConfig::default()).unwrap();
        (scheduler, shutdown, queue)
    }

    async fn enqueue_without_activation(store: &FlakyStore, member: &str, score: f64) {
        store
            .inner()
            .score_upsert(DEFAULT_WAITING_KEY, member, score)
            .await
            .unwrap();
    }

    async fn is_active(queue: &AdmissionQueue, member: &str) -> bool {
        queue.can_purchase(&ClientId::parse(member).unwrap()).await.unwrap()
    }

    async fn sleep(secs: f64) {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_pass_admits_waiting_clients() {
        let store = FlakyStore::new();
        enqueue_without_activation(&store, "a", 2.0).await;
        enqueue_without_activation(&store, "b", 1.0).await;
        let (scheduler, shutdown, queue) = scheduler_over(&store);

        let handle = scheduler.spawn();
        sleep(0.1).await;

        assert!(is_active(&queue, "a").await);
        assert!(is_active(&queue, "b").await);

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_retries_until_store_comes_up() {
        let store = FlakyStore::new();
        enqueue_without_activation(&store, "a", 1.0).await;
        store.fail_next(2);
        let (scheduler, shutdown, queue) = scheduler_over(&store);

        let handle = scheduler.spawn();

        // Attempts at t=0 and t=2 fail, t=4 succeeds.
        sleep(3.0).await;
        assert!(!is_active(&queue, "a").await);
        sleep(1.5).await;
        assert!(is_active(&queue, "a").await);

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_handshake_falls_through_to_steady_loop() {
        let store = FlakyStore::new();
        store.set_down(true);
        let (scheduler, shutdown, queue) = scheduler_over(&store);

        let handle = scheduler.spawn();

        // Five attempts span t=0..8; the store stays down past that.
        sleep(9.0).await;
        assert!(!handle.is_finished());

        store.set_down(false);
        enqueue_without_activation(&store, "late", 1.0).await;
        sleep(5.5).await;
        assert!(is_active(&queue, "late").await);

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_loop_survives_failed_ticks() {
        let store = FlakyStore::new();
        let (scheduler, shutdown, queue) = scheduler_over(&store);
        let handle = scheduler.spawn();
        sleep(0.1).await;

        store.set_down(true);
        sleep(12.0).await;
        store.set_down(false);

        enqueue_without_activation(&store, "x", 1.0).await;
        sleep(5.0).await;
        assert!(is_active(&queue, "x").await);

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_handshake() {
        let store = FlakyStore::new();
        store.set_down(true);
        let (scheduler, shutdown, _queue) = scheduler_over(&store);
        let handle = scheduler.spawn();

        sleep(1.0).await;
        shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("scheduler should stop promptly")
            .unwrap();
        // Only the first attempt ran.
        assert!(store.calls() <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_scheduler() {
        let store = FlakyStore::new();
        let (scheduler, shutdown, _queue) = scheduler_over(&store);
        let handle = scheduler.spawn();

        sleep(0.1).await;
        drop(shutdown);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop once the sender is gone")
            .unwrap();
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let store = FlakyStore::new();
        let config = SchedulerConfig {
            poll_interval: Duration::ZERO,
            ..SchedulerConfig::default()
        };

        let result = ActivationScheduler::new(queue_over(&store), config);
        assert!(matches!(result, Err(AdmissionError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_startup_attempts_is_rejected() {
        let config = SchedulerConfig {
            startup_retries: 0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AdmissionError::InvalidConfig(_))
        ));
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_tick_reports_admissions_and_failures() {
        let store = FlakyStore::new();
        enqueue_without_activation(&store, "a", 1.0).await;
        let (scheduler, _shutdown, _queue) = scheduler_over(&store);

        assert_eq!(scheduler.tick().await.unwrap(), 1);
        assert_eq!(scheduler.tick().await.unwrap(), 0);

        store.set_down(true);
        assert!(scheduler.tick().await.unwrap_err().is_retryable());
    }
}
