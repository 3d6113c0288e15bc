//! Application lifecycle management and graceful shutdown.
//!
//! 1. **Startup**: prepare the Redis store, install metrics, spawn the
//!    scheduler. Redis is connected lazily, so an unreachable Redis does not
//!    stop the process; the scheduler's startup retries absorb it
//! 2. **Runtime**: serve HTTP
//! 3. **Shutdown**: stop accepting connections, stop the scheduler, wait for
//!    it within the configured timeout
//!
//! # Example
//!
//! ```rust,ignore
//! let app = Application::build(Config::from_env()).await?;
//! app.run().await?;
//! ```

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;
use admission_core::{AdmissionQueue, SystemClock, TrustedLedger};
use admission_redis::RedisOrderedStore;
use admission_runtime::{ActivationScheduler, MetricsServer};
use anyhow::Context;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Running application with its background scheduler.
pub struct Application {
    /// TCP listener for HTTP server
    listener: TcpListener,
    /// Axum router with all HTTP routes
    router: axum::Router,
    /// Activation scheduler, spawned by `run`
    scheduler: ActivationScheduler,
    /// Stops the scheduler
    scheduler_shutdown: watch::Sender<bool>,
    /// How long to wait for the scheduler after the server stops
    shutdown_timeout: Duration,
}

impl Application {
    /// Wire the production application from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is malformed, the queue or scheduler
    /// configuration is invalid, the metrics recorder cannot be installed, or
    /// the listener cannot bind. Redis being down is not an error here.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let store = RedisOrderedStore::new(&config.redis.url)
            .with_context(|| format!("configuring Redis at {}", config.redis.url))?;

        let mut metrics = MetricsServer::new();
        metrics.start().context("installing Prometheus recorder")?;

        let queue = Arc::new(
            AdmissionQueue::new(Arc::new(store), Arc::new(SystemClock), config.queue())
                .context("building admission queue")?,
        );

        let mut state = AppState::new(Arc::clone(&queue), Arc::new(TrustedLedger));
        if let Some(handle) = metrics.handle() {
            state = state.with_metrics(handle.clone());
        }

        let listener = TcpListener::bind(config.server_addr())
            .await
            .with_context(|| format!("binding {}", config.server_addr()))?;

        info!(
            max_active = config.queue.max_active_buyers,
            queue_key = %config.queue.queue_key,
            active_key = %config.queue.active_key,
            "Admission queue configured"
        );

        Self::new(listener, build_router(state), queue, &config)
    }

    /// Assemble an application from parts.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler timing is invalid.
    pub fn new(
        listener: TcpListener,
        router: axum::Router,
        queue: Arc<AdmissionQueue>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let (scheduler, scheduler_shutdown) = ActivationScheduler::new(queue, config.scheduler())
            .context("building activation scheduler")?;
        Ok(Self {
            listener,
            router,
            scheduler,
            scheduler_shutdown,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` resolves, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails.
    pub async fn run_until(
        self,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        if let Ok(addr) = self.listener.local_addr() {
            info!(address = %addr, "Starting HTTP server");
        }

        let scheduler_handle = self.scheduler.spawn();

        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await;

        info!("HTTP server stopped, initiating graceful shutdown...");

        // The scheduler may already be gone; nothing to signal then.
        let _ = self.scheduler_shutdown.send(true);

        match tokio::time::timeout(self.shutdown_timeout, scheduler_handle).await {
            Ok(Ok(())) => info!("Activation scheduler stopped gracefully"),
            Ok(Err(e)) => warn!(error = %e, "Activation scheduler task failed"),
            Err(_) => warn!("Activation scheduler shutdown timed out"),
        }

        served.context("HTTP server failed")?;
        info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
