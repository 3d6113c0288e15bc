//! Admission queue server.
//!
//! Serves the queue API over HTTP, backed by Redis, with the activation
//! scheduler running in the background.
//!
//! # Usage
//!
//! ```bash
//! docker run -d -p 6379:6379 redis:7-alpine
//! cargo run --bin server
//! ```

use admission_web::{Application, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,admission=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        redis = %config.redis.url,
        address = %config.server_addr(),
        max_active = config.queue.max_active_buyers,
        "Configuration loaded"
    );

    let app = Application::build(config).await?;
    app.run().await
}
