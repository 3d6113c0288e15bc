//! HTTP surface for the admission queue.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Axum (this crate)          │  ← routes, JSON, status codes
//! ├─────────────────────────────────────────┤
//! │   AdmissionQueue          Scheduler     │  ← ordering and admission
//! ├─────────────────────────────────────────┤
//! │         OrderedStore (Redis)            │  ← all shared state
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Routes
//!
//! | method | path | handler |
//! |--------|------|---------|
//! | POST | `/queue/join` | [`handlers::queue::join_queue`] |
//! | GET | `/queue/position/:user_address` | [`handlers::queue::get_position`] |
//! | GET | `/queue/can-purchase/:user_address` | [`handlers::queue::can_purchase`] |
//! | POST | `/queue/complete/:user_address` | [`handlers::queue::complete_purchase`] |
//! | POST | `/queue/leave` | [`handlers::queue::leave_queue`] |
//! | GET | `/queue/stats` | [`handlers::queue::get_stats`] |
//! | GET | `/health` | [`handlers::health::health_check`] |
//! | GET | `/ready` | [`handlers::health::readiness_check`] |
//! | GET | `/metrics` | [`handlers::health::metrics`] |

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use config::Config;
pub use error::AppError;
pub use lifecycle::Application;
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
