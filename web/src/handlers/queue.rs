//! Queue endpoints.
//!
//! - `POST /queue/join` - join (or re-join) the waiting list
//! - `GET /queue/position/:user_address` - place in line and eligibility
//! - `GET /queue/can-purchase/:user_address` - eligibility only
//! - `POST /queue/complete/:user_address` - release the slot after a purchase
//! - `POST /queue/leave` - give up a place in line
//! - `GET /queue/stats` - occupancy
//!
//! Addresses are normalized (trimmed, lower-cased) before use, and responses
//! echo the normalized form.

use crate::error::AppError;
use crate::state::AppState;
use admission_core::{
    ClientId, CompleteStatus, JoinOutcome, LeaveStatus, PriorityWeight, QueueStats,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body of `POST /queue/join`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoinRequest {
    /// Wallet address of the buyer
    pub user_address: String,
    /// Loyalty points backing this join (the priority weight)
    pub points_amount: i64,
    /// Charge the configured ledger before joining
    #[serde(default)]
    pub redeem_points: bool,
}

/// Response of `POST /queue/join`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoinResponse {
    /// Always `true`; failures use the error body
    pub success: bool,
    /// Normalized address
    pub user_address: String,
    /// 1-indexed position in line
    pub queue_position: u64,
    /// Priority weight the join was recorded with
    pub points_redeemed: u64,
    /// Whether the buyer may purchase right now
    pub can_purchase: bool,
}

impl From<JoinOutcome> for JoinResponse {
    fn from(outcome: JoinOutcome) -> Self {
        Self {
            success: true,
            user_address: outcome.client_id.to_string(),
            queue_position: outcome.queue_position,
            points_redeemed: outcome.priority_weight.units(),
            can_purchase: outcome.is_active,
        }
    }
}

/// Response of `GET /queue/position/:user_address`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PositionResponse {
    /// Normalized address
    pub user_address: String,
    /// 1-indexed position in line, 0 if not waiting
    pub queue_position: u64,
    /// Whether the buyer may purchase right now
    pub can_purchase: bool,
}

/// Response of `GET /queue/can-purchase/:user_address`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CanPurchaseResponse {
    /// Normalized address
    pub user_address: String,
    /// Whether the buyer may purchase right now
    pub can_purchase: bool,
}

/// Response of `POST /queue/complete/:user_address`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompleteResponse {
    /// Always `completed`
    pub status: CompleteStatus,
    /// Normalized address
    pub user_address: String,
}

/// Body of `POST /queue/leave`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeaveRequest {
    /// Wallet address of the buyer
    pub user_address: String,
}

/// Response of `POST /queue/leave`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeaveResponse {
    /// `removed`, or `error` if the store could not be reached
    pub status: LeaveStatus,
    /// Normalized address
    pub user_address: String,
    /// Whether the buyer was waiting before the call
    pub was_in_queue: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Join the queue.
///
/// ```bash
/// curl -X POST http://localhost:8080/queue/join \
///   -H 'content-type: application/json' \
///   -d '{"user_address": "0xAbc", "points_amount": 10}'
/// ```
///
/// # Errors
///
/// - 422 for an empty address
/// - 422 for negative points or points above
///   [`MAX_PRIORITY_WEIGHT`](admission_core::MAX_PRIORITY_WEIGHT)
/// - 409 if the ledger refuses the redemption
/// - 503 if the store or ledger is unreachable
pub async fn join_queue(
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    let client_id = ClientId::parse(&request.user_address)?;
    let weight = PriorityWeight::try_from_i64(request.points_amount)?;

    let outcome = if request.redeem_points {
        state
            .queue
            .redeem_and_join(&client_id, weight.units(), state.ledger.as_ref())
            .await?
    } else {
        state.queue.join(&client_id, weight).await?
    };

    Ok(Json(outcome.into()))
}

/// Place in line.
///
/// # Errors
///
/// 422 for an empty address, 503 if the store is unreachable.
pub async fn get_position(
    State(state): State<AppState>,
    Path(user_address): Path<String>,
) -> Result<Json<PositionResponse>, AppError> {
    let client_id = ClientId::parse(&user_address)?;
    let report = state.queue.position_report(&client_id).await?;

    Ok(Json(PositionResponse {
        user_address: report.client_id.to_string(),
        queue_position: report.queue_position,
        can_purchase: report.can_purchase,
    }))
}

/// Purchase eligibility.
///
/// # Errors
///
/// 422 for an empty address, 503 if the store is unreachable.
pub async fn can_purchase(
    State(state): State<AppState>,
    Path(user_address): Path<String>,
) -> Result<Json<CanPurchaseResponse>, AppError> {
    let client_id = ClientId::parse(&user_address)?;
    let can_purchase = state.queue.can_purchase(&client_id).await?;

    Ok(Json(CanPurchaseResponse {
        user_address: client_id.to_string(),
        can_purchase,
    }))
}

/// Release the buyer's slot after a purchase.
///
/// # Errors
///
/// 422 for an empty address, 503 if the store is unreachable.
pub async fn complete_purchase(
    State(state): State<AppState>,
    Path(user_address): Path<String>,
) -> Result<Json<CompleteResponse>, AppError> {
    let client_id = ClientId::parse(&user_address)?;
    let outcome = state.queue.complete(&client_id).await?;

    Ok(Json(CompleteResponse {
        status: outcome.status,
        user_address: outcome.client_id.to_string(),
    }))
}

/// Leave the queue.
///
/// Store failures are reported in the body with `status: "error"`, not as
/// an HTTP error.
///
/// # Errors
///
/// 422 for an empty address.
pub async fn leave_queue(
    State(state): State<AppState>,
    Json(request): Json<LeaveRequest>,
) -> Result<Json<LeaveResponse>, AppError> {
    let client_id = ClientId::parse(&request.user_address)?;
    let outcome = state.queue.leave(&client_id).await;

    Ok(Json(LeaveResponse {
        status: outcome.status,
        user_address: outcome.client_id.to_string(),
        was_in_queue: outcome.was_in_queue,
    }))
}

/// Queue occupancy.
///
/// # Errors
///
/// 503 if the store is unreachable.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<QueueStats>, AppError> {
    Ok(Json(state.queue.stats().await?))
}
