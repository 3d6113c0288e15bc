//! Loyalty-point ledger seam.
//!
//! Settlement lives in an external contract layer. The queue only needs one
//! interaction with it: spend a client's points and learn how much priority
//! that bought.

use crate::error::LedgerError;
use crate::types::{ClientId, PriorityWeight};
use async_trait::async_trait;

/// External ledger that converts loyalty points into queue priority.
#[async_trait]
pub trait PointsLedger: Send + Sync {
    /// Redeem `points` held by `client_id` for queue priority.
    ///
    /// Returns the weight the redemption is worth.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientPoints`] if the balance is too low
    /// - [`LedgerError::Rejected`] if the ledger refuses for another reason
    /// - [`LedgerError::Unavailable`] if the ledger cannot be reached
    async fn redeem(&self, client_id: &ClientId, points: u64)
    -> Result<PriorityWeight, LedgerError>;
}

/// Ledger used when no contract layer is wired in.
///
/// Performs no settlement and grants one priority unit per point, trusting
/// the amount the caller claims to have redeemed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedLedger;

#[async_trait]
impl PointsLedger for TrustedLedger {
    async fn redeem(
        &self,
        client_id: &ClientId,
        points: u64,
    ) -> Result<PriorityWeight, LedgerError> {
        tracing::debug!(client_id = %client_id, points, "Trusted redemption (no settlement)");
        Ok(PriorityWeight::new(points))
    }
}
