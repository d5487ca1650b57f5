use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::schedule::{PaymentSchedule, ScheduleTerms};
use crate::ServicingResult;

/// Amortization plan generation and lookup. Exactly one plan per loan is
/// active; regeneration bumps the version and deactivates the prior plan.
#[async_trait]
pub trait ScheduleService: Send + Sync {
    /// Generate and activate a plan for the loan.
    async fn generate(&self, terms: ScheduleTerms) -> ServicingResult<PaymentSchedule>;

    /// Regenerate after modification; version increments, prior plan is
    /// deactivated in the same transaction.
    async fn regenerate(&self, terms: ScheduleTerms) -> ServicingResult<PaymentSchedule>;

    async fn active_schedule(&self, loan_id: Uuid) -> ServicingResult<Option<PaymentSchedule>>;
}
