use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::collections::{
    DelinquencySnapshot, ForeclosureCase, ForeclosureMilestone, LateFeeAssessment, PaymentPlan,
    PlanInstallment,
};
use crate::domain::money::Minor;
use crate::ServicingResult;

/// Daily delinquency, late fees, payment plans, and foreclosure
/// milestones.
#[async_trait]
pub trait CollectionsService: Send + Sync {
    // ============================================================================
    // DELINQUENCY
    // ============================================================================

    /// Compute and upsert the delinquency snapshot for (loan, as_of).
    /// Publishes a status-changed event when the bucket moves, and opens
    /// a foreclosure case on entry into dpd_90_plus.
    async fn compute_delinquency(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<DelinquencySnapshot>;

    async fn latest_snapshot(&self, loan_id: Uuid) -> ServicingResult<Option<DelinquencySnapshot>>;

    // ============================================================================
    // LATE FEES
    // ============================================================================

    /// Assess the late fee for one schedule period, once, respecting
    /// grace days and the fee policy base/cap. Returns None when no fee
    /// applies (inside grace, base fully paid, or already assessed).
    async fn assess_late_fee(
        &self,
        loan_id: Uuid,
        period_due_date: NaiveDate,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Option<LateFeeAssessment>>;

    // ============================================================================
    // PAYMENT PLANS
    // ============================================================================

    /// Create a draft plan. Rejected when the loan already has an active
    /// plan.
    async fn create_plan(
        &self,
        loan_id: Uuid,
        installments: Vec<PlanInstallment>,
    ) -> ServicingResult<PaymentPlan>;

    async fn activate_plan(&self, plan_id: Uuid) -> ServicingResult<PaymentPlan>;

    async fn cancel_plan(&self, plan_id: Uuid) -> ServicingResult<PaymentPlan>;

    /// Apply a payment across installments by ascending number; completes
    /// the plan when every installment is paid.
    async fn apply_plan_payment(
        &self,
        plan_id: Uuid,
        amount_minor: Minor,
        paid_on: NaiveDate,
    ) -> ServicingResult<PaymentPlan>;

    /// Daily sweep: default active plans with past-due unpaid
    /// installments.
    async fn sweep_defaulted_plans(&self, as_of_date: NaiveDate) -> ServicingResult<Vec<Uuid>>;

    // ============================================================================
    // FORECLOSURE
    // ============================================================================

    /// Open a case unless one is already open for the loan.
    async fn open_foreclosure_case(&self, loan_id: Uuid) -> ServicingResult<ForeclosureCase>;

    /// Append a milestone (unique per case). Terminal milestones close
    /// the case and update the collection-case status.
    async fn record_milestone(
        &self,
        case_id: Uuid,
        milestone: ForeclosureMilestone,
        occurred_on: NaiveDate,
    ) -> ServicingResult<ForeclosureCase>;

    async fn open_case_for_loan(&self, loan_id: Uuid) -> ServicingResult<Option<ForeclosureCase>>;
}
