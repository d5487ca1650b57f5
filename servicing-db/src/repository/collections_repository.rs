use async_trait::async_trait;
use chrono::NaiveDate;
use servicing_api::domain::{ForeclosureMilestone, PlanStatus};
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::{
    DelinquencySnapshotModel, ForeclosureCaseModel, ForeclosureEventModel, LateFeeAssessmentModel,
    PaymentPlanModel, PlanInstallmentModel,
};

#[async_trait]
pub trait CollectionsRepository: Send + Sync {
    // ============================================================================
    // DELINQUENCY SNAPSHOTS
    // ============================================================================

    async fn upsert_snapshot(&self, snapshot: DelinquencySnapshotModel) -> ServicingResult<()>;

    async fn find_snapshot(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>>;

    /// Most recent snapshot strictly before `as_of_date`.
    async fn latest_snapshot_before(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>>;

    async fn latest_snapshot(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>>;

    // ============================================================================
    // LATE FEES
    // ============================================================================

    async fn create_late_fee(&self, fee: LateFeeAssessmentModel) -> ServicingResult<()>;

    async fn find_late_fee(
        &self,
        loan_id: Uuid,
        period_due_date: NaiveDate,
    ) -> ServicingResult<Option<LateFeeAssessmentModel>>;

    /// Total assessed fees for the loan through a date.
    async fn fees_assessed_through(&self, loan_id: Uuid, as_of: NaiveDate)
        -> ServicingResult<i64>;

    // ============================================================================
    // PAYMENT PLANS
    // ============================================================================

    async fn create_plan(
        &self,
        plan: PaymentPlanModel,
        installments: Vec<PlanInstallmentModel>,
    ) -> ServicingResult<()>;

    async fn find_plan(&self, plan_id: Uuid) -> ServicingResult<Option<PaymentPlanModel>>;

    async fn plan_installments(&self, plan_id: Uuid)
        -> ServicingResult<Vec<PlanInstallmentModel>>;

    async fn active_plan_for_loan(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<PaymentPlanModel>>;

    async fn update_plan_status(&self, plan_id: Uuid, status: PlanStatus) -> ServicingResult<()>;

    async fn update_installment(&self, installment: PlanInstallmentModel) -> ServicingResult<()>;

    async fn plans_by_status(&self, status: PlanStatus)
        -> ServicingResult<Vec<PaymentPlanModel>>;

    // ============================================================================
    // FORECLOSURE
    // ============================================================================

    async fn create_case(&self, case: ForeclosureCaseModel) -> ServicingResult<()>;

    async fn find_case(&self, case_id: Uuid) -> ServicingResult<Option<ForeclosureCaseModel>>;

    async fn open_case_for_loan(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<ForeclosureCaseModel>>;

    /// Append a milestone; the UNIQUE (case_id, milestone) constraint
    /// surfaces duplicates.
    async fn insert_milestone(&self, event: ForeclosureEventModel) -> ServicingResult<()>;

    async fn milestones_for_case(
        &self,
        case_id: Uuid,
    ) -> ServicingResult<Vec<ForeclosureEventModel>>;

    async fn has_milestone(
        &self,
        case_id: Uuid,
        milestone: ForeclosureMilestone,
    ) -> ServicingResult<bool>;

    async fn close_case(&self, case_id: Uuid) -> ServicingResult<()>;
}
