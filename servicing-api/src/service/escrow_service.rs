use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::escrow::{EscrowAnalysis, EscrowDisbursement, EscrowForecastRow};
use crate::ServicingResult;

/// Forecast → schedule → disburse → annual analysis.
#[async_trait]
pub trait EscrowService: Send + Sync {
    /// Rebuild the 12-month forecast horizon for the loan from its active
    /// escrow items. Replaces the prior horizon in one transaction;
    /// idempotent on (loan, escrow_id, due_date).
    async fn refresh_forecast(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Vec<EscrowForecastRow>>;

    /// Schedule disbursements for forecast rows due within the next 30
    /// days. Safe to re-enter.
    async fn schedule_disbursements(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
    ) -> ServicingResult<Vec<EscrowDisbursement>>;

    /// Post every scheduled disbursement due on or before `as_of_date`,
    /// advancing servicer funds for any shortfall. Failures leave rows
    /// `scheduled` for the next cycle.
    async fn post_due_disbursements(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Vec<EscrowDisbursement>>;

    /// Cancel a scheduled disbursement; posted rows cannot be canceled.
    async fn cancel_disbursement(&self, disbursement_id: Uuid) -> ServicingResult<()>;

    /// RESPA-style annual analysis over [as_of, as_of + 12 months].
    async fn run_annual_analysis(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<EscrowAnalysis>;

    async fn latest_analysis(&self, loan_id: Uuid) -> ServicingResult<Option<EscrowAnalysis>>;
}
