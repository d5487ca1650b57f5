use async_trait::async_trait;
use chrono::NaiveDate;
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::{
    EscrowAnalysisModel, EscrowDisbursementModel, EscrowForecastModel, EscrowItemModel,
};

#[async_trait]
pub trait EscrowRepository: Send + Sync {
    async fn active_items(&self, loan_id: Uuid) -> ServicingResult<Vec<EscrowItemModel>>;

    async fn upsert_item(&self, item: EscrowItemModel) -> ServicingResult<()>;

    /// Replace the loan's forecast horizon: delete-then-insert within one
    /// transaction, idempotent on (loan, escrow_id, due_date).
    async fn replace_forecast(
        &self,
        loan_id: Uuid,
        rows: Vec<EscrowForecastModel>,
    ) -> ServicingResult<()>;

    async fn forecast_between(
        &self,
        loan_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServicingResult<Vec<EscrowForecastModel>>;

    async fn create_disbursement(
        &self,
        disbursement: EscrowDisbursementModel,
    ) -> ServicingResult<()>;

    /// The non-canceled disbursement for (loan, escrow_id, due_date), if
    /// any. Uniqueness is predicate-enforced.
    async fn find_non_canceled(
        &self,
        loan_id: Uuid,
        escrow_id: Uuid,
        due_date: NaiveDate,
    ) -> ServicingResult<Option<EscrowDisbursementModel>>;

    async fn find_disbursement(
        &self,
        disbursement_id: Uuid,
    ) -> ServicingResult<Option<EscrowDisbursementModel>>;

    async fn scheduled_due(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<Vec<EscrowDisbursementModel>>;

    /// scheduled → posted, recording the ledger event. Fails unless the
    /// row is currently scheduled.
    async fn mark_posted(&self, disbursement_id: Uuid, event_id: Uuid) -> ServicingResult<()>;

    /// scheduled → canceled. Fails unless the row is currently scheduled.
    async fn mark_canceled(&self, disbursement_id: Uuid) -> ServicingResult<()>;

    /// Insert with version = previous max + 1 for the loan.
    async fn insert_analysis(&self, analysis: EscrowAnalysisModel) -> ServicingResult<()>;

    async fn latest_analysis(&self, loan_id: Uuid)
        -> ServicingResult<Option<EscrowAnalysisModel>>;

    async fn max_analysis_version(&self, loan_id: Uuid) -> ServicingResult<i32>;
}
