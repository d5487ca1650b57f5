use async_trait::async_trait;
use chrono::NaiveDate;
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::{
    AppliedTotalsRow, PaymentIntakeModel, PaymentPostingModel, PaymentValidationModel,
};

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert an intake row; the UNIQUE idempotency key surfaces dupes as
    /// a constraint violation.
    async fn create_intake(&self, intake: PaymentIntakeModel) -> ServicingResult<()>;

    async fn find_intake(&self, payment_id: Uuid) -> ServicingResult<Option<PaymentIntakeModel>>;

    async fn find_intake_by_key(
        &self,
        idempotency_key: &str,
    ) -> ServicingResult<Option<PaymentIntakeModel>>;

    async fn upsert_validation(&self, validation: PaymentValidationModel) -> ServicingResult<()>;

    async fn find_validation(
        &self,
        payment_id: Uuid,
    ) -> ServicingResult<Option<PaymentValidationModel>>;

    async fn create_posting(&self, posting: PaymentPostingModel) -> ServicingResult<()>;

    async fn find_posting(&self, payment_id: Uuid)
        -> ServicingResult<Option<PaymentPostingModel>>;

    /// Cumulative applied splits for a loan's postings with effective
    /// date on or before `as_of`.
    async fn applied_through(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<AppliedTotalsRow>;
}
