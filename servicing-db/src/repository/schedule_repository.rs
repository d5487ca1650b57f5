use async_trait::async_trait;
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::{PaymentScheduleModel, ScheduleRowModel};

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Insert a plan with its rows and deactivate any prior active plan
    /// for the loan, in one transaction.
    async fn insert_plan(
        &self,
        plan: PaymentScheduleModel,
        rows: Vec<ScheduleRowModel>,
    ) -> ServicingResult<()>;

    async fn find_active(&self, loan_id: Uuid) -> ServicingResult<Option<PaymentScheduleModel>>;

    async fn rows_for_schedule(&self, schedule_id: Uuid) -> ServicingResult<Vec<ScheduleRowModel>>;

    async fn max_version(&self, loan_id: Uuid) -> ServicingResult<i32>;
}
