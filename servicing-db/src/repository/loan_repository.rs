use async_trait::async_trait;
use servicing_api::domain::{CollectionCaseStatus, LoanStatus};
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::{AuditRecordModel, LoanModel};

#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn create(&self, loan: LoanModel) -> ServicingResult<()>;

    async fn find_by_id(&self, loan_id: Uuid) -> ServicingResult<Option<LoanModel>>;

    async fn update_status(&self, loan_id: Uuid, status: LoanStatus) -> ServicingResult<()>;

    async fn update_collection_case_status(
        &self,
        loan_id: Uuid,
        status: CollectionCaseStatus,
    ) -> ServicingResult<()>;

    /// Loans the daily cycle fans out over (non-terminal statuses).
    async fn list_serviceable(&self) -> ServicingResult<Vec<LoanModel>>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, record: AuditRecordModel) -> ServicingResult<()>;

    async fn for_entity(&self, entity_id: Uuid) -> ServicingResult<Vec<AuditRecordModel>>;
}
