use async_trait::async_trait;
use servicing_api::domain::AchBatchStatus;
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::{AchBatchModel, AchEntryModel, AchReturnModel};

#[async_trait]
pub trait AchRepository: Send + Sync {
    async fn create_batch(&self, batch: AchBatchModel) -> ServicingResult<()>;

    async fn find_batch(&self, batch_id: Uuid) -> ServicingResult<Option<AchBatchModel>>;

    async fn update_batch_status(
        &self,
        batch_id: Uuid,
        status: AchBatchStatus,
    ) -> ServicingResult<()>;

    /// Freeze totals + trace assignments at seal time.
    async fn seal_batch(
        &self,
        batch: AchBatchModel,
        entries: Vec<AchEntryModel>,
    ) -> ServicingResult<()>;

    async fn add_entry(&self, entry: AchEntryModel) -> ServicingResult<()>;

    async fn entries_for_batch(&self, batch_id: Uuid) -> ServicingResult<Vec<AchEntryModel>>;

    async fn find_entry_by_trace(
        &self,
        trace_number: &str,
    ) -> ServicingResult<Option<AchEntryModel>>;

    /// Insert a return; UNIQUE per entry surfaces duplicates.
    async fn insert_return(&self, ach_return: AchReturnModel) -> ServicingResult<()>;

    async fn find_return_for_entry(
        &self,
        entry_id: Uuid,
    ) -> ServicingResult<Option<AchReturnModel>>;
}
