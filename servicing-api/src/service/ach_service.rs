use async_trait::async_trait;
use chrono::NaiveDate;
use heapless::String as HeaplessString;
use uuid::Uuid;

use crate::domain::ach::{AchBatch, AchEntry, AchReturn, AchTransactionCode};
use crate::domain::money::Minor;
use crate::ServicingResult;

#[derive(Debug, Clone)]
pub struct NewAchEntry {
    pub loan_id: Option<Uuid>,
    pub txn_code: AchTransactionCode,
    pub rdfi_routing: HeaplessString<9>,
    pub account_number_masked: HeaplessString<17>,
    pub amount_minor: Minor,
    pub individual_name: HeaplessString<22>,
}

/// NACHA batch assembly and return handling.
#[async_trait]
pub trait AchService: Send + Sync {
    async fn create_batch(
        &self,
        company_entry_description: &str,
        effective_entry_date: NaiveDate,
    ) -> ServicingResult<AchBatch>;

    /// Entries may only be added while the batch is open.
    async fn add_entry(&self, batch_id: Uuid, entry: NewAchEntry) -> ServicingResult<AchEntry>;

    /// Seal: assign trace numbers and freeze totals.
    async fn seal_batch(&self, batch_id: Uuid) -> ServicingResult<AchBatch>;

    /// Render the sealed batch as a NACHA file (94-byte lines, block
    /// factor 10) and mark the batch filed.
    async fn generate_file(&self, batch_id: Uuid) -> ServicingResult<String>;

    async fn mark_settled(&self, batch_id: Uuid) -> ServicingResult<AchBatch>;

    async fn mark_failed(&self, batch_id: Uuid) -> ServicingResult<AchBatch>;

    /// Record a return by trace number, idempotent per entry. Retryable
    /// codes schedule a payment retry; others open a recon exception;
    /// loan-scoped entries emit a reversal request.
    async fn process_return(
        &self,
        trace_number: &str,
        return_code: &str,
        return_date: NaiveDate,
        addenda: Option<String>,
    ) -> ServicingResult<AchReturn>;

    async fn find_batch(&self, batch_id: Uuid) -> ServicingResult<Option<AchBatch>>;

    async fn batch_entries(&self, batch_id: Uuid) -> ServicingResult<Vec<AchEntry>>;
}
