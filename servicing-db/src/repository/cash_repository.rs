use async_trait::async_trait;
use chrono::NaiveDate;
use servicing_api::domain::ReconExceptionStatus;
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::{
    BankAccountModel, BankStatementFileModel, BankTxnModel, MatchCandidateModel,
    ReconExceptionModel,
};

#[async_trait]
pub trait CashRepository: Send + Sync {
    async fn find_bank_account(
        &self,
        bank_account_id: Uuid,
    ) -> ServicingResult<Option<BankAccountModel>>;

    async fn upsert_bank_account(&self, account: BankAccountModel) -> ServicingResult<()>;

    /// Statement file ingest: dedupe by SHA-256 content hash per
    /// account + as_of.
    async fn find_file_by_hash(
        &self,
        bank_account_id: Uuid,
        as_of_date: NaiveDate,
        content_hash: &str,
    ) -> ServicingResult<Option<BankStatementFileModel>>;

    async fn create_file(&self, file: BankStatementFileModel) -> ServicingResult<()>;

    async fn insert_txns(&self, txns: Vec<BankTxnModel>) -> ServicingResult<()>;

    async fn txns_for_file(&self, file_id: Uuid) -> ServicingResult<Vec<BankTxnModel>>;

    async fn find_txn(&self, bank_txn_id: Uuid) -> ServicingResult<Option<BankTxnModel>>;

    async fn mark_matched(&self, bank_txn_id: Uuid, event_id: Uuid) -> ServicingResult<()>;

    /// Replace the candidate set for a bank txn (top 3 retained).
    async fn replace_candidates(
        &self,
        bank_txn_id: Uuid,
        candidates: Vec<MatchCandidateModel>,
    ) -> ServicingResult<()>;

    async fn candidates_for(&self, bank_txn_id: Uuid)
        -> ServicingResult<Vec<MatchCandidateModel>>;

    async fn upsert_exception(&self, exception: ReconExceptionModel) -> ServicingResult<()>;

    async fn find_exception(
        &self,
        bank_txn_id: Uuid,
    ) -> ServicingResult<Option<ReconExceptionModel>>;

    async fn update_exception_status(
        &self,
        bank_txn_id: Uuid,
        status: ReconExceptionStatus,
        note: Option<String>,
    ) -> ServicingResult<()>;

    async fn exceptions_by_status(
        &self,
        status: ReconExceptionStatus,
    ) -> ServicingResult<Vec<ReconExceptionModel>>;
}
