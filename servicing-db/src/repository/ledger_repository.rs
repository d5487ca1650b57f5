use async_trait::async_trait;
use chrono::NaiveDate;
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::{AccountSumRow, CashEventRow, LedgerEntryModel, LedgerEventModel};

/// Append-only ledger persistence.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Insert event + entries and finalize in one transaction. The
    /// finalize step re-checks Σdebit = Σcredit ≠ 0 inside the same
    /// transaction; a duplicate correlation id or failed check rolls the
    /// whole event back.
    async fn create_event(
        &self,
        event: LedgerEventModel,
        entries: Vec<LedgerEntryModel>,
    ) -> ServicingResult<Uuid>;

    async fn find_by_id(&self, event_id: Uuid) -> ServicingResult<Option<LedgerEventModel>>;

    async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> ServicingResult<Option<LedgerEventModel>>;

    async fn entries_for_event(&self, event_id: Uuid) -> ServicingResult<Vec<LedgerEntryModel>>;

    /// Per-account (Σdebit, Σcredit) over finalized entries of one loan.
    async fn account_sums_for_loan(&self, loan_id: Uuid) -> ServicingResult<Vec<AccountSumRow>>;

    /// Per-account (Σdebit, Σcredit) over all finalized entries.
    async fn account_sums(&self) -> ServicingResult<Vec<AccountSumRow>>;

    /// Finalized events with net cash movement inside [from, to], for
    /// reconciliation candidate scoring.
    async fn cash_events_in_window(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServicingResult<Vec<CashEventRow>>;
}
