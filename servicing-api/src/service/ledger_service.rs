use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::ledger::{EntryLine, EventSchema, LedgerEvent, LoanBalances, TrialBalance};
use crate::domain::money::Minor;
use crate::ServicingResult;

/// Append-only double-entry ledger.
///
/// Every monetary mutation is a balanced event posted in a single
/// transaction. Balances are always derived by summing finalized
/// entries; nothing here exposes a mutable balance.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Post a balanced event.
    ///
    /// Fails with `DuplicateCorrelation` when the correlation id has
    /// already produced an event, `InvalidLine` for malformed lines, and
    /// `Unbalanced` when debits != credits or the event sums to zero.
    /// On any failure the transaction is rolled back with no partial
    /// entries.
    async fn post_event(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        schema: EventSchema,
        currency: [u8; 3],
        lines: Vec<EntryLine>,
    ) -> ServicingResult<Uuid>;

    /// Ledger-derived balances for one loan over finalized events only.
    async fn latest_balances(&self, loan_id: Uuid) -> ServicingResult<LoanBalances>;

    /// Aggregate over all finalized entries grouped by account.
    async fn trial_balance(&self) -> ServicingResult<TrialBalance>;

    async fn find_event(&self, event_id: Uuid) -> ServicingResult<Option<LedgerEvent>>;

    async fn find_event_by_correlation(
        &self,
        correlation_id: &str,
    ) -> ServicingResult<Option<LedgerEvent>>;

    // ============================================================================
    // POSTING HELPERS (thin, contract-preserving)
    // ============================================================================

    /// Debit cash, credit suspense. The poster books through this when a
    /// payment has nothing outstanding to absorb it and the whole amount
    /// lands in suspense.
    async fn post_payment_received(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        amount_minor: Minor,
    ) -> ServicingResult<Uuid>;

    /// Debit interest receivable, credit interest income.
    async fn post_interest_accrual(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        amount_minor: Minor,
    ) -> ServicingResult<Uuid>;

    /// Debit escrow liability, credit cash. Used for escrow money leaving
    /// the book outside the disbursement flow, e.g. surplus refunds.
    async fn post_escrow_payment(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        amount_minor: Minor,
        payee_memo: &str,
    ) -> ServicingResult<Uuid>;

    /// Debit loan principal, credit suspense (funding source).
    async fn post_loan_origination(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        principal_minor: Minor,
    ) -> ServicingResult<Uuid>;

    /// Debit write-off expense, credit loan principal.
    async fn post_charge_off(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
        correlation_id: &str,
        amount_minor: Minor,
    ) -> ServicingResult<Uuid>;

    /// Produce the sibling event with debits and credits swapped, schema
    /// `posting.reversal.v1`.
    async fn reverse_event(
        &self,
        event_id: Uuid,
        correlation_id: &str,
        effective_date: NaiveDate,
    ) -> ServicingResult<Uuid>;
}
