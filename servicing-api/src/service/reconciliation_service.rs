use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::cash::{
    BankStatementFile, BankTxn, MatchCandidate, ReconException, StatementFormat,
};
use crate::ServicingResult;

/// Result of a matching pass over one bank transaction.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// Top candidate met the threshold; txn matched, exception resolved.
    AutoMatched { event_id: Uuid, score: i32 },
    /// Below threshold or no candidates; exception created or refreshed.
    Exception { variance_minor: i64 },
    /// Already matched; nothing to do.
    AlreadyMatched,
}

/// Statement ingest, candidate scoring, matching, and write-off.
#[async_trait]
pub trait ReconciliationService: Send + Sync {
    /// Parse and persist a statement file. Duplicate content (SHA-256 per
    /// account + as_of) dedupes silently by returning the existing file.
    async fn ingest_statement(
        &self,
        bank_account_id: Uuid,
        as_of_date: NaiveDate,
        format: StatementFormat,
        bytes: &[u8],
    ) -> ServicingResult<BankStatementFile>;

    /// Score ledger candidates for every unmatched txn of the file and
    /// auto-match those at or above the threshold.
    async fn match_statement(&self, file_id: Uuid) -> ServicingResult<Vec<MatchOutcome>>;

    /// Score and match a single bank transaction.
    async fn match_bank_txn(&self, bank_txn_id: Uuid) -> ServicingResult<MatchOutcome>;

    /// Operator-confirmed pairing; emits `cash.reconciled.v1`.
    async fn manual_match(&self, bank_txn_id: Uuid, event_id: Uuid) -> ServicingResult<()>;

    /// Post the compensating ledger event and close the exception as
    /// written off.
    async fn write_off(&self, bank_txn_id: Uuid, note: &str) -> ServicingResult<Uuid>;

    async fn candidates(&self, bank_txn_id: Uuid) -> ServicingResult<Vec<MatchCandidate>>;

    async fn open_exceptions(&self) -> ServicingResult<Vec<ReconException>>;

    async fn find_bank_txn(&self, bank_txn_id: Uuid) -> ServicingResult<Option<BankTxn>>;
}
