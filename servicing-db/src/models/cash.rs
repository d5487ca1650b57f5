use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use servicing_api::domain::{BankTxnType, ReconExceptionStatus, StatementFormat};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountModel {
    pub bank_account_id: Uuid,
    pub bank_name: String,
    pub routing_number: String,
    pub account_number_masked: String,
    pub currency: String,
    pub active: bool,
}

/// Unique on (bank_account_id, as_of_date, content_hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankStatementFileModel {
    pub file_id: Uuid,
    pub bank_account_id: Uuid,
    pub as_of_date: NaiveDate,
    pub format: StatementFormat,
    pub content_hash: String,
    pub txn_count: i32,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTxnModel {
    pub bank_txn_id: Uuid,
    pub bank_account_id: Uuid,
    pub file_id: Uuid,
    pub posted_date: NaiveDate,
    pub amount_minor: i64,
    pub txn_type: BankTxnType,
    pub bank_ref: String,
    pub description: String,
    pub matched: bool,
    pub matched_event_id: Option<Uuid>,
}

/// Top-3 scored candidates per bank txn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidateModel {
    pub bank_txn_id: Uuid,
    pub event_id: Uuid,
    pub score: i32,
    pub reason: String,
}

/// Keyed by bank_txn_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconExceptionModel {
    pub bank_txn_id: Uuid,
    pub variance_minor: i64,
    pub status: ReconExceptionStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
