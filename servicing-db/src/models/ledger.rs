use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use servicing_api::domain::{EventSchema, GlAccount};

/// Database model for ledger events. Rows are append-only; `finalized_at`
/// is set by the finalize procedure inside the posting transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEventModel {
    pub event_id: Uuid,
    pub loan_id: Uuid,
    pub effective_date: NaiveDate,
    pub schema: EventSchema,
    pub correlation_id: String,
    pub currency: String,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Database model for entry lines. Exactly one of debit/credit is
/// positive; enforced in application code and by a table CHECK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryModel {
    pub entry_id: Uuid,
    pub event_id: Uuid,
    pub account: GlAccount,
    pub debit_minor: i64,
    pub credit_minor: i64,
    pub currency: String,
    pub memo: Option<String>,
}

/// Aggregated (account, Σdebit, Σcredit) row over finalized entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSumRow {
    pub account: GlAccount,
    pub debit_minor: i64,
    pub credit_minor: i64,
}

/// Projection used by reconciliation candidate scoring: one finalized
/// event touching the cash account inside the scoring window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashEventRow {
    pub event_id: Uuid,
    pub loan_id: Uuid,
    pub effective_date: NaiveDate,
    pub correlation_id: String,
    /// Net cash movement of the event: Σ(debit − credit) on cash.
    pub cash_net_minor: i64,
    /// Concatenated entry memos, for bank-reference matching.
    pub memo_blob: String,
}
