use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use servicing_api::domain::{AchBatchStatus, AchTransactionCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchBatchModel {
    pub batch_id: Uuid,
    pub status: AchBatchStatus,
    pub company_entry_description: String,
    pub effective_entry_date: NaiveDate,
    pub entry_count: i32,
    pub debit_total_minor: i64,
    pub credit_total_minor: i64,
    pub entry_hash: i64,
    pub sealed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchEntryModel {
    pub entry_id: Uuid,
    pub batch_id: Uuid,
    pub loan_id: Option<Uuid>,
    pub txn_code: AchTransactionCode,
    pub rdfi_routing: String,
    pub account_number_masked: String,
    pub amount_minor: i64,
    pub individual_name: String,
    pub trace_number: Option<String>,
}

/// Unique on entry_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchReturnModel {
    pub return_id: Uuid,
    pub entry_id: Uuid,
    pub return_code: String,
    pub return_date: NaiveDate,
    pub addenda: Option<String>,
    pub received_at: DateTime<Utc>,
}
