use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use servicing_api::domain::{CollectionCaseStatus, LoanStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanModel {
    pub loan_id: Uuid,
    pub product_code: String,
    pub status: LoanStatus,
    pub collection_case_status: CollectionCaseStatus,
    pub origination_date: NaiveDate,
    pub original_principal_minor: i64,
    pub annual_rate_bps: i32,
    pub term_months: i32,
    pub jurisdiction: String,
    pub late_fee_grace_days: i16,
    pub created_at: DateTime<Utc>,
}

/// Processing audit record written by stage consumers; `payload_hash` is
/// a blake3 digest of the handled payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecordModel {
    pub audit_id: Uuid,
    pub entity_id: Uuid,
    pub stage: String,
    pub outcome: String,
    pub payload_hash: String,
    pub recorded_at: DateTime<Utc>,
}
