use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use servicing_api::domain::{PaymentMethod, PaymentSource, PaymentType};

/// Database model for raw payment intakes. Read-only after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntakeModel {
    pub payment_id: Uuid,
    pub loan_id: Uuid,
    pub method: PaymentMethod,
    pub amount_minor: i64,
    pub currency: String,
    pub received_at: DateTime<Utc>,
    pub gateway_txn_id: String,
    pub source: PaymentSource,
    pub idempotency_key: String,
    pub effective_date: NaiveDate,
    pub raw_payload: serde_json::Value,
    pub payload_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentValidationModel {
    pub payment_id: Uuid,
    pub is_valid: bool,
    pub reason: Option<String>,
    pub retry_after_secs: Option<i64>,
    pub payment_type: Option<PaymentType>,
    pub scheduled_total_minor: Option<i64>,
    pub effective_date: NaiveDate,
    pub validated_at: DateTime<Utc>,
}

/// Database model for posting results. The flat applied_* columns are
/// the waterfall split collapsed by GL target; `applied_json` keeps the
/// full bucket-level breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPostingModel {
    pub payment_id: Uuid,
    pub event_id: Uuid,
    pub applied_fees_minor: i64,
    pub applied_interest_minor: i64,
    pub applied_principal_minor: i64,
    pub applied_escrow_minor: i64,
    pub applied_suspense_minor: i64,
    pub applied_json: serde_json::Value,
    pub new_balances_json: serde_json::Value,
    pub posted_at: DateTime<Utc>,
}

/// Cumulative applied amounts for a loan through a date, summed over
/// postings. Drives delinquency arithmetic.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AppliedTotalsRow {
    pub fees_minor: i64,
    pub interest_minor: i64,
    pub principal_minor: i64,
    pub escrow_minor: i64,
}

impl AppliedTotalsRow {
    pub fn total_minor(&self) -> i64 {
        self.fees_minor + self.interest_minor + self.principal_minor + self.escrow_minor
    }
}

/// Transactional outbox row. Publishing happens only from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessageModel {
    pub outbox_id: Uuid,
    pub event_id: Uuid,
    pub exchange: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub parked: bool,
}
