use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use servicing_api::domain::{DisbursementStatus, EscrowFrequency, EscrowItemType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowItemModel {
    pub escrow_id: Uuid,
    pub loan_id: Uuid,
    pub item_type: EscrowItemType,
    pub payee: String,
    pub amount_minor: i64,
    pub frequency: EscrowFrequency,
    pub next_due_date: NaiveDate,
    pub active: bool,
}

/// Forecast occurrence; unique on (loan_id, escrow_id, due_date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowForecastModel {
    pub loan_id: Uuid,
    pub escrow_id: Uuid,
    pub due_date: NaiveDate,
    pub amount_minor: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowDisbursementModel {
    pub disbursement_id: Uuid,
    pub loan_id: Uuid,
    pub escrow_id: Uuid,
    pub due_date: NaiveDate,
    pub amount_minor: i64,
    pub status: DisbursementStatus,
    pub event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowAnalysisModel {
    pub analysis_id: Uuid,
    pub loan_id: Uuid,
    pub as_of: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub annual_expected_minor: i64,
    pub cushion_target_minor: i64,
    pub current_balance_minor: i64,
    pub lowest_projected_minor: i64,
    pub shortage_minor: i64,
    pub deficiency_minor: i64,
    pub surplus_minor: i64,
    pub new_monthly_target_minor: i64,
    pub deficiency_recovery_monthly_minor: i64,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}
