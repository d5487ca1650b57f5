use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use servicing_api::domain::{DayCountConvention, RoundingMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentScheduleModel {
    pub schedule_id: Uuid,
    pub loan_id: Uuid,
    pub version: i32,
    pub active: bool,
    pub principal_minor: i64,
    pub annual_rate_bps: i32,
    pub term_months: i32,
    pub first_payment_date: NaiveDate,
    pub day_count: DayCountConvention,
    pub rounding: RoundingMode,
    pub interest_only_months: i32,
    pub balloon_month: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRowModel {
    pub schedule_id: Uuid,
    pub period_no: i32,
    pub due_date: NaiveDate,
    pub principal_minor: i64,
    pub interest_minor: i64,
    pub total_payment_minor: i64,
    pub balance_minor: i64,
}
