use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use servicing_api::domain::{
    DelinquencyBucket, ForeclosureCaseStatus, ForeclosureMilestone, InstallmentStatus, PlanStatus,
};

/// Unique on (loan_id, as_of_date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelinquencySnapshotModel {
    pub loan_id: Uuid,
    pub as_of_date: NaiveDate,
    pub earliest_unpaid_due_date: Option<NaiveDate>,
    pub unpaid_due_minor: i64,
    pub dpd: i32,
    pub bucket: DelinquencyBucket,
}

/// Unique on (loan_id, period_due_date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateFeeAssessmentModel {
    pub fee_id: Uuid,
    pub loan_id: Uuid,
    pub period_due_date: NaiveDate,
    pub amount_minor: i64,
    pub template_id: String,
    pub event_id: Uuid,
    pub assessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlanModel {
    pub plan_id: Uuid,
    pub loan_id: Uuid,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInstallmentModel {
    pub plan_id: Uuid,
    pub installment_no: i32,
    pub due_date: NaiveDate,
    pub amount_minor: i64,
    pub paid_minor: i64,
    pub status: InstallmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeclosureCaseModel {
    pub case_id: Uuid,
    pub loan_id: Uuid,
    pub status: ForeclosureCaseStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Unique on (case_id, milestone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeclosureEventModel {
    pub case_id: Uuid,
    pub milestone: ForeclosureMilestone,
    pub occurred_on: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}
