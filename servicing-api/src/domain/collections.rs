use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Minor;

/// Delinquency aging buckets keyed off days past due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelinquencyBucket {
    Current,
    Dpd1_29,
    Dpd30_59,
    Dpd60_89,
    Dpd90Plus,
}

impl DelinquencyBucket {
    pub fn for_dpd(dpd: u32) -> Self {
        match dpd {
            0 => DelinquencyBucket::Current,
            1..=29 => DelinquencyBucket::Dpd1_29,
            30..=59 => DelinquencyBucket::Dpd30_59,
            60..=89 => DelinquencyBucket::Dpd60_89,
            _ => DelinquencyBucket::Dpd90Plus,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DelinquencyBucket::Current => "current",
            DelinquencyBucket::Dpd1_29 => "dpd_1_29",
            DelinquencyBucket::Dpd30_59 => "dpd_30_59",
            DelinquencyBucket::Dpd60_89 => "dpd_60_89",
            DelinquencyBucket::Dpd90Plus => "dpd_90_plus",
        }
    }
}

impl std::str::FromStr for DelinquencyBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(DelinquencyBucket::Current),
            "dpd_1_29" => Ok(DelinquencyBucket::Dpd1_29),
            "dpd_30_59" => Ok(DelinquencyBucket::Dpd30_59),
            "dpd_60_89" => Ok(DelinquencyBucket::Dpd60_89),
            "dpd_90_plus" => Ok(DelinquencyBucket::Dpd90Plus),
            other => Err(format!("unknown delinquency bucket: {other}")),
        }
    }
}

/// Daily delinquency snapshot; unique per (loan, as_of_date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelinquencySnapshot {
    pub loan_id: Uuid,
    pub as_of_date: NaiveDate,
    pub earliest_unpaid_due_date: Option<NaiveDate>,
    pub unpaid_due_minor: Minor,
    pub dpd: u32,
    pub bucket: DelinquencyBucket,
}

/// A late fee assessed once per (loan, period_due_date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateFeeAssessment {
    pub fee_id: Uuid,
    pub loan_id: Uuid,
    pub period_due_date: NaiveDate,
    pub amount_minor: Minor,
    pub template_id: String,
    pub event_id: Uuid,
    pub assessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
    Completed,
    Defaulted,
    Canceled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Active => "active",
            PlanStatus::Completed => "completed",
            PlanStatus::Defaulted => "defaulted",
            PlanStatus::Canceled => "canceled",
        }
    }

    /// Monotone transitions of the plan state machine.
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        matches!(
            (self, next),
            (PlanStatus::Draft, PlanStatus::Active)
                | (PlanStatus::Draft, PlanStatus::Canceled)
                | (PlanStatus::Active, PlanStatus::Completed)
                | (PlanStatus::Active, PlanStatus::Defaulted)
                | (PlanStatus::Active, PlanStatus::Canceled)
        )
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PlanStatus::Draft),
            "active" => Ok(PlanStatus::Active),
            "completed" => Ok(PlanStatus::Completed),
            "defaulted" => Ok(PlanStatus::Defaulted),
            "canceled" => Ok(PlanStatus::Canceled),
            other => Err(format!("unknown plan status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Partial,
    Paid,
    Missed,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Partial => "partial",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Missed => "missed",
        }
    }
}

impl std::str::FromStr for InstallmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstallmentStatus::Pending),
            "partial" => Ok(InstallmentStatus::Partial),
            "paid" => Ok(InstallmentStatus::Paid),
            "missed" => Ok(InstallmentStatus::Missed),
            other => Err(format!("unknown installment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInstallment {
    pub installment_no: u32,
    pub due_date: NaiveDate,
    pub amount_minor: Minor,
    pub paid_minor: Minor,
    pub status: InstallmentStatus,
}

/// A repayment plan: header plus installment schedule and progress. At
/// most one active plan per loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub plan_id: Uuid,
    pub loan_id: Uuid,
    pub status: PlanStatus,
    pub installments: Vec<PlanInstallment>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Foreclosure milestones. Terminal ones close the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeclosureMilestone {
    Referral,
    BreachLetterSent,
    ComplaintFiled,
    JudgmentEntered,
    SaleScheduled,
    SaleCompleted,
    Reinstated,
    Redeemed,
}

impl ForeclosureMilestone {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ForeclosureMilestone::SaleCompleted
                | ForeclosureMilestone::Reinstated
                | ForeclosureMilestone::Redeemed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForeclosureMilestone::Referral => "referral",
            ForeclosureMilestone::BreachLetterSent => "breach_letter_sent",
            ForeclosureMilestone::ComplaintFiled => "complaint_filed",
            ForeclosureMilestone::JudgmentEntered => "judgment_entered",
            ForeclosureMilestone::SaleScheduled => "sale_scheduled",
            ForeclosureMilestone::SaleCompleted => "sale_completed",
            ForeclosureMilestone::Reinstated => "reinstated",
            ForeclosureMilestone::Redeemed => "redeemed",
        }
    }
}

impl std::str::FromStr for ForeclosureMilestone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "referral" => Ok(ForeclosureMilestone::Referral),
            "breach_letter_sent" => Ok(ForeclosureMilestone::BreachLetterSent),
            "complaint_filed" => Ok(ForeclosureMilestone::ComplaintFiled),
            "judgment_entered" => Ok(ForeclosureMilestone::JudgmentEntered),
            "sale_scheduled" => Ok(ForeclosureMilestone::SaleScheduled),
            "sale_completed" => Ok(ForeclosureMilestone::SaleCompleted),
            "reinstated" => Ok(ForeclosureMilestone::Reinstated),
            "redeemed" => Ok(ForeclosureMilestone::Redeemed),
            other => Err(format!("unknown foreclosure milestone: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeclosureCaseStatus {
    Open,
    Closed,
}

impl ForeclosureCaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForeclosureCaseStatus::Open => "open",
            ForeclosureCaseStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for ForeclosureCaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ForeclosureCaseStatus::Open),
            "closed" => Ok(ForeclosureCaseStatus::Closed),
            other => Err(format!("unknown foreclosure case status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeclosureCase {
    pub case_id: Uuid,
    pub loan_id: Uuid,
    pub status: ForeclosureCaseStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A recorded milestone; unique per (case_id, milestone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeclosureEvent {
    pub case_id: Uuid,
    pub milestone: ForeclosureMilestone,
    pub occurred_on: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries() {
        assert_eq!(DelinquencyBucket::for_dpd(0), DelinquencyBucket::Current);
        assert_eq!(DelinquencyBucket::for_dpd(1), DelinquencyBucket::Dpd1_29);
        assert_eq!(DelinquencyBucket::for_dpd(29), DelinquencyBucket::Dpd1_29);
        assert_eq!(DelinquencyBucket::for_dpd(30), DelinquencyBucket::Dpd30_59);
        assert_eq!(DelinquencyBucket::for_dpd(59), DelinquencyBucket::Dpd30_59);
        assert_eq!(DelinquencyBucket::for_dpd(60), DelinquencyBucket::Dpd60_89);
        assert_eq!(DelinquencyBucket::for_dpd(89), DelinquencyBucket::Dpd60_89);
        assert_eq!(DelinquencyBucket::for_dpd(90), DelinquencyBucket::Dpd90Plus);
        assert_eq!(DelinquencyBucket::for_dpd(400), DelinquencyBucket::Dpd90Plus);
    }

    #[test]
    fn plan_state_machine_is_monotone() {
        assert!(PlanStatus::Draft.can_transition_to(PlanStatus::Active));
        assert!(PlanStatus::Active.can_transition_to(PlanStatus::Completed));
        assert!(PlanStatus::Active.can_transition_to(PlanStatus::Defaulted));
        assert!(!PlanStatus::Completed.can_transition_to(PlanStatus::Active));
        assert!(!PlanStatus::Defaulted.can_transition_to(PlanStatus::Active));
        assert!(!PlanStatus::Draft.can_transition_to(PlanStatus::Completed));
    }

    #[test]
    fn terminal_milestones() {
        assert!(ForeclosureMilestone::SaleCompleted.is_terminal());
        assert!(ForeclosureMilestone::Reinstated.is_terminal());
        assert!(ForeclosureMilestone::Redeemed.is_terminal());
        assert!(!ForeclosureMilestone::Referral.is_terminal());
    }
}
