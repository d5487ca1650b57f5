use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::daycount::DayCountConvention;
use crate::domain::money::{Minor, RateBps, RoundingMode};

/// Inputs to the schedule generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTerms {
    pub loan_id: Uuid,
    pub principal_minor: Minor,
    pub annual_rate_bps: RateBps,
    pub term_months: u32,
    pub first_payment_date: NaiveDate,
    pub day_count: DayCountConvention,
    pub rounding: RoundingMode,
    /// Leading periods that pay interest only.
    pub interest_only_months: u32,
    /// Balloon: remaining principal falls due in this period (1-based).
    pub balloon_month: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub period_no: u32,
    pub due_date: NaiveDate,
    pub principal_minor: Minor,
    pub interest_minor: Minor,
    pub total_payment_minor: Minor,
    /// Principal remaining after this period.
    pub balance_minor: Minor,
}

/// A generated amortization plan. Exactly one plan per loan is active;
/// regeneration bumps `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub schedule_id: Uuid,
    pub loan_id: Uuid,
    pub version: i32,
    pub active: bool,
    pub terms: ScheduleTerms,
    pub rows: Vec<ScheduleRow>,
    pub created_at: DateTime<Utc>,
}

impl PaymentSchedule {
    /// Rows due on or before `as_of`, in period order.
    pub fn rows_due_through(&self, as_of: NaiveDate) -> impl Iterator<Item = &ScheduleRow> {
        self.rows.iter().filter(move |row| row.due_date <= as_of)
    }

    /// The row for the current period at `as_of`: the earliest row whose
    /// due date is on or after `as_of`, if any.
    pub fn current_period(&self, as_of: NaiveDate) -> Option<&ScheduleRow> {
        self.rows.iter().find(|row| row.due_date >= as_of)
    }

    pub fn total_principal(&self) -> Minor {
        self.rows.iter().map(|row| row.principal_minor).sum()
    }

    pub fn total_interest(&self) -> Minor {
        self.rows.iter().map(|row| row.interest_minor).sum()
    }
}
