use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::money::{Minor, RoundingMode};

/// Disbursement categories tracked in escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowItemType {
    PropertyTax,
    HazardInsurance,
    FloodInsurance,
    Mip,
    Hoa,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowFrequency {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    Once,
}

impl EscrowFrequency {
    /// Months to step forward between forecast occurrences. `Once`
    /// advances far enough to terminate the horizon walk.
    pub fn step_months(&self) -> u32 {
        match self {
            EscrowFrequency::Monthly => 1,
            EscrowFrequency::Quarterly => 3,
            EscrowFrequency::SemiAnnual => 6,
            EscrowFrequency::Annual => 12,
            EscrowFrequency::Once => 1200,
        }
    }
}

/// RESPA-style analysis policy keyed by (product, jurisdiction).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EscrowPolicy {
    #[validate(range(min = 0, max = 2))]
    pub cushion_months: u32,
    #[validate(range(min = 1, max = 24))]
    pub shortage_amortization_months: u32,
    #[validate(range(min = 1, max = 24))]
    pub deficiency_amortization_months: u32,
    #[validate(range(min = 0))]
    pub surplus_refund_threshold_minor: Minor,
    /// Collect surplus as a reduction of the monthly target instead of
    /// refunding it.
    pub collect_surplus_as_reduction: bool,
    /// Advance servicer funds when the escrow balance cannot cover a due
    /// disbursement.
    pub pay_when_insufficient: bool,
    pub rounding: RoundingMode,
}

impl Default for EscrowPolicy {
    fn default() -> Self {
        Self {
            cushion_months: 2,
            shortage_amortization_months: 12,
            deficiency_amortization_months: 12,
            surplus_refund_threshold_minor: 5_000,
            collect_surplus_as_reduction: false,
            pay_when_insufficient: true,
            rounding: RoundingMode::HalfAwayFromZero,
        }
    }
}

/// An active disbursement configuration (tax bill, insurance premium).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowItem {
    pub escrow_id: Uuid,
    pub loan_id: Uuid,
    pub item_type: EscrowItemType,
    pub payee: String,
    pub amount_minor: Minor,
    pub frequency: EscrowFrequency,
    pub next_due_date: NaiveDate,
    pub active: bool,
}

/// One projected disbursement occurrence. Unique per
/// (loan, escrow_id, due_date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowForecastRow {
    pub loan_id: Uuid,
    pub escrow_id: Uuid,
    pub due_date: NaiveDate,
    pub amount_minor: Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementStatus {
    Scheduled,
    Posted,
    Canceled,
}

impl DisbursementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisbursementStatus::Scheduled => "scheduled",
            DisbursementStatus::Posted => "posted",
            DisbursementStatus::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for DisbursementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(DisbursementStatus::Scheduled),
            "posted" => Ok(DisbursementStatus::Posted),
            "canceled" => Ok(DisbursementStatus::Canceled),
            other => Err(format!("unknown disbursement status: {other}")),
        }
    }
}

/// A scheduled-or-posted escrow payout. Transitions scheduled → posted or
/// scheduled → canceled exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowDisbursement {
    pub disbursement_id: Uuid,
    pub loan_id: Uuid,
    pub escrow_id: Uuid,
    pub due_date: NaiveDate,
    pub amount_minor: Minor,
    pub status: DisbursementStatus,
    pub event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an annual escrow analysis run. Versions increase
/// monotonically per loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowAnalysis {
    pub analysis_id: Uuid,
    pub loan_id: Uuid,
    pub as_of: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub annual_expected_minor: Minor,
    pub cushion_target_minor: Minor,
    pub current_balance_minor: Minor,
    pub lowest_projected_minor: Minor,
    pub shortage_minor: Minor,
    pub deficiency_minor: Minor,
    pub surplus_minor: Minor,
    pub new_monthly_target_minor: Minor,
    pub deficiency_recovery_monthly_minor: Minor,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}


impl EscrowItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowItemType::PropertyTax => "property_tax",
            EscrowItemType::HazardInsurance => "hazard_insurance",
            EscrowItemType::FloodInsurance => "flood_insurance",
            EscrowItemType::Mip => "mip",
            EscrowItemType::Hoa => "hoa",
            EscrowItemType::Other => "other",
        }
    }
}

impl std::str::FromStr for EscrowItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "property_tax" => Ok(EscrowItemType::PropertyTax),
            "hazard_insurance" => Ok(EscrowItemType::HazardInsurance),
            "flood_insurance" => Ok(EscrowItemType::FloodInsurance),
            "mip" => Ok(EscrowItemType::Mip),
            "hoa" => Ok(EscrowItemType::Hoa),
            "other" => Ok(EscrowItemType::Other),
            other => Err(format!("unknown escrow item type: {other}")),
        }
    }
}

impl EscrowFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowFrequency::Monthly => "monthly",
            EscrowFrequency::Quarterly => "quarterly",
            EscrowFrequency::SemiAnnual => "semi_annual",
            EscrowFrequency::Annual => "annual",
            EscrowFrequency::Once => "once",
        }
    }
}

impl std::str::FromStr for EscrowFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(EscrowFrequency::Monthly),
            "quarterly" => Ok(EscrowFrequency::Quarterly),
            "semi_annual" => Ok(EscrowFrequency::SemiAnnual),
            "annual" => Ok(EscrowFrequency::Annual),
            "once" => Ok(EscrowFrequency::Once),
            other => Err(format!("unknown escrow frequency: {other}")),
        }
    }
}
