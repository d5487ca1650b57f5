use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::{Minor, RateBps};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Pending,
    Active,
    Delinquent,
    InForeclosure,
    PaidOff,
    ChargedOff,
}

impl LoanStatus {
    /// Terminal states reject incoming payments at validation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::PaidOff | LoanStatus::ChargedOff)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Active => "active",
            LoanStatus::Delinquent => "delinquent",
            LoanStatus::InForeclosure => "in_foreclosure",
            LoanStatus::PaidOff => "paid_off",
            LoanStatus::ChargedOff => "charged_off",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LoanStatus::Pending),
            "active" => Ok(LoanStatus::Active),
            "delinquent" => Ok(LoanStatus::Delinquent),
            "in_foreclosure" => Ok(LoanStatus::InForeclosure),
            "paid_off" => Ok(LoanStatus::PaidOff),
            "charged_off" => Ok(LoanStatus::ChargedOff),
            other => Err(format!("unknown loan status: {other}")),
        }
    }
}

/// Servicing view of a loan. Balances are never stored here; they are
/// derived from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: Uuid,
    pub product_code: String,
    pub status: LoanStatus,
    pub origination_date: NaiveDate,
    pub original_principal_minor: Minor,
    pub annual_rate_bps: RateBps,
    pub term_months: u32,
    pub jurisdiction: String,
    pub late_fee_grace_days: u16,
    pub created_at: DateTime<Utc>,
}

/// Collection-case roll-up status tracked alongside foreclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionCaseStatus {
    Normal,
    InCollections,
    Closed,
}

impl CollectionCaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionCaseStatus::Normal => "normal",
            CollectionCaseStatus::InCollections => "in_collections",
            CollectionCaseStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for CollectionCaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(CollectionCaseStatus::Normal),
            "in_collections" => Ok(CollectionCaseStatus::InCollections),
            "closed" => Ok(CollectionCaseStatus::Closed),
            other => Err(format!("unknown collection case status: {other}")),
        }
    }
}
