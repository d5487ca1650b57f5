use chrono::{DateTime, NaiveDate, Utc};
use heapless::String as HeaplessString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::money::Minor;

/// NACHA standard entry class + transaction codes carried on detail
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AchTransactionCode {
    /// 22: credit to a checking account
    CheckingCredit,
    /// 27: debit from a checking account
    CheckingDebit,
    /// 32: credit to a savings account
    SavingsCredit,
    /// 37: debit from a savings account
    SavingsDebit,
}

impl AchTransactionCode {
    pub fn code(&self) -> &'static str {
        match self {
            AchTransactionCode::CheckingCredit => "22",
            AchTransactionCode::CheckingDebit => "27",
            AchTransactionCode::SavingsCredit => "32",
            AchTransactionCode::SavingsDebit => "37",
        }
    }

    pub fn is_debit(&self) -> bool {
        matches!(
            self,
            AchTransactionCode::CheckingDebit | AchTransactionCode::SavingsDebit
        )
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "22" => Some(AchTransactionCode::CheckingCredit),
            "27" => Some(AchTransactionCode::CheckingDebit),
            "32" => Some(AchTransactionCode::SavingsCredit),
            "37" => Some(AchTransactionCode::SavingsDebit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchBatchStatus {
    Open,
    Sealed,
    Filed,
    Settled,
    Failed,
}

impl AchBatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchBatchStatus::Open => "open",
            AchBatchStatus::Sealed => "sealed",
            AchBatchStatus::Filed => "filed",
            AchBatchStatus::Settled => "settled",
            AchBatchStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: AchBatchStatus) -> bool {
        matches!(
            (self, next),
            (AchBatchStatus::Open, AchBatchStatus::Sealed)
                | (AchBatchStatus::Sealed, AchBatchStatus::Filed)
                | (AchBatchStatus::Filed, AchBatchStatus::Settled)
                | (AchBatchStatus::Filed, AchBatchStatus::Failed)
        )
    }
}

impl std::str::FromStr for AchBatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(AchBatchStatus::Open),
            "sealed" => Ok(AchBatchStatus::Sealed),
            "filed" => Ok(AchBatchStatus::Filed),
            "settled" => Ok(AchBatchStatus::Settled),
            "failed" => Ok(AchBatchStatus::Failed),
            other => Err(format!("unknown ACH batch status: {other}")),
        }
    }
}

/// Originator identity written into NACHA file and batch headers.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AchOriginator {
    /// ODFI routing number, 9 digits with check digit.
    #[validate(length(equal = 9))]
    pub odfi_routing: String,
    #[validate(length(min = 1, max = 10))]
    pub immediate_destination: String,
    #[validate(length(min = 1, max = 10))]
    pub immediate_origin: String,
    #[validate(length(min = 1, max = 23))]
    pub destination_name: String,
    #[validate(length(min = 1, max = 23))]
    pub origin_name: String,
    #[validate(length(min = 1, max = 16))]
    pub company_name: String,
    #[validate(length(equal = 10))]
    pub company_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchBatch {
    pub batch_id: Uuid,
    pub status: AchBatchStatus,
    pub company_entry_description: HeaplessString<10>,
    pub effective_entry_date: NaiveDate,
    pub entry_count: i32,
    pub debit_total_minor: Minor,
    pub credit_total_minor: Minor,
    /// Sum of first-8 routing digits mod 10^10, frozen on seal.
    pub entry_hash: i64,
    pub sealed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchEntry {
    pub entry_id: Uuid,
    pub batch_id: Uuid,
    pub loan_id: Option<Uuid>,
    pub txn_code: AchTransactionCode,
    pub rdfi_routing: HeaplessString<9>,
    pub account_number_masked: HeaplessString<17>,
    pub amount_minor: Minor,
    pub individual_name: HeaplessString<22>,
    /// Assigned on seal: first 8 of ODFI routing + 7-digit sequence.
    pub trace_number: Option<HeaplessString<15>>,
}

/// ACH return disposition classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnDisposition {
    /// NSF-class: schedule a payment retry.
    Retryable,
    /// Account closed, no account, etc: open a recon exception.
    Exception,
}

/// Classify a NACHA return reason code.
pub fn classify_return_code(code: &str) -> ReturnDisposition {
    match code {
        // R01 insufficient funds, R09 uncollected funds
        "R01" | "R09" => ReturnDisposition::Retryable,
        _ => ReturnDisposition::Exception,
    }
}

/// A received return; at most one per originated entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchReturn {
    pub return_id: Uuid,
    pub entry_id: Uuid,
    pub return_code: HeaplessString<3>,
    pub return_date: NaiveDate,
    pub addenda: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Compute the ABA check digit for the first 8 digits of a routing
/// number. Weights 3-7-1 per position.
pub fn routing_check_digit(first_eight: &str) -> Option<u32> {
    if first_eight.len() != 8 || !first_eight.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: Vec<u32> = first_eight.bytes().map(|b| (b - b'0') as u32).collect();
    let weighted: u32 = digits
        .iter()
        .zip([3, 7, 1, 3, 7, 1, 3, 7])
        .map(|(d, w)| d * w)
        .sum();
    Some((10 - (weighted % 10)) % 10)
}
