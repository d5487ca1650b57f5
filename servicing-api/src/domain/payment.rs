use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::allocation::Allocation;
use crate::domain::ledger::LoanBalances;
use crate::domain::money::Minor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Ach,
    Card,
    Check,
    Wire,
    Cashier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    Gateway,
    Lockbox,
    Branch,
    Retry,
}

/// Raw gateway payment accepted by the intake stage. Read-only once
/// written; downstream stages key off `payment_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntake {
    pub payment_id: Uuid,
    pub loan_id: Uuid,
    pub method: PaymentMethod,
    pub amount_minor: Minor,
    pub currency: [u8; 3],
    pub received_at: DateTime<Utc>,
    pub gateway_txn_id: String,
    pub source: PaymentSource,
    /// SHA-256 over `loan|gateway_txn|amount|currency|effective_date`.
    pub idempotency_key: String,
    pub effective_date: NaiveDate,
    pub raw_payload: serde_json::Value,
    /// blake3 integrity hash of the raw payload bytes.
    pub payload_hash: String,
}

impl PaymentIntake {
    /// Deterministic intake idempotency key.
    pub fn idempotency_key_for(
        loan_id: Uuid,
        gateway_txn_id: &str,
        amount_minor: Minor,
        currency: &str,
        effective_date: NaiveDate,
    ) -> String {
        let preimage =
            format!("{loan_id}|{gateway_txn_id}|{amount_minor}|{currency}|{effective_date}");
        let digest = Sha256::digest(preimage.as_bytes());
        hex_encode(&digest)
    }

    /// Ledger correlation id for the eventual posting.
    pub fn correlation_id(&self) -> String {
        format!("payment:loan:{}:gw:{}", self.loan_id, self.gateway_txn_id)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// How a validated payment relates to the active schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Scheduled,
    Overpayment,
    Partial,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationHints {
    pub payment_type: Option<PaymentType>,
    pub scheduled_total_minor: Option<Minor>,
}

/// Outcome of the validation stage, keyed 1:1 to the intake row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentValidation {
    pub payment_id: Uuid,
    pub is_valid: bool,
    pub reason: Option<String>,
    /// Seconds until a future-dated payment becomes postable.
    pub retry_after_secs: Option<i64>,
    pub allocation_hints: AllocationHints,
    pub effective_date: NaiveDate,
    pub validated_at: DateTime<Utc>,
}

impl PaymentValidation {
    pub fn valid(payment_id: Uuid, effective_date: NaiveDate, hints: AllocationHints) -> Self {
        Self {
            payment_id,
            is_valid: true,
            reason: None,
            retry_after_secs: None,
            allocation_hints: hints,
            effective_date,
            validated_at: Utc::now(),
        }
    }

    pub fn invalid(payment_id: Uuid, effective_date: NaiveDate, reason: impl Into<String>) -> Self {
        Self {
            payment_id,
            is_valid: false,
            reason: Some(reason.into()),
            retry_after_secs: None,
            allocation_hints: AllocationHints::default(),
            effective_date,
            validated_at: Utc::now(),
        }
    }
}

/// Result of the posting stage: the ledger event plus the applied split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPosting {
    pub payment_id: Uuid,
    pub event_id: Uuid,
    pub applied: Vec<Allocation>,
    pub new_balances: LoanBalances,
    pub posted_at: DateTime<Utc>,
}


impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Ach => "ach",
            PaymentMethod::Card => "card",
            PaymentMethod::Check => "check",
            PaymentMethod::Wire => "wire",
            PaymentMethod::Cashier => "cashier",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ach" => Ok(PaymentMethod::Ach),
            "card" => Ok(PaymentMethod::Card),
            "check" => Ok(PaymentMethod::Check),
            "wire" => Ok(PaymentMethod::Wire),
            "cashier" => Ok(PaymentMethod::Cashier),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

impl PaymentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSource::Gateway => "gateway",
            PaymentSource::Lockbox => "lockbox",
            PaymentSource::Branch => "branch",
            PaymentSource::Retry => "retry",
        }
    }
}

impl std::str::FromStr for PaymentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gateway" => Ok(PaymentSource::Gateway),
            "lockbox" => Ok(PaymentSource::Lockbox),
            "branch" => Ok(PaymentSource::Branch),
            "retry" => Ok(PaymentSource::Retry),
            other => Err(format!("unknown payment source: {other}")),
        }
    }
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Scheduled => "scheduled",
            PaymentType::Overpayment => "overpayment",
            PaymentType::Partial => "partial",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PaymentType::Scheduled),
            "overpayment" => Ok(PaymentType::Overpayment),
            "partial" => Ok(PaymentType::Partial),
            other => Err(format!("unknown payment type: {other}")),
        }
    }
}
