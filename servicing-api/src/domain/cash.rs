use chrono::{DateTime, NaiveDate, Utc};
use heapless::String as HeaplessString;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::money::Minor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementFormat {
    Bai2,
    Camt053,
}

/// A serviced bank account reconciled against the GL cash account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub bank_account_id: Uuid,
    pub bank_name: String,
    pub routing_number: HeaplessString<9>,
    pub account_number_masked: HeaplessString<32>,
    pub currency: [u8; 3],
    pub active: bool,
}

/// An ingested statement file; unique by content hash per account + as_of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankStatementFile {
    pub file_id: Uuid,
    pub bank_account_id: Uuid,
    pub as_of_date: NaiveDate,
    pub format: StatementFormat,
    /// SHA-256 over the raw statement bytes.
    pub content_hash: String,
    pub txn_count: i32,
    pub ingested_at: DateTime<Utc>,
}

impl BankStatementFile {
    pub fn content_hash_for(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let mut out = String::with_capacity(64);
        for b in digest {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankTxnType {
    Credit,
    Debit,
    Fee,
    Return,
}

impl BankTxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankTxnType::Credit => "credit",
            BankTxnType::Debit => "debit",
            BankTxnType::Fee => "fee",
            BankTxnType::Return => "return",
        }
    }
}

impl std::str::FromStr for BankTxnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(BankTxnType::Credit),
            "debit" => Ok(BankTxnType::Debit),
            "fee" => Ok(BankTxnType::Fee),
            "return" => Ok(BankTxnType::Return),
            other => Err(format!("unknown bank txn type: {other}")),
        }
    }
}

/// One statement line awaiting a ledger match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTxn {
    pub bank_txn_id: Uuid,
    pub bank_account_id: Uuid,
    pub file_id: Uuid,
    pub posted_date: NaiveDate,
    pub amount_minor: Minor,
    pub txn_type: BankTxnType,
    pub bank_ref: HeaplessString<100>,
    pub description: String,
    pub matched: bool,
    pub matched_event_id: Option<Uuid>,
}

/// Scored ledger candidate for a bank transaction; top 3 retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub bank_txn_id: Uuid,
    pub event_id: Uuid,
    pub score: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconExceptionStatus {
    New,
    Investigating,
    Resolved,
    WrittenOff,
}

impl ReconExceptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconExceptionStatus::New => "new",
            ReconExceptionStatus::Investigating => "investigating",
            ReconExceptionStatus::Resolved => "resolved",
            ReconExceptionStatus::WrittenOff => "written_off",
        }
    }
}

impl std::str::FromStr for ReconExceptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ReconExceptionStatus::New),
            "investigating" => Ok(ReconExceptionStatus::Investigating),
            "resolved" => Ok(ReconExceptionStatus::Resolved),
            "written_off" => Ok(ReconExceptionStatus::WrittenOff),
            other => Err(format!("unknown exception status: {other}")),
        }
    }
}

/// An unmatched statement line under investigation. Created on unmatch,
/// closed only by match, resolve, or write-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconException {
    pub bank_txn_id: Uuid,
    pub variance_minor: Minor,
    pub status: ReconExceptionStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}


impl StatementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementFormat::Bai2 => "bai2",
            StatementFormat::Camt053 => "camt053",
        }
    }
}

impl std::str::FromStr for StatementFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bai2" => Ok(StatementFormat::Bai2),
            "camt053" => Ok(StatementFormat::Camt053),
            other => Err(format!("unknown statement format: {other}")),
        }
    }
}
