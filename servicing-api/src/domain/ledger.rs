use chrono::{DateTime, NaiveDate, Utc};
use heapless::String as HeaplessString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::Minor;

/// General-ledger account enumeration. Wire names are stable snake_case
/// strings used in entry rows and event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlAccount {
    Cash,
    LoanPrincipal,
    InterestReceivable,
    InterestIncome,
    EscrowLiability,
    EscrowAdvances,
    EscrowRefundPayable,
    FeesReceivable,
    FeeIncome,
    LateFeeIncome,
    FeeExpense,
    WriteoffExpense,
    Suspense,
}

impl GlAccount {
    pub const ALL: [GlAccount; 13] = [
        GlAccount::Cash,
        GlAccount::LoanPrincipal,
        GlAccount::InterestReceivable,
        GlAccount::InterestIncome,
        GlAccount::EscrowLiability,
        GlAccount::EscrowAdvances,
        GlAccount::EscrowRefundPayable,
        GlAccount::FeesReceivable,
        GlAccount::FeeIncome,
        GlAccount::LateFeeIncome,
        GlAccount::FeeExpense,
        GlAccount::WriteoffExpense,
        GlAccount::Suspense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GlAccount::Cash => "cash",
            GlAccount::LoanPrincipal => "loan_principal",
            GlAccount::InterestReceivable => "interest_receivable",
            GlAccount::InterestIncome => "interest_income",
            GlAccount::EscrowLiability => "escrow_liability",
            GlAccount::EscrowAdvances => "escrow_advances",
            GlAccount::EscrowRefundPayable => "escrow_refund_payable",
            GlAccount::FeesReceivable => "fees_receivable",
            GlAccount::FeeIncome => "fee_income",
            GlAccount::LateFeeIncome => "late_fee_income",
            GlAccount::FeeExpense => "fee_expense",
            GlAccount::WriteoffExpense => "writeoff_expense",
            GlAccount::Suspense => "suspense",
        }
    }
}

impl std::str::FromStr for GlAccount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GlAccount::ALL
            .iter()
            .copied()
            .find(|account| account.as_str() == s)
            .ok_or_else(|| format!("unknown GL account: {s}"))
    }
}

impl std::fmt::Display for GlAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One debit-or-credit line of a balanced event. Exactly one of
/// `debit_minor` / `credit_minor` is positive; neither is ever negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryLine {
    pub account: GlAccount,
    pub debit_minor: Minor,
    pub credit_minor: Minor,
    pub memo: Option<HeaplessString<200>>,
}

impl EntryLine {
    pub fn debit(account: GlAccount, amount_minor: Minor, memo: &str) -> Self {
        Self {
            account,
            debit_minor: amount_minor,
            credit_minor: 0,
            memo: HeaplessString::try_from(memo).ok(),
        }
    }

    pub fn credit(account: GlAccount, amount_minor: Minor, memo: &str) -> Self {
        Self {
            account,
            debit_minor: 0,
            credit_minor: amount_minor,
            memo: HeaplessString::try_from(memo).ok(),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        if self.debit_minor < 0 || self.credit_minor < 0 {
            return false;
        }
        (self.debit_minor > 0) != (self.credit_minor > 0)
    }
}

/// A finalized, balanced ledger event. Append-only: never updated or
/// deleted once `finalized_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: Uuid,
    pub loan_id: Uuid,
    pub effective_date: NaiveDate,
    pub schema: EventSchema,
    pub correlation_id: String,
    pub currency: [u8; 3],
    pub entries: Vec<LedgerEntry>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,
    pub event_id: Uuid,
    pub account: GlAccount,
    pub debit_minor: Minor,
    pub credit_minor: Minor,
    pub currency: [u8; 3],
    pub memo: Option<HeaplessString<200>>,
}

/// Versioned posting schemas. Decoders fail closed on anything outside
/// this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSchema {
    #[serde(rename = "posting.payment.v1")]
    PaymentV1,
    #[serde(rename = "posting.accrual.v1")]
    AccrualV1,
    #[serde(rename = "posting.fee.v1")]
    FeeV1,
    #[serde(rename = "posting.late_fee.v1")]
    LateFeeV1,
    #[serde(rename = "posting.escrow.v1")]
    EscrowV1,
    #[serde(rename = "posting.origination.v1")]
    OriginationV1,
    #[serde(rename = "posting.chargeoff.v1")]
    ChargeOffV1,
    #[serde(rename = "posting.reversal.v1")]
    ReversalV1,
    #[serde(rename = "escrow.disbursement.v1")]
    EscrowDisbursementV1,
    #[serde(rename = "cash.writeoff.v1")]
    CashWriteoffV1,
}

impl EventSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSchema::PaymentV1 => "posting.payment.v1",
            EventSchema::AccrualV1 => "posting.accrual.v1",
            EventSchema::FeeV1 => "posting.fee.v1",
            EventSchema::LateFeeV1 => "posting.late_fee.v1",
            EventSchema::EscrowV1 => "posting.escrow.v1",
            EventSchema::OriginationV1 => "posting.origination.v1",
            EventSchema::ChargeOffV1 => "posting.chargeoff.v1",
            EventSchema::ReversalV1 => "posting.reversal.v1",
            EventSchema::EscrowDisbursementV1 => "escrow.disbursement.v1",
            EventSchema::CashWriteoffV1 => "cash.writeoff.v1",
        }
    }
}

impl std::str::FromStr for EventSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "posting.payment.v1" => Ok(EventSchema::PaymentV1),
            "posting.accrual.v1" => Ok(EventSchema::AccrualV1),
            "posting.fee.v1" => Ok(EventSchema::FeeV1),
            "posting.late_fee.v1" => Ok(EventSchema::LateFeeV1),
            "posting.escrow.v1" => Ok(EventSchema::EscrowV1),
            "posting.origination.v1" => Ok(EventSchema::OriginationV1),
            "posting.chargeoff.v1" => Ok(EventSchema::ChargeOffV1),
            "posting.reversal.v1" => Ok(EventSchema::ReversalV1),
            "escrow.disbursement.v1" => Ok(EventSchema::EscrowDisbursementV1),
            "cash.writeoff.v1" => Ok(EventSchema::CashWriteoffV1),
            other => Err(format!("unknown event schema: {other}")),
        }
    }
}

impl std::fmt::Display for EventSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger-derived balances for a single loan. Debit-normal sign: positive
/// values on liability accounts mean a net debit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBalances {
    pub principal_minor: Minor,
    pub interest_receivable_minor: Minor,
    pub escrow_liability_minor: Minor,
    pub fees_receivable_minor: Minor,
    pub cash_minor: Minor,
    pub suspense_minor: Minor,
}

impl LoanBalances {
    /// Escrow funds held, as a positive liability amount.
    pub fn escrow_available_minor(&self) -> Minor {
        (-self.escrow_liability_minor).max(0)
    }
}

/// One aggregated row of the trial balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account: GlAccount,
    pub debit_minor: Minor,
    pub credit_minor: Minor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: DateTime<Utc>,
    pub rows: Vec<TrialBalanceRow>,
}

impl TrialBalance {
    pub fn total_debits(&self) -> Minor {
        self.rows.iter().map(|r| r.debit_minor).sum()
    }

    pub fn total_credits(&self) -> Minor {
        self.rows.iter().map(|r| r.credit_minor).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }
}
