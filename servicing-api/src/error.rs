use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type ServicingResult<T> = Result<T, ServicingError>;

/// Classification used by stage consumers to decide retry behaviour.
///
/// Validation failures become domain events, dedupes are acked silently,
/// transient failures are retried with backoff, and posting-invariant
/// violations are fatal for the message (nack to DLQ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    Validation,
    Dedupe,
    Transient,
    Fatal,
}

#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ServicingError {
    // Ledger posting invariants
    #[error("Duplicate correlation id: {0}")]
    DuplicateCorrelation(String),

    #[error("Unbalanced event: debits {debit_minor} != credits {credit_minor}")]
    Unbalanced {
        debit_minor: i64,
        credit_minor: i64,
    },

    #[error("Invalid entry line for {account}: debit {debit_minor}, credit {credit_minor}")]
    InvalidLine {
        account: String,
        debit_minor: i64,
        credit_minor: i64,
    },

    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    #[error("Event {0} is not finalized")]
    EventNotFinalized(Uuid),

    // Loan / payment validation
    #[error("Loan not found: {0}")]
    LoanNotFound(Uuid),

    #[error("Loan {loan_id} is in terminal status {status}")]
    LoanNotServiceable { loan_id: Uuid, status: String },

    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(i64),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Effective date {effective_date} is in the future; retry after {retry_after_secs}s")]
    FutureEffectiveDate {
        effective_date: NaiveDate,
        retry_after_secs: i64,
    },

    #[error("Duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    // Schedule
    #[error("No active schedule for loan {0}")]
    NoActiveSchedule(Uuid),

    #[error("Schedule generation error: {0}")]
    ScheduleGeneration(String),

    // Escrow
    #[error("Escrow item not found: {0}")]
    EscrowItemNotFound(Uuid),

    #[error("Escrow disbursement {disbursement_id} is {status}, expected scheduled")]
    DisbursementNotScheduled {
        disbursement_id: Uuid,
        status: String,
    },

    #[error("Escrow analysis error: {0}")]
    EscrowAnalysis(String),

    // Collections
    #[error("Late fee already assessed for loan {loan_id} period {period_due_date}")]
    LateFeeAlreadyAssessed {
        loan_id: Uuid,
        period_due_date: NaiveDate,
    },

    #[error("Loan {0} already has an active payment plan")]
    ActivePlanExists(Uuid),

    #[error("Payment plan not found: {0}")]
    PlanNotFound(Uuid),

    #[error("Invalid plan transition from {from} to {to}")]
    InvalidPlanTransition { from: String, to: String },

    #[error("Foreclosure case not found: {0}")]
    ForeclosureCaseNotFound(Uuid),

    #[error("Milestone {milestone} already recorded for case {case_id}")]
    DuplicateMilestone { case_id: Uuid, milestone: String },

    // Reconciliation / cash
    #[error("Bank account not found: {0}")]
    BankAccountNotFound(Uuid),

    #[error("Statement file already ingested: {0}")]
    DuplicateStatementFile(String),

    #[error("Statement parse error at line {line}: {message}")]
    StatementParse { line: usize, message: String },

    #[error("Bank transaction not found: {0}")]
    BankTxnNotFound(Uuid),

    #[error("Bank transaction {0} is already matched")]
    BankTxnAlreadyMatched(Uuid),

    #[error("Reconciliation exception not found for bank txn {0}")]
    ExceptionNotFound(Uuid),

    // ACH
    #[error("ACH batch {batch_id} is {status}; entries can only be added while open")]
    BatchNotOpen { batch_id: Uuid, status: String },

    #[error("ACH batch not found: {0}")]
    AchBatchNotFound(Uuid),

    #[error("ACH entry not found for trace {0}")]
    AchEntryNotFound(String),

    #[error("Duplicate ACH return for entry {0}")]
    DuplicateAchReturn(Uuid),

    #[error("Invalid routing number: {0}")]
    InvalidRoutingNumber(String),

    // Messaging
    #[error("Unknown message schema: {0}")]
    UnknownSchema(String),

    #[error("Payload is already enveloped; refusing to double-wrap")]
    DoubleWrap,

    #[error("Publish confirm timed out after {timeout_secs}s on topic {topic}")]
    PublishTimeout { topic: String, timeout_secs: u64 },

    #[error("Outbox message {0} is parked and requires operator action")]
    OutboxParked(Uuid),

    // Money / date primitives
    #[error("Invalid monetary input: {0}")]
    InvalidMoney(String),

    #[error("Date calculation error: {0}")]
    DateCalculation(String),

    // Configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Product policy not found: {0}")]
    ProductPolicyNotFound(String),

    // Infrastructure
    #[error("Database constraint violation: {constraint} - {details}")]
    DatabaseConstraintViolation { constraint: String, details: String },

    #[error("Transient infrastructure error: {0}")]
    Transient(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error in {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServicingError {
    /// Map the error onto the retry taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            ServicingError::DuplicateCorrelation(_)
            | ServicingError::DuplicateIdempotencyKey(_)
            | ServicingError::DuplicateStatementFile(_)
            | ServicingError::DuplicateAchReturn(_)
            | ServicingError::DuplicateMilestone { .. }
            | ServicingError::LateFeeAlreadyAssessed { .. } => ErrorClass::Dedupe,

            ServicingError::Transient(_) | ServicingError::PublishTimeout { .. } => {
                ErrorClass::Transient
            }

            ServicingError::Unbalanced { .. }
            | ServicingError::InvalidLine { .. }
            | ServicingError::OutboxParked(_)
            | ServicingError::DatabaseConstraintViolation { .. }
            | ServicingError::Internal(_) => ErrorClass::Fatal,

            _ => ErrorClass::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<anyhow::Error> for ServicingError {
    fn from(err: anyhow::Error) -> Self {
        ServicingError::Internal(err.to_string())
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for ServicingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                ServicingError::NotFound("database row not found".to_string())
            }
            sqlx::Error::Database(ref db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    ServicingError::DatabaseConstraintViolation {
                        constraint: constraint.to_string(),
                        details: db_err.message().to_string(),
                    }
                } else if db_err.code().as_deref() == Some("40001") {
                    // serialization failure is retryable at the caller
                    ServicingError::Transient(db_err.message().to_string())
                } else {
                    ServicingError::Internal(format!("Database error: {}", db_err.message()))
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ServicingError::Transient(format!("Database connection error: {err}"))
            }
            _ => ServicingError::Internal(format!("Database error: {err}")),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ServicingError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ServicingError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_correlation_is_dedupe() {
        let err = ServicingError::DuplicateCorrelation("payment:loan:1:gw:A".into());
        assert_eq!(err.class(), ErrorClass::Dedupe);
        assert!(!err.is_retryable());
    }

    #[test]
    fn unbalanced_is_fatal() {
        let err = ServicingError::Unbalanced {
            debit_minor: 100,
            credit_minor: 90,
        };
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[test]
    fn transient_is_retryable() {
        assert!(ServicingError::Transient("broker gone".into()).is_retryable());
    }
}
