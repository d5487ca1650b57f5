use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::allocation::Allocation;
use crate::domain::collections::{DelinquencyBucket, ForeclosureMilestone};
use crate::domain::ledger::LoanBalances;
use crate::domain::money::Minor;
use crate::error::{ServicingError, ServicingResult};

/// Canonical JSON envelope wrapping every inter-stage payload exactly
/// once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message_id: Uuid,
    pub schema: String,
    pub correlation_id: String,
    pub trace_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub priority: u8,
    pub payload: Value,
}

impl MessageEnvelope {
    /// Wrap a payload. Rejects payloads that already look like an
    /// envelope; double-wrapping is a bug upstream.
    pub fn wrap(
        schema: &str,
        correlation_id: &str,
        trace_id: Uuid,
        payload: Value,
    ) -> ServicingResult<Self> {
        if let Value::Object(map) = &payload {
            if map.contains_key("message_id") && map.contains_key("schema") && map.contains_key("payload")
            {
                return Err(ServicingError::DoubleWrap);
            }
        }
        Ok(Self {
            message_id: Uuid::new_v4(),
            schema: schema.to_string(),
            correlation_id: correlation_id.to_string(),
            trace_id,
            timestamp: Utc::now(),
            priority: 4,
            payload,
        })
    }

    /// Decode the payload as a typed stage event; fails closed on unknown
    /// schemas.
    pub fn decode(&self) -> ServicingResult<StageEvent> {
        StageEvent::decode(&self.schema, self.payload.clone())
    }
}

/// Exchange names (topic unless noted).
pub mod exchanges {
    pub const PAYMENTS_VALIDATION: &str = "payments.validation";
    pub const PAYMENTS_SAGA: &str = "payments.saga";
    pub const PAYMENTS_EVENTS: &str = "payments.events";
    /// fanout
    pub const PAYMENTS_AUDIT: &str = "payments.audit";
    pub const PAYMENTS_DLQ: &str = "payments.dlq";
    pub const ESCROW_SAGA: &str = "escrow.saga";
    pub const ESCROW_EVENTS: &str = "escrow.events";
    pub const ESCROW_DLQ: &str = "escrow.dlq";
    pub const CASH_EVENTS: &str = "cash.events";
}

/// Versioned stage-event schema names.
pub mod schemas {
    pub const PAYMENT_RECEIVED_V1: &str = "payment.received.v1";
    pub const PAYMENT_VALIDATED_V1: &str = "payment.validated.v1";
    pub const PAYMENT_POSTED_V1: &str = "payment.posted.v1";
    pub const PAYMENT_FAILED_V1: &str = "payment.failed.v1";
    pub const PAYMENT_REVERSAL_REQUESTED_V1: &str = "payment.reversal.requested.v1";
    pub const ESCROW_FORECAST_V1: &str = "escrow.forecast.v1";
    pub const ESCROW_DISBURSEMENT_V1: &str = "escrow.disbursement.v1";
    pub const CASH_STMT_INGESTED_V1: &str = "cash.stmt.ingested.v1";
    pub const CASH_RECONCILED_V1: &str = "cash.reconciled.v1";
    pub const LATEFEE_ASSESSED_V1: &str = "latefee.assessed.v1";
    pub const DELINQUENCY_STATUS_CHANGED_V1: &str = "delinquency.status.changed.v1";
    pub const FORECLOSURE_CASE_OPENED_V1: &str = "foreclosure.case.opened.v1";
    pub const FORECLOSURE_MILESTONE_HIT_V1: &str = "foreclosure.milestone.hit.v1";
}

/// Typed inter-stage events, keyed by versioned schema tag. Decoders fail
/// closed on anything not listed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageEvent {
    PaymentReceived {
        payment_id: Uuid,
        loan_id: Uuid,
        amount_minor: Minor,
        effective_date: NaiveDate,
    },
    PaymentValidated {
        payment_id: Uuid,
        loan_id: Uuid,
    },
    PaymentPosted {
        payment_id: Uuid,
        loan_id: Uuid,
        event_id: Uuid,
        applied: Vec<Allocation>,
        new_balances: LoanBalances,
    },
    PaymentFailed {
        payment_id: Uuid,
        loan_id: Uuid,
        reason: String,
        retry_after_secs: Option<i64>,
    },
    PaymentReversalRequested {
        entry_id: Uuid,
        loan_id: Uuid,
        return_code: String,
    },
    EscrowForecastRefreshed {
        loan_id: Uuid,
        rows: i64,
        horizon_end: NaiveDate,
    },
    EscrowDisbursed {
        loan_id: Uuid,
        disbursement_id: Uuid,
        event_id: Uuid,
        amount_minor: Minor,
        advanced_minor: Minor,
    },
    StatementIngested {
        file_id: Uuid,
        bank_account_id: Uuid,
        txn_count: i64,
    },
    CashReconciled {
        bank_txn_id: Uuid,
        event_id: Uuid,
    },
    LateFeeAssessed {
        loan_id: Uuid,
        fee_id: Uuid,
        period_due_date: NaiveDate,
        amount_minor: Minor,
    },
    DelinquencyStatusChanged {
        loan_id: Uuid,
        as_of_date: NaiveDate,
        previous_bucket: Option<DelinquencyBucket>,
        bucket: DelinquencyBucket,
        dpd: u32,
    },
    ForeclosureCaseOpened {
        loan_id: Uuid,
        case_id: Uuid,
    },
    ForeclosureMilestoneHit {
        loan_id: Uuid,
        case_id: Uuid,
        milestone: ForeclosureMilestone,
    },
}

impl StageEvent {
    pub fn schema(&self) -> &'static str {
        match self {
            StageEvent::PaymentReceived { .. } => schemas::PAYMENT_RECEIVED_V1,
            StageEvent::PaymentValidated { .. } => schemas::PAYMENT_VALIDATED_V1,
            StageEvent::PaymentPosted { .. } => schemas::PAYMENT_POSTED_V1,
            StageEvent::PaymentFailed { .. } => schemas::PAYMENT_FAILED_V1,
            StageEvent::PaymentReversalRequested { .. } => schemas::PAYMENT_REVERSAL_REQUESTED_V1,
            StageEvent::EscrowForecastRefreshed { .. } => schemas::ESCROW_FORECAST_V1,
            StageEvent::EscrowDisbursed { .. } => schemas::ESCROW_DISBURSEMENT_V1,
            StageEvent::StatementIngested { .. } => schemas::CASH_STMT_INGESTED_V1,
            StageEvent::CashReconciled { .. } => schemas::CASH_RECONCILED_V1,
            StageEvent::LateFeeAssessed { .. } => schemas::LATEFEE_ASSESSED_V1,
            StageEvent::DelinquencyStatusChanged { .. } => schemas::DELINQUENCY_STATUS_CHANGED_V1,
            StageEvent::ForeclosureCaseOpened { .. } => schemas::FORECLOSURE_CASE_OPENED_V1,
            StageEvent::ForeclosureMilestoneHit { .. } => schemas::FORECLOSURE_MILESTONE_HIT_V1,
        }
    }

    /// Topic exchange the event belongs on.
    pub fn exchange(&self) -> &'static str {
        match self {
            StageEvent::PaymentReceived { .. } | StageEvent::PaymentValidated { .. } => {
                exchanges::PAYMENTS_VALIDATION
            }
            StageEvent::PaymentPosted { .. }
            | StageEvent::PaymentFailed { .. }
            | StageEvent::PaymentReversalRequested { .. } => exchanges::PAYMENTS_EVENTS,
            StageEvent::EscrowForecastRefreshed { .. } | StageEvent::EscrowDisbursed { .. } => {
                exchanges::ESCROW_EVENTS
            }
            StageEvent::StatementIngested { .. } | StageEvent::CashReconciled { .. } => {
                exchanges::CASH_EVENTS
            }
            StageEvent::LateFeeAssessed { .. }
            | StageEvent::DelinquencyStatusChanged { .. }
            | StageEvent::ForeclosureCaseOpened { .. }
            | StageEvent::ForeclosureMilestoneHit { .. } => exchanges::PAYMENTS_EVENTS,
        }
    }

    pub fn to_payload(&self) -> ServicingResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| ServicingError::Internal(format!("encode {}: {e}", self.schema())))
    }

    pub fn decode(schema: &str, payload: Value) -> ServicingResult<StageEvent> {
        let known = [
            schemas::PAYMENT_RECEIVED_V1,
            schemas::PAYMENT_VALIDATED_V1,
            schemas::PAYMENT_POSTED_V1,
            schemas::PAYMENT_FAILED_V1,
            schemas::PAYMENT_REVERSAL_REQUESTED_V1,
            schemas::ESCROW_FORECAST_V1,
            schemas::ESCROW_DISBURSEMENT_V1,
            schemas::CASH_STMT_INGESTED_V1,
            schemas::CASH_RECONCILED_V1,
            schemas::LATEFEE_ASSESSED_V1,
            schemas::DELINQUENCY_STATUS_CHANGED_V1,
            schemas::FORECLOSURE_CASE_OPENED_V1,
            schemas::FORECLOSURE_MILESTONE_HIT_V1,
        ];
        if !known.contains(&schema) {
            return Err(ServicingError::UnknownSchema(schema.to_string()));
        }
        let event: StageEvent = serde_json::from_value(payload)
            .map_err(|e| ServicingError::Internal(format!("decode {schema}: {e}")))?;
        if event.schema() != schema {
            return Err(ServicingError::UnknownSchema(format!(
                "schema tag {schema} does not match payload kind {}",
                event.schema()
            )));
        }
        Ok(event)
    }
}
