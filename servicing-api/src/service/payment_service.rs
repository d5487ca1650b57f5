use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::money::Minor;
use crate::domain::payment::{PaymentIntake, PaymentMethod, PaymentPosting, PaymentSource, PaymentValidation};
use crate::ServicingResult;

/// Raw event handed to the intake stage by the gateway webhook adapter.
#[derive(Debug, Clone)]
pub struct GatewayPaymentEvent {
    pub loan_id: Uuid,
    pub method: PaymentMethod,
    pub amount_minor: Minor,
    pub currency: String,
    pub gateway_txn_id: String,
    pub source: PaymentSource,
    pub effective_date: NaiveDate,
    pub raw_payload: Value,
}

/// Outcome of one intake attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// New intake row written, `payment.received.v1` queued.
    Accepted(Uuid),
    /// Same idempotency key seen before; acked and dropped.
    Duplicate(Uuid),
}

/// The three single-purpose pipeline stages. Each stage writes its rows
/// and its outbox entry in one transaction; publishing happens only via
/// the outbox dispatcher.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Intake stage: dedupe on the idempotency key, persist the raw
    /// payment, queue `payment.received.v1`.
    async fn intake(&self, event: GatewayPaymentEvent) -> ServicingResult<IntakeOutcome>;

    /// Validation stage: §4.5 rules in order; writes the validation row
    /// and queues `payment.validated.v1` or `payment.failed.v1`.
    async fn validate(&self, payment_id: Uuid) -> ServicingResult<PaymentValidation>;

    /// Posting stage: allocate per product waterfall over ledger-derived
    /// outstanding and post the balanced event.
    async fn post(&self, payment_id: Uuid) -> ServicingResult<PaymentPosting>;

    /// Reverse a posted payment: the debit/credit-swapped sibling event
    /// under `posting.reversal.v1`. Idempotent per payment; returns the
    /// reversal event id. Driven by ACH reversal requests and operator
    /// corrections.
    async fn reverse(&self, payment_id: Uuid, effective_date: NaiveDate)
        -> ServicingResult<Uuid>;

    async fn find_intake(&self, payment_id: Uuid) -> ServicingResult<Option<PaymentIntake>>;

    async fn find_posting(&self, payment_id: Uuid) -> ServicingResult<Option<PaymentPosting>>;
}
