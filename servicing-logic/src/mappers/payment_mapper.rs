use servicing_api::domain::{
    Allocation, AllocationHints, LoanBalances, PaymentIntake, PaymentPosting, PaymentValidation,
};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{PaymentIntakeModel, PaymentPostingModel, PaymentValidationModel};

use super::{currency_from_str, currency_to_string};

pub struct PaymentMapper;

impl PaymentMapper {
    pub fn intake_to_model(intake: &PaymentIntake) -> PaymentIntakeModel {
        PaymentIntakeModel {
            payment_id: intake.payment_id,
            loan_id: intake.loan_id,
            method: intake.method,
            amount_minor: intake.amount_minor,
            currency: currency_to_string(intake.currency),
            received_at: intake.received_at,
            gateway_txn_id: intake.gateway_txn_id.clone(),
            source: intake.source,
            idempotency_key: intake.idempotency_key.clone(),
            effective_date: intake.effective_date,
            raw_payload: intake.raw_payload.clone(),
            payload_hash: intake.payload_hash.clone(),
        }
    }

    pub fn intake_from_model(model: PaymentIntakeModel) -> ServicingResult<PaymentIntake> {
        Ok(PaymentIntake {
            payment_id: model.payment_id,
            loan_id: model.loan_id,
            method: model.method,
            amount_minor: model.amount_minor,
            currency: currency_from_str(&model.currency)?,
            received_at: model.received_at,
            gateway_txn_id: model.gateway_txn_id,
            source: model.source,
            idempotency_key: model.idempotency_key,
            effective_date: model.effective_date,
            raw_payload: model.raw_payload,
            payload_hash: model.payload_hash,
        })
    }

    pub fn validation_to_model(validation: &PaymentValidation) -> PaymentValidationModel {
        PaymentValidationModel {
            payment_id: validation.payment_id,
            is_valid: validation.is_valid,
            reason: validation.reason.clone(),
            retry_after_secs: validation.retry_after_secs,
            payment_type: validation.allocation_hints.payment_type,
            scheduled_total_minor: validation.allocation_hints.scheduled_total_minor,
            effective_date: validation.effective_date,
            validated_at: validation.validated_at,
        }
    }

    pub fn validation_from_model(model: PaymentValidationModel) -> PaymentValidation {
        PaymentValidation {
            payment_id: model.payment_id,
            is_valid: model.is_valid,
            reason: model.reason,
            retry_after_secs: model.retry_after_secs,
            allocation_hints: AllocationHints {
                payment_type: model.payment_type,
                scheduled_total_minor: model.scheduled_total_minor,
            },
            effective_date: model.effective_date,
            validated_at: model.validated_at,
        }
    }

    pub fn posting_to_model(posting: &PaymentPosting) -> ServicingResult<PaymentPostingModel> {
        use servicing_api::domain::WaterfallBucket;

        let mut fees = 0;
        let mut interest = 0;
        let mut principal = 0;
        let mut escrow = 0;
        let mut suspense = 0;
        for allocation in &posting.applied {
            match allocation.bucket {
                WaterfallBucket::FeesDue => fees += allocation.amount_minor,
                WaterfallBucket::InterestPastDue | WaterfallBucket::InterestCurrent => {
                    interest += allocation.amount_minor
                }
                WaterfallBucket::Principal => principal += allocation.amount_minor,
                WaterfallBucket::Escrow => escrow += allocation.amount_minor,
                WaterfallBucket::Future => suspense += allocation.amount_minor,
            }
        }

        Ok(PaymentPostingModel {
            payment_id: posting.payment_id,
            event_id: posting.event_id,
            applied_fees_minor: fees,
            applied_interest_minor: interest,
            applied_principal_minor: principal,
            applied_escrow_minor: escrow,
            applied_suspense_minor: suspense,
            applied_json: serde_json::to_value(&posting.applied)
                .map_err(|e| ServicingError::Internal(format!("encode applied: {e}")))?,
            new_balances_json: serde_json::to_value(posting.new_balances)
                .map_err(|e| ServicingError::Internal(format!("encode balances: {e}")))?,
            posted_at: posting.posted_at,
        })
    }

    pub fn posting_from_model(model: PaymentPostingModel) -> ServicingResult<PaymentPosting> {
        let applied: Vec<Allocation> = serde_json::from_value(model.applied_json)
            .map_err(|e| ServicingError::Internal(format!("decode applied: {e}")))?;
        let new_balances: LoanBalances = serde_json::from_value(model.new_balances_json)
            .map_err(|e| ServicingError::Internal(format!("decode balances: {e}")))?;
        Ok(PaymentPosting {
            payment_id: model.payment_id,
            event_id: model.event_id,
            applied,
            new_balances,
            posted_at: model.posted_at,
        })
    }
}
