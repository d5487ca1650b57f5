use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{
    AppliedTotalsRow, PaymentIntakeModel, PaymentPostingModel, PaymentValidationModel,
};
use servicing_db::repository::PaymentRepository;

use super::executor::Executor;
use super::utils::{parse_col, parse_col_opt};

pub struct PaymentRepositoryImpl {
    executor: Executor,
}

impl PaymentRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn intake_from_row(row: &PgRow) -> ServicingResult<PaymentIntakeModel> {
        Ok(PaymentIntakeModel {
            payment_id: row.try_get("payment_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            method: parse_col(row, "method")?,
            amount_minor: row.try_get("amount_minor").map_err(ServicingError::from)?,
            currency: row.try_get("currency").map_err(ServicingError::from)?,
            received_at: row.try_get("received_at").map_err(ServicingError::from)?,
            gateway_txn_id: row.try_get("gateway_txn_id").map_err(ServicingError::from)?,
            source: parse_col(row, "source")?,
            idempotency_key: row
                .try_get("idempotency_key")
                .map_err(ServicingError::from)?,
            effective_date: row.try_get("effective_date").map_err(ServicingError::from)?,
            raw_payload: row.try_get("raw_payload").map_err(ServicingError::from)?,
            payload_hash: row.try_get("payload_hash").map_err(ServicingError::from)?,
        })
    }

    fn validation_from_row(row: &PgRow) -> ServicingResult<PaymentValidationModel> {
        Ok(PaymentValidationModel {
            payment_id: row.try_get("payment_id").map_err(ServicingError::from)?,
            is_valid: row.try_get("is_valid").map_err(ServicingError::from)?,
            reason: row.try_get("reason").map_err(ServicingError::from)?,
            retry_after_secs: row
                .try_get("retry_after_secs")
                .map_err(ServicingError::from)?,
            payment_type: parse_col_opt(row, "payment_type")?,
            scheduled_total_minor: row
                .try_get("scheduled_total_minor")
                .map_err(ServicingError::from)?,
            effective_date: row.try_get("effective_date").map_err(ServicingError::from)?,
            validated_at: row.try_get("validated_at").map_err(ServicingError::from)?,
        })
    }

    fn posting_from_row(row: &PgRow) -> ServicingResult<PaymentPostingModel> {
        Ok(PaymentPostingModel {
            payment_id: row.try_get("payment_id").map_err(ServicingError::from)?,
            event_id: row.try_get("event_id").map_err(ServicingError::from)?,
            applied_fees_minor: row
                .try_get("applied_fees_minor")
                .map_err(ServicingError::from)?,
            applied_interest_minor: row
                .try_get("applied_interest_minor")
                .map_err(ServicingError::from)?,
            applied_principal_minor: row
                .try_get("applied_principal_minor")
                .map_err(ServicingError::from)?,
            applied_escrow_minor: row
                .try_get("applied_escrow_minor")
                .map_err(ServicingError::from)?,
            applied_suspense_minor: row
                .try_get("applied_suspense_minor")
                .map_err(ServicingError::from)?,
            applied_json: row.try_get("applied_json").map_err(ServicingError::from)?,
            new_balances_json: row
                .try_get("new_balances_json")
                .map_err(ServicingError::from)?,
            posted_at: row.try_get("posted_at").map_err(ServicingError::from)?,
        })
    }
}

#[async_trait]
impl PaymentRepository for PaymentRepositoryImpl {
    async fn create_intake(&self, intake: PaymentIntakeModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO payment_intakes \
                     (payment_id, loan_id, method, amount_minor, currency, received_at, \
                      gateway_txn_id, source, idempotency_key, effective_date, raw_payload, payload_hash) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
                )
                .bind(intake.payment_id)
                .bind(intake.loan_id)
                .bind(intake.method.as_str())
                .bind(intake.amount_minor)
                .bind(&intake.currency)
                .bind(intake.received_at)
                .bind(&intake.gateway_txn_id)
                .bind(intake.source.as_str())
                .bind(&intake.idempotency_key)
                .bind(intake.effective_date)
                .bind(&intake.raw_payload)
                .bind(&intake.payload_hash),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_intake(&self, payment_id: Uuid) -> ServicingResult<Option<PaymentIntakeModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM payment_intakes WHERE payment_id = $1")
                    .bind(payment_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::intake_from_row).transpose()
    }

    async fn find_intake_by_key(
        &self,
        idempotency_key: &str,
    ) -> ServicingResult<Option<PaymentIntakeModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM payment_intakes WHERE idempotency_key = $1")
                    .bind(idempotency_key),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::intake_from_row).transpose()
    }

    async fn upsert_validation(&self, validation: PaymentValidationModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO payment_validations \
                     (payment_id, is_valid, reason, retry_after_secs, payment_type, \
                      scheduled_total_minor, effective_date, validated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     ON CONFLICT (payment_id) DO UPDATE SET \
                       is_valid = EXCLUDED.is_valid, \
                       reason = EXCLUDED.reason, \
                       retry_after_secs = EXCLUDED.retry_after_secs, \
                       payment_type = EXCLUDED.payment_type, \
                       scheduled_total_minor = EXCLUDED.scheduled_total_minor, \
                       validated_at = EXCLUDED.validated_at",
                )
                .bind(validation.payment_id)
                .bind(validation.is_valid)
                .bind(&validation.reason)
                .bind(validation.retry_after_secs)
                .bind(validation.payment_type.map(|t| t.as_str()))
                .bind(validation.scheduled_total_minor)
                .bind(validation.effective_date)
                .bind(validation.validated_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_validation(
        &self,
        payment_id: Uuid,
    ) -> ServicingResult<Option<PaymentValidationModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM payment_validations WHERE payment_id = $1")
                    .bind(payment_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::validation_from_row).transpose()
    }

    async fn create_posting(&self, posting: PaymentPostingModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO payment_postings \
                     (payment_id, event_id, applied_fees_minor, applied_interest_minor, \
                      applied_principal_minor, applied_escrow_minor, applied_suspense_minor, \
                      applied_json, new_balances_json, posted_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                )
                .bind(posting.payment_id)
                .bind(posting.event_id)
                .bind(posting.applied_fees_minor)
                .bind(posting.applied_interest_minor)
                .bind(posting.applied_principal_minor)
                .bind(posting.applied_escrow_minor)
                .bind(posting.applied_suspense_minor)
                .bind(&posting.applied_json)
                .bind(&posting.new_balances_json)
                .bind(posting.posted_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_posting(
        &self,
        payment_id: Uuid,
    ) -> ServicingResult<Option<PaymentPostingModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM payment_postings WHERE payment_id = $1")
                    .bind(payment_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::posting_from_row).transpose()
    }

    async fn applied_through(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<AppliedTotalsRow> {
        let row = self
            .executor
            .fetch_one(
                sqlx::query(
                    "SELECT COALESCE(SUM(p.applied_fees_minor), 0)::BIGINT AS fees_minor, \
                            COALESCE(SUM(p.applied_interest_minor), 0)::BIGINT AS interest_minor, \
                            COALESCE(SUM(p.applied_principal_minor), 0)::BIGINT AS principal_minor, \
                            COALESCE(SUM(p.applied_escrow_minor), 0)::BIGINT AS escrow_minor \
                     FROM payment_postings p \
                     JOIN payment_intakes i ON i.payment_id = p.payment_id \
                     WHERE i.loan_id = $1 AND i.effective_date <= $2",
                )
                .bind(loan_id)
                .bind(as_of),
            )
            .await
            .map_err(ServicingError::from)?;

        Ok(AppliedTotalsRow {
            fees_minor: row.try_get("fees_minor").map_err(ServicingError::from)?,
            interest_minor: row.try_get("interest_minor").map_err(ServicingError::from)?,
            principal_minor: row
                .try_get("principal_minor")
                .map_err(ServicingError::from)?,
            escrow_minor: row.try_get("escrow_minor").map_err(ServicingError::from)?,
        })
    }
}
