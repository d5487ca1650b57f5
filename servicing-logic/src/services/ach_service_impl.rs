use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use servicing_api::domain::{
    add_days, classify_return_code, routing_check_digit, AchBatch, AchBatchStatus, AchEntry,
    AchOriginator, AchReturn, MessageEnvelope, PaymentMethod, PaymentSource, ReconExceptionStatus,
    ReturnDisposition, StageEvent,
};
use servicing_api::service::{AchService, NewAchEntry, PaymentService};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{AchBatchModel, AchEntryModel, AchReturnModel, OutboxMessageModel, ReconExceptionModel};
use servicing_db::repository::{AchRepository, CashRepository, UnitOfWork, UnitOfWorkSession};

use crate::engines::nacha;
use crate::mappers::AchMapper;

/// Days after a retryable return before the replacement payment becomes
/// effective.
const RETRY_DELAY_DAYS: u64 = 3;

pub struct AchServiceImpl {
    unit_of_work: Arc<dyn UnitOfWork>,
    ach_repository: Arc<dyn AchRepository>,
    cash_repository: Arc<dyn CashRepository>,
    payment_service: Arc<dyn PaymentService>,
    originator: AchOriginator,
}

impl AchServiceImpl {
    pub fn new(
        unit_of_work: Arc<dyn UnitOfWork>,
        ach_repository: Arc<dyn AchRepository>,
        cash_repository: Arc<dyn CashRepository>,
        payment_service: Arc<dyn PaymentService>,
        originator: AchOriginator,
    ) -> Self {
        Self {
            unit_of_work,
            ach_repository,
            cash_repository,
            payment_service,
            originator,
        }
    }

    fn outbox_row(
        aggregate_id: Uuid,
        correlation_id: &str,
        event: &StageEvent,
    ) -> ServicingResult<OutboxMessageModel> {
        let envelope = MessageEnvelope::wrap(
            event.schema(),
            correlation_id,
            Uuid::new_v4(),
            event.to_payload()?,
        )?;
        Ok(OutboxMessageModel {
            outbox_id: Uuid::new_v4(),
            event_id: aggregate_id,
            exchange: event.exchange().to_string(),
            routing_key: event.schema().to_string(),
            payload: serde_json::to_value(&envelope)
                .map_err(|e| ServicingError::Internal(format!("encode envelope: {e}")))?,
            created_at: Utc::now(),
            published_at: None,
            attempt_count: 0,
            next_retry_at: None,
            last_error: None,
            parked: false,
        })
    }

    async fn require_batch(&self, batch_id: Uuid) -> ServicingResult<AchBatchModel> {
        self.ach_repository
            .find_batch(batch_id)
            .await?
            .ok_or(ServicingError::AchBatchNotFound(batch_id))
    }

    async fn transition_batch(
        &self,
        batch_id: Uuid,
        next: AchBatchStatus,
    ) -> ServicingResult<AchBatch> {
        let batch = self.require_batch(batch_id).await?;
        if !batch.status.can_transition_to(next) {
            return Err(ServicingError::BatchNotOpen {
                batch_id,
                status: batch.status.as_str().to_string(),
            });
        }
        self.ach_repository.update_batch_status(batch_id, next).await?;
        Ok(AchMapper::batch_from_model(AchBatchModel {
            status: next,
            ..batch
        }))
    }
}

#[async_trait]
impl AchService for AchServiceImpl {
    async fn create_batch(
        &self,
        company_entry_description: &str,
        effective_entry_date: NaiveDate,
    ) -> ServicingResult<AchBatch> {
        let batch = AchBatchModel {
            batch_id: Uuid::new_v4(),
            status: AchBatchStatus::Open,
            company_entry_description: company_entry_description.to_string(),
            effective_entry_date,
            entry_count: 0,
            debit_total_minor: 0,
            credit_total_minor: 0,
            entry_hash: 0,
            sealed_at: None,
            created_at: Utc::now(),
        };
        self.ach_repository.create_batch(batch.clone()).await?;
        tracing::info!(batch_id = %batch.batch_id, "ACH batch opened");
        Ok(AchMapper::batch_from_model(batch))
    }

    async fn add_entry(&self, batch_id: Uuid, entry: NewAchEntry) -> ServicingResult<AchEntry> {
        let batch = self.require_batch(batch_id).await?;
        if batch.status != AchBatchStatus::Open {
            return Err(ServicingError::BatchNotOpen {
                batch_id,
                status: batch.status.as_str().to_string(),
            });
        }
        if entry.amount_minor <= 0 {
            return Err(ServicingError::InvalidPaymentAmount(entry.amount_minor));
        }

        let routing = entry.rdfi_routing.as_str();
        let valid_routing = routing.len() == 9
            && routing_check_digit(&routing[..8])
                .map(|digit| digit.to_string() == routing[8..])
                .unwrap_or(false);
        if !valid_routing {
            return Err(ServicingError::InvalidRoutingNumber(routing.to_string()));
        }

        let model = AchEntryModel {
            entry_id: Uuid::new_v4(),
            batch_id,
            loan_id: entry.loan_id,
            txn_code: entry.txn_code,
            rdfi_routing: routing.to_string(),
            account_number_masked: entry.account_number_masked.to_string(),
            amount_minor: entry.amount_minor,
            individual_name: entry.individual_name.to_string(),
            trace_number: None,
        };
        self.ach_repository.add_entry(model.clone()).await?;
        Ok(AchMapper::entry_from_model(model))
    }

    async fn seal_batch(&self, batch_id: Uuid) -> ServicingResult<AchBatch> {
        let batch = self.require_batch(batch_id).await?;
        if batch.status != AchBatchStatus::Open {
            return Err(ServicingError::BatchNotOpen {
                batch_id,
                status: batch.status.as_str().to_string(),
            });
        }

        let mut entries = self.ach_repository.entries_for_batch(batch_id).await?;
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.trace_number = Some(nacha::trace_number(
                &self.originator.odfi_routing,
                index as u32 + 1,
            ));
        }

        let sealed = AchBatchModel {
            status: AchBatchStatus::Sealed,
            entry_count: entries.len() as i32,
            debit_total_minor: entries
                .iter()
                .filter(|entry| entry.txn_code.is_debit())
                .map(|entry| entry.amount_minor)
                .sum(),
            credit_total_minor: entries
                .iter()
                .filter(|entry| !entry.txn_code.is_debit())
                .map(|entry| entry.amount_minor)
                .sum(),
            entry_hash: nacha::entry_hash(&entries),
            sealed_at: Some(Utc::now()),
            ..batch
        };

        self.ach_repository
            .seal_batch(sealed.clone(), entries)
            .await?;
        tracing::info!(
            %batch_id,
            entries = sealed.entry_count,
            debits = sealed.debit_total_minor,
            credits = sealed.credit_total_minor,
            "ACH batch sealed"
        );
        Ok(AchMapper::batch_from_model(sealed))
    }

    async fn generate_file(&self, batch_id: Uuid) -> ServicingResult<String> {
        let batch = self.require_batch(batch_id).await?;
        if batch.status != AchBatchStatus::Sealed {
            return Err(ServicingError::BatchNotOpen {
                batch_id,
                status: batch.status.as_str().to_string(),
            });
        }
        let entries = self.ach_repository.entries_for_batch(batch_id).await?;
        let now = Utc::now();
        let file = nacha::build_file(
            &self.originator,
            &batch,
            &entries,
            now.date_naive(),
            now.time(),
        )?;
        self.ach_repository
            .update_batch_status(batch_id, AchBatchStatus::Filed)
            .await?;
        tracing::info!(%batch_id, lines = file.lines().count(), "NACHA file generated");
        Ok(file)
    }

    async fn mark_settled(&self, batch_id: Uuid) -> ServicingResult<AchBatch> {
        self.transition_batch(batch_id, AchBatchStatus::Settled).await
    }

    async fn mark_failed(&self, batch_id: Uuid) -> ServicingResult<AchBatch> {
        self.transition_batch(batch_id, AchBatchStatus::Failed).await
    }

    async fn process_return(
        &self,
        trace_number: &str,
        return_code: &str,
        return_date: NaiveDate,
        addenda: Option<String>,
    ) -> ServicingResult<AchReturn> {
        let entry = self
            .ach_repository
            .find_entry_by_trace(trace_number)
            .await?
            .ok_or_else(|| ServicingError::AchEntryNotFound(trace_number.to_string()))?;

        if let Some(existing) = self
            .ach_repository
            .find_return_for_entry(entry.entry_id)
            .await?
        {
            return Ok(AchMapper::return_from_model(existing));
        }

        let ach_return = AchReturnModel {
            return_id: Uuid::new_v4(),
            entry_id: entry.entry_id,
            return_code: return_code.to_string(),
            return_date,
            addenda,
            received_at: Utc::now(),
        };

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session.ach().insert_return(ach_return.clone()).await?;
            if let Some(loan_id) = entry.loan_id {
                let event = StageEvent::PaymentReversalRequested {
                    entry_id: entry.entry_id,
                    loan_id,
                    return_code: return_code.to_string(),
                };
                let correlation = format!("achreturn:entry:{}", entry.entry_id);
                session
                    .outbox()
                    .enqueue(Self::outbox_row(entry.entry_id, &correlation, &event)?)
                    .await?;
            }
            Ok(())
        }
        .await;

        if let Err(err) = result {
            session.rollback().await?;
            return Err(err);
        }
        session.commit().await?;

        match classify_return_code(return_code) {
            ReturnDisposition::Retryable => {
                if let Some(loan_id) = entry.loan_id {
                    // re-enter the pipeline; the intake idempotency key
                    // makes repeated return processing harmless
                    let retry = servicing_api::service::GatewayPaymentEvent {
                        loan_id,
                        method: PaymentMethod::Ach,
                        amount_minor: entry.amount_minor,
                        currency: "USD".to_string(),
                        gateway_txn_id: format!("retry:{trace_number}:{return_date}"),
                        source: PaymentSource::Retry,
                        effective_date: add_days(return_date, RETRY_DELAY_DAYS),
                        raw_payload: serde_json::json!({
                            "return_code": return_code,
                            "trace_number": trace_number,
                        }),
                    };
                    self.payment_service.intake(retry).await?;
                    tracing::info!(
                        entry_id = %entry.entry_id,
                        return_code,
                        "retryable ACH return; payment retry scheduled"
                    );
                }
            }
            ReturnDisposition::Exception => {
                let now = Utc::now();
                self.cash_repository
                    .upsert_exception(ReconExceptionModel {
                        // keyed by the originated entry; returns have no
                        // statement line of their own
                        bank_txn_id: entry.entry_id,
                        variance_minor: entry.amount_minor,
                        status: ReconExceptionStatus::New,
                        note: Some(format!("ACH return {return_code}")),
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                tracing::warn!(
                    entry_id = %entry.entry_id,
                    return_code,
                    "non-retryable ACH return; exception opened"
                );
            }
        }

        Ok(AchMapper::return_from_model(ach_return))
    }

    async fn find_batch(&self, batch_id: Uuid) -> ServicingResult<Option<AchBatch>> {
        Ok(self
            .ach_repository
            .find_batch(batch_id)
            .await?
            .map(AchMapper::batch_from_model))
    }

    async fn batch_entries(&self, batch_id: Uuid) -> ServicingResult<Vec<AchEntry>> {
        Ok(self
            .ach_repository
            .entries_for_batch(batch_id)
            .await?
            .into_iter()
            .map(AchMapper::entry_from_model)
            .collect())
    }
}
