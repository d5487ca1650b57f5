use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use servicing_api::domain::{
    AllocationHints, EntryLine, EventSchema, LoanBalances, MessageEnvelope, Outstanding,
    PaymentIntake, PaymentPosting, PaymentType, PaymentValidation, StageEvent, WaterfallBucket,
};
use servicing_api::service::{GatewayPaymentEvent, IntakeOutcome, LedgerService, PaymentService};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{AuditRecordModel, OutboxMessageModel};
use servicing_db::repository::{
    CollectionsRepository, EscrowRepository, LedgerRepository, LoanRepository, PaymentRepository,
    ScheduleRepository, UnitOfWork, UnitOfWorkSession,
};

use crate::engines::allocation::allocate_payment;
use crate::mappers::{currency_from_str, LedgerMapper, PaymentMapper, ScheduleMapper};
use crate::services::ledger_service_impl::LedgerServiceImpl;
use crate::services::policy_service::PolicyService;

/// The three pipeline stages. Each stage opens one unit of work per
/// message so its rows and outbox entry commit atomically; the poster
/// additionally posts the ledger event inside the same transaction.
pub struct PaymentServiceImpl {
    unit_of_work: Arc<dyn UnitOfWork>,
    payment_repository: Arc<dyn PaymentRepository>,
    ledger_repository: Arc<dyn LedgerRepository>,
    loan_repository: Arc<dyn LoanRepository>,
    schedule_repository: Arc<dyn ScheduleRepository>,
    collections_repository: Arc<dyn CollectionsRepository>,
    escrow_repository: Arc<dyn EscrowRepository>,
    policy_service: Arc<PolicyService>,
}

impl PaymentServiceImpl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unit_of_work: Arc<dyn UnitOfWork>,
        payment_repository: Arc<dyn PaymentRepository>,
        ledger_repository: Arc<dyn LedgerRepository>,
        loan_repository: Arc<dyn LoanRepository>,
        schedule_repository: Arc<dyn ScheduleRepository>,
        collections_repository: Arc<dyn CollectionsRepository>,
        escrow_repository: Arc<dyn EscrowRepository>,
        policy_service: Arc<PolicyService>,
    ) -> Self {
        Self {
            unit_of_work,
            payment_repository,
            ledger_repository,
            loan_repository,
            schedule_repository,
            collections_repository,
            escrow_repository,
            policy_service,
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

    fn audit_row(
        entity_id: Uuid,
        stage: &str,
        outcome: &str,
        payload: &serde_json::Value,
    ) -> AuditRecordModel {
        AuditRecordModel {
            audit_id: Uuid::new_v4(),
            entity_id,
            stage: stage.to_string(),
            outcome: outcome.to_string(),
            payload_hash: blake3::hash(payload.to_string().as_bytes())
                .to_hex()
                .to_string(),
            recorded_at: Utc::now(),
        }
    }

    /// Poster-side outstanding: ledger-derived balances plus the current
    /// period's scheduled interest. Receivable interest beyond the
    /// current period counts as past due only once the loan has a
    /// delinquent snapshot.
    async fn outstanding_for(
        &self,
        intake: &PaymentIntake,
    ) -> ServicingResult<(Outstanding, LoanBalances)> {
        let sums = self
            .ledger_repository
            .account_sums_for_loan(intake.loan_id)
            .await?;
        let balances = LedgerMapper::balances_from_sums(&sums);

        let interest_total = balances.interest_receivable_minor.max(0);
        let current_period_interest = match self
            .schedule_repository
            .find_active(intake.loan_id)
            .await?
        {
            Some(plan) => {
                let rows = self
                    .schedule_repository
                    .rows_for_schedule(plan.schedule_id)
                    .await?;
                let schedule = ScheduleMapper::plan_from_models(plan, rows);
                schedule
                    .current_period(intake.effective_date)
                    .map(|row| row.interest_minor)
                    .unwrap_or(interest_total)
            }
            None => interest_total,
        };
        let interest_current = current_period_interest.min(interest_total);

        let delinquent = self
            .collections_repository
            .latest_snapshot(intake.loan_id)
            .await?
            .map(|snapshot| snapshot.dpd > 0)
            .unwrap_or(false);
        let interest_past_due = if delinquent {
            interest_total - interest_current
        } else {
            0
        };

        let escrow_target = self
            .escrow_repository
            .latest_analysis(intake.loan_id)
            .await?
            .map(|analysis| analysis.new_monthly_target_minor)
            .unwrap_or(0);

        let outstanding = Outstanding {
            fees_due_minor: balances.fees_receivable_minor.max(0),
            interest_past_due_minor: interest_past_due,
            interest_current_minor: interest_current,
            principal_minor: balances.principal_minor.max(0),
            escrow_minor: escrow_target.max(0),
        };
        Ok((outstanding, balances))
    }

    fn projected_balances(
        balances: &LoanBalances,
        amount_minor: i64,
        applied: &[servicing_api::domain::Allocation],
    ) -> LoanBalances {
        let mut next = *balances;
        next.cash_minor += amount_minor;
        for allocation in applied {
            match allocation.bucket {
                WaterfallBucket::FeesDue => next.fees_receivable_minor -= allocation.amount_minor,
                WaterfallBucket::InterestPastDue | WaterfallBucket::InterestCurrent => {
                    next.interest_receivable_minor -= allocation.amount_minor
                }
                WaterfallBucket::Principal => next.principal_minor -= allocation.amount_minor,
                WaterfallBucket::Escrow => next.escrow_liability_minor -= allocation.amount_minor,
                WaterfallBucket::Future => next.suspense_minor -= allocation.amount_minor,
            }
        }
        next
    }
}

#[async_trait]
impl PaymentService for PaymentServiceImpl {
    async fn intake(&self, event: GatewayPaymentEvent) -> ServicingResult<IntakeOutcome> {
        let currency = currency_from_str(&event.currency)?;
        let idempotency_key = PaymentIntake::idempotency_key_for(
            event.loan_id,
            &event.gateway_txn_id,
            event.amount_minor,
            &event.currency,
            event.effective_date,
        );

        if let Some(existing) = self
            .payment_repository
            .find_intake_by_key(&idempotency_key)
            .await?
        {
            tracing::debug!(
                loan_id = %event.loan_id,
                gateway_txn_id = %event.gateway_txn_id,
                "duplicate intake dropped"
            );
            return Ok(IntakeOutcome::Duplicate(existing.payment_id));
        }

        let intake = PaymentIntake {
            payment_id: Uuid::new_v4(),
            loan_id: event.loan_id,
            method: event.method,
            amount_minor: event.amount_minor,
            currency,
            received_at: Utc::now(),
            gateway_txn_id: event.gateway_txn_id,
            source: event.source,
            idempotency_key,
            effective_date: event.effective_date,
            payload_hash: blake3::hash(event.raw_payload.to_string().as_bytes())
                .to_hex()
                .to_string(),
            raw_payload: event.raw_payload,
        };

        let received = StageEvent::PaymentReceived {
            payment_id: intake.payment_id,
            loan_id: intake.loan_id,
            amount_minor: intake.amount_minor,
            effective_date: intake.effective_date,
        };
        let correlation = intake.correlation_id();

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session
                .payments()
                .create_intake(PaymentMapper::intake_to_model(&intake))
                .await?;
            session
                .outbox()
                .enqueue(Self::outbox_row(intake.payment_id, &correlation, &received)?)
                .await?;
            session
                .audit()
                .record(Self::audit_row(
                    intake.payment_id,
                    "payment_intake",
                    "accepted",
                    &intake.raw_payload,
                ))
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                session.commit().await?;
                tracing::info!(payment_id = %intake.payment_id, loan_id = %intake.loan_id, "payment intake accepted");
                Ok(IntakeOutcome::Accepted(intake.payment_id))
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn validate(&self, payment_id: Uuid) -> ServicingResult<PaymentValidation> {
        let intake_model = self
            .payment_repository
            .find_intake(payment_id)
            .await?
            .ok_or(ServicingError::PaymentNotFound(payment_id))?;
        let intake = PaymentMapper::intake_from_model(intake_model)?;
        let today = Utc::now().date_naive();

        let mut failure: Option<(String, Option<i64>)> = None;

        let loan = self.loan_repository.find_by_id(intake.loan_id).await?;
        match &loan {
            None => failure = Some((format!("loan {} not found", intake.loan_id), None)),
            Some(loan_model) if loan_model.status.is_terminal() => {
                failure = Some((
                    format!("loan is {}", loan_model.status.as_str()),
                    None,
                ));
            }
            Some(_) => {}
        }

        if failure.is_none() && intake.amount_minor <= 0 {
            failure = Some((format!("non-positive amount {}", intake.amount_minor), None));
        }
        if failure.is_none() && intake.currency != *b"USD" {
            failure = Some((
                format!(
                    "unsupported currency {}",
                    String::from_utf8_lossy(&intake.currency)
                ),
                None,
            ));
        }
        if failure.is_none() && intake.effective_date > today {
            let retry_after = (intake.effective_date - today).num_days() * 86_400;
            failure = Some((
                format!("effective date {} is in the future", intake.effective_date),
                Some(retry_after),
            ));
        }

        let validation = match failure {
            Some((reason, retry_after)) => {
                let mut invalid =
                    PaymentValidation::invalid(payment_id, intake.effective_date, reason);
                invalid.retry_after_secs = retry_after;
                invalid
            }
            None => {
                let mut hints = AllocationHints::default();
                if let Some(plan) = self.schedule_repository.find_active(intake.loan_id).await? {
                    let rows = self
                        .schedule_repository
                        .rows_for_schedule(plan.schedule_id)
                        .await?;
                    let schedule = ScheduleMapper::plan_from_models(plan, rows);
                    let current_row = schedule
                        .rows
                        .iter()
                        .filter(|row| row.due_date <= intake.effective_date)
                        .next_back();
                    if let Some(row) = current_row {
                        hints.scheduled_total_minor = Some(row.total_payment_minor);
                        hints.payment_type = Some(match intake
                            .amount_minor
                            .cmp(&row.total_payment_minor)
                        {
                            std::cmp::Ordering::Equal => PaymentType::Scheduled,
                            std::cmp::Ordering::Greater => PaymentType::Overpayment,
                            std::cmp::Ordering::Less => PaymentType::Partial,
                        });
                    }
                }
                PaymentValidation::valid(payment_id, intake.effective_date, hints)
            }
        };

        let stage_event = if validation.is_valid {
            StageEvent::PaymentValidated {
                payment_id,
                loan_id: intake.loan_id,
            }
        } else {
            StageEvent::PaymentFailed {
                payment_id,
                loan_id: intake.loan_id,
                reason: validation.reason.clone().unwrap_or_default(),
                retry_after_secs: validation.retry_after_secs,
            }
        };
        let correlation = intake.correlation_id();

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session
                .payments()
                .upsert_validation(PaymentMapper::validation_to_model(&validation))
                .await?;
            session
                .outbox()
                .enqueue(Self::outbox_row(payment_id, &correlation, &stage_event)?)
                .await?;
            session
                .audit()
                .record(Self::audit_row(
                    payment_id,
                    "payment_validation",
                    if validation.is_valid { "valid" } else { "invalid" },
                    &intake.raw_payload,
                ))
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                session.commit().await?;
                Ok(validation)
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn post(&self, payment_id: Uuid) -> ServicingResult<PaymentPosting> {
        let intake_model = self
            .payment_repository
            .find_intake(payment_id)
            .await?
            .ok_or(ServicingError::PaymentNotFound(payment_id))?;
        let intake = PaymentMapper::intake_from_model(intake_model)?;

        let validation = self
            .payment_repository
            .find_validation(payment_id)
            .await?
            .ok_or_else(|| ServicingError::ValidationError {
                field: "payment_id".to_string(),
                message: format!("payment {payment_id} has not been validated"),
            })?;
        if !validation.is_valid {
            return Err(ServicingError::ValidationError {
                field: "payment_id".to_string(),
                message: validation.reason.unwrap_or_else(|| "invalid payment".to_string()),
            });
        }

        // idempotent re-entry: the posting row is the record of truth
        if let Some(existing) = self.payment_repository.find_posting(payment_id).await? {
            return PaymentMapper::posting_from_model(existing);
        }

        let loan = self
            .loan_repository
            .find_by_id(intake.loan_id)
            .await?
            .ok_or(ServicingError::LoanNotFound(intake.loan_id))?;
        let policy = self.policy_service.product_policy(&loan.product_code).await?;

        let (outstanding, balances) = self.outstanding_for(&intake).await?;
        let applied = allocate_payment(intake.amount_minor, &policy.payment_waterfall, &outstanding);

        let correlation = intake.correlation_id();
        let posting = PaymentPosting {
            payment_id,
            event_id: Uuid::nil(),
            applied: applied.clone(),
            new_balances: Self::projected_balances(&balances, intake.amount_minor, &applied),
            posted_at: Utc::now(),
        };

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<PaymentPosting> = async {
            let ledger = LedgerServiceImpl::new(session.ledger());
            // nothing outstanding absorbs the payment: book the canonical
            // received-into-suspense posting
            let all_suspense =
                applied.len() == 1 && applied[0].bucket == WaterfallBucket::Future;
            let event_id = if all_suspense {
                ledger
                    .post_payment_received(
                        intake.loan_id,
                        intake.effective_date,
                        &correlation,
                        intake.amount_minor,
                    )
                    .await?
            } else {
                let mut lines = vec![EntryLine::debit(
                    servicing_api::domain::GlAccount::Cash,
                    intake.amount_minor,
                    "Payment received",
                )];
                for allocation in &applied {
                    let (account, memo) = allocation.bucket.credit_account();
                    lines.push(EntryLine::credit(account, allocation.amount_minor, memo));
                }
                ledger
                    .post_event(
                        intake.loan_id,
                        intake.effective_date,
                        &correlation,
                        EventSchema::PaymentV1,
                        intake.currency,
                        lines,
                    )
                    .await?
            };

            let posting = PaymentPosting {
                event_id,
                ..posting.clone()
            };
            let posted_event = StageEvent::PaymentPosted {
                payment_id,
                loan_id: intake.loan_id,
                event_id,
                applied: posting.applied.clone(),
                new_balances: posting.new_balances,
            };

            session
                .payments()
                .create_posting(PaymentMapper::posting_to_model(&posting)?)
                .await?;
            session
                .outbox()
                .enqueue(Self::outbox_row(event_id, &correlation, &posted_event)?)
                .await?;
            session
                .audit()
                .record(Self::audit_row(
                    payment_id,
                    "payment_posting",
                    "posted",
                    &intake.raw_payload,
                ))
                .await?;
            Ok(posting)
        }
        .await;

        match result {
            Ok(posting) => {
                session.commit().await?;
                tracing::info!(
                    %payment_id,
                    loan_id = %intake.loan_id,
                    event_id = %posting.event_id,
                    amount = intake.amount_minor,
                    "payment posted"
                );
                Ok(posting)
            }
            Err(err) => {
                session.rollback().await?;
                // another consumer may have won the race; the correlation
                // id already produced an event and a posting row
                if matches!(err, ServicingError::DuplicateCorrelation(_)) {
                    if let Some(existing) =
                        self.payment_repository.find_posting(payment_id).await?
                    {
                        return PaymentMapper::posting_from_model(existing);
                    }
                }
                Err(err)
            }
        }
    }

    async fn reverse(
        &self,
        payment_id: Uuid,
        effective_date: chrono::NaiveDate,
    ) -> ServicingResult<Uuid> {
        let posting = self
            .payment_repository
            .find_posting(payment_id)
            .await?
            .ok_or(ServicingError::PaymentNotFound(payment_id))?;

        let correlation = format!("reversal:payment:{payment_id}");
        if let Some(existing) = self
            .ledger_repository
            .find_by_correlation(&correlation)
            .await?
        {
            return Ok(existing.event_id);
        }

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<Uuid> = async {
            let ledger = LedgerServiceImpl::new(session.ledger());
            let event_id = ledger
                .reverse_event(posting.event_id, &correlation, effective_date)
                .await?;
            let payload = serde_json::json!({ "reversed_event_id": posting.event_id });
            session
                .audit()
                .record(Self::audit_row(
                    payment_id,
                    "payment_reversal",
                    "reversed",
                    &payload,
                ))
                .await?;
            Ok(event_id)
        }
        .await;

        match result {
            Ok(event_id) => {
                session.commit().await?;
                tracing::info!(%payment_id, %event_id, "payment posting reversed");
                Ok(event_id)
            }
            Err(err) => {
                session.rollback().await?;
                // lost a race with another reversal of the same payment
                if matches!(err, ServicingError::DuplicateCorrelation(_)) {
                    if let Some(existing) = self
                        .ledger_repository
                        .find_by_correlation(&correlation)
                        .await?
                    {
                        return Ok(existing.event_id);
                    }
                }
                Err(err)
            }
        }
    }

    async fn find_intake(&self, payment_id: Uuid) -> ServicingResult<Option<PaymentIntake>> {
        match self.payment_repository.find_intake(payment_id).await? {
            Some(model) => PaymentMapper::intake_from_model(model).map(Some),
            None => Ok(None),
        }
    }

    async fn find_posting(&self, payment_id: Uuid) -> ServicingResult<Option<PaymentPosting>> {
        match self.payment_repository.find_posting(payment_id).await? {
            Some(model) => PaymentMapper::posting_from_model(model).map(Some),
            None => Ok(None),
        }
    }
}
