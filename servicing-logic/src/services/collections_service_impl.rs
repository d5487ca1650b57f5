use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use servicing_api::domain::{
    CollectionCaseStatus, DelinquencyBucket, DelinquencySnapshot, EventSchema, ForeclosureCase,
    ForeclosureCaseStatus, ForeclosureMilestone, InstallmentStatus, LateFeeAssessment, LoanStatus,
    MessageEnvelope, PaymentPlan, PaymentSchedule, PlanInstallment, PlanStatus, StageEvent,
};
use servicing_api::service::{CollectionsService, LedgerService};
use servicing_api::{ErrorClass, ServicingError, ServicingResult};
use servicing_db::models::{
    ForeclosureCaseModel, ForeclosureEventModel, LateFeeAssessmentModel, OutboxMessageModel,
    PaymentPlanModel, PlanInstallmentModel,
};
use servicing_db::repository::{
    CollectionsRepository, EscrowRepository, LoanRepository, PaymentRepository,
    ScheduleRepository, UnitOfWork, UnitOfWorkSession,
};

use crate::engines::{delinquency, late_fee};
use crate::mappers::{CollectionsMapper, ScheduleMapper};
use crate::services::ledger_service_impl::LedgerServiceImpl;
use crate::services::policy_service::PolicyService;

pub struct CollectionsServiceImpl {
    unit_of_work: Arc<dyn UnitOfWork>,
    collections_repository: Arc<dyn CollectionsRepository>,
    schedule_repository: Arc<dyn ScheduleRepository>,
    payment_repository: Arc<dyn PaymentRepository>,
    escrow_repository: Arc<dyn EscrowRepository>,
    loan_repository: Arc<dyn LoanRepository>,
    policy_service: Arc<PolicyService>,
}

impl CollectionsServiceImpl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unit_of_work: Arc<dyn UnitOfWork>,
        collections_repository: Arc<dyn CollectionsRepository>,
        schedule_repository: Arc<dyn ScheduleRepository>,
        payment_repository: Arc<dyn PaymentRepository>,
        escrow_repository: Arc<dyn EscrowRepository>,
        loan_repository: Arc<dyn LoanRepository>,
        policy_service: Arc<PolicyService>,
    ) -> Self {
        Self {
            unit_of_work,
            collections_repository,
            schedule_repository,
            payment_repository,
            escrow_repository,
            loan_repository,
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

    async fn active_schedule(&self, loan_id: Uuid) -> ServicingResult<Option<PaymentSchedule>> {
        let Some(plan) = self.schedule_repository.find_active(loan_id).await? else {
            return Ok(None);
        };
        let rows = self
            .schedule_repository
            .rows_for_schedule(plan.schedule_id)
            .await?;
        Ok(Some(ScheduleMapper::plan_from_models(plan, rows)))
    }

    async fn monthly_escrow_target(&self, loan_id: Uuid) -> ServicingResult<i64> {
        Ok(self
            .escrow_repository
            .latest_analysis(loan_id)
            .await?
            .map(|analysis| analysis.new_monthly_target_minor)
            .unwrap_or(0))
    }
}

#[async_trait]
impl CollectionsService for CollectionsServiceImpl {
    async fn compute_delinquency(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<DelinquencySnapshot> {
        let schedule = self.active_schedule(loan_id).await?;
        let rows = schedule.as_ref().map(|plan| plan.rows.as_slice()).unwrap_or(&[]);

        let monthly_escrow = self.monthly_escrow_target(loan_id).await?;
        let fees_assessed = self
            .collections_repository
            .fees_assessed_through(loan_id, as_of_date)
            .await?;
        let applied = self
            .payment_repository
            .applied_through(loan_id, as_of_date)
            .await?;

        let standing = delinquency::compute(
            delinquency::DelinquencyInput {
                rows,
                monthly_escrow_minor: monthly_escrow,
                fees_assessed_minor: fees_assessed,
                applied_total_minor: applied.total_minor(),
            },
            as_of_date,
        );

        let snapshot = DelinquencySnapshot {
            loan_id,
            as_of_date,
            earliest_unpaid_due_date: standing.earliest_unpaid_due_date,
            unpaid_due_minor: standing.unpaid_due_minor,
            dpd: standing.dpd,
            bucket: standing.bucket,
        };

        let previous_bucket = self
            .collections_repository
            .latest_snapshot_before(loan_id, as_of_date)
            .await?
            .map(|model| model.bucket);
        let bucket_changed = previous_bucket != Some(snapshot.bucket)
            && !(previous_bucket.is_none() && snapshot.bucket == DelinquencyBucket::Current);
        let entering_90_plus = snapshot.bucket == DelinquencyBucket::Dpd90Plus
            && previous_bucket != Some(DelinquencyBucket::Dpd90Plus);
        let open_case = self
            .collections_repository
            .open_case_for_loan(loan_id)
            .await?;

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session
                .collections()
                .upsert_snapshot(CollectionsMapper::snapshot_to_model(&snapshot))
                .await?;

            if bucket_changed {
                let event = StageEvent::DelinquencyStatusChanged {
                    loan_id,
                    as_of_date,
                    previous_bucket,
                    bucket: snapshot.bucket,
                    dpd: snapshot.dpd,
                };
                let correlation = format!("delinquency:loan:{loan_id}:{as_of_date}");
                session
                    .outbox()
                    .enqueue(Self::outbox_row(loan_id, &correlation, &event)?)
                    .await?;
            }

            if entering_90_plus && open_case.is_none() {
                let case = ForeclosureCaseModel {
                    case_id: Uuid::new_v4(),
                    loan_id,
                    status: ForeclosureCaseStatus::Open,
                    opened_at: Utc::now(),
                    closed_at: None,
                };
                session.collections().create_case(case.clone()).await?;
                session
                    .loans()
                    .update_collection_case_status(loan_id, CollectionCaseStatus::InCollections)
                    .await?;
                let event = StageEvent::ForeclosureCaseOpened {
                    loan_id,
                    case_id: case.case_id,
                };
                let correlation = format!("foreclosure:loan:{loan_id}:open");
                session
                    .outbox()
                    .enqueue(Self::outbox_row(case.case_id, &correlation, &event)?)
                    .await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                session.commit().await?;
                if bucket_changed {
                    tracing::info!(
                        %loan_id,
                        bucket = snapshot.bucket.as_str(),
                        dpd = snapshot.dpd,
                        "delinquency bucket changed"
                    );
                }
                Ok(snapshot)
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn latest_snapshot(&self, loan_id: Uuid) -> ServicingResult<Option<DelinquencySnapshot>> {
        Ok(self
            .collections_repository
            .latest_snapshot(loan_id)
            .await?
            .map(CollectionsMapper::snapshot_from_model))
    }

    async fn assess_late_fee(
        &self,
        loan_id: Uuid,
        period_due_date: NaiveDate,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Option<LateFeeAssessment>> {
        if self
            .collections_repository
            .find_late_fee(loan_id, period_due_date)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let loan = self
            .loan_repository
            .find_by_id(loan_id)
            .await?
            .ok_or(ServicingError::LoanNotFound(loan_id))?;
        let policy = self.policy_service.fee_policy(&loan.product_code).await?;

        let Some(schedule) = self.active_schedule(loan_id).await? else {
            return Ok(None);
        };
        let Some(row) = schedule
            .rows
            .iter()
            .find(|row| row.due_date == period_due_date)
        else {
            return Ok(None);
        };

        // amount applied toward this period: whatever of the cumulative
        // applied total is left after covering all earlier periods
        let applied = self
            .payment_repository
            .applied_through(loan_id, as_of_date)
            .await?;
        let cumulative_before: i64 = schedule
            .rows
            .iter()
            .filter(|earlier| earlier.due_date < period_due_date)
            .map(|earlier| earlier.total_payment_minor)
            .sum();
        let base_paid = (applied.total_minor() - cumulative_before)
            .clamp(0, row.total_payment_minor);

        let unpaid_total = {
            let fees_assessed = self
                .collections_repository
                .fees_assessed_through(loan_id, as_of_date)
                .await?;
            let scheduled_through: i64 = schedule
                .rows_due_through(as_of_date)
                .map(|r| r.total_payment_minor)
                .sum();
            (scheduled_through + fees_assessed - applied.total_minor()).max(0)
        };

        let context = late_fee::LateFeeContext {
            scheduled_pi_minor: row.principal_minor + row.interest_minor,
            total_due_minor: unpaid_total,
            principal_due_minor: row.principal_minor,
            base_paid_minor: base_paid,
        };

        let Some(amount) = late_fee::compute(&policy, context, period_due_date, as_of_date) else {
            return Ok(None);
        };

        let fee = LateFeeAssessment {
            fee_id: Uuid::new_v4(),
            loan_id,
            period_due_date,
            amount_minor: amount,
            template_id: policy.template_id.clone(),
            event_id: Uuid::nil(),
            assessed_at: Utc::now(),
        };
        let correlation = format!("latefee:loan:{loan_id}:{period_due_date}");

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<LateFeeAssessment> = async {
            let ledger = LedgerServiceImpl::new(session.ledger());
            let event_id = ledger
                .post_event(
                    loan_id,
                    as_of_date,
                    &correlation,
                    EventSchema::LateFeeV1,
                    *b"USD",
                    vec![
                        servicing_api::domain::EntryLine::debit(
                            servicing_api::domain::GlAccount::FeesReceivable,
                            amount,
                            "Late fee",
                        ),
                        servicing_api::domain::EntryLine::credit(
                            servicing_api::domain::GlAccount::LateFeeIncome,
                            amount,
                            "Late fee",
                        ),
                    ],
                )
                .await?;

            let fee = LateFeeAssessment { event_id, ..fee.clone() };
            let model = LateFeeAssessmentModel {
                fee_id: fee.fee_id,
                loan_id,
                period_due_date,
                amount_minor: amount,
                template_id: fee.template_id.clone(),
                event_id,
                assessed_at: fee.assessed_at,
            };
            session.collections().create_late_fee(model).await?;

            let event = StageEvent::LateFeeAssessed {
                loan_id,
                fee_id: fee.fee_id,
                period_due_date,
                amount_minor: amount,
            };
            session
                .outbox()
                .enqueue(Self::outbox_row(fee.fee_id, &correlation, &event)?)
                .await?;
            Ok(fee)
        }
        .await;

        match result {
            Ok(fee) => {
                session.commit().await?;
                tracing::info!(%loan_id, %period_due_date, amount, "late fee assessed");
                Ok(Some(fee))
            }
            Err(err) => {
                session.rollback().await?;
                match err.class() {
                    // lost a race with another assessor for the same period
                    ErrorClass::Dedupe => Ok(None),
                    _ => Err(err),
                }
            }
        }
    }

    async fn create_plan(
        &self,
        loan_id: Uuid,
        installments: Vec<PlanInstallment>,
    ) -> ServicingResult<PaymentPlan> {
        if installments.is_empty() {
            return Err(ServicingError::ValidationError {
                field: "installments".to_string(),
                message: "a plan needs at least one installment".to_string(),
            });
        }
        if self
            .collections_repository
            .active_plan_for_loan(loan_id)
            .await?
            .is_some()
        {
            return Err(ServicingError::ActivePlanExists(loan_id));
        }

        let mut installments = installments;
        installments.sort_by_key(|installment| installment.installment_no);

        let plan = PaymentPlan {
            plan_id: Uuid::new_v4(),
            loan_id,
            status: PlanStatus::Draft,
            installments,
            created_at: Utc::now(),
            activated_at: None,
            closed_at: None,
        };
        let (header, rows) = CollectionsMapper::plan_to_models(&plan);
        self.collections_repository.create_plan(header, rows).await?;
        Ok(plan)
    }

    async fn activate_plan(&self, plan_id: Uuid) -> ServicingResult<PaymentPlan> {
        let model = self
            .collections_repository
            .find_plan(plan_id)
            .await?
            .ok_or(ServicingError::PlanNotFound(plan_id))?;
        if !model.status.can_transition_to(PlanStatus::Active) {
            return Err(ServicingError::InvalidPlanTransition {
                from: model.status.as_str().to_string(),
                to: PlanStatus::Active.as_str().to_string(),
            });
        }
        if self
            .collections_repository
            .active_plan_for_loan(model.loan_id)
            .await?
            .is_some()
        {
            return Err(ServicingError::ActivePlanExists(model.loan_id));
        }
        self.collections_repository
            .update_plan_status(plan_id, PlanStatus::Active)
            .await?;
        let installments = self.collections_repository.plan_installments(plan_id).await?;
        let mut plan = CollectionsMapper::plan_from_models(model, installments);
        plan.status = PlanStatus::Active;
        plan.activated_at = Some(Utc::now());
        Ok(plan)
    }

    async fn cancel_plan(&self, plan_id: Uuid) -> ServicingResult<PaymentPlan> {
        let model = self
            .collections_repository
            .find_plan(plan_id)
            .await?
            .ok_or(ServicingError::PlanNotFound(plan_id))?;
        if !model.status.can_transition_to(PlanStatus::Canceled) {
            return Err(ServicingError::InvalidPlanTransition {
                from: model.status.as_str().to_string(),
                to: PlanStatus::Canceled.as_str().to_string(),
            });
        }
        self.collections_repository
            .update_plan_status(plan_id, PlanStatus::Canceled)
            .await?;
        let installments = self.collections_repository.plan_installments(plan_id).await?;
        let mut plan = CollectionsMapper::plan_from_models(model, installments);
        plan.status = PlanStatus::Canceled;
        plan.closed_at = Some(Utc::now());
        Ok(plan)
    }

    async fn apply_plan_payment(
        &self,
        plan_id: Uuid,
        amount_minor: i64,
        _paid_on: NaiveDate,
    ) -> ServicingResult<PaymentPlan> {
        let model = self
            .collections_repository
            .find_plan(plan_id)
            .await?
            .ok_or(ServicingError::PlanNotFound(plan_id))?;
        if model.status != PlanStatus::Active {
            return Err(ServicingError::InvalidPlanTransition {
                from: model.status.as_str().to_string(),
                to: "payment application".to_string(),
            });
        }

        let mut installments = self.collections_repository.plan_installments(plan_id).await?;
        installments.sort_by_key(|installment| installment.installment_no);

        let mut remaining = amount_minor.max(0);
        for installment in installments.iter_mut() {
            if remaining == 0 {
                break;
            }
            if installment.status == InstallmentStatus::Paid {
                continue;
            }
            let owed = (installment.amount_minor - installment.paid_minor).max(0);
            let take = remaining.min(owed);
            installment.paid_minor += take;
            remaining -= take;
            installment.status = if installment.paid_minor >= installment.amount_minor {
                InstallmentStatus::Paid
            } else if installment.paid_minor > 0 {
                InstallmentStatus::Partial
            } else {
                InstallmentStatus::Pending
            };
            self.collections_repository
                .update_installment(installment.clone())
                .await?;
        }

        let all_paid = installments
            .iter()
            .all(|installment| installment.status == InstallmentStatus::Paid);
        let mut plan = CollectionsMapper::plan_from_models(model, installments);
        if all_paid {
            self.collections_repository
                .update_plan_status(plan_id, PlanStatus::Completed)
                .await?;
            plan.status = PlanStatus::Completed;
            plan.closed_at = Some(Utc::now());
            tracing::info!(%plan_id, "payment plan completed");
        }
        Ok(plan)
    }

    async fn sweep_defaulted_plans(&self, as_of_date: NaiveDate) -> ServicingResult<Vec<Uuid>> {
        let active = self
            .collections_repository
            .plans_by_status(PlanStatus::Active)
            .await?;

        let mut defaulted = Vec::new();
        for plan in active {
            let installments = self
                .collections_repository
                .plan_installments(plan.plan_id)
                .await?;
            let past_due_unpaid = installments.iter().any(|installment| {
                installment.due_date < as_of_date
                    && matches!(
                        installment.status,
                        InstallmentStatus::Pending | InstallmentStatus::Partial
                    )
            });
            if past_due_unpaid {
                self.collections_repository
                    .update_plan_status(plan.plan_id, PlanStatus::Defaulted)
                    .await?;
                defaulted.push(plan.plan_id);
                tracing::info!(plan_id = %plan.plan_id, loan_id = %plan.loan_id, "payment plan defaulted");
            }
        }
        Ok(defaulted)
    }

    async fn open_foreclosure_case(&self, loan_id: Uuid) -> ServicingResult<ForeclosureCase> {
        if let Some(existing) = self
            .collections_repository
            .open_case_for_loan(loan_id)
            .await?
        {
            return Ok(CollectionsMapper::case_from_model(existing));
        }

        let case = ForeclosureCaseModel {
            case_id: Uuid::new_v4(),
            loan_id,
            status: ForeclosureCaseStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
        };

        let event = StageEvent::ForeclosureCaseOpened {
            loan_id,
            case_id: case.case_id,
        };
        let correlation = format!("foreclosure:loan:{loan_id}:open");

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session.collections().create_case(case.clone()).await?;
            session
                .loans()
                .update_collection_case_status(loan_id, CollectionCaseStatus::InCollections)
                .await?;
            session
                .outbox()
                .enqueue(Self::outbox_row(case.case_id, &correlation, &event)?)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                session.commit().await?;
                tracing::info!(%loan_id, case_id = %case.case_id, "foreclosure case opened");
                Ok(CollectionsMapper::case_from_model(case))
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn record_milestone(
        &self,
        case_id: Uuid,
        milestone: ForeclosureMilestone,
        occurred_on: NaiveDate,
    ) -> ServicingResult<ForeclosureCase> {
        let case = self
            .collections_repository
            .find_case(case_id)
            .await?
            .ok_or(ServicingError::ForeclosureCaseNotFound(case_id))?;
        if case.status == ForeclosureCaseStatus::Closed {
            return Err(ServicingError::DuplicateMilestone {
                case_id,
                milestone: milestone.as_str().to_string(),
            });
        }
        if self
            .collections_repository
            .has_milestone(case_id, milestone)
            .await?
        {
            return Err(ServicingError::DuplicateMilestone {
                case_id,
                milestone: milestone.as_str().to_string(),
            });
        }

        let event = StageEvent::ForeclosureMilestoneHit {
            loan_id: case.loan_id,
            case_id,
            milestone,
        };
        let correlation = format!("foreclosure:case:{case_id}:{}", milestone.as_str());

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session
                .collections()
                .insert_milestone(ForeclosureEventModel {
                    case_id,
                    milestone,
                    occurred_on,
                    recorded_at: Utc::now(),
                })
                .await?;

            if milestone.is_terminal() {
                session.collections().close_case(case_id).await?;
                let status = if milestone == ForeclosureMilestone::SaleCompleted {
                    CollectionCaseStatus::Closed
                } else {
                    CollectionCaseStatus::Normal
                };
                session
                    .loans()
                    .update_collection_case_status(case.loan_id, status)
                    .await?;

                // a completed sale charges off whatever principal the
                // proceeds did not recover and retires the loan
                if milestone == ForeclosureMilestone::SaleCompleted {
                    let ledger = LedgerServiceImpl::new(session.ledger());
                    let remaining = ledger.latest_balances(case.loan_id).await?.principal_minor;
                    if remaining > 0 {
                        let charge_off_correlation =
                            format!("chargeoff:loan:{}", case.loan_id);
                        match ledger
                            .post_charge_off(
                                case.loan_id,
                                occurred_on,
                                &charge_off_correlation,
                                remaining,
                            )
                            .await
                        {
                            Ok(_) => {}
                            // an earlier sale attempt already charged off
                            Err(err) if err.class() == ErrorClass::Dedupe => {}
                            Err(err) => return Err(err),
                        }
                    }
                    session
                        .loans()
                        .update_status(case.loan_id, LoanStatus::ChargedOff)
                        .await?;
                }
            }

            session
                .outbox()
                .enqueue(Self::outbox_row(case_id, &correlation, &event)?)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                session.commit().await?;
                let mut updated = CollectionsMapper::case_from_model(case);
                if milestone.is_terminal() {
                    updated.status = ForeclosureCaseStatus::Closed;
                    updated.closed_at = Some(Utc::now());
                }
                tracing::info!(
                    %case_id,
                    milestone = milestone.as_str(),
                    "foreclosure milestone recorded"
                );
                Ok(updated)
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn open_case_for_loan(&self, loan_id: Uuid) -> ServicingResult<Option<ForeclosureCase>> {
        Ok(self
            .collections_repository
            .open_case_for_loan(loan_id)
            .await?
            .map(CollectionsMapper::case_from_model))
    }
}
