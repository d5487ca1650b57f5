use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use servicing_api::domain::{
    add_days, add_months, DisbursementStatus, EntryLine, EscrowAnalysis, EscrowDisbursement,
    EscrowForecastRow, EventSchema, GlAccount, MessageEnvelope, StageEvent,
};
use servicing_api::service::{EscrowService, LedgerService};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{EscrowDisbursementModel, OutboxMessageModel};
use servicing_db::repository::{
    EscrowRepository, LedgerRepository, LoanRepository, UnitOfWork, UnitOfWorkSession,
};

use crate::engines::escrow_analysis;
use crate::mappers::{EscrowMapper, LedgerMapper};
use crate::services::ledger_service_impl::LedgerServiceImpl;
use crate::services::policy_service::PolicyService;

/// Forecast horizon in months.
const HORIZON_MONTHS: u32 = 12;
/// Disbursement scheduling look-ahead in days.
const SCHEDULE_WINDOW_DAYS: u64 = 30;

pub struct EscrowServiceImpl {
    unit_of_work: Arc<dyn UnitOfWork>,
    escrow_repository: Arc<dyn EscrowRepository>,
    ledger_repository: Arc<dyn LedgerRepository>,
    loan_repository: Arc<dyn LoanRepository>,
    policy_service: Arc<PolicyService>,
}

impl EscrowServiceImpl {
    pub fn new(
        unit_of_work: Arc<dyn UnitOfWork>,
        escrow_repository: Arc<dyn EscrowRepository>,
        ledger_repository: Arc<dyn LedgerRepository>,
        loan_repository: Arc<dyn LoanRepository>,
        policy_service: Arc<PolicyService>,
    ) -> Self {
        Self {
            unit_of_work,
            escrow_repository,
            ledger_repository,
            loan_repository,
            policy_service,
        }
    }

    async fn escrow_available(&self, loan_id: Uuid) -> ServicingResult<i64> {
        let sums = self.ledger_repository.account_sums_for_loan(loan_id).await?;
        Ok(LedgerMapper::balances_from_sums(&sums).escrow_available_minor())
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

    /// Post one scheduled disbursement, advancing servicer funds for any
    /// shortfall. Runs in its own unit of work; on failure the row stays
    /// `scheduled` for the next cycle.
    async fn post_one(
        &self,
        disbursement: &EscrowDisbursement,
        as_of_date: NaiveDate,
        pay_when_insufficient: bool,
    ) -> ServicingResult<Option<EscrowDisbursement>> {
        let available = self.escrow_available(disbursement.loan_id).await?;
        let amount = disbursement.amount_minor;
        let covered = available.min(amount).max(0);
        let shortfall = amount - covered;

        if shortfall > 0 && !pay_when_insufficient {
            tracing::warn!(
                disbursement_id = %disbursement.disbursement_id,
                loan_id = %disbursement.loan_id,
                shortfall,
                "escrow balance insufficient and policy forbids advancing"
            );
            return Ok(None);
        }

        let mut lines = Vec::new();
        if shortfall > 0 {
            lines.push(EntryLine::debit(
                GlAccount::EscrowAdvances,
                shortfall,
                "Escrow advance",
            ));
            lines.push(EntryLine::credit(GlAccount::Cash, shortfall, "Escrow advance"));
        }
        if covered > 0 {
            lines.push(EntryLine::debit(
                GlAccount::EscrowLiability,
                covered,
                "Escrow disbursement",
            ));
            lines.push(EntryLine::credit(
                GlAccount::Cash,
                covered,
                "Escrow disbursement",
            ));
        }
        if lines.is_empty() {
            return Ok(None);
        }

        let correlation = format!(
            "escrow:loan:{}:disb:{}",
            disbursement.loan_id, disbursement.disbursement_id
        );

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<Uuid> = async {
            let ledger = LedgerServiceImpl::new(session.ledger());
            let event_id = ledger
                .post_event(
                    disbursement.loan_id,
                    as_of_date,
                    &correlation,
                    EventSchema::EscrowDisbursementV1,
                    *b"USD",
                    lines,
                )
                .await?;
            session
                .escrow()
                .mark_posted(disbursement.disbursement_id, event_id)
                .await?;
            let event = StageEvent::EscrowDisbursed {
                loan_id: disbursement.loan_id,
                disbursement_id: disbursement.disbursement_id,
                event_id,
                amount_minor: amount,
                advanced_minor: shortfall,
            };
            session
                .outbox()
                .enqueue(Self::outbox_row(event_id, &correlation, &event)?)
                .await?;
            Ok(event_id)
        }
        .await;

        match result {
            Ok(event_id) => {
                session.commit().await?;
                tracing::info!(
                    disbursement_id = %disbursement.disbursement_id,
                    loan_id = %disbursement.loan_id,
                    amount,
                    advanced = shortfall,
                    "escrow disbursement posted"
                );
                Ok(Some(EscrowDisbursement {
                    status: DisbursementStatus::Posted,
                    event_id: Some(event_id),
                    ..disbursement.clone()
                }))
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }
}

#[async_trait]
impl EscrowService for EscrowServiceImpl {
    async fn refresh_forecast(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Vec<EscrowForecastRow>> {
        let items = self.escrow_repository.active_items(loan_id).await?;
        let horizon_end = add_months(as_of_date, HORIZON_MONTHS);

        let mut rows = Vec::new();
        for item_model in items {
            let item = EscrowMapper::item_from_model(item_model);
            let step = item.frequency.step_months();

            let mut due = item.next_due_date;
            while due < as_of_date {
                due = add_months(due, step);
            }
            while due <= horizon_end {
                rows.push(EscrowForecastRow {
                    loan_id,
                    escrow_id: item.escrow_id,
                    due_date: due,
                    amount_minor: item.amount_minor,
                });
                due = add_months(due, step);
            }
        }

        let event = StageEvent::EscrowForecastRefreshed {
            loan_id,
            rows: rows.len() as i64,
            horizon_end,
        };
        let correlation = format!("escrow:loan:{loan_id}:forecast:{as_of_date}");

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session
                .escrow()
                .replace_forecast(
                    loan_id,
                    rows.iter().map(EscrowMapper::forecast_to_model).collect(),
                )
                .await?;
            session
                .outbox()
                .enqueue(Self::outbox_row(loan_id, &correlation, &event)?)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                session.commit().await?;
                tracing::debug!(%loan_id, rows = rows.len(), "escrow forecast refreshed");
                Ok(rows)
            }
            Err(err) => {
                session.rollback().await?;
                Err(err)
            }
        }
    }

    async fn schedule_disbursements(
        &self,
        loan_id: Uuid,
        effective_date: NaiveDate,
    ) -> ServicingResult<Vec<EscrowDisbursement>> {
        let window_end = add_days(effective_date, SCHEDULE_WINDOW_DAYS);
        let forecast = self
            .escrow_repository
            .forecast_between(loan_id, effective_date, window_end)
            .await?;

        let mut created = Vec::new();
        for row in forecast {
            let existing = self
                .escrow_repository
                .find_non_canceled(loan_id, row.escrow_id, row.due_date)
                .await?;
            if existing.is_some() {
                continue;
            }
            let model = EscrowDisbursementModel {
                disbursement_id: Uuid::new_v4(),
                loan_id,
                escrow_id: row.escrow_id,
                due_date: row.due_date,
                amount_minor: row.amount_minor,
                status: DisbursementStatus::Scheduled,
                event_id: None,
                created_at: Utc::now(),
            };
            self.escrow_repository.create_disbursement(model.clone()).await?;
            created.push(EscrowMapper::disbursement_from_model(model));
        }

        Ok(created)
    }

    async fn post_due_disbursements(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Vec<EscrowDisbursement>> {
        let loan = self
            .loan_repository
            .find_by_id(loan_id)
            .await?
            .ok_or(ServicingError::LoanNotFound(loan_id))?;
        let policy = self
            .policy_service
            .escrow_policy(&loan.product_code, &loan.jurisdiction)
            .await?;

        let due = self.escrow_repository.scheduled_due(loan_id, as_of_date).await?;
        let mut posted = Vec::new();
        for model in due {
            let disbursement = EscrowMapper::disbursement_from_model(model);
            match self
                .post_one(&disbursement, as_of_date, policy.pay_when_insufficient)
                .await
            {
                Ok(Some(updated)) => posted.push(updated),
                Ok(None) => {}
                Err(err) => {
                    // leave the row scheduled for the next cycle
                    tracing::warn!(
                        disbursement_id = %disbursement.disbursement_id,
                        error = %err,
                        "escrow disbursement posting failed"
                    );
                }
            }
        }
        Ok(posted)
    }

    async fn cancel_disbursement(&self, disbursement_id: Uuid) -> ServicingResult<()> {
        let model = self
            .escrow_repository
            .find_disbursement(disbursement_id)
            .await?
            .ok_or_else(|| {
                ServicingError::NotFound(format!("disbursement {disbursement_id}"))
            })?;
        if model.status != DisbursementStatus::Scheduled {
            return Err(ServicingError::DisbursementNotScheduled {
                disbursement_id,
                status: model.status.as_str().to_string(),
            });
        }
        self.escrow_repository.mark_canceled(disbursement_id).await
    }

    async fn run_annual_analysis(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<EscrowAnalysis> {
        let loan = self
            .loan_repository
            .find_by_id(loan_id)
            .await?
            .ok_or(ServicingError::LoanNotFound(loan_id))?;
        let policy = self
            .policy_service
            .escrow_policy(&loan.product_code, &loan.jurisdiction)
            .await?;

        let period_end = add_months(as_of, HORIZON_MONTHS);
        let forecast: Vec<EscrowForecastRow> = self
            .escrow_repository
            .forecast_between(loan_id, as_of, period_end)
            .await?
            .into_iter()
            .map(EscrowMapper::forecast_from_model)
            .collect();
        let current_balance = self.escrow_available(loan_id).await?;

        let outcome = escrow_analysis::analyze(&policy, current_balance, &forecast, as_of);
        let version = self.escrow_repository.max_analysis_version(loan_id).await? + 1;

        let analysis = EscrowAnalysis {
            analysis_id: Uuid::new_v4(),
            loan_id,
            as_of,
            period_start: as_of,
            period_end,
            annual_expected_minor: outcome.annual_expected_minor,
            cushion_target_minor: outcome.cushion_target_minor,
            current_balance_minor: current_balance,
            lowest_projected_minor: outcome.lowest_projected_minor,
            shortage_minor: outcome.shortage_minor,
            deficiency_minor: outcome.deficiency_minor,
            surplus_minor: outcome.surplus_minor,
            new_monthly_target_minor: outcome.new_monthly_target_minor,
            deficiency_recovery_monthly_minor: outcome.deficiency_recovery_monthly_minor,
            version,
            created_at: Utc::now(),
        };

        // surplus at or above the refund threshold leaves the book unless
        // policy collects it as a target reduction instead
        let refund_minor = if policy.collect_surplus_as_reduction {
            0
        } else {
            analysis.surplus_minor
        };

        let session = self.unit_of_work.begin().await?;
        let result: ServicingResult<()> = async {
            session
                .escrow()
                .insert_analysis(EscrowMapper::analysis_to_model(&analysis))
                .await?;
            if refund_minor > 0 {
                let ledger = LedgerServiceImpl::new(session.ledger());
                let correlation = format!("escrow:loan:{loan_id}:refund:{as_of}:v{version}");
                ledger
                    .post_escrow_payment(
                        loan_id,
                        as_of,
                        &correlation,
                        refund_minor,
                        "Escrow surplus refund",
                    )
                    .await?;
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => session.commit().await?,
            Err(err) => {
                session.rollback().await?;
                return Err(err);
            }
        }

        tracing::info!(
            %loan_id,
            version,
            shortage = analysis.shortage_minor,
            deficiency = analysis.deficiency_minor,
            surplus = analysis.surplus_minor,
            refunded = refund_minor,
            "escrow analysis recorded"
        );
        Ok(analysis)
    }

    async fn latest_analysis(&self, loan_id: Uuid) -> ServicingResult<Option<EscrowAnalysis>> {
        Ok(self
            .escrow_repository
            .latest_analysis(loan_id)
            .await?
            .map(EscrowMapper::analysis_from_model))
    }
}
