use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use servicing_api::domain::per_diem;
use servicing_api::service::{
    CollectionsService, CycleReport, CycleTask, EscrowService, LedgerService,
    ServicingCycleService,
};
use servicing_api::{ErrorClass, ServicingResult};
use servicing_db::models::LoanModel;
use servicing_db::repository::{LoanRepository, ScheduleRepository};

use crate::mappers::ScheduleMapper;
use crate::services::policy_service::PolicyService;

/// Daily scheduler fanning out per-loan servicing work through the
/// typed service dependencies.
pub struct ServicingCycleImpl {
    loan_repository: Arc<dyn LoanRepository>,
    schedule_repository: Arc<dyn ScheduleRepository>,
    ledger_service: Arc<dyn LedgerService>,
    collections_service: Arc<dyn CollectionsService>,
    escrow_service: Arc<dyn EscrowService>,
    policy_service: Arc<PolicyService>,
}

impl ServicingCycleImpl {
    pub fn new(
        loan_repository: Arc<dyn LoanRepository>,
        schedule_repository: Arc<dyn ScheduleRepository>,
        ledger_service: Arc<dyn LedgerService>,
        collections_service: Arc<dyn CollectionsService>,
        escrow_service: Arc<dyn EscrowService>,
        policy_service: Arc<PolicyService>,
    ) -> Self {
        Self {
            loan_repository,
            schedule_repository,
            ledger_service,
            collections_service,
            escrow_service,
            policy_service,
        }
    }

    async fn accrue_interest(
        &self,
        loan: &LoanModel,
        processing_date: NaiveDate,
    ) -> ServicingResult<()> {
        let balances = self.ledger_service.latest_balances(loan.loan_id).await?;
        if balances.principal_minor <= 0 {
            return Ok(());
        }

        let policy = self.policy_service.product_policy(&loan.product_code).await?;
        let amount = per_diem(
            balances.principal_minor,
            loan.annual_rate_bps,
            policy.default_day_count.base_days(processing_date),
            policy.rounding,
        );
        if amount == 0 {
            return Ok(());
        }

        let correlation = format!("accrual:loan:{}:{processing_date}", loan.loan_id);
        match self
            .ledger_service
            .post_interest_accrual(loan.loan_id, processing_date, &correlation, amount)
            .await
        {
            Ok(_) => Ok(()),
            // the daily job re-runs safely; an existing accrual for the
            // date is not a failure
            Err(err) if err.class() == ErrorClass::Dedupe => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn assess_due_late_fees(
        &self,
        loan: &LoanModel,
        processing_date: NaiveDate,
    ) -> ServicingResult<()> {
        let Some(plan) = self.schedule_repository.find_active(loan.loan_id).await? else {
            return Ok(());
        };
        let rows = self
            .schedule_repository
            .rows_for_schedule(plan.schedule_id)
            .await?;
        let schedule = ScheduleMapper::plan_from_models(plan, rows);

        // bounded lookback keeps the sweep cheap; older periods were
        // handled by earlier cycles
        let lookback_start = processing_date - Duration::days(90);
        for row in schedule
            .rows
            .iter()
            .filter(|row| row.due_date <= processing_date && row.due_date >= lookback_start)
        {
            self.collections_service
                .assess_late_fee(loan.loan_id, row.due_date, processing_date)
                .await?;
        }
        Ok(())
    }

    async fn for_each_loan<F, Fut>(
        &self,
        task: CycleTask,
        processing_date: NaiveDate,
        per_loan: F,
    ) -> ServicingResult<CycleReport>
    where
        F: Fn(LoanModel) -> Fut,
        Fut: std::future::Future<Output = ServicingResult<()>>,
    {
        let mut report = CycleReport::new(task, processing_date);
        for loan in self.loan_repository.list_serviceable().await? {
            let loan_id = loan.loan_id;
            match per_loan(loan).await {
                Ok(()) => report.record_success(),
                Err(err) => {
                    tracing::warn!(%loan_id, task = ?task, error = %err, "cycle task failed for loan");
                    report.record_failure(loan_id, err);
                }
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl ServicingCycleService for ServicingCycleImpl {
    async fn run_daily_cycle(
        &self,
        processing_date: NaiveDate,
    ) -> ServicingResult<Vec<CycleReport>> {
        let mut reports = Vec::new();
        for task in [
            CycleTask::InterestAccrual,
            CycleTask::Delinquency,
            CycleTask::LateFees,
            CycleTask::PlanSweep,
            CycleTask::EscrowForecast,
            CycleTask::EscrowScheduling,
            CycleTask::EscrowDisbursement,
        ] {
            reports.push(self.run_task(task, processing_date).await?);
        }
        tracing::info!(%processing_date, "daily servicing cycle complete");
        Ok(reports)
    }

    async fn run_task(
        &self,
        task: CycleTask,
        processing_date: NaiveDate,
    ) -> ServicingResult<CycleReport> {
        match task {
            CycleTask::InterestAccrual => {
                self.for_each_loan(task, processing_date, |loan| async move {
                    self.accrue_interest(&loan, processing_date).await
                })
                .await
            }
            CycleTask::Delinquency => {
                self.for_each_loan(task, processing_date, |loan| async move {
                    self.collections_service
                        .compute_delinquency(loan.loan_id, processing_date)
                        .await
                        .map(|_| ())
                })
                .await
            }
            CycleTask::LateFees => {
                self.for_each_loan(task, processing_date, |loan| async move {
                    self.assess_due_late_fees(&loan, processing_date).await
                })
                .await
            }
            CycleTask::PlanSweep => {
                let mut report = CycleReport::new(task, processing_date);
                let defaulted = self
                    .collections_service
                    .sweep_defaulted_plans(processing_date)
                    .await?;
                report.processed = defaulted.len() as i64;
                report.succeeded = defaulted.len() as i64;
                Ok(report)
            }
            CycleTask::EscrowForecast => {
                self.for_each_loan(task, processing_date, |loan| async move {
                    self.escrow_service
                        .refresh_forecast(loan.loan_id, processing_date)
                        .await
                        .map(|_| ())
                })
                .await
            }
            CycleTask::EscrowScheduling => {
                self.for_each_loan(task, processing_date, |loan| async move {
                    self.escrow_service
                        .schedule_disbursements(loan.loan_id, processing_date)
                        .await
                        .map(|_| ())
                })
                .await
            }
            CycleTask::EscrowDisbursement => {
                self.for_each_loan(task, processing_date, |loan| async move {
                    self.escrow_service
                        .post_due_disbursements(loan.loan_id, processing_date)
                        .await
                        .map(|_| ())
                })
                .await
            }
        }
    }
}
