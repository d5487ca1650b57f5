use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::domain::{ForeclosureMilestone, PlanStatus};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{
    DelinquencySnapshotModel, ForeclosureCaseModel, ForeclosureEventModel, LateFeeAssessmentModel,
    PaymentPlanModel, PlanInstallmentModel,
};
use servicing_db::repository::CollectionsRepository;

use super::executor::Executor;
use super::utils::parse_col;

pub struct CollectionsRepositoryImpl {
    executor: Executor,
}

impl CollectionsRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn snapshot_from_row(row: &PgRow) -> ServicingResult<DelinquencySnapshotModel> {
        Ok(DelinquencySnapshotModel {
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            as_of_date: row.try_get("as_of_date").map_err(ServicingError::from)?,
            earliest_unpaid_due_date: row
                .try_get("earliest_unpaid_due_date")
                .map_err(ServicingError::from)?,
            unpaid_due_minor: row
                .try_get("unpaid_due_minor")
                .map_err(ServicingError::from)?,
            dpd: row.try_get("dpd").map_err(ServicingError::from)?,
            bucket: parse_col(row, "bucket")?,
        })
    }

    fn late_fee_from_row(row: &PgRow) -> ServicingResult<LateFeeAssessmentModel> {
        Ok(LateFeeAssessmentModel {
            fee_id: row.try_get("fee_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            period_due_date: row
                .try_get("period_due_date")
                .map_err(ServicingError::from)?,
            amount_minor: row.try_get("amount_minor").map_err(ServicingError::from)?,
            template_id: row.try_get("template_id").map_err(ServicingError::from)?,
            event_id: row.try_get("event_id").map_err(ServicingError::from)?,
            assessed_at: row.try_get("assessed_at").map_err(ServicingError::from)?,
        })
    }

    fn plan_from_row(row: &PgRow) -> ServicingResult<PaymentPlanModel> {
        Ok(PaymentPlanModel {
            plan_id: row.try_get("plan_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            status: parse_col(row, "status")?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
            activated_at: row.try_get("activated_at").map_err(ServicingError::from)?,
            closed_at: row.try_get("closed_at").map_err(ServicingError::from)?,
        })
    }

    fn installment_from_row(row: &PgRow) -> ServicingResult<PlanInstallmentModel> {
        Ok(PlanInstallmentModel {
            plan_id: row.try_get("plan_id").map_err(ServicingError::from)?,
            installment_no: row
                .try_get("installment_no")
                .map_err(ServicingError::from)?,
            due_date: row.try_get("due_date").map_err(ServicingError::from)?,
            amount_minor: row.try_get("amount_minor").map_err(ServicingError::from)?,
            paid_minor: row.try_get("paid_minor").map_err(ServicingError::from)?,
            status: parse_col(row, "status")?,
        })
    }

    fn case_from_row(row: &PgRow) -> ServicingResult<ForeclosureCaseModel> {
        Ok(ForeclosureCaseModel {
            case_id: row.try_get("case_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            status: parse_col(row, "status")?,
            opened_at: row.try_get("opened_at").map_err(ServicingError::from)?,
            closed_at: row.try_get("closed_at").map_err(ServicingError::from)?,
        })
    }
}

#[async_trait]
impl CollectionsRepository for CollectionsRepositoryImpl {
    async fn upsert_snapshot(&self, snapshot: DelinquencySnapshotModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO delinquency_snapshots \
                     (loan_id, as_of_date, earliest_unpaid_due_date, unpaid_due_minor, dpd, bucket) \
                     VALUES ($1, $2, $3, $4, $5, $6) \
                     ON CONFLICT (loan_id, as_of_date) DO UPDATE SET \
                       earliest_unpaid_due_date = EXCLUDED.earliest_unpaid_due_date, \
                       unpaid_due_minor = EXCLUDED.unpaid_due_minor, \
                       dpd = EXCLUDED.dpd, \
                       bucket = EXCLUDED.bucket",
                )
                .bind(snapshot.loan_id)
                .bind(snapshot.as_of_date)
                .bind(snapshot.earliest_unpaid_due_date)
                .bind(snapshot.unpaid_due_minor)
                .bind(snapshot.dpd)
                .bind(snapshot.bucket.as_str()),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_snapshot(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM delinquency_snapshots WHERE loan_id = $1 AND as_of_date = $2",
                )
                .bind(loan_id)
                .bind(as_of_date),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::snapshot_from_row).transpose()
    }

    async fn latest_snapshot_before(
        &self,
        loan_id: Uuid,
        as_of_date: NaiveDate,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM delinquency_snapshots \
                     WHERE loan_id = $1 AND as_of_date < $2 \
                     ORDER BY as_of_date DESC LIMIT 1",
                )
                .bind(loan_id)
                .bind(as_of_date),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::snapshot_from_row).transpose()
    }

    async fn latest_snapshot(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<DelinquencySnapshotModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM delinquency_snapshots WHERE loan_id = $1 \
                     ORDER BY as_of_date DESC LIMIT 1",
                )
                .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::snapshot_from_row).transpose()
    }

    async fn create_late_fee(&self, fee: LateFeeAssessmentModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO late_fee_assessments \
                     (fee_id, loan_id, period_due_date, amount_minor, template_id, event_id, assessed_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(fee.fee_id)
                .bind(fee.loan_id)
                .bind(fee.period_due_date)
                .bind(fee.amount_minor)
                .bind(&fee.template_id)
                .bind(fee.event_id)
                .bind(fee.assessed_at),
            )
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db_err)
                    if db_err.constraint()
                        == Some("late_fee_assessments_loan_id_period_due_date_key") =>
                {
                    ServicingError::LateFeeAlreadyAssessed {
                        loan_id: fee.loan_id,
                        period_due_date: fee.period_due_date,
                    }
                }
                _ => ServicingError::from(err),
            })?;
        Ok(())
    }

    async fn find_late_fee(
        &self,
        loan_id: Uuid,
        period_due_date: NaiveDate,
    ) -> ServicingResult<Option<LateFeeAssessmentModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM late_fee_assessments \
                     WHERE loan_id = $1 AND period_due_date = $2",
                )
                .bind(loan_id)
                .bind(period_due_date),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::late_fee_from_row).transpose()
    }

    async fn fees_assessed_through(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<i64> {
        let row = self
            .executor
            .fetch_one(
                sqlx::query(
                    "SELECT COALESCE(SUM(amount_minor), 0)::BIGINT AS total \
                     FROM late_fee_assessments \
                     WHERE loan_id = $1 AND period_due_date <= $2",
                )
                .bind(loan_id)
                .bind(as_of),
            )
            .await
            .map_err(ServicingError::from)?;
        row.try_get("total").map_err(ServicingError::from)
    }

    async fn create_plan(
        &self,
        plan: PaymentPlanModel,
        installments: Vec<PlanInstallmentModel>,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO payment_plans \
                     (plan_id, loan_id, status, created_at, activated_at, closed_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(plan.plan_id)
                .bind(plan.loan_id)
                .bind(plan.status.as_str())
                .bind(plan.created_at)
                .bind(plan.activated_at)
                .bind(plan.closed_at),
            )
            .await
            .map_err(ServicingError::from)?;

        for installment in installments {
            self.executor
                .execute(
                    sqlx::query(
                        "INSERT INTO plan_installments \
                         (plan_id, installment_no, due_date, amount_minor, paid_minor, status) \
                         VALUES ($1, $2, $3, $4, $5, $6)",
                    )
                    .bind(installment.plan_id)
                    .bind(installment.installment_no)
                    .bind(installment.due_date)
                    .bind(installment.amount_minor)
                    .bind(installment.paid_minor)
                    .bind(installment.status.as_str()),
                )
                .await
                .map_err(ServicingError::from)?;
        }
        Ok(())
    }

    async fn find_plan(&self, plan_id: Uuid) -> ServicingResult<Option<PaymentPlanModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM payment_plans WHERE plan_id = $1").bind(plan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::plan_from_row).transpose()
    }

    async fn plan_installments(
        &self,
        plan_id: Uuid,
    ) -> ServicingResult<Vec<PlanInstallmentModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM plan_installments WHERE plan_id = $1 ORDER BY installment_no",
                )
                .bind(plan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::installment_from_row).collect()
    }

    async fn active_plan_for_loan(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<PaymentPlanModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM payment_plans WHERE loan_id = $1 AND status = 'active'",
                )
                .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::plan_from_row).transpose()
    }

    async fn update_plan_status(&self, plan_id: Uuid, status: PlanStatus) -> ServicingResult<()> {
        let stamp = match status {
            PlanStatus::Active => "activated_at = now()",
            PlanStatus::Completed | PlanStatus::Defaulted | PlanStatus::Canceled => {
                "closed_at = now()"
            }
            PlanStatus::Draft => "activated_at = activated_at",
        };
        let sql = format!("UPDATE payment_plans SET status = $2, {stamp} WHERE plan_id = $1");
        self.executor
            .execute(sqlx::query(&sql).bind(plan_id).bind(status.as_str()))
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn update_installment(&self, installment: PlanInstallmentModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "UPDATE plan_installments SET paid_minor = $3, status = $4 \
                     WHERE plan_id = $1 AND installment_no = $2",
                )
                .bind(installment.plan_id)
                .bind(installment.installment_no)
                .bind(installment.paid_minor)
                .bind(installment.status.as_str()),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn plans_by_status(&self, status: PlanStatus) -> ServicingResult<Vec<PaymentPlanModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query("SELECT * FROM payment_plans WHERE status = $1 ORDER BY created_at")
                    .bind(status.as_str()),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::plan_from_row).collect()
    }

    async fn create_case(&self, case: ForeclosureCaseModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO foreclosure_cases (case_id, loan_id, status, opened_at, closed_at) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(case.case_id)
                .bind(case.loan_id)
                .bind(case.status.as_str())
                .bind(case.opened_at)
                .bind(case.closed_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_case(&self, case_id: Uuid) -> ServicingResult<Option<ForeclosureCaseModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM foreclosure_cases WHERE case_id = $1").bind(case_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::case_from_row).transpose()
    }

    async fn open_case_for_loan(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<ForeclosureCaseModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM foreclosure_cases WHERE loan_id = $1 AND status = 'open'",
                )
                .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::case_from_row).transpose()
    }

    async fn insert_milestone(&self, event: ForeclosureEventModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO foreclosure_events (case_id, milestone, occurred_on, recorded_at) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(event.case_id)
                .bind(event.milestone.as_str())
                .bind(event.occurred_on)
                .bind(event.recorded_at),
            )
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db_err)
                    if db_err.constraint() == Some("foreclosure_events_pkey") =>
                {
                    ServicingError::DuplicateMilestone {
                        case_id: event.case_id,
                        milestone: event.milestone.as_str().to_string(),
                    }
                }
                _ => ServicingError::from(err),
            })?;
        Ok(())
    }

    async fn milestones_for_case(
        &self,
        case_id: Uuid,
    ) -> ServicingResult<Vec<ForeclosureEventModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM foreclosure_events WHERE case_id = $1 ORDER BY recorded_at",
                )
                .bind(case_id),
            )
            .await
            .map_err(ServicingError::from)?;

        rows.iter()
            .map(|row| {
                Ok(ForeclosureEventModel {
                    case_id: row.try_get("case_id").map_err(ServicingError::from)?,
                    milestone: parse_col(row, "milestone")?,
                    occurred_on: row.try_get("occurred_on").map_err(ServicingError::from)?,
                    recorded_at: row.try_get("recorded_at").map_err(ServicingError::from)?,
                })
            })
            .collect()
    }

    async fn has_milestone(
        &self,
        case_id: Uuid,
        milestone: ForeclosureMilestone,
    ) -> ServicingResult<bool> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT 1 AS present FROM foreclosure_events \
                     WHERE case_id = $1 AND milestone = $2",
                )
                .bind(case_id)
                .bind(milestone.as_str()),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(row.is_some())
    }

    async fn close_case(&self, case_id: Uuid) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "UPDATE foreclosure_cases SET status = 'closed', closed_at = now() \
                     WHERE case_id = $1",
                )
                .bind(case_id),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }
}
