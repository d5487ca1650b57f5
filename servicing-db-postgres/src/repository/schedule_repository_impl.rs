use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{PaymentScheduleModel, ScheduleRowModel};
use servicing_db::repository::ScheduleRepository;

use super::executor::Executor;
use super::utils::parse_col;

pub struct ScheduleRepositoryImpl {
    executor: Executor,
}

impl ScheduleRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn plan_from_row(row: &PgRow) -> ServicingResult<PaymentScheduleModel> {
        Ok(PaymentScheduleModel {
            schedule_id: row.try_get("schedule_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            version: row.try_get("version").map_err(ServicingError::from)?,
            active: row.try_get("active").map_err(ServicingError::from)?,
            principal_minor: row
                .try_get("principal_minor")
                .map_err(ServicingError::from)?,
            annual_rate_bps: row
                .try_get("annual_rate_bps")
                .map_err(ServicingError::from)?,
            term_months: row.try_get("term_months").map_err(ServicingError::from)?,
            first_payment_date: row
                .try_get("first_payment_date")
                .map_err(ServicingError::from)?,
            day_count: parse_col(row, "day_count")?,
            rounding: parse_col(row, "rounding")?,
            interest_only_months: row
                .try_get("interest_only_months")
                .map_err(ServicingError::from)?,
            balloon_month: row.try_get("balloon_month").map_err(ServicingError::from)?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
        })
    }

    async fn insert_on(
        executor: &Executor,
        plan: &PaymentScheduleModel,
        rows: &[ScheduleRowModel],
    ) -> ServicingResult<()> {
        executor
            .execute(
                sqlx::query("UPDATE payment_schedules SET active = FALSE WHERE loan_id = $1 AND active")
                    .bind(plan.loan_id),
            )
            .await
            .map_err(ServicingError::from)?;

        executor
            .execute(
                sqlx::query(
                    "INSERT INTO payment_schedules \
                     (schedule_id, loan_id, version, active, principal_minor, annual_rate_bps, \
                      term_months, first_payment_date, day_count, rounding, interest_only_months, \
                      balloon_month, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                )
                .bind(plan.schedule_id)
                .bind(plan.loan_id)
                .bind(plan.version)
                .bind(plan.active)
                .bind(plan.principal_minor)
                .bind(plan.annual_rate_bps)
                .bind(plan.term_months)
                .bind(plan.first_payment_date)
                .bind(plan.day_count.as_str())
                .bind(plan.rounding.as_str())
                .bind(plan.interest_only_months)
                .bind(plan.balloon_month)
                .bind(plan.created_at),
            )
            .await
            .map_err(ServicingError::from)?;

        for row in rows {
            executor
                .execute(
                    sqlx::query(
                        "INSERT INTO schedule_rows \
                         (schedule_id, period_no, due_date, principal_minor, interest_minor, \
                          total_payment_minor, balance_minor) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    )
                    .bind(row.schedule_id)
                    .bind(row.period_no)
                    .bind(row.due_date)
                    .bind(row.principal_minor)
                    .bind(row.interest_minor)
                    .bind(row.total_payment_minor)
                    .bind(row.balance_minor),
                )
                .await
                .map_err(ServicingError::from)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduleRepository for ScheduleRepositoryImpl {
    async fn insert_plan(
        &self,
        plan: PaymentScheduleModel,
        rows: Vec<ScheduleRowModel>,
    ) -> ServicingResult<()> {
        match &self.executor {
            Executor::Tx(_) => Self::insert_on(&self.executor, &plan, &rows).await,
            Executor::Pool(pool) => {
                let tx = pool.begin().await.map_err(ServicingError::from)?;
                let tx_executor = Executor::Tx(std::sync::Arc::new(tokio::sync::Mutex::new(tx)));
                Self::insert_on(&tx_executor, &plan, &rows).await?;
                let Executor::Tx(tx) = tx_executor else {
                    unreachable!();
                };
                let tx = std::sync::Arc::into_inner(tx)
                    .ok_or_else(|| ServicingError::Internal("transaction still shared".into()))?
                    .into_inner();
                tx.commit().await.map_err(ServicingError::from)
            }
        }
    }

    async fn find_active(&self, loan_id: Uuid) -> ServicingResult<Option<PaymentScheduleModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM payment_schedules WHERE loan_id = $1 AND active")
                    .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::plan_from_row).transpose()
    }

    async fn rows_for_schedule(&self, schedule_id: Uuid) -> ServicingResult<Vec<ScheduleRowModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM schedule_rows WHERE schedule_id = $1 ORDER BY period_no",
                )
                .bind(schedule_id),
            )
            .await
            .map_err(ServicingError::from)?;

        rows.iter()
            .map(|row| {
                Ok(ScheduleRowModel {
                    schedule_id: row.try_get("schedule_id").map_err(ServicingError::from)?,
                    period_no: row.try_get("period_no").map_err(ServicingError::from)?,
                    due_date: row.try_get("due_date").map_err(ServicingError::from)?,
                    principal_minor: row
                        .try_get("principal_minor")
                        .map_err(ServicingError::from)?,
                    interest_minor: row
                        .try_get("interest_minor")
                        .map_err(ServicingError::from)?,
                    total_payment_minor: row
                        .try_get("total_payment_minor")
                        .map_err(ServicingError::from)?,
                    balance_minor: row.try_get("balance_minor").map_err(ServicingError::from)?,
                })
            })
            .collect()
    }

    async fn max_version(&self, loan_id: Uuid) -> ServicingResult<i32> {
        let row = self
            .executor
            .fetch_one(
                sqlx::query(
                    "SELECT COALESCE(MAX(version), 0)::INT AS max_version \
                     FROM payment_schedules WHERE loan_id = $1",
                )
                .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.try_get("max_version").map_err(ServicingError::from)
    }
}
