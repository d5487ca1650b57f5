use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{
    EscrowAnalysisModel, EscrowDisbursementModel, EscrowForecastModel, EscrowItemModel,
};
use servicing_db::repository::EscrowRepository;

use super::executor::Executor;
use super::utils::parse_col;

pub struct EscrowRepositoryImpl {
    executor: Executor,
}

impl EscrowRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn item_from_row(row: &PgRow) -> ServicingResult<EscrowItemModel> {
        Ok(EscrowItemModel {
            escrow_id: row.try_get("escrow_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            item_type: parse_col(row, "item_type")?,
            payee: row.try_get("payee").map_err(ServicingError::from)?,
            amount_minor: row.try_get("amount_minor").map_err(ServicingError::from)?,
            frequency: parse_col(row, "frequency")?,
            next_due_date: row.try_get("next_due_date").map_err(ServicingError::from)?,
            active: row.try_get("active").map_err(ServicingError::from)?,
        })
    }

    fn forecast_from_row(row: &PgRow) -> ServicingResult<EscrowForecastModel> {
        Ok(EscrowForecastModel {
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            escrow_id: row.try_get("escrow_id").map_err(ServicingError::from)?,
            due_date: row.try_get("due_date").map_err(ServicingError::from)?,
            amount_minor: row.try_get("amount_minor").map_err(ServicingError::from)?,
        })
    }

    fn disbursement_from_row(row: &PgRow) -> ServicingResult<EscrowDisbursementModel> {
        Ok(EscrowDisbursementModel {
            disbursement_id: row
                .try_get("disbursement_id")
                .map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            escrow_id: row.try_get("escrow_id").map_err(ServicingError::from)?,
            due_date: row.try_get("due_date").map_err(ServicingError::from)?,
            amount_minor: row.try_get("amount_minor").map_err(ServicingError::from)?,
            status: parse_col(row, "status")?,
            event_id: row.try_get("event_id").map_err(ServicingError::from)?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
        })
    }

    fn analysis_from_row(row: &PgRow) -> ServicingResult<EscrowAnalysisModel> {
        Ok(EscrowAnalysisModel {
            analysis_id: row.try_get("analysis_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            as_of: row.try_get("as_of").map_err(ServicingError::from)?,
            period_start: row.try_get("period_start").map_err(ServicingError::from)?,
            period_end: row.try_get("period_end").map_err(ServicingError::from)?,
            annual_expected_minor: row
                .try_get("annual_expected_minor")
                .map_err(ServicingError::from)?,
            cushion_target_minor: row
                .try_get("cushion_target_minor")
                .map_err(ServicingError::from)?,
            current_balance_minor: row
                .try_get("current_balance_minor")
                .map_err(ServicingError::from)?,
            lowest_projected_minor: row
                .try_get("lowest_projected_minor")
                .map_err(ServicingError::from)?,
            shortage_minor: row.try_get("shortage_minor").map_err(ServicingError::from)?,
            deficiency_minor: row
                .try_get("deficiency_minor")
                .map_err(ServicingError::from)?,
            surplus_minor: row.try_get("surplus_minor").map_err(ServicingError::from)?,
            new_monthly_target_minor: row
                .try_get("new_monthly_target_minor")
                .map_err(ServicingError::from)?,
            deficiency_recovery_monthly_minor: row
                .try_get("deficiency_recovery_monthly_minor")
                .map_err(ServicingError::from)?,
            version: row.try_get("version").map_err(ServicingError::from)?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
        })
    }
}

#[async_trait]
impl EscrowRepository for EscrowRepositoryImpl {
    async fn active_items(&self, loan_id: Uuid) -> ServicingResult<Vec<EscrowItemModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query("SELECT * FROM escrow_items WHERE loan_id = $1 AND active")
                    .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::item_from_row).collect()
    }

    async fn upsert_item(&self, item: EscrowItemModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO escrow_items \
                     (escrow_id, loan_id, item_type, payee, amount_minor, frequency, next_due_date, active) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     ON CONFLICT (escrow_id) DO UPDATE SET \
                       payee = EXCLUDED.payee, \
                       amount_minor = EXCLUDED.amount_minor, \
                       frequency = EXCLUDED.frequency, \
                       next_due_date = EXCLUDED.next_due_date, \
                       active = EXCLUDED.active",
                )
                .bind(item.escrow_id)
                .bind(item.loan_id)
                .bind(item.item_type.as_str())
                .bind(&item.payee)
                .bind(item.amount_minor)
                .bind(item.frequency.as_str())
                .bind(item.next_due_date)
                .bind(item.active),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn replace_forecast(
        &self,
        loan_id: Uuid,
        rows: Vec<EscrowForecastModel>,
    ) -> ServicingResult<()> {
        self.executor
            .execute(sqlx::query("DELETE FROM escrow_forecast WHERE loan_id = $1").bind(loan_id))
            .await
            .map_err(ServicingError::from)?;
        for row in rows {
            self.executor
                .execute(
                    sqlx::query(
                        "INSERT INTO escrow_forecast (loan_id, escrow_id, due_date, amount_minor) \
                         VALUES ($1, $2, $3, $4) \
                         ON CONFLICT (loan_id, escrow_id, due_date) DO UPDATE \
                         SET amount_minor = EXCLUDED.amount_minor",
                    )
                    .bind(row.loan_id)
                    .bind(row.escrow_id)
                    .bind(row.due_date)
                    .bind(row.amount_minor),
                )
                .await
                .map_err(ServicingError::from)?;
        }
        Ok(())
    }

    async fn forecast_between(
        &self,
        loan_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServicingResult<Vec<EscrowForecastModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM escrow_forecast \
                     WHERE loan_id = $1 AND due_date BETWEEN $2 AND $3 \
                     ORDER BY due_date",
                )
                .bind(loan_id)
                .bind(from)
                .bind(to),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::forecast_from_row).collect()
    }

    async fn create_disbursement(
        &self,
        disbursement: EscrowDisbursementModel,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO escrow_disbursements \
                     (disbursement_id, loan_id, escrow_id, due_date, amount_minor, status, event_id, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                )
                .bind(disbursement.disbursement_id)
                .bind(disbursement.loan_id)
                .bind(disbursement.escrow_id)
                .bind(disbursement.due_date)
                .bind(disbursement.amount_minor)
                .bind(disbursement.status.as_str())
                .bind(disbursement.event_id)
                .bind(disbursement.created_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_non_canceled(
        &self,
        loan_id: Uuid,
        escrow_id: Uuid,
        due_date: NaiveDate,
    ) -> ServicingResult<Option<EscrowDisbursementModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM escrow_disbursements \
                     WHERE loan_id = $1 AND escrow_id = $2 AND due_date = $3 \
                       AND status <> 'canceled'",
                )
                .bind(loan_id)
                .bind(escrow_id)
                .bind(due_date),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::disbursement_from_row).transpose()
    }

    async fn find_disbursement(
        &self,
        disbursement_id: Uuid,
    ) -> ServicingResult<Option<EscrowDisbursementModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM escrow_disbursements WHERE disbursement_id = $1")
                    .bind(disbursement_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::disbursement_from_row).transpose()
    }

    async fn scheduled_due(
        &self,
        loan_id: Uuid,
        as_of: NaiveDate,
    ) -> ServicingResult<Vec<EscrowDisbursementModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM escrow_disbursements \
                     WHERE loan_id = $1 AND status = 'scheduled' AND due_date <= $2 \
                     ORDER BY due_date",
                )
                .bind(loan_id)
                .bind(as_of),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::disbursement_from_row).collect()
    }

    async fn mark_posted(&self, disbursement_id: Uuid, event_id: Uuid) -> ServicingResult<()> {
        let result = self
            .executor
            .execute(
                sqlx::query(
                    "UPDATE escrow_disbursements SET status = 'posted', event_id = $2 \
                     WHERE disbursement_id = $1 AND status = 'scheduled'",
                )
                .bind(disbursement_id)
                .bind(event_id),
            )
            .await
            .map_err(ServicingError::from)?;
        if result.rows_affected() == 0 {
            return Err(ServicingError::DisbursementNotScheduled {
                disbursement_id,
                status: "unknown".to_string(),
            });
        }
        Ok(())
    }

    async fn mark_canceled(&self, disbursement_id: Uuid) -> ServicingResult<()> {
        let result = self
            .executor
            .execute(
                sqlx::query(
                    "UPDATE escrow_disbursements SET status = 'canceled' \
                     WHERE disbursement_id = $1 AND status = 'scheduled'",
                )
                .bind(disbursement_id),
            )
            .await
            .map_err(ServicingError::from)?;
        if result.rows_affected() == 0 {
            return Err(ServicingError::DisbursementNotScheduled {
                disbursement_id,
                status: "unknown".to_string(),
            });
        }
        Ok(())
    }

    async fn insert_analysis(&self, analysis: EscrowAnalysisModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO escrow_analyses \
                     (analysis_id, loan_id, as_of, period_start, period_end, annual_expected_minor, \
                      cushion_target_minor, current_balance_minor, lowest_projected_minor, \
                      shortage_minor, deficiency_minor, surplus_minor, new_monthly_target_minor, \
                      deficiency_recovery_monthly_minor, version, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
                )
                .bind(analysis.analysis_id)
                .bind(analysis.loan_id)
                .bind(analysis.as_of)
                .bind(analysis.period_start)
                .bind(analysis.period_end)
                .bind(analysis.annual_expected_minor)
                .bind(analysis.cushion_target_minor)
                .bind(analysis.current_balance_minor)
                .bind(analysis.lowest_projected_minor)
                .bind(analysis.shortage_minor)
                .bind(analysis.deficiency_minor)
                .bind(analysis.surplus_minor)
                .bind(analysis.new_monthly_target_minor)
                .bind(analysis.deficiency_recovery_monthly_minor)
                .bind(analysis.version)
                .bind(analysis.created_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn latest_analysis(
        &self,
        loan_id: Uuid,
    ) -> ServicingResult<Option<EscrowAnalysisModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM escrow_analyses WHERE loan_id = $1 \
                     ORDER BY version DESC LIMIT 1",
                )
                .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::analysis_from_row).transpose()
    }

    async fn max_analysis_version(&self, loan_id: Uuid) -> ServicingResult<i32> {
        let row = self
            .executor
            .fetch_one(
                sqlx::query(
                    "SELECT COALESCE(MAX(version), 0)::INT AS max_version \
                     FROM escrow_analyses WHERE loan_id = $1",
                )
                .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.try_get("max_version").map_err(ServicingError::from)
    }
}
