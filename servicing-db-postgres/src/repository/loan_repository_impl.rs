use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::domain::{CollectionCaseStatus, LoanStatus};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{AuditRecordModel, LoanModel};
use servicing_db::repository::{AuditRepository, LoanRepository};

use super::executor::Executor;
use super::utils::parse_col;

pub struct LoanRepositoryImpl {
    executor: Executor,
}

impl LoanRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn from_row(row: &PgRow) -> ServicingResult<LoanModel> {
        Ok(LoanModel {
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            product_code: row.try_get("product_code").map_err(ServicingError::from)?,
            status: parse_col(row, "status")?,
            collection_case_status: parse_col(row, "collection_case_status")?,
            origination_date: row
                .try_get("origination_date")
                .map_err(ServicingError::from)?,
            original_principal_minor: row
                .try_get("original_principal_minor")
                .map_err(ServicingError::from)?,
            annual_rate_bps: row
                .try_get("annual_rate_bps")
                .map_err(ServicingError::from)?,
            term_months: row.try_get("term_months").map_err(ServicingError::from)?,
            jurisdiction: row.try_get("jurisdiction").map_err(ServicingError::from)?,
            late_fee_grace_days: row
                .try_get("late_fee_grace_days")
                .map_err(ServicingError::from)?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
        })
    }
}

#[async_trait]
impl LoanRepository for LoanRepositoryImpl {
    async fn create(&self, loan: LoanModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO loans \
                     (loan_id, product_code, status, collection_case_status, origination_date, \
                      original_principal_minor, annual_rate_bps, term_months, jurisdiction, \
                      late_fee_grace_days, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                )
                .bind(loan.loan_id)
                .bind(&loan.product_code)
                .bind(loan.status.as_str())
                .bind(loan.collection_case_status.as_str())
                .bind(loan.origination_date)
                .bind(loan.original_principal_minor)
                .bind(loan.annual_rate_bps)
                .bind(loan.term_months)
                .bind(&loan.jurisdiction)
                .bind(loan.late_fee_grace_days)
                .bind(loan.created_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_by_id(&self, loan_id: Uuid) -> ServicingResult<Option<LoanModel>> {
        let row = self
            .executor
            .fetch_optional(sqlx::query("SELECT * FROM loans WHERE loan_id = $1").bind(loan_id))
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn update_status(&self, loan_id: Uuid, status: LoanStatus) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query("UPDATE loans SET status = $2 WHERE loan_id = $1")
                    .bind(loan_id)
                    .bind(status.as_str()),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn update_collection_case_status(
        &self,
        loan_id: Uuid,
        status: CollectionCaseStatus,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query("UPDATE loans SET collection_case_status = $2 WHERE loan_id = $1")
                    .bind(loan_id)
                    .bind(status.as_str()),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn list_serviceable(&self) -> ServicingResult<Vec<LoanModel>> {
        let rows = self
            .executor
            .fetch_all(sqlx::query(
                "SELECT * FROM loans WHERE status NOT IN ('paid_off', 'charged_off') \
                 ORDER BY created_at",
            ))
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::from_row).collect()
    }
}

pub struct AuditRepositoryImpl {
    executor: Executor,
}

impl AuditRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl AuditRepository for AuditRepositoryImpl {
    async fn record(&self, record: AuditRecordModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO audit_records \
                     (audit_id, entity_id, stage, outcome, payload_hash, recorded_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(record.audit_id)
                .bind(record.entity_id)
                .bind(&record.stage)
                .bind(&record.outcome)
                .bind(&record.payload_hash)
                .bind(record.recorded_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn for_entity(&self, entity_id: Uuid) -> ServicingResult<Vec<AuditRecordModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM audit_records WHERE entity_id = $1 ORDER BY recorded_at",
                )
                .bind(entity_id),
            )
            .await
            .map_err(ServicingError::from)?;

        rows.iter()
            .map(|row| {
                Ok(AuditRecordModel {
                    audit_id: row.try_get("audit_id").map_err(ServicingError::from)?,
                    entity_id: row.try_get("entity_id").map_err(ServicingError::from)?,
                    stage: row.try_get("stage").map_err(ServicingError::from)?,
                    outcome: row.try_get("outcome").map_err(ServicingError::from)?,
                    payload_hash: row.try_get("payload_hash").map_err(ServicingError::from)?,
                    recorded_at: row.try_get("recorded_at").map_err(ServicingError::from)?,
                })
            })
            .collect()
    }
}
