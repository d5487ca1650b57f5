use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::domain::{AchBatchStatus, AchTransactionCode};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{AchBatchModel, AchEntryModel, AchReturnModel};
use servicing_db::repository::AchRepository;

use super::executor::Executor;
use super::utils::parse_col;

pub struct AchRepositoryImpl {
    executor: Executor,
}

impl AchRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn batch_from_row(row: &PgRow) -> ServicingResult<AchBatchModel> {
        Ok(AchBatchModel {
            batch_id: row.try_get("batch_id").map_err(ServicingError::from)?,
            status: parse_col(row, "status")?,
            company_entry_description: row
                .try_get("company_entry_description")
                .map_err(ServicingError::from)?,
            effective_entry_date: row
                .try_get("effective_entry_date")
                .map_err(ServicingError::from)?,
            entry_count: row.try_get("entry_count").map_err(ServicingError::from)?,
            debit_total_minor: row
                .try_get("debit_total_minor")
                .map_err(ServicingError::from)?,
            credit_total_minor: row
                .try_get("credit_total_minor")
                .map_err(ServicingError::from)?,
            entry_hash: row.try_get("entry_hash").map_err(ServicingError::from)?,
            sealed_at: row.try_get("sealed_at").map_err(ServicingError::from)?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
        })
    }

    fn entry_from_row(row: &PgRow) -> ServicingResult<AchEntryModel> {
        let code: String = row.try_get("txn_code").map_err(ServicingError::from)?;
        let txn_code = AchTransactionCode::from_code(code.trim()).ok_or_else(|| {
            ServicingError::ValidationError {
                field: "txn_code".to_string(),
                message: format!("unknown ACH transaction code {code}"),
            }
        })?;
        Ok(AchEntryModel {
            entry_id: row.try_get("entry_id").map_err(ServicingError::from)?,
            batch_id: row.try_get("batch_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            txn_code,
            rdfi_routing: row.try_get("rdfi_routing").map_err(ServicingError::from)?,
            account_number_masked: row
                .try_get("account_number_masked")
                .map_err(ServicingError::from)?,
            amount_minor: row.try_get("amount_minor").map_err(ServicingError::from)?,
            individual_name: row
                .try_get("individual_name")
                .map_err(ServicingError::from)?,
            trace_number: row.try_get("trace_number").map_err(ServicingError::from)?,
        })
    }

    fn return_from_row(row: &PgRow) -> ServicingResult<AchReturnModel> {
        Ok(AchReturnModel {
            return_id: row.try_get("return_id").map_err(ServicingError::from)?,
            entry_id: row.try_get("entry_id").map_err(ServicingError::from)?,
            return_code: row.try_get("return_code").map_err(ServicingError::from)?,
            return_date: row.try_get("return_date").map_err(ServicingError::from)?,
            addenda: row.try_get("addenda").map_err(ServicingError::from)?,
            received_at: row.try_get("received_at").map_err(ServicingError::from)?,
        })
    }
}

#[async_trait]
impl AchRepository for AchRepositoryImpl {
    async fn create_batch(&self, batch: AchBatchModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO ach_batches \
                     (batch_id, status, company_entry_description, effective_entry_date, \
                      entry_count, debit_total_minor, credit_total_minor, entry_hash, sealed_at, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                )
                .bind(batch.batch_id)
                .bind(batch.status.as_str())
                .bind(&batch.company_entry_description)
                .bind(batch.effective_entry_date)
                .bind(batch.entry_count)
                .bind(batch.debit_total_minor)
                .bind(batch.credit_total_minor)
                .bind(batch.entry_hash)
                .bind(batch.sealed_at)
                .bind(batch.created_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_batch(&self, batch_id: Uuid) -> ServicingResult<Option<AchBatchModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM ach_batches WHERE batch_id = $1").bind(batch_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::batch_from_row).transpose()
    }

    async fn update_batch_status(
        &self,
        batch_id: Uuid,
        status: AchBatchStatus,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query("UPDATE ach_batches SET status = $2 WHERE batch_id = $1")
                    .bind(batch_id)
                    .bind(status.as_str()),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn seal_batch(
        &self,
        batch: AchBatchModel,
        entries: Vec<AchEntryModel>,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "UPDATE ach_batches \
                     SET status = $2, entry_count = $3, debit_total_minor = $4, \
                         credit_total_minor = $5, entry_hash = $6, sealed_at = $7 \
                     WHERE batch_id = $1 AND status = 'open'",
                )
                .bind(batch.batch_id)
                .bind(batch.status.as_str())
                .bind(batch.entry_count)
                .bind(batch.debit_total_minor)
                .bind(batch.credit_total_minor)
                .bind(batch.entry_hash)
                .bind(batch.sealed_at),
            )
            .await
            .map_err(ServicingError::from)?;

        for entry in entries {
            self.executor
                .execute(
                    sqlx::query("UPDATE ach_entries SET trace_number = $2 WHERE entry_id = $1")
                        .bind(entry.entry_id)
                        .bind(entry.trace_number.as_deref()),
                )
                .await
                .map_err(ServicingError::from)?;
        }
        Ok(())
    }

    async fn add_entry(&self, entry: AchEntryModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO ach_entries \
                     (entry_id, batch_id, loan_id, txn_code, rdfi_routing, account_number_masked, \
                      amount_minor, individual_name, trace_number) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                )
                .bind(entry.entry_id)
                .bind(entry.batch_id)
                .bind(entry.loan_id)
                .bind(entry.txn_code.code())
                .bind(&entry.rdfi_routing)
                .bind(&entry.account_number_masked)
                .bind(entry.amount_minor)
                .bind(&entry.individual_name)
                .bind(entry.trace_number.as_deref()),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn entries_for_batch(&self, batch_id: Uuid) -> ServicingResult<Vec<AchEntryModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query("SELECT * FROM ach_entries WHERE batch_id = $1 ORDER BY entry_id")
                    .bind(batch_id),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn find_entry_by_trace(
        &self,
        trace_number: &str,
    ) -> ServicingResult<Option<AchEntryModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM ach_entries WHERE trace_number = $1")
                    .bind(trace_number),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::entry_from_row).transpose()
    }

    async fn insert_return(&self, ach_return: AchReturnModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO ach_returns \
                     (return_id, entry_id, return_code, return_date, addenda, received_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(ach_return.return_id)
                .bind(ach_return.entry_id)
                .bind(&ach_return.return_code)
                .bind(ach_return.return_date)
                .bind(&ach_return.addenda)
                .bind(ach_return.received_at),
            )
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db_err)
                    if db_err.constraint() == Some("ach_returns_entry_id_key") =>
                {
                    ServicingError::DuplicateAchReturn(ach_return.entry_id)
                }
                _ => ServicingError::from(err),
            })?;
        Ok(())
    }

    async fn find_return_for_entry(
        &self,
        entry_id: Uuid,
    ) -> ServicingResult<Option<AchReturnModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM ach_returns WHERE entry_id = $1").bind(entry_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::return_from_row).transpose()
    }
}
