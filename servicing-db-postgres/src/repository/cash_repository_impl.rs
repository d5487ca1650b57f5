use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::domain::ReconExceptionStatus;
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{
    BankAccountModel, BankStatementFileModel, BankTxnModel, MatchCandidateModel,
    ReconExceptionModel,
};
use servicing_db::repository::CashRepository;

use super::executor::Executor;
use super::utils::parse_col;

pub struct CashRepositoryImpl {
    executor: Executor,
}

impl CashRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn account_from_row(row: &PgRow) -> ServicingResult<BankAccountModel> {
        Ok(BankAccountModel {
            bank_account_id: row
                .try_get("bank_account_id")
                .map_err(ServicingError::from)?,
            bank_name: row.try_get("bank_name").map_err(ServicingError::from)?,
            routing_number: row
                .try_get("routing_number")
                .map_err(ServicingError::from)?,
            account_number_masked: row
                .try_get("account_number_masked")
                .map_err(ServicingError::from)?,
            currency: row.try_get("currency").map_err(ServicingError::from)?,
            active: row.try_get("active").map_err(ServicingError::from)?,
        })
    }

    fn file_from_row(row: &PgRow) -> ServicingResult<BankStatementFileModel> {
        Ok(BankStatementFileModel {
            file_id: row.try_get("file_id").map_err(ServicingError::from)?,
            bank_account_id: row
                .try_get("bank_account_id")
                .map_err(ServicingError::from)?,
            as_of_date: row.try_get("as_of_date").map_err(ServicingError::from)?,
            format: parse_col(row, "format")?,
            content_hash: row.try_get("content_hash").map_err(ServicingError::from)?,
            txn_count: row.try_get("txn_count").map_err(ServicingError::from)?,
            ingested_at: row.try_get("ingested_at").map_err(ServicingError::from)?,
        })
    }

    fn txn_from_row(row: &PgRow) -> ServicingResult<BankTxnModel> {
        Ok(BankTxnModel {
            bank_txn_id: row.try_get("bank_txn_id").map_err(ServicingError::from)?,
            bank_account_id: row
                .try_get("bank_account_id")
                .map_err(ServicingError::from)?,
            file_id: row.try_get("file_id").map_err(ServicingError::from)?,
            posted_date: row.try_get("posted_date").map_err(ServicingError::from)?,
            amount_minor: row.try_get("amount_minor").map_err(ServicingError::from)?,
            txn_type: parse_col(row, "txn_type")?,
            bank_ref: row.try_get("bank_ref").map_err(ServicingError::from)?,
            description: row.try_get("description").map_err(ServicingError::from)?,
            matched: row.try_get("matched").map_err(ServicingError::from)?,
            matched_event_id: row
                .try_get("matched_event_id")
                .map_err(ServicingError::from)?,
        })
    }

    fn exception_from_row(row: &PgRow) -> ServicingResult<ReconExceptionModel> {
        Ok(ReconExceptionModel {
            bank_txn_id: row.try_get("bank_txn_id").map_err(ServicingError::from)?,
            variance_minor: row
                .try_get("variance_minor")
                .map_err(ServicingError::from)?,
            status: parse_col(row, "status")?,
            note: row.try_get("note").map_err(ServicingError::from)?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
            updated_at: row.try_get("updated_at").map_err(ServicingError::from)?,
        })
    }
}

#[async_trait]
impl CashRepository for CashRepositoryImpl {
    async fn find_bank_account(
        &self,
        bank_account_id: Uuid,
    ) -> ServicingResult<Option<BankAccountModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM bank_accounts WHERE bank_account_id = $1")
                    .bind(bank_account_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::account_from_row).transpose()
    }

    async fn upsert_bank_account(&self, account: BankAccountModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO bank_accounts \
                     (bank_account_id, bank_name, routing_number, account_number_masked, currency, active) \
                     VALUES ($1, $2, $3, $4, $5, $6) \
                     ON CONFLICT (bank_account_id) DO UPDATE SET \
                       bank_name = EXCLUDED.bank_name, \
                       active = EXCLUDED.active",
                )
                .bind(account.bank_account_id)
                .bind(&account.bank_name)
                .bind(&account.routing_number)
                .bind(&account.account_number_masked)
                .bind(&account.currency)
                .bind(account.active),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_file_by_hash(
        &self,
        bank_account_id: Uuid,
        as_of_date: NaiveDate,
        content_hash: &str,
    ) -> ServicingResult<Option<BankStatementFileModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query(
                    "SELECT * FROM bank_statement_files \
                     WHERE bank_account_id = $1 AND as_of_date = $2 AND content_hash = $3",
                )
                .bind(bank_account_id)
                .bind(as_of_date)
                .bind(content_hash),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::file_from_row).transpose()
    }

    async fn create_file(&self, file: BankStatementFileModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO bank_statement_files \
                     (file_id, bank_account_id, as_of_date, format, content_hash, txn_count, ingested_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(file.file_id)
                .bind(file.bank_account_id)
                .bind(file.as_of_date)
                .bind(file.format.as_str())
                .bind(&file.content_hash)
                .bind(file.txn_count)
                .bind(file.ingested_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn insert_txns(&self, txns: Vec<BankTxnModel>) -> ServicingResult<()> {
        for txn in txns {
            self.executor
                .execute(
                    sqlx::query(
                        "INSERT INTO bank_txns \
                         (bank_txn_id, bank_account_id, file_id, posted_date, amount_minor, \
                          txn_type, bank_ref, description, matched, matched_event_id) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                    )
                    .bind(txn.bank_txn_id)
                    .bind(txn.bank_account_id)
                    .bind(txn.file_id)
                    .bind(txn.posted_date)
                    .bind(txn.amount_minor)
                    .bind(txn.txn_type.as_str())
                    .bind(&txn.bank_ref)
                    .bind(&txn.description)
                    .bind(txn.matched)
                    .bind(txn.matched_event_id),
                )
                .await
                .map_err(ServicingError::from)?;
        }
        Ok(())
    }

    async fn txns_for_file(&self, file_id: Uuid) -> ServicingResult<Vec<BankTxnModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query("SELECT * FROM bank_txns WHERE file_id = $1 ORDER BY posted_date")
                    .bind(file_id),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::txn_from_row).collect()
    }

    async fn find_txn(&self, bank_txn_id: Uuid) -> ServicingResult<Option<BankTxnModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM bank_txns WHERE bank_txn_id = $1").bind(bank_txn_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::txn_from_row).transpose()
    }

    async fn mark_matched(&self, bank_txn_id: Uuid, event_id: Uuid) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "UPDATE bank_txns SET matched = TRUE, matched_event_id = $2 \
                     WHERE bank_txn_id = $1",
                )
                .bind(bank_txn_id)
                .bind(event_id),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn replace_candidates(
        &self,
        bank_txn_id: Uuid,
        candidates: Vec<MatchCandidateModel>,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query("DELETE FROM match_candidates WHERE bank_txn_id = $1")
                    .bind(bank_txn_id),
            )
            .await
            .map_err(ServicingError::from)?;
        for candidate in candidates {
            self.executor
                .execute(
                    sqlx::query(
                        "INSERT INTO match_candidates (bank_txn_id, event_id, score, reason) \
                         VALUES ($1, $2, $3, $4)",
                    )
                    .bind(candidate.bank_txn_id)
                    .bind(candidate.event_id)
                    .bind(candidate.score)
                    .bind(&candidate.reason),
                )
                .await
                .map_err(ServicingError::from)?;
        }
        Ok(())
    }

    async fn candidates_for(
        &self,
        bank_txn_id: Uuid,
    ) -> ServicingResult<Vec<MatchCandidateModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM match_candidates WHERE bank_txn_id = $1 ORDER BY score DESC",
                )
                .bind(bank_txn_id),
            )
            .await
            .map_err(ServicingError::from)?;

        rows.iter()
            .map(|row| {
                Ok(MatchCandidateModel {
                    bank_txn_id: row.try_get("bank_txn_id").map_err(ServicingError::from)?,
                    event_id: row.try_get("event_id").map_err(ServicingError::from)?,
                    score: row.try_get("score").map_err(ServicingError::from)?,
                    reason: row.try_get("reason").map_err(ServicingError::from)?,
                })
            })
            .collect()
    }

    async fn upsert_exception(&self, exception: ReconExceptionModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO recon_exceptions \
                     (bank_txn_id, variance_minor, status, note, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6) \
                     ON CONFLICT (bank_txn_id) DO UPDATE SET \
                       variance_minor = EXCLUDED.variance_minor, \
                       status = EXCLUDED.status, \
                       note = COALESCE(EXCLUDED.note, recon_exceptions.note), \
                       updated_at = now()",
                )
                .bind(exception.bank_txn_id)
                .bind(exception.variance_minor)
                .bind(exception.status.as_str())
                .bind(&exception.note)
                .bind(exception.created_at)
                .bind(exception.updated_at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn find_exception(
        &self,
        bank_txn_id: Uuid,
    ) -> ServicingResult<Option<ReconExceptionModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM recon_exceptions WHERE bank_txn_id = $1")
                    .bind(bank_txn_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::exception_from_row).transpose()
    }

    async fn update_exception_status(
        &self,
        bank_txn_id: Uuid,
        status: ReconExceptionStatus,
        note: Option<String>,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "UPDATE recon_exceptions \
                     SET status = $2, note = COALESCE($3, note), updated_at = now() \
                     WHERE bank_txn_id = $1",
                )
                .bind(bank_txn_id)
                .bind(status.as_str())
                .bind(note),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn exceptions_by_status(
        &self,
        status: ReconExceptionStatus,
    ) -> ServicingResult<Vec<ReconExceptionModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM recon_exceptions WHERE status = $1 ORDER BY created_at",
                )
                .bind(status.as_str()),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::exception_from_row).collect()
    }
}
