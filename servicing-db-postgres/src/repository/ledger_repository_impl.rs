use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::{AccountSumRow, CashEventRow, LedgerEntryModel, LedgerEventModel};
use servicing_db::repository::LedgerRepository;

use super::executor::Executor;
use super::utils::parse_col;

pub struct LedgerRepositoryImpl {
    executor: Executor,
}

impl LedgerRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn event_from_row(row: &PgRow) -> ServicingResult<LedgerEventModel> {
        Ok(LedgerEventModel {
            event_id: row.try_get("event_id").map_err(ServicingError::from)?,
            loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
            effective_date: row.try_get("effective_date").map_err(ServicingError::from)?,
            schema: parse_col(row, "schema")?,
            correlation_id: row.try_get("correlation_id").map_err(ServicingError::from)?,
            currency: row.try_get("currency").map_err(ServicingError::from)?,
            finalized_at: row.try_get("finalized_at").map_err(ServicingError::from)?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
        })
    }

    fn entry_from_row(row: &PgRow) -> ServicingResult<LedgerEntryModel> {
        Ok(LedgerEntryModel {
            entry_id: row.try_get("entry_id").map_err(ServicingError::from)?,
            event_id: row.try_get("event_id").map_err(ServicingError::from)?,
            account: parse_col(row, "account")?,
            debit_minor: row.try_get("debit_minor").map_err(ServicingError::from)?,
            credit_minor: row.try_get("credit_minor").map_err(ServicingError::from)?,
            currency: row.try_get("currency").map_err(ServicingError::from)?,
            memo: row.try_get("memo").map_err(ServicingError::from)?,
        })
    }

    async fn insert_event_and_entries(
        executor: &Executor,
        event: &LedgerEventModel,
        entries: &[LedgerEntryModel],
    ) -> ServicingResult<()> {
        executor
            .execute(
                sqlx::query(
                    "INSERT INTO ledger_events \
                     (event_id, loan_id, effective_date, schema, correlation_id, currency, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(event.event_id)
                .bind(event.loan_id)
                .bind(event.effective_date)
                .bind(event.schema.as_str())
                .bind(&event.correlation_id)
                .bind(&event.currency)
                .bind(event.created_at),
            )
            .await
            .map_err(|err| map_correlation_conflict(err, &event.correlation_id))?;

        for entry in entries {
            executor
                .execute(
                    sqlx::query(
                        "INSERT INTO ledger_entries \
                         (entry_id, event_id, account, debit_minor, credit_minor, currency, memo) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    )
                    .bind(entry.entry_id)
                    .bind(entry.event_id)
                    .bind(entry.account.as_str())
                    .bind(entry.debit_minor)
                    .bind(entry.credit_minor)
                    .bind(&entry.currency)
                    .bind(entry.memo.as_deref()),
                )
                .await
                .map_err(ServicingError::from)?;
        }

        // defense in depth: the SQL function repeats the balance check
        // before stamping finalized_at, inside this same transaction
        executor
            .execute(sqlx::query("SELECT finalize_event($1)").bind(event.event_id))
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    fn sums_from_rows(rows: Vec<PgRow>) -> ServicingResult<Vec<AccountSumRow>> {
        rows.iter()
            .map(|row| {
                Ok(AccountSumRow {
                    account: parse_col(row, "account")?,
                    debit_minor: row.try_get("debit_minor").map_err(ServicingError::from)?,
                    credit_minor: row.try_get("credit_minor").map_err(ServicingError::from)?,
                })
            })
            .collect()
    }
}

fn map_correlation_conflict(err: sqlx::Error, correlation_id: &str) -> ServicingError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some("ledger_events_correlation_id_key") {
            return ServicingError::DuplicateCorrelation(correlation_id.to_string());
        }
    }
    ServicingError::from(err)
}

#[async_trait]
impl LedgerRepository for LedgerRepositoryImpl {
    async fn create_event(
        &self,
        event: LedgerEventModel,
        entries: Vec<LedgerEntryModel>,
    ) -> ServicingResult<Uuid> {
        let event_id = event.event_id;
        match &self.executor {
            // inside a unit of work: run on the shared transaction
            Executor::Tx(_) => {
                Self::insert_event_and_entries(&self.executor, &event, &entries).await?;
            }
            // standalone: the event gets its own transaction
            Executor::Pool(pool) => {
                let tx = pool.begin().await.map_err(ServicingError::from)?;
                let tx_executor = Executor::Tx(std::sync::Arc::new(tokio::sync::Mutex::new(tx)));
                Self::insert_event_and_entries(&tx_executor, &event, &entries).await?;
                let Executor::Tx(tx) = tx_executor else {
                    unreachable!();
                };
                let tx = std::sync::Arc::into_inner(tx)
                    .ok_or_else(|| ServicingError::Internal("transaction still shared".into()))?
                    .into_inner();
                tx.commit().await.map_err(ServicingError::from)?;
            }
        }
        Ok(event_id)
    }

    async fn find_by_id(&self, event_id: Uuid) -> ServicingResult<Option<LedgerEventModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM ledger_events WHERE event_id = $1").bind(event_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::event_from_row).transpose()
    }

    async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> ServicingResult<Option<LedgerEventModel>> {
        let row = self
            .executor
            .fetch_optional(
                sqlx::query("SELECT * FROM ledger_events WHERE correlation_id = $1")
                    .bind(correlation_id),
            )
            .await
            .map_err(ServicingError::from)?;
        row.as_ref().map(Self::event_from_row).transpose()
    }

    async fn entries_for_event(&self, event_id: Uuid) -> ServicingResult<Vec<LedgerEntryModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query("SELECT * FROM ledger_entries WHERE event_id = $1").bind(event_id),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn account_sums_for_loan(&self, loan_id: Uuid) -> ServicingResult<Vec<AccountSumRow>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT e.account, \
                            COALESCE(SUM(e.debit_minor), 0)::BIGINT AS debit_minor, \
                            COALESCE(SUM(e.credit_minor), 0)::BIGINT AS credit_minor \
                     FROM ledger_entries e \
                     JOIN ledger_events ev ON ev.event_id = e.event_id \
                     WHERE ev.loan_id = $1 AND ev.finalized_at IS NOT NULL \
                     GROUP BY e.account",
                )
                .bind(loan_id),
            )
            .await
            .map_err(ServicingError::from)?;
        Self::sums_from_rows(rows)
    }

    async fn account_sums(&self) -> ServicingResult<Vec<AccountSumRow>> {
        let rows = self
            .executor
            .fetch_all(sqlx::query(
                "SELECT e.account, \
                        COALESCE(SUM(e.debit_minor), 0)::BIGINT AS debit_minor, \
                        COALESCE(SUM(e.credit_minor), 0)::BIGINT AS credit_minor \
                 FROM ledger_entries e \
                 JOIN ledger_events ev ON ev.event_id = e.event_id \
                 WHERE ev.finalized_at IS NOT NULL \
                 GROUP BY e.account",
            ))
            .await
            .map_err(ServicingError::from)?;
        Self::sums_from_rows(rows)
    }

    async fn cash_events_in_window(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServicingResult<Vec<CashEventRow>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT ev.event_id, ev.loan_id, ev.effective_date, ev.correlation_id, \
                            SUM(CASE WHEN e.account = 'cash' THEN e.debit_minor - e.credit_minor ELSE 0 END)::BIGINT AS cash_net_minor, \
                            COALESCE(STRING_AGG(e.memo, ' | '), '') AS memo_blob \
                     FROM ledger_events ev \
                     JOIN ledger_entries e ON e.event_id = ev.event_id \
                     WHERE ev.finalized_at IS NOT NULL \
                       AND ev.effective_date BETWEEN $1 AND $2 \
                     GROUP BY ev.event_id, ev.loan_id, ev.effective_date, ev.correlation_id \
                     HAVING BOOL_OR(e.account = 'cash')",
                )
                .bind(from)
                .bind(to),
            )
            .await
            .map_err(ServicingError::from)?;

        rows.iter()
            .map(|row| {
                Ok(CashEventRow {
                    event_id: row.try_get("event_id").map_err(ServicingError::from)?,
                    loan_id: row.try_get("loan_id").map_err(ServicingError::from)?,
                    effective_date: row
                        .try_get("effective_date")
                        .map_err(ServicingError::from)?,
                    correlation_id: row
                        .try_get("correlation_id")
                        .map_err(ServicingError::from)?,
                    cash_net_minor: row
                        .try_get("cash_net_minor")
                        .map_err(ServicingError::from)?,
                    memo_blob: row.try_get("memo_blob").map_err(ServicingError::from)?,
                })
            })
            .collect()
    }
}
