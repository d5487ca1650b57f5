use std::sync::Arc;

use sqlx::postgres::{PgArguments, PgQueryResult, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

/// A handle to a database executor, which can be either a connection
/// pool or an active transaction. Using `Arc<Mutex<...>>` for the
/// transaction allows it to be shared across multiple repository
/// instances within the same unit of work.
#[derive(Clone)]
pub enum Executor {
    Pool(Arc<PgPool>),
    Tx(Arc<Mutex<Transaction<'static, Postgres>>>),
}

impl Executor {
    pub async fn execute(
        &self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<PgQueryResult, sqlx::Error> {
        match self {
            Executor::Pool(pool) => query.execute(pool.as_ref()).await,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.execute(&mut **guard).await
            }
        }
    }

    pub async fn fetch_optional(
        &self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<Option<PgRow>, sqlx::Error> {
        match self {
            Executor::Pool(pool) => query.fetch_optional(pool.as_ref()).await,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_optional(&mut **guard).await
            }
        }
    }

    pub async fn fetch_one(
        &self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<PgRow, sqlx::Error> {
        match self {
            Executor::Pool(pool) => query.fetch_one(pool.as_ref()).await,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_one(&mut **guard).await
            }
        }
    }

    pub async fn fetch_all(
        &self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<Vec<PgRow>, sqlx::Error> {
        match self {
            Executor::Pool(pool) => query.fetch_all(pool.as_ref()).await,
            Executor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(&mut **guard).await
            }
        }
    }
}
