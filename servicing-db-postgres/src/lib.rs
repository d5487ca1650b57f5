pub mod repository;

pub use repository::*;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use servicing_api::{ServicingError, ServicingResult};

/// Connect a pool with servicing defaults. The caller owns teardown via
/// `PgPool::close`.
pub async fn connect(database_url: &str, max_connections: u32) -> ServicingResult<Arc<PgPool>> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(ServicingError::from)?;
    tracing::info!(max_connections, "servicing database pool connected");
    Ok(Arc::new(pool))
}
