use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::OutboxMessageModel;
use servicing_db::repository::OutboxRepository;

use super::executor::Executor;

pub struct OutboxRepositoryImpl {
    executor: Executor,
}

impl OutboxRepositoryImpl {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }

    fn from_row(row: &PgRow) -> ServicingResult<OutboxMessageModel> {
        Ok(OutboxMessageModel {
            outbox_id: row.try_get("outbox_id").map_err(ServicingError::from)?,
            event_id: row.try_get("event_id").map_err(ServicingError::from)?,
            exchange: row.try_get("exchange").map_err(ServicingError::from)?,
            routing_key: row.try_get("routing_key").map_err(ServicingError::from)?,
            payload: row.try_get("payload").map_err(ServicingError::from)?,
            created_at: row.try_get("created_at").map_err(ServicingError::from)?,
            published_at: row.try_get("published_at").map_err(ServicingError::from)?,
            attempt_count: row.try_get("attempt_count").map_err(ServicingError::from)?,
            next_retry_at: row.try_get("next_retry_at").map_err(ServicingError::from)?,
            last_error: row.try_get("last_error").map_err(ServicingError::from)?,
            parked: row.try_get("parked").map_err(ServicingError::from)?,
        })
    }
}

#[async_trait]
impl OutboxRepository for OutboxRepositoryImpl {
    async fn enqueue(&self, message: OutboxMessageModel) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "INSERT INTO outbox_messages \
                     (outbox_id, event_id, exchange, routing_key, payload, created_at, \
                      published_at, attempt_count, next_retry_at, last_error, parked) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                )
                .bind(message.outbox_id)
                .bind(message.event_id)
                .bind(&message.exchange)
                .bind(&message.routing_key)
                .bind(&message.payload)
                .bind(message.created_at)
                .bind(message.published_at)
                .bind(message.attempt_count)
                .bind(message.next_retry_at)
                .bind(&message.last_error)
                .bind(message.parked),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> ServicingResult<Vec<OutboxMessageModel>> {
        let rows = self
            .executor
            .fetch_all(
                sqlx::query(
                    "SELECT * FROM outbox_messages \
                     WHERE published_at IS NULL AND NOT parked \
                       AND (next_retry_at IS NULL OR next_retry_at <= $1) \
                     ORDER BY created_at \
                     LIMIT $2",
                )
                .bind(now)
                .bind(limit),
            )
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::from_row).collect()
    }

    async fn mark_published(&self, outbox_id: Uuid, at: DateTime<Utc>) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query("UPDATE outbox_messages SET published_at = $2 WHERE outbox_id = $1")
                    .bind(outbox_id)
                    .bind(at),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn record_failure(
        &self,
        outbox_id: Uuid,
        attempt_count: i32,
        next_retry_at: Option<DateTime<Utc>>,
        last_error: &str,
        parked: bool,
    ) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "UPDATE outbox_messages \
                     SET attempt_count = $2, next_retry_at = $3, last_error = $4, parked = $5 \
                     WHERE outbox_id = $1",
                )
                .bind(outbox_id)
                .bind(attempt_count)
                .bind(next_retry_at)
                .bind(last_error)
                .bind(parked),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }

    async fn parked(&self) -> ServicingResult<Vec<OutboxMessageModel>> {
        let rows = self
            .executor
            .fetch_all(sqlx::query(
                "SELECT * FROM outbox_messages WHERE parked ORDER BY created_at",
            ))
            .await
            .map_err(ServicingError::from)?;
        rows.iter().map(Self::from_row).collect()
    }

    async fn requeue_parked(&self, outbox_id: Uuid) -> ServicingResult<()> {
        self.executor
            .execute(
                sqlx::query(
                    "UPDATE outbox_messages \
                     SET parked = FALSE, attempt_count = 0, next_retry_at = NULL \
                     WHERE outbox_id = $1 AND parked",
                )
                .bind(outbox_id),
            )
            .await
            .map_err(ServicingError::from)?;
        Ok(())
    }
}
