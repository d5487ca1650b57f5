use async_trait::async_trait;
use chrono::{DateTime, Utc};
use servicing_api::ServicingResult;
use uuid::Uuid;

use crate::models::OutboxMessageModel;

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(&self, message: OutboxMessageModel) -> ServicingResult<()>;

    /// Unpublished, unparked rows due at `now`, ordered by `created_at`,
    /// capped at `limit`.
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> ServicingResult<Vec<OutboxMessageModel>>;

    async fn mark_published(&self, outbox_id: Uuid, at: DateTime<Utc>) -> ServicingResult<()>;

    /// Record a failed attempt with the next retry time; parks the row
    /// when the attempt cap is reached.
    async fn record_failure(
        &self,
        outbox_id: Uuid,
        attempt_count: i32,
        next_retry_at: Option<DateTime<Utc>>,
        last_error: &str,
        parked: bool,
    ) -> ServicingResult<()>;

    async fn parked(&self) -> ServicingResult<Vec<OutboxMessageModel>>;

    /// Operator action: reset a parked row for fresh delivery attempts.
    async fn requeue_parked(&self, outbox_id: Uuid) -> ServicingResult<()>;
}
