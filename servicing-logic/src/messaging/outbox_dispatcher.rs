use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use async_trait::async_trait;
use servicing_api::domain::MessageEnvelope;
use servicing_api::service::{BrokerPublisher, Worker, WorkerStatus};
use servicing_api::{ServicingError, ServicingResult};
use servicing_db::models::OutboxMessageModel;
use servicing_db::repository::OutboxRepository;

use crate::settings::OutboxSettings;

/// Polls unpublished outbox rows in `created_at` order and publishes
/// them with confirms. Failures back off exponentially (capped, with
/// jitter); rows that exhaust the attempt budget are parked for an
/// operator.
pub struct OutboxDispatcher {
    outbox_repository: Arc<dyn OutboxRepository>,
    publisher: Arc<dyn BrokerPublisher>,
    settings: OutboxSettings,
    state: Mutex<DispatcherState>,
}

struct DispatcherState {
    status: WorkerStatus,
    handle: Option<JoinHandle<()>>,
    shutdown: Option<tokio::sync::watch::Sender<bool>>,
}

impl OutboxDispatcher {
    pub fn new(
        outbox_repository: Arc<dyn OutboxRepository>,
        publisher: Arc<dyn BrokerPublisher>,
        settings: OutboxSettings,
    ) -> Self {
        Self {
            outbox_repository,
            publisher,
            settings,
            state: Mutex::new(DispatcherState {
                status: WorkerStatus::Idle,
                handle: None,
                shutdown: None,
            }),
        }
    }

    /// One polling pass. Returns the number of rows published.
    pub async fn run_once(&self) -> ServicingResult<usize> {
        dispatch_pass(&*self.outbox_repository, &*self.publisher, &self.settings).await
    }

    /// Operator action: return a parked row to the dispatch loop.
    pub async fn requeue_parked(&self, outbox_id: uuid::Uuid) -> ServicingResult<()> {
        self.outbox_repository.requeue_parked(outbox_id).await
    }

    pub async fn parked(&self) -> ServicingResult<Vec<OutboxMessageModel>> {
        self.outbox_repository.parked().await
    }
}

async fn dispatch_pass(
    repo: &dyn OutboxRepository,
    publisher: &dyn BrokerPublisher,
    settings: &OutboxSettings,
) -> ServicingResult<usize> {
    let due = repo.fetch_due(Utc::now(), settings.batch_size).await?;

    let mut published = 0;
    for row in due {
        match dispatch_row(publisher, &row).await {
            Ok(()) => {
                repo.mark_published(row.outbox_id, Utc::now()).await?;
                published += 1;
            }
            Err(err) => {
                let attempts = row.attempt_count + 1;
                let parked = attempts >= settings.max_attempts;
                let next_retry = if parked {
                    None
                } else {
                    Some(Utc::now() + backoff(settings, attempts))
                };
                repo.record_failure(row.outbox_id, attempts, next_retry, &err.to_string(), parked)
                    .await?;
                if parked {
                    tracing::error!(
                        outbox_id = %row.outbox_id,
                        attempts,
                        error = %err,
                        "outbox row parked; operator action required"
                    );
                } else {
                    tracing::warn!(
                        outbox_id = %row.outbox_id,
                        attempts,
                        error = %err,
                        "outbox publish failed; will retry"
                    );
                }
            }
        }
    }
    Ok(published)
}

async fn dispatch_row(
    publisher: &dyn BrokerPublisher,
    row: &OutboxMessageModel,
) -> ServicingResult<()> {
    let envelope: MessageEnvelope = serde_json::from_value(row.payload.clone())
        .map_err(|e| ServicingError::Internal(format!("corrupt outbox payload: {e}")))?;
    publisher
        .publish(&row.exchange, &row.routing_key, &envelope)
        .await
}

/// `min(cap, 2^attempts × 1 s)` plus up to a second of jitter.
fn backoff(settings: &OutboxSettings, attempts: i32) -> Duration {
    let exp_secs = 1u64
        .checked_shl(attempts.clamp(0, 30) as u32)
        .unwrap_or(u64::MAX)
        .min(settings.max_backoff_secs);
    let jitter_ms = rand::thread_rng().gen_range(0..1000);
    Duration::seconds(exp_secs as i64) + Duration::milliseconds(jitter_ms)
}

#[async_trait]
impl Worker for OutboxDispatcher {
    fn name(&self) -> &str {
        "outbox_dispatcher"
    }

    async fn start(&self) -> ServicingResult<()> {
        let mut state = self.state.lock().await;
        if state.status == WorkerStatus::Running {
            return Ok(());
        }

        let (tx, mut rx) = tokio::sync::watch::channel(false);
        let repo = self.outbox_repository.clone();
        let publisher = self.publisher.clone();
        let settings = self.settings;

        let handle = tokio::spawn(async move {
            let poll = std::time::Duration::from_secs(settings.poll_interval_secs);
            loop {
                if *rx.borrow() {
                    break;
                }
                if let Err(err) = dispatch_pass(&*repo, &*publisher, &settings).await {
                    tracing::error!(error = %err, "outbox dispatch pass failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(poll) => {}
                    _ = rx.changed() => {}
                }
            }
        });

        state.status = WorkerStatus::Running;
        state.handle = Some(handle);
        state.shutdown = Some(tx);
        tracing::info!("outbox dispatcher started");
        Ok(())
    }

    async fn stop(&self) -> ServicingResult<()> {
        let mut state = self.state.lock().await;
        if let Some(shutdown) = state.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = state.handle.take() {
            let _ = handle.await;
        }
        state.status = WorkerStatus::Stopped;
        tracing::info!("outbox dispatcher stopped");
        Ok(())
    }

    async fn status(&self) -> WorkerStatus {
        self.state.lock().await.status
    }
}
