use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use servicing_api::domain::StageEvent;
use servicing_api::service::{
    BrokerConsumer, Delivery, PaymentService, Worker, WorkerStatus,
};
use servicing_api::{ErrorClass, ServicingResult};

/// What a stage handler decided about one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Transient failure: redeliver.
    RetryLater,
    /// Poison or fatal: dead-letter.
    DeadLetter,
}

#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn handle(&self, event: StageEvent) -> ServicingResult<()>;
}

/// Validation stage: consumes `payment.received.v1`.
pub struct ValidationHandler {
    payment_service: Arc<dyn PaymentService>,
}

impl ValidationHandler {
    pub fn new(payment_service: Arc<dyn PaymentService>) -> Self {
        Self { payment_service }
    }
}

#[async_trait]
impl StageHandler for ValidationHandler {
    async fn handle(&self, event: StageEvent) -> ServicingResult<()> {
        match event {
            StageEvent::PaymentReceived { payment_id, .. } => {
                // invalid payments surface as payment.failed.v1 via the
                // service's own outbox write, not as consumer errors
                self.payment_service.validate(payment_id).await.map(|_| ())
            }
            other => {
                tracing::warn!(schema = other.schema(), "validation queue got unexpected event");
                Ok(())
            }
        }
    }
}

/// Posting stage: consumes `payment.validated.v1`.
pub struct PostingHandler {
    payment_service: Arc<dyn PaymentService>,
}

impl PostingHandler {
    pub fn new(payment_service: Arc<dyn PaymentService>) -> Self {
        Self { payment_service }
    }
}

#[async_trait]
impl StageHandler for PostingHandler {
    async fn handle(&self, event: StageEvent) -> ServicingResult<()> {
        match event {
            StageEvent::PaymentValidated { payment_id, .. } => {
                self.payment_service.post(payment_id).await.map(|_| ())
            }
            other => {
                tracing::warn!(schema = other.schema(), "posting queue got unexpected event");
                Ok(())
            }
        }
    }
}

/// A queue consumer task binding one handler to one queue. Decode
/// failures and fatal errors dead-letter the message; transient errors
/// requeue it; dedupes and validation outcomes ack.
pub struct StageConsumer {
    name: String,
    queue: String,
    broker: Arc<dyn BrokerConsumer>,
    handler: Arc<dyn StageHandler>,
    state: Mutex<ConsumerState>,
}

struct ConsumerState {
    status: WorkerStatus,
    handle: Option<JoinHandle<()>>,
    shutdown: Option<tokio::sync::watch::Sender<bool>>,
}

impl StageConsumer {
    pub fn new(
        name: &str,
        queue: &str,
        broker: Arc<dyn BrokerConsumer>,
        handler: Arc<dyn StageHandler>,
    ) -> Self {
        Self {
            name: name.to_string(),
            queue: queue.to_string(),
            broker,
            handler,
            state: Mutex::new(ConsumerState {
                status: WorkerStatus::Idle,
                handle: None,
                shutdown: None,
            }),
        }
    }

    /// Drain and process everything currently in the queue. Used by
    /// tests and the polling loop alike.
    pub async fn drain(&self) -> ServicingResult<usize> {
        drain_queue(&self.queue, &*self.broker, &*self.handler).await
    }
}

async fn drain_queue(
    queue: &str,
    broker: &dyn BrokerConsumer,
    handler: &dyn StageHandler,
) -> ServicingResult<usize> {
    let mut handled = 0;
    while let Some(delivery) = broker.next_delivery(queue).await? {
        let disposition = process_delivery(&delivery, handler).await;
        match disposition {
            Disposition::Ack => broker.ack(delivery.delivery_tag).await?,
            Disposition::RetryLater => broker.nack(delivery.delivery_tag, true).await?,
            Disposition::DeadLetter => broker.nack(delivery.delivery_tag, false).await?,
        }
        handled += 1;
    }
    Ok(handled)
}

async fn process_delivery(delivery: &Delivery, handler: &dyn StageHandler) -> Disposition {
    let event = match delivery.envelope.decode() {
        Ok(event) => event,
        Err(err) => {
            tracing::error!(
                queue = delivery.queue,
                message_id = %delivery.envelope.message_id,
                error = %err,
                "undecodable message dead-lettered"
            );
            return Disposition::DeadLetter;
        }
    };

    match handler.handle(event).await {
        Ok(()) => Disposition::Ack,
        Err(err) => match err.class() {
            ErrorClass::Dedupe | ErrorClass::Validation => {
                tracing::debug!(
                    queue = delivery.queue,
                    error = %err,
                    "business outcome acked"
                );
                Disposition::Ack
            }
            ErrorClass::Transient => {
                tracing::warn!(queue = delivery.queue, error = %err, "transient failure, requeueing");
                Disposition::RetryLater
            }
            ErrorClass::Fatal => {
                tracing::error!(queue = delivery.queue, error = %err, "fatal failure, dead-lettering");
                Disposition::DeadLetter
            }
        },
    }
}

#[async_trait]
impl Worker for StageConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> ServicingResult<()> {
        let mut state = self.state.lock().await;
        if state.status == WorkerStatus::Running {
            return Ok(());
        }

        let (tx, mut rx) = tokio::sync::watch::channel(false);
        let broker = self.broker.clone();
        let handler = self.handler.clone();
        let queue = self.queue.clone();
        let name = self.name.clone();

        let handle = tokio::spawn(async move {
            loop {
                if *rx.borrow() {
                    break;
                }
                if let Err(err) = drain_queue(&queue, &*broker, &*handler).await {
                    tracing::error!(consumer = name, error = %err, "consumer pass failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
                    _ = rx.changed() => {}
                }
            }
        });

        state.status = WorkerStatus::Running;
        state.handle = Some(handle);
        state.shutdown = Some(tx);
        tracing::info!(consumer = self.name, queue = self.queue, "stage consumer started");
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
        Ok(())
    }

    async fn status(&self) -> WorkerStatus {
        self.state.lock().await.status
    }
}
