use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::messaging::MessageEnvelope;
use crate::ServicingResult;

/// Declared shape of one queue: durable/quorum with dead-lettering and a
/// bounded delivery limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSpec {
    pub name: String,
    pub exchange: String,
    pub routing_key: String,
    pub prefetch: u16,
    pub delivery_limit: u32,
    pub dead_letter_exchange: String,
}

/// Publisher port. Implementations must honor publisher confirms: a
/// returned Ok means the broker confirmed the publish within the
/// configured timeout.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        envelope: &MessageEnvelope,
    ) -> ServicingResult<()>;
}

/// Consumer port: deliveries arrive with an ack handle; prefetch bounds
/// in-flight work per queue.
#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    /// Pull the next delivery for the queue, if any.
    async fn next_delivery(&self, queue: &str) -> ServicingResult<Option<Delivery>>;

    async fn ack(&self, delivery_tag: u64) -> ServicingResult<()>;

    /// Negative-ack. `requeue = false` dead-letters the message.
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> ServicingResult<()>;
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub queue: String,
    pub envelope: MessageEnvelope,
    pub redelivery_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Running,
    Stopped,
    Failed,
}

/// Common lifecycle capability implemented by stage consumers, the
/// outbox dispatcher, and the daily cycle.
#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> ServicingResult<()>;

    async fn stop(&self) -> ServicingResult<()>;

    async fn status(&self) -> WorkerStatus;
}
