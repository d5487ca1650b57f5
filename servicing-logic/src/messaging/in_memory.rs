use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use servicing_api::domain::MessageEnvelope;
use servicing_api::service::{BrokerConsumer, BrokerPublisher, Delivery, QueueSpec};
use servicing_api::{ServicingError, ServicingResult};

struct QueueState {
    spec: QueueSpec,
    ready: VecDeque<(MessageEnvelope, u32)>,
}

struct Unacked {
    queue: String,
    envelope: MessageEnvelope,
    redelivery_count: u32,
}

/// In-process broker implementing the publisher/consumer ports with the
/// same visible semantics as the production topology: topic routing,
/// publisher confirms, per-message redelivery counting, and dead-letter
/// routing once the delivery limit is exhausted.
///
/// Used by tests and local wiring; production deployments bind the same
/// ports to a real broker adapter.
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, QueueState>>,
    dead_letters: Mutex<HashMap<String, Vec<MessageEnvelope>>>,
    unacked: Mutex<HashMap<u64, Unacked>>,
    delivery_seq: AtomicU64,
    fail_publishes: AtomicBool,
}

impl InMemoryBroker {
    pub fn new(specs: Vec<QueueSpec>) -> Self {
        let queues = specs
            .into_iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    QueueState {
                        spec,
                        ready: VecDeque::new(),
                    },
                )
            })
            .collect();
        Self {
            queues: Mutex::new(queues),
            dead_letters: Mutex::new(HashMap::new()),
            unacked: Mutex::new(HashMap::new()),
            delivery_seq: AtomicU64::new(0),
            fail_publishes: AtomicBool::new(false),
        }
    }

    /// Test hook: make publishes time out until cleared.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    pub fn queue_depth(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .expect("broker lock")
            .get(queue)
            .map(|state| state.ready.len())
            .unwrap_or(0)
    }

    pub fn dead_letter_depth(&self, exchange: &str) -> usize {
        self.dead_letters
            .lock()
            .expect("broker lock")
            .get(exchange)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn dead_letter(&self, queue: &str, envelope: MessageEnvelope) {
        let exchange = self
            .queues
            .lock()
            .expect("broker lock")
            .get(queue)
            .map(|state| state.spec.dead_letter_exchange.clone())
            .unwrap_or_else(|| "dlq".to_string());
        self.dead_letters
            .lock()
            .expect("broker lock")
            .entry(exchange)
            .or_default()
            .push(envelope);
    }
}

#[async_trait]
impl BrokerPublisher for InMemoryBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        envelope: &MessageEnvelope,
    ) -> ServicingResult<()> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(ServicingError::PublishTimeout {
                topic: exchange.to_string(),
                timeout_secs: 5,
            });
        }

        let mut queues = self.queues.lock().expect("broker lock");
        for state in queues.values_mut() {
            let bound = state.spec.exchange == exchange
                && (state.spec.routing_key == "#" || state.spec.routing_key == routing_key);
            if bound {
                state.ready.push_back((envelope.clone(), 0));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerConsumer for InMemoryBroker {
    async fn next_delivery(&self, queue: &str) -> ServicingResult<Option<Delivery>> {
        let mut queues = self.queues.lock().expect("broker lock");
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| ServicingError::NotFound(format!("queue {queue}")))?;

        // prefetch bounds in-flight work per queue
        let in_flight = self
            .unacked
            .lock()
            .expect("broker lock")
            .values()
            .filter(|u| u.queue == queue)
            .count();
        if in_flight >= state.spec.prefetch as usize {
            return Ok(None);
        }

        let Some((envelope, redelivery_count)) = state.ready.pop_front() else {
            return Ok(None);
        };
        let delivery_tag = self.delivery_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.unacked.lock().expect("broker lock").insert(
            delivery_tag,
            Unacked {
                queue: queue.to_string(),
                envelope: envelope.clone(),
                redelivery_count,
            },
        );
        Ok(Some(Delivery {
            delivery_tag,
            queue: queue.to_string(),
            envelope,
            redelivery_count,
        }))
    }

    async fn ack(&self, delivery_tag: u64) -> ServicingResult<()> {
        self.unacked
            .lock()
            .expect("broker lock")
            .remove(&delivery_tag)
            .map(|_| ())
            .ok_or_else(|| ServicingError::NotFound(format!("delivery {delivery_tag}")))
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> ServicingResult<()> {
        let unacked = self
            .unacked
            .lock()
            .expect("broker lock")
            .remove(&delivery_tag)
            .ok_or_else(|| ServicingError::NotFound(format!("delivery {delivery_tag}")))?;

        if !requeue {
            self.dead_letter(&unacked.queue, unacked.envelope);
            return Ok(());
        }

        let limit = self
            .queues
            .lock()
            .expect("broker lock")
            .get(&unacked.queue)
            .map(|state| state.spec.delivery_limit)
            .unwrap_or(0);
        let next_count = unacked.redelivery_count + 1;
        if next_count >= limit {
            self.dead_letter(&unacked.queue, unacked.envelope);
            return Ok(());
        }

        if let Some(state) = self
            .queues
            .lock()
            .expect("broker lock")
            .get_mut(&unacked.queue)
        {
            state.ready.push_back((unacked.envelope, next_count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicing_api::domain::messaging::{exchanges, schemas};
    use uuid::Uuid;

    fn spec(name: &str, routing_key: &str, prefetch: u16, limit: u32) -> QueueSpec {
        QueueSpec {
            name: name.to_string(),
            exchange: exchanges::PAYMENTS_VALIDATION.to_string(),
            routing_key: routing_key.to_string(),
            prefetch,
            delivery_limit: limit,
            dead_letter_exchange: exchanges::PAYMENTS_DLQ.to_string(),
        }
    }

    fn envelope() -> MessageEnvelope {
        MessageEnvelope::wrap(
            schemas::PAYMENT_RECEIVED_V1,
            "c-1",
            Uuid::new_v4(),
            serde_json::json!({"kind": "payment_validated", "payment_id": Uuid::nil(), "loan_id": Uuid::nil()}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn routes_by_exchange_and_key() {
        let broker = InMemoryBroker::new(vec![
            spec("q1", schemas::PAYMENT_RECEIVED_V1, 10, 6),
            spec("q2", "#", 10, 6),
            spec("q3", schemas::PAYMENT_VALIDATED_V1, 10, 6),
        ]);
        broker
            .publish(
                exchanges::PAYMENTS_VALIDATION,
                schemas::PAYMENT_RECEIVED_V1,
                &envelope(),
            )
            .await
            .unwrap();
        assert_eq!(broker.queue_depth("q1"), 1);
        assert_eq!(broker.queue_depth("q2"), 1);
        assert_eq!(broker.queue_depth("q3"), 0);
    }

    #[tokio::test]
    async fn prefetch_bounds_in_flight_deliveries() {
        let broker = InMemoryBroker::new(vec![spec("q", "#", 2, 6)]);
        for _ in 0..3 {
            broker
                .publish(exchanges::PAYMENTS_VALIDATION, "x.v1", &envelope())
                .await
                .unwrap();
        }
        let d1 = broker.next_delivery("q").await.unwrap().unwrap();
        let _d2 = broker.next_delivery("q").await.unwrap().unwrap();
        // two in flight at prefetch 2: nothing more until an ack
        assert!(broker.next_delivery("q").await.unwrap().is_none());
        broker.ack(d1.delivery_tag).await.unwrap();
        assert!(broker.next_delivery("q").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delivery_limit_dead_letters_poison_messages() {
        let broker = InMemoryBroker::new(vec![spec("q", "#", 10, 3)]);
        broker
            .publish(exchanges::PAYMENTS_VALIDATION, "x.v1", &envelope())
            .await
            .unwrap();

        loop {
            match broker.next_delivery("q").await.unwrap() {
                Some(delivery) => broker.nack(delivery.delivery_tag, true).await.unwrap(),
                None => break,
            }
        }
        assert_eq!(broker.queue_depth("q"), 0);
        assert_eq!(broker.dead_letter_depth(exchanges::PAYMENTS_DLQ), 1);
    }

    #[tokio::test]
    async fn nack_without_requeue_goes_straight_to_dlq() {
        let broker = InMemoryBroker::new(vec![spec("q", "#", 10, 6)]);
        broker
            .publish(exchanges::PAYMENTS_VALIDATION, "x.v1", &envelope())
            .await
            .unwrap();
        let delivery = broker.next_delivery("q").await.unwrap().unwrap();
        broker.nack(delivery.delivery_tag, false).await.unwrap();
        assert_eq!(broker.dead_letter_depth(exchanges::PAYMENTS_DLQ), 1);
    }

    #[tokio::test]
    async fn failed_publish_surfaces_confirm_timeout() {
        let broker = InMemoryBroker::new(vec![spec("q", "#", 10, 6)]);
        broker.set_fail_publishes(true);
        let err = broker
            .publish(exchanges::PAYMENTS_VALIDATION, "x.v1", &envelope())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
