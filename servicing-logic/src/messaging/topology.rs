use servicing_api::domain::messaging::{exchanges, schemas};
use servicing_api::service::QueueSpec;

use crate::settings::BrokerSettings;

pub const Q_PAYMENT_VALIDATION: &str = "payment_validation";
pub const Q_PAYMENT_PROCESSING: &str = "payment_processing";
pub const Q_RECONCILE: &str = "reconcile";
pub const Q_AUDIT_LOG: &str = "audit_log";
pub const Q_ESCROW_EVENTS: &str = "escrow_events";
pub const Q_SERVICING_CYCLE: &str = "servicing_cycle";

/// Declared queue topology: durable/quorum queues with per-queue
/// prefetch, a bounded delivery limit, and dead-letter routing.
pub fn queue_specs(settings: &BrokerSettings) -> Vec<QueueSpec> {
    let limit = settings.delivery_limit;
    vec![
        QueueSpec {
            name: Q_PAYMENT_VALIDATION.to_string(),
            exchange: exchanges::PAYMENTS_VALIDATION.to_string(),
            routing_key: schemas::PAYMENT_RECEIVED_V1.to_string(),
            prefetch: settings.prefetch.payment_validation,
            delivery_limit: limit,
            dead_letter_exchange: exchanges::PAYMENTS_DLQ.to_string(),
        },
        QueueSpec {
            name: Q_PAYMENT_PROCESSING.to_string(),
            exchange: exchanges::PAYMENTS_VALIDATION.to_string(),
            routing_key: schemas::PAYMENT_VALIDATED_V1.to_string(),
            prefetch: settings.prefetch.payment_processing,
            delivery_limit: limit,
            dead_letter_exchange: exchanges::PAYMENTS_DLQ.to_string(),
        },
        QueueSpec {
            name: Q_RECONCILE.to_string(),
            exchange: exchanges::CASH_EVENTS.to_string(),
            routing_key: "#".to_string(),
            prefetch: settings.prefetch.reconcile,
            delivery_limit: limit,
            dead_letter_exchange: exchanges::PAYMENTS_DLQ.to_string(),
        },
        QueueSpec {
            name: Q_AUDIT_LOG.to_string(),
            // fanout: every payment event is audited
            exchange: exchanges::PAYMENTS_EVENTS.to_string(),
            routing_key: "#".to_string(),
            prefetch: settings.prefetch.audit_log,
            delivery_limit: limit,
            dead_letter_exchange: exchanges::PAYMENTS_DLQ.to_string(),
        },
        QueueSpec {
            name: Q_ESCROW_EVENTS.to_string(),
            exchange: exchanges::ESCROW_EVENTS.to_string(),
            routing_key: "#".to_string(),
            prefetch: settings.prefetch.reconcile,
            delivery_limit: limit,
            dead_letter_exchange: exchanges::ESCROW_DLQ.to_string(),
        },
        QueueSpec {
            name: Q_SERVICING_CYCLE.to_string(),
            exchange: exchanges::ESCROW_SAGA.to_string(),
            routing_key: "#".to_string(),
            prefetch: settings.prefetch.servicing_cycle,
            delivery_limit: limit,
            dead_letter_exchange: exchanges::ESCROW_DLQ.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefetch_follows_settings() {
        let specs = queue_specs(&BrokerSettings::default());
        let validation = specs.iter().find(|q| q.name == Q_PAYMENT_VALIDATION).unwrap();
        let processing = specs.iter().find(|q| q.name == Q_PAYMENT_PROCESSING).unwrap();
        let cycle = specs.iter().find(|q| q.name == Q_SERVICING_CYCLE).unwrap();
        assert_eq!(validation.prefetch, 20);
        assert_eq!(processing.prefetch, 5);
        assert_eq!(cycle.prefetch, 1);
        assert!(specs.iter().all(|q| q.delivery_limit == 6));
        assert!(specs.iter().all(|q| !q.dead_letter_exchange.is_empty()));
    }
}
