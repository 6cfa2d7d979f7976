//! # Order Processor
//!
//! The per-message unit of work: validate the payload, wait the simulated
//! kitchen delay, republish to the delivery topic.
//!
//! Each processor runs as its own task and is an isolated fault domain. It
//! shares only the broker handle with its siblings and has no other mutable
//! state, so no locking is needed. Failures are logged and contained; nothing
//! here can take down the receive loop or another in-flight order.

use crate::broker::{BrokerClient, InboundMessage, DELIVERY_TOPIC, QOS_EXACTLY_ONCE};
use crate::delay::DelayProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Handle a single order message.
///
/// An empty payload is a handling error, not a fatal one: it is logged and the
/// message is silently dropped — there is no retry or dead-letter policy, so
/// zero publishes result. A non-empty payload is republished byte-identical to
/// [`DELIVERY_TOPIC`] at QoS 2 after the sampled delay.
pub async fn process<B: BrokerClient>(
    broker: Arc<B>,
    delay: Arc<dyn DelayProvider>,
    min_wait: Duration,
    max_wait: Duration,
    message: InboundMessage,
) {
    if message.payload.is_empty() {
        error!(
            topic = %message.topic,
            sequence = ?message.sequence,
            "order has empty payload, dropping"
        );
        return;
    }

    // Simulate the kitchen doing the actual work.
    let wait = delay.sample(min_wait, max_wait);
    info!(
        topic = %message.topic,
        sequence = ?message.sequence,
        wait_ms = wait.as_millis() as u64,
        "preparing order"
    );
    tokio::time::sleep(wait).await;

    match broker
        .publish(DELIVERY_TOPIC, &message.payload, QOS_EXACTLY_ONCE)
        .await
    {
        Ok(()) => info!(
            topic = DELIVERY_TOPIC,
            sequence = ?message.sequence,
            "order delivered"
        ),
        Err(e) => error!(
            error = %e,
            sequence = ?message.sequence,
            "failed to publish delivery"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::mock::MockBroker;
    use crate::broker::BrokerError;
    use crate::delay::FixedDelay;

    fn zero_delay() -> Arc<dyn DelayProvider> {
        Arc::new(FixedDelay(Duration::ZERO))
    }

    #[tokio::test]
    async fn republishes_payload_unchanged() {
        let broker = Arc::new(MockBroker::new());
        let message = InboundMessage::new("restaurant/order", &b"data1"[..]);

        process(
            Arc::clone(&broker),
            zero_delay(),
            Duration::ZERO,
            Duration::ZERO,
            message,
        )
        .await;

        assert_eq!(broker.publishes_to(DELIVERY_TOPIC), vec![b"data1".to_vec()]);
    }

    #[tokio::test]
    async fn empty_payload_is_dropped_without_publish() {
        let broker = Arc::new(MockBroker::new());
        let message = InboundMessage::new("restaurant/order", &b""[..]);

        process(
            Arc::clone(&broker),
            zero_delay(),
            Duration::ZERO,
            Duration::ZERO,
            message,
        )
        .await;

        assert!(broker.publishes_to(DELIVERY_TOPIC).is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_contained() {
        let broker = Arc::new(MockBroker::new());
        broker.fail_publish(BrokerError::Protocol("rejected".to_string()));
        let message = InboundMessage::new("restaurant/order", &b"data1"[..]);

        // Must complete without panicking; the failure is logged only.
        process(
            Arc::clone(&broker),
            zero_delay(),
            Duration::ZERO,
            Duration::ZERO,
            message,
        )
        .await;

        assert!(broker.publishes_to(DELIVERY_TOPIC).is_empty());
    }
}
