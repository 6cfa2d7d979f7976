//! Integration tests for the receive loop: the dispatcher runs against a
//! scripted [`MockBroker`] and the tests assert on the recorded calls.
//!
//! Delays use [`FixedDelay`] plus tokio's paused virtual clock, so nothing
//! here depends on wall-clock time.

use kitchen_dispatch::broker::mock::{BrokerEvent, MockBroker, ScriptedReceive};
use kitchen_dispatch::broker::{BrokerError, DELIVERY_TOPIC, ORDER_TOPIC};
use kitchen_dispatch::config::DispatcherConfig;
use kitchen_dispatch::delay::FixedDelay;
use kitchen_dispatch::dispatcher::{OrderDispatcher, StopHandle};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> DispatcherConfig {
    DispatcherConfig::new("mqtt://localhost:1883", Duration::ZERO, Duration::ZERO).unwrap()
}

fn dispatcher(
    broker: &Arc<MockBroker>,
    delay: Duration,
) -> (OrderDispatcher<MockBroker>, StopHandle) {
    OrderDispatcher::new(
        Arc::clone(broker),
        test_config(),
        Arc::new(FixedDelay(delay)),
    )
}

fn session_lost() -> ScriptedReceive {
    ScriptedReceive::Error(BrokerError::SessionLost("broker went away".to_string()))
}

/// One buffered order, zero delay, exactly one delivery publish
/// with the payload byte-identical to the input.
#[tokio::test]
async fn single_order_is_delivered_exactly_once() {
    let broker = Arc::new(MockBroker::new());
    broker.script_message(ORDER_TOPIC, b"data1");
    broker.script(session_lost());

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    dispatcher.connect().await.unwrap();
    dispatcher.run().await;

    assert_eq!(broker.publishes_to(DELIVERY_TOPIC), vec![b"data1".to_vec()]);
}

/// Ten buffered orders with distinct payloads all appear among the
/// delivery publishes, in any order, count = 10.
#[tokio::test]
async fn ten_orders_all_get_delivered() {
    let broker = Arc::new(MockBroker::new());
    let payloads: Vec<Vec<u8>> = (0..10).map(|i| format!("order-{i}").into_bytes()).collect();
    for payload in &payloads {
        broker.script_message(ORDER_TOPIC, payload);
    }
    broker.script(session_lost());

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    dispatcher.connect().await.unwrap();
    dispatcher.run().await;

    let mut published = broker.publishes_to(DELIVERY_TOPIC);
    published.sort();
    let mut expected = payloads;
    expected.sort();
    assert_eq!(published, expected);
}

/// An empty payload produces zero delivery publishes and the loop
/// keeps accepting subsequent messages.
#[tokio::test]
async fn empty_payload_is_dropped_and_loop_continues() {
    let broker = Arc::new(MockBroker::new());
    broker.script_message(ORDER_TOPIC, b"");
    broker.script_message(ORDER_TOPIC, b"data2");
    broker.script(session_lost());

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    dispatcher.connect().await.unwrap();
    dispatcher.run().await;

    assert_eq!(broker.publishes_to(DELIVERY_TOPIC), vec![b"data2".to_vec()]);
    // The empty message did not kill intake: all three receives happened.
    assert_eq!(broker.receive_count(), 3);
}

/// A failed connect is surfaced to the caller and leaves no
/// subscription behind.
#[tokio::test]
async fn connect_failure_leaves_no_subscription() {
    let broker = Arc::new(MockBroker::new());
    broker.fail_connect(BrokerError::Connection("refused".to_string()));

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    let result = dispatcher.connect().await;

    assert!(matches!(result, Err(BrokerError::Connection(_))));
    assert!(broker.subscriptions().is_empty());
    assert!(!broker
        .events()
        .iter()
        .any(|e| matches!(e, BrokerEvent::Subscribe(_))));
}

/// A subscribe failure during connect also propagates.
#[tokio::test]
async fn subscribe_failure_propagates() {
    let broker = Arc::new(MockBroker::new());
    broker.fail_subscribe(BrokerError::Protocol("bad filter".to_string()));

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    let result = dispatcher.connect().await;

    assert!(matches!(result, Err(BrokerError::Protocol(_))));
    assert!(broker.subscriptions().is_empty());
}

/// Connect subscribes to the order topic.
#[tokio::test]
async fn connect_subscribes_to_order_topic() {
    let broker = Arc::new(MockBroker::new());

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    dispatcher.connect().await.unwrap();

    assert_eq!(broker.subscriptions(), vec![ORDER_TOPIC.to_string()]);
}

/// Intake is decoupled from processing. With a long per-order delay, every
/// receive completes before the first delivery publish happens.
#[tokio::test(start_paused = true)]
async fn intake_is_not_blocked_by_processing() {
    let broker = Arc::new(MockBroker::new());
    for i in 0..10u8 {
        broker.script_message(ORDER_TOPIC, &[i + 1]);
    }
    broker.script(session_lost());

    let (dispatcher, _stop) = dispatcher(&broker, Duration::from_secs(60));
    dispatcher.connect().await.unwrap();
    dispatcher.run().await;

    let events = broker.events();
    let last_receive = events
        .iter()
        .rposition(|e| matches!(e, BrokerEvent::Receive))
        .expect("receives recorded");
    let first_publish = events
        .iter()
        .position(|e| matches!(e, BrokerEvent::Publish { .. }))
        .expect("publishes recorded");
    assert!(
        last_receive < first_publish,
        "intake should finish before any publish: last receive at {last_receive}, first publish at {first_publish}"
    );
    assert_eq!(broker.publishes_to(DELIVERY_TOPIC).len(), 10);
}

/// A one-off protocol error on receive is recoverable: the loop logs it and
/// keeps pulling messages.
#[tokio::test]
async fn recoverable_receive_error_does_not_end_loop() {
    let broker = Arc::new(MockBroker::new());
    broker.script(ScriptedReceive::Error(BrokerError::Protocol(
        "garbled envelope".to_string(),
    )));
    broker.script_message(ORDER_TOPIC, b"data1");
    broker.script(session_lost());

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    dispatcher.connect().await.unwrap();
    dispatcher.run().await;

    assert_eq!(broker.publishes_to(DELIVERY_TOPIC), vec![b"data1".to_vec()]);
}

/// "No message this iteration" (timeout / missing packet) is not an error and
/// does not end the loop.
#[tokio::test]
async fn empty_receive_does_not_end_loop() {
    let broker = Arc::new(MockBroker::new());
    broker.script(ScriptedReceive::Empty);
    broker.script_message(ORDER_TOPIC, b"data1");
    broker.script(session_lost());

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    dispatcher.connect().await.unwrap();
    dispatcher.run().await;

    assert_eq!(broker.publishes_to(DELIVERY_TOPIC), vec![b"data1".to_vec()]);
    assert_eq!(broker.receive_count(), 3);
}

/// Session loss is loop-fatal: intake ends and the connection is closed in
/// order (unsubscribe, then disconnect).
#[tokio::test]
async fn session_loss_ends_loop_and_closes_connection() {
    let broker = Arc::new(MockBroker::new());
    broker.script(session_lost());

    let (dispatcher, _stop) = dispatcher(&broker, Duration::ZERO);
    dispatcher.connect().await.unwrap();
    dispatcher.run().await;

    let events = broker.events();
    assert!(matches!(
        events[events.len() - 2],
        BrokerEvent::Unsubscribe(_)
    ));
    assert!(matches!(events[events.len() - 1], BrokerEvent::Disconnect));
}
