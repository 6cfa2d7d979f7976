//! # Broker Capability
//!
//! This module defines [`BrokerClient`], the abstract publish/subscribe capability
//! the dispatcher consumes. The dispatcher never talks to a wire protocol
//! directly; it only sees this trait.
//!
//! # Architecture Note
//! Why a trait instead of calling the MQTT client directly?
//! By defining a contract (`BrokerClient`) for everything the dispatcher needs
//! from a broker, we can write the receive loop *once* and run it against the
//! production MQTT implementation ([`mqtt::MqttBroker`]) or an in-memory test
//! double ([`mock::MockBroker`]). Testing the concurrency contract of the loop
//! never requires a live broker.
//!
//! The trait mirrors the lifecycle of a pub/sub session:
//! `connect` → `subscribe` → `receive`/`publish` → `unsubscribe` → `disconnect`.

use async_trait::async_trait;
use std::time::Duration;

pub mod mock;
pub mod mqtt;

/// Topic that order messages arrive on.
pub const ORDER_TOPIC: &str = "restaurant/order";

/// Topic that delivery messages are published to.
pub const DELIVERY_TOPIC: &str = "restaurant/deliver";

/// Strongest delivery guarantee the broker offers ("exactly-once-ish").
pub const QOS_EXACTLY_ONCE: u8 = 2;

/// One inbound unit of work, as delivered by the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// The topic the message arrived on.
    pub topic: String,
    /// Opaque order data, forwarded unmodified.
    pub payload: Vec<u8>,
    /// Broker-assigned sequence identifier. Used for log correlation only,
    /// never for dispatch decisions.
    pub sequence: Option<u64>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// Errors surfaced by a [`BrokerClient`].
///
/// The dispatcher classifies these into loop-fatal and recoverable: losing the
/// session or the transport ends the receive loop, anything else is logged and
/// the loop continues. See [`BrokerError::is_loop_fatal`].
#[derive(Clone, Debug, thiserror::Error)]
pub enum BrokerError {
    /// The transport connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),
    /// Any other broker-level failure (bad subscribe, rejected publish, ...).
    #[error("broker protocol error: {0}")]
    Protocol(String),
    /// The client lost its session; no further messages will arrive.
    #[error("broker session lost: {0}")]
    SessionLost(String),
}

impl BrokerError {
    /// Whether this error should terminate the receive loop.
    ///
    /// Per-message failures are recoverable; only transport/session-level
    /// errors end the loop.
    pub fn is_loop_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::SessionLost(_))
    }
}

/// Abstract pub/sub capability with at-least-once delivery and QoS-acknowledged
/// publishes.
///
/// Implementations must be safe for concurrent `publish` calls: the receive
/// loop and every in-flight processor task share one handle.
#[async_trait]
pub trait BrokerClient: Send + Sync + 'static {
    /// Open the connection to the broker.
    async fn connect(&self) -> Result<(), BrokerError>;

    /// Subscribe to the given `(topic, qos)` pairs.
    async fn subscribe(&self, topics: &[(&str, u8)]) -> Result<(), BrokerError>;

    /// Wait for the next inbound message.
    ///
    /// Returns `Ok(None)` when the optional timeout elapses or when the broker
    /// delivered an envelope with no extractable payload — "no message this
    /// iteration", not an error. A hard transport failure is an `Err`.
    async fn receive(&self, timeout: Option<Duration>)
        -> Result<Option<InboundMessage>, BrokerError>;

    /// Publish `payload` to `topic` at the given QoS level.
    async fn publish(&self, topic: &str, payload: &[u8], qos: u8) -> Result<(), BrokerError>;

    /// Unsubscribe from the given topics.
    async fn unsubscribe(&self, topics: &[&str]) -> Result<(), BrokerError>;

    /// Tear down the connection.
    async fn disconnect(&self) -> Result<(), BrokerError>;
}
