//! # MQTT Broker Client
//!
//! Production [`BrokerClient`] implementation backed by `rumqttc`.
//!
//! # Architecture Note
//! `rumqttc` splits a session into an [`AsyncClient`] (request side) and an
//! [`EventLoop`] that must be polled to make any progress — including flushing
//! outgoing publishes. We therefore spawn a dedicated driver task on `connect`
//! that owns the event loop, forwards inbound publishes into a channel, and
//! keeps the session alive while processor tasks publish concurrently.
//! `receive` is then just a channel read, which gives the dispatcher clean
//! timeout and session-loss semantics.

use super::{BrokerClient, BrokerError, InboundMessage};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter,
};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const DEFAULT_MQTT_PORT: u16 = 1883;
const INBOUND_BUFFER: usize = 64;

/// MQTT-backed broker client.
///
/// Cheap to share behind an `Arc`; `publish` is safe to call from any number
/// of tasks concurrently.
pub struct MqttBroker {
    client: AsyncClient,
    // Taken by `connect`, which hands it to the driver task.
    event_loop: Mutex<Option<EventLoop>>,
    inbound: tokio::sync::Mutex<Option<mpsc::Receiver<InboundMessage>>>,
}

impl MqttBroker {
    /// Build a client for the given broker URL (`mqtt://host:port`).
    ///
    /// The connection is not opened until [`BrokerClient::connect`] is called.
    pub fn new(broker_url: &str) -> Result<Self, BrokerError> {
        let (host, port) = parse_broker_url(broker_url)?;
        let client_id = format!("kitchen-dispatch-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, event_loop) = AsyncClient::new(options, 10);
        Ok(Self {
            client,
            event_loop: Mutex::new(Some(event_loop)),
            inbound: tokio::sync::Mutex::new(None),
        })
    }
}

#[async_trait]
impl BrokerClient for MqttBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        let event_loop = self
            .event_loop
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BrokerError::Protocol("already connected".to_string()))?;

        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(drive(event_loop, tx, ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => {
                *self.inbound.lock().await = Some(rx);
                Ok(())
            }
            Ok(Err(reason)) => Err(BrokerError::Connection(reason)),
            Err(_) => Err(BrokerError::Connection(
                "event loop exited before connack".to_string(),
            )),
        }
    }

    async fn subscribe(&self, topics: &[(&str, u8)]) -> Result<(), BrokerError> {
        let filters: Vec<SubscribeFilter> = topics
            .iter()
            .map(|(topic, qos)| SubscribeFilter::new(topic.to_string(), qos_level(*qos)))
            .collect();
        self.client
            .subscribe_many(filters)
            .await
            .map_err(|e| BrokerError::Protocol(e.to_string()))
    }

    async fn receive(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Option<InboundMessage>, BrokerError> {
        let mut guard = self.inbound.lock().await;
        let rx = guard
            .as_mut()
            .ok_or_else(|| BrokerError::Protocol("not connected".to_string()))?;

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx.recv()).await {
                Ok(received) => received,
                Err(_) => return Ok(None),
            },
            None => rx.recv().await,
        };

        match received {
            Some(message) => Ok(Some(message)),
            // Driver gone: the session is over.
            None => Err(BrokerError::SessionLost(
                "broker connection closed".to_string(),
            )),
        }
    }

    async fn publish(&self, topic: &str, payload: &[u8], qos: u8) -> Result<(), BrokerError> {
        self.client
            .publish(topic, qos_level(qos), false, payload.to_vec())
            .await
            .map_err(|e| BrokerError::Protocol(e.to_string()))
    }

    async fn unsubscribe(&self, topics: &[&str]) -> Result<(), BrokerError> {
        for topic in topics {
            self.client
                .unsubscribe(*topic)
                .await
                .map_err(|e| BrokerError::Protocol(e.to_string()))?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BrokerError::Protocol(e.to_string()))
    }
}

/// Own the rumqttc event loop: confirm the connack, forward inbound publishes,
/// and keep outgoing traffic (publish/subscribe acks, pings) flowing.
async fn drive(
    mut event_loop: EventLoop,
    tx: mpsc::Sender<InboundMessage>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let mut ready = Some(ready);
    let mut sequence: u64 = 0;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if let Some(ready) = ready.take() {
                    if ack.code == ConnectReturnCode::Success {
                        let _ = ready.send(Ok(()));
                    } else {
                        let _ = ready.send(Err(format!(
                            "broker refused connection: {:?}",
                            ack.code
                        )));
                        return;
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                sequence += 1;
                let message = InboundMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                    sequence: Some(sequence),
                };
                if tx.send(message).await.is_err() {
                    debug!("inbound receiver dropped, stopping event loop");
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                match ready.take() {
                    Some(ready) => {
                        let _ = ready.send(Err(e.to_string()));
                    }
                    // Normal after a requested disconnect; the channel closing
                    // tells `receive` the session is over.
                    None => warn!(error = %e, "mqtt event loop closed"),
                }
                return;
            }
        }
    }
}

fn qos_level(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn parse_broker_url(url: &str) -> Result<(String, u16), BrokerError> {
    let trimmed = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    if trimmed.is_empty() {
        return Err(BrokerError::Connection(format!(
            "invalid broker url '{url}'"
        )));
    }

    match trimmed.split_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| {
                BrokerError::Connection(format!("invalid broker port in '{url}'"))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((trimmed.to_string(), DEFAULT_MQTT_PORT)),
    }
}
