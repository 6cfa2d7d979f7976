//! # Mock Broker & Testing Guide
//!
//! [`MockBroker`] implements the same [`BrokerClient`] API as the production
//! MQTT client but operates entirely in-memory. Tests script what `receive`
//! returns and then assert on the calls the dispatcher made, enabling fast,
//! deterministic testing of the receive loop without a live broker.
//!
//! ## Scripting receives
//!
//! Each call to `receive` consumes the next [`ScriptedReceive`] entry:
//!
//! - `Message(msg)` — a well-formed order arrives.
//! - `Empty` — "no message this iteration" (timeout / missing packet).
//! - `Error(e)` — a broker error; `SessionLost` ends the loop, others do not.
//! - `Block` — never resolves; used to park the loop so a stop signal can be
//!   exercised.
//!
//! An exhausted script behaves like `Block`, so tests that drive shutdown via
//! cancellation do not need a trailing entry.
//!
//! ## Asserting behavior
//!
//! Every call is appended to an ordered event log ([`BrokerEvent`]). Ordering
//! assertions (all publishes before the disconnect, intake decoupled from
//! processing) read the log; content assertions use the [`MockBroker::publishes_to`]
//! and [`MockBroker::subscriptions`] helpers.

use super::{BrokerClient, BrokerError, InboundMessage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted outcome for a `receive` call.
#[derive(Clone, Debug)]
pub enum ScriptedReceive {
    /// Deliver a message.
    Message(InboundMessage),
    /// Return "no message this iteration".
    Empty,
    /// Fail with the given error.
    Error(BrokerError),
    /// Never resolve. The loop stays parked until cancelled.
    Block,
}

/// A recorded call against the mock, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerEvent {
    Connect,
    Subscribe(Vec<String>),
    Receive,
    Publish { topic: String, payload: Vec<u8> },
    Unsubscribe(Vec<String>),
    Disconnect,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<ScriptedReceive>,
    events: Vec<BrokerEvent>,
    subscriptions: Vec<String>,
    connect_error: Option<BrokerError>,
    subscribe_error: Option<BrokerError>,
    publish_error: Option<BrokerError>,
}

/// In-memory [`BrokerClient`] test double with scripted receives and a
/// recorded event log.
#[derive(Default)]
pub struct MockBroker {
    state: Mutex<MockState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scripted outcome for a future `receive` call.
    pub fn script(&self, entry: ScriptedReceive) {
        self.state.lock().unwrap().script.push_back(entry);
    }

    /// Convenience: script the arrival of one order message.
    pub fn script_message(&self, topic: &str, payload: &[u8]) {
        self.script(ScriptedReceive::Message(InboundMessage::new(topic, payload)));
    }

    /// Make the next `connect` call fail.
    pub fn fail_connect(&self, error: BrokerError) {
        self.state.lock().unwrap().connect_error = Some(error);
    }

    /// Make the next `subscribe` call fail.
    pub fn fail_subscribe(&self, error: BrokerError) {
        self.state.lock().unwrap().subscribe_error = Some(error);
    }

    /// Make every `publish` call fail.
    pub fn fail_publish(&self, error: BrokerError) {
        self.state.lock().unwrap().publish_error = Some(error);
    }

    /// Snapshot of the ordered event log.
    pub fn events(&self) -> Vec<BrokerEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Payloads published to `topic`, in publish order.
    pub fn publishes_to(&self, topic: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter_map(|e| match e {
                BrokerEvent::Publish { topic: t, payload } if t == topic => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Topics currently subscribed to.
    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    /// Number of `receive` calls observed so far.
    pub fn receive_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| matches!(e, BrokerEvent::Receive))
            .count()
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(BrokerEvent::Connect);
        if let Some(e) = state.connect_error.take() {
            return Err(e);
        }
        Ok(())
    }

    async fn subscribe(&self, topics: &[(&str, u8)]) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        let names: Vec<String> = topics.iter().map(|(t, _)| t.to_string()).collect();
        state.events.push(BrokerEvent::Subscribe(names.clone()));
        if let Some(e) = state.subscribe_error.take() {
            return Err(e);
        }
        state.subscriptions.extend(names);
        Ok(())
    }

    async fn receive(
        &self,
        _timeout: Option<Duration>,
    ) -> Result<Option<InboundMessage>, BrokerError> {
        let entry = {
            let mut state = self.state.lock().unwrap();
            state.events.push(BrokerEvent::Receive);
            state.script.pop_front()
        };
        match entry {
            Some(ScriptedReceive::Message(msg)) => Ok(Some(msg)),
            Some(ScriptedReceive::Empty) => Ok(None),
            Some(ScriptedReceive::Error(e)) => Err(e),
            Some(ScriptedReceive::Block) | None => {
                // Park forever; only cancellation gets the caller out.
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn publish(&self, topic: &str, payload: &[u8], _qos: u8) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.publish_error.clone() {
            return Err(e);
        }
        state.events.push(BrokerEvent::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn unsubscribe(&self, topics: &[&str]) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        let names: Vec<String> = topics.iter().map(|t| t.to_string()).collect();
        state.events.push(BrokerEvent::Unsubscribe(names.clone()));
        state.subscriptions.retain(|s| !names.contains(s));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(BrokerEvent::Disconnect);
        Ok(())
    }
}
