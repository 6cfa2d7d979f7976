//! # Kitchen Dispatch
//!
//! > **A concurrent order dispatcher for a pub/sub restaurant.**
//!
//! This crate subscribes to `restaurant/order` on an MQTT broker and, for every
//! inbound order, spawns an independent task that waits a randomized "kitchen"
//! delay and republishes the payload unchanged to `restaurant/deliver` at
//! QoS 2.
//!
//! ## 🏗️ Design Philosophy
//!
//! The only part of this system with a real concurrency contract is the
//! dispatch loop: one sequential inbound stream, many concurrent outbound
//! producers, and a connection lifecycle that must tear down deterministically.
//! Everything around it is a capability injected at construction:
//!
//! - **Broker**: the [`broker::BrokerClient`] trait. Production uses
//!   [`broker::mqtt::MqttBroker`] (rumqttc); tests use
//!   [`broker::mock::MockBroker`].
//! - **Delay**: the [`delay::DelayProvider`] trait, so tests run on
//!   deterministic time instead of wall-clock randomness.
//! - **Logging**: `tracing` everywhere with structured fields; setup lives in
//!   [`runtime::tracing`], scoped to the binary.
//!
//! ## 🚀 Module Tour
//!
//! - [`broker`]: the abstract pub/sub capability, its MQTT implementation, and
//!   the in-memory mock.
//! - [`config`]: environment-sourced [`config::DispatcherConfig`]; invalid
//!   configuration is startup-fatal.
//! - [`delay`]: injectable simulated-work durations.
//! - [`dispatcher`]: the core — [`dispatcher::OrderDispatcher`] with its
//!   receive loop, per-message [`dispatcher::processor`], graceful drain, and
//!   close.
//! - [`runtime`]: process-level tracing setup.
//!
//! ## Guarantees
//!
//! - Intake is never blocked by processing.
//! - Exactly one delivery publish per valid order; zero for empty payloads.
//! - On shutdown (stop signal or session loss) every in-flight order drains
//!   before the connection closes.
//!
//! ## 🧪 Testing
//!
//! See [`broker::mock`] for scripting receives and asserting on the ordered
//! event log without a live broker.

pub mod broker;
pub mod config;
pub mod delay;
pub mod dispatcher;
pub mod runtime;
