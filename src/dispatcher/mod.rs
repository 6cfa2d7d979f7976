//! # Order Dispatcher
//!
//! The concurrent message dispatch loop: one sequential intake stream, many
//! concurrent outbound producers, and a deterministic teardown.
//!
//! # Architecture Note
//! The loop exists as a component distinct from the processor for exactly one
//! reason: intake must never block on processing. The dispatcher pulls messages
//! strictly one at a time in broker order, spawns a processor task per message
//! into a [`JoinSet`], and immediately goes back to waiting for the next one.
//! Completion order across processors is unconstrained — each waits an
//! independently random delay.
//!
//! # Concurrency Model
//! - **Intake**: single cooperative loop, suspended only while waiting for the
//!   next broker message (or the stop signal).
//! - **Processing**: one task per accepted message, no admission control. The
//!   `JoinSet` is the outstanding-task set: insertion on spawn, removal on
//!   completion, and a blocking "wait for all" drain on loop exit.
//! - **Cancellation**: graceful drain. A stop signal ends intake only;
//!   in-flight processors always run to completion before the connection is
//!   closed. Children are never force-cancelled — aborting mid-flight could
//!   lose a delivery publish.
//!
//! # Lifecycle
//! `connect()` → `run()` (loop → drain → close). The connection is torn down
//! only after every spawned processor has finished.

use crate::broker::{BrokerClient, BrokerError, InboundMessage, ORDER_TOPIC, QOS_EXACTLY_ONCE};
use crate::config::DispatcherConfig;
use crate::delay::DelayProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

pub mod processor;

/// Requests cooperative shutdown of a running [`OrderDispatcher`].
///
/// Calling [`StopHandle::stop`] ends intake: no further messages are pulled,
/// in-flight orders drain, then the connection is closed.
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Owns the broker connection, runs the receive loop, and tracks every spawned
/// processor task until completion.
pub struct OrderDispatcher<B: BrokerClient> {
    broker: Arc<B>,
    config: DispatcherConfig,
    delay: Arc<dyn DelayProvider>,
    tasks: JoinSet<()>,
    stop: watch::Receiver<bool>,
}

impl<B: BrokerClient> OrderDispatcher<B> {
    /// Create a dispatcher and the handle used to stop it.
    pub fn new(
        broker: Arc<B>,
        config: DispatcherConfig,
        delay: Arc<dyn DelayProvider>,
    ) -> (Self, StopHandle) {
        let (tx, rx) = watch::channel(false);
        let dispatcher = Self {
            broker,
            config,
            delay,
            tasks: JoinSet::new(),
            stop: rx,
        };
        (dispatcher, StopHandle { tx })
    }

    /// Connect to the broker and subscribe to the order topic.
    ///
    /// No retry: failures propagate to the caller. If the transport connect
    /// fails, no subscription has been made.
    pub async fn connect(&self) -> Result<(), BrokerError> {
        self.broker.connect().await?;
        self.broker
            .subscribe(&[(ORDER_TOPIC, QOS_EXACTLY_ONCE)])
            .await?;
        info!(topic = ORDER_TOPIC, "connected and subscribed");
        Ok(())
    }

    /// Run the receive loop until a loop-fatal broker error or a stop request,
    /// then drain all in-flight orders and close the connection.
    ///
    /// Loop-fatal means the session or transport is gone
    /// ([`BrokerError::is_loop_fatal`]); a failure to handle one message is
    /// logged and skipped. Errors past this point are reported via logging
    /// only — nothing is re-raised across the loop boundary.
    pub async fn run(mut self) {
        info!(topic = ORDER_TOPIC, "listening for orders");

        let broker = Arc::clone(&self.broker);
        let mut stop = self.stop.clone();
        // Resolves once when a stop is requested. A dropped StopHandle means
        // shutdown can only come from the broker side.
        let stop_requested = async move {
            if stop.wait_for(|requested| *requested).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(stop_requested);

        loop {
            tokio::select! {
                _ = &mut stop_requested => {
                    info!("stop requested, ending intake");
                    break;
                }
                received = receive_next_order(broker.as_ref(), None) => {
                    match received {
                        Ok(Some(message)) => self.spawn_processor(message),
                        Ok(None) => {}
                        Err(e) if e.is_loop_fatal() => {
                            error!(error = %e, "broker receive failed, ending intake");
                            break;
                        }
                        Err(e) => error!(error = %e, "error while handling message"),
                    }
                }
            }
        }

        self.drain().await;
        self.close().await;
    }

    /// Tear down the broker session: unsubscribe, then disconnect.
    ///
    /// Must only run after intake has stopped and all processor tasks have
    /// completed; closing earlier risks pulling the connection out from under
    /// an in-flight publish. Errors here are logged in isolation and never
    /// propagated.
    pub async fn close(&self) {
        if let Err(e) = self.broker.unsubscribe(&[ORDER_TOPIC]).await {
            error!(error = %e, topic = ORDER_TOPIC, "failed to unsubscribe");
        }
        if let Err(e) = self.broker.disconnect().await {
            error!(error = %e, "failed to disconnect");
        }
        info!("broker connection closed");
    }

    fn spawn_processor(&mut self, message: InboundMessage) {
        let broker = Arc::clone(&self.broker);
        let delay = Arc::clone(&self.delay);
        let min_wait = self.config.min_wait;
        let max_wait = self.config.max_wait;
        self.tasks
            .spawn(processor::process(broker, delay, min_wait, max_wait, message));
    }

    /// Wait for every outstanding processor task to finish.
    async fn drain(&mut self) {
        let outstanding = self.tasks.len();
        if outstanding > 0 {
            info!(outstanding, "draining in-flight orders");
        }
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "order task failed");
            }
        }
    }
}

/// Wait for the next order message.
///
/// `Ok(None)` covers both an elapsed timeout and an envelope the broker could
/// not hand over a payload for; either way the loop just tries again. Hard
/// transport errors are returned to the loop for classification.
async fn receive_next_order<B: BrokerClient>(
    broker: &B,
    timeout: Option<Duration>,
) -> Result<Option<InboundMessage>, BrokerError> {
    match broker.receive(timeout).await {
        Ok(Some(message)) => {
            info!(
                topic = %message.topic,
                sequence = ?message.sequence,
                bytes = message.payload.len(),
                "received order"
            );
            Ok(Some(message))
        }
        Ok(None) => {
            error!("failed to retrieve next order message");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
