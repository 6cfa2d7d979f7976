//! Binary entry point: wire configuration, broker, and dispatcher together,
//! then run until the broker session ends or the process is asked to stop.
//!
//! Startup failures (bad configuration, failed connect/subscribe) are fatal:
//! logged and reported with a non-zero exit status. Once the loop is running,
//! errors are contained and surfaced through logs only.

use kitchen_dispatch::broker::mqtt::MqttBroker;
use kitchen_dispatch::config::DispatcherConfig;
use kitchen_dispatch::delay::UniformDelay;
use kitchen_dispatch::dispatcher::OrderDispatcher;
use kitchen_dispatch::runtime::tracing::setup_tracing;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    setup_tracing();
    info!("starting kitchen dispatcher");

    // A missing .env file is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    let config = match DispatcherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "fatal error while creating config");
            std::process::exit(1);
        }
    };

    let broker = match MqttBroker::new(&config.broker_url) {
        Ok(broker) => Arc::new(broker),
        Err(e) => {
            error!(error = %e, url = %config.broker_url, "fatal error while building broker client");
            std::process::exit(1);
        }
    };

    let (dispatcher, stop) = OrderDispatcher::new(broker, config, Arc::new(UniformDelay));

    if let Err(e) = dispatcher.connect().await {
        error!(error = %e, "fatal error while connecting to broker");
        std::process::exit(1);
    }

    // Ctrl-C requests cooperative shutdown: intake stops, in-flight orders
    // drain, then the connection closes.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            stop.stop();
        }
    });

    dispatcher.run().await;
    info!("kitchen dispatcher stopped");
}
