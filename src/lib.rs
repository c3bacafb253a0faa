pub mod amqp;
pub mod conf;
pub mod egress;
pub mod error;
pub mod health;
pub mod ingress;
pub mod logging;
pub mod message;
pub mod relay;
pub mod sink;
pub mod transform;

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

pub use crate::conf::Config;
pub use crate::egress::EgressRoute;
pub use crate::error::RelayError;
pub use crate::health::{HealthState, HealthStatus, SharedHealthState, run_health_server};
pub use crate::ingress::IngressRoute;
pub use crate::logging::{LogFormat, init_logging};
pub use crate::message::{HeaderValue, Message};
pub use crate::relay::MessageRelay;
pub use crate::sink::{BlobSink, MessageSink};
pub use crate::transform::{MessageTransformer, TimestampTransformer};

/// Run the relay with automatic reconnection and health status updates.
///
/// # Errors
/// Returns an error if establishing broker connections, creating channels,
/// consuming, publishing, or other underlying I/O operations fail while
/// creating or running the relay.
pub async fn run_with_recovery(config: Config, health_state: SharedHealthState) -> Result<()> {
    const RECONNECT_DELAY: Duration = Duration::from_secs(5);

    loop {
        info!(event = "relay_creating", "Creating message relay");

        match MessageRelay::new(config.clone(), health_state.clone()).await {
            Ok(relay) => {
                info!(
                    event = "relay_created",
                    status = "success",
                    "Relay created successfully, starting message processing"
                );

                match relay.run().await {
                    Ok(()) => {
                        warn!(
                            event = "relay_stopped",
                            reason = "normal",
                            "Relay stopped normally (unexpected)"
                        );
                    }
                    Err(e) => {
                        error!(
                            event = "relay_error",
                            error = %e,
                            "Relay encountered an error"
                        );
                    }
                }

                info!(
                    event = "relay_reconnecting",
                    delay_secs = RECONNECT_DELAY.as_secs(),
                    "Connection lost or error occurred, will attempt to reconnect"
                );
            }
            Err(e) => {
                error!(
                    event = "relay_creation_failed",
                    error = %e,
                    retry_delay_secs = RECONNECT_DELAY.as_secs(),
                    "Failed to create relay"
                );

                // Mark as unhealthy if we can't create the relay
                let mut state = health_state.write().await;
                state.liveness = HealthStatus::Unhealthy;
                state.readiness = HealthStatus::Unhealthy;
            }
        }

        time::sleep(RECONNECT_DELAY).await;
        info!(event = "reconnect_attempt", "Attempting to reconnect");
    }
}

/// Run the relay and a health server until the provided `shutdown` future completes.
///
/// # Errors
/// Returns an error if the health server fails to bind or serve requests, or
/// if the relay fails to initialize or run due to broker/IO errors.
pub async fn run_relay_until<S>(
    config: Config,
    health_state: SharedHealthState,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    info!(
        event = "application_starting",
        "Starting message relay with auto-recovery and health checks"
    );

    info!(
        event = "config_loaded",
        source_queue = %config.source_queue,
        bus_exchange = %config.bus_exchange,
        bus_routing_key = %config.bus_routing_key,
        blob_container = %config.blob_container,
        health_port = config.health_port,
        "Configuration loaded"
    );

    let health_server = run_health_server(config.health_port, health_state.clone());
    let relay = run_with_recovery(config, health_state);

    tokio::pin!(health_server);
    tokio::pin!(relay);
    tokio::pin!(shutdown);

    tokio::select! {
        result = &mut health_server => {
            error!(
                event = "health_server_failed",
                error = ?result,
                "Health server failed"
            );
            result.context("Health server failed")?;
        }
        result = &mut relay => {
            error!(
                event = "relay_failed",
                error = ?result,
                "Relay failed"
            );
            result.context("Relay failed")?;
        }
        () = &mut shutdown => {
            info!(
                event = "shutdown_signal",
                "Received shutdown signal, exiting gracefully"
            );
        }
    }

    info!(
        event = "application_stopped",
        "Application shutdown complete"
    );

    Ok(())
}

/// Convenience runner that waits for Ctrl-C and then shuts down gracefully.
///
/// # Errors
/// Propagates any errors from `run_relay_until`, including failures starting
/// the health server or the relay.
pub async fn run_with_ctrl_c(config: Config, health_state: SharedHealthState) -> Result<()> {
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    run_relay_until(config, health_state, shutdown).await
}
