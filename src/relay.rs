use crate::amqp::{self, BusSink};
use crate::conf::Config;
use crate::egress::EgressRoute;
use crate::error::RelayError;
use crate::health::{HealthStatus, SharedHealthState};
use crate::ingress::IngressRoute;
use crate::message::Message;
use crate::sink::BlobSink;
use crate::transform::TimestampTransformer;
use anyhow::{Context, Error};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, Consumer};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Owns the broker connections and drives the ingress route, one message at
/// a time (prefetch 1, manual ack).
pub struct MessageRelay {
    source_channel: Channel,
    source_connection: Connection,
    bus_connection: Connection,
    ingress: IngressRoute,
    config: Config,
    health_state: SharedHealthState,
}

impl MessageRelay {
    pub async fn new(config: Config, health_state: SharedHealthState) -> anyhow::Result<Self> {
        {
            let mut state = health_state.write().await;
            state.liveness = HealthStatus::Starting;
            state.readiness = HealthStatus::Starting;
        }

        let source_conn =
            amqp::connect_with_retry(&config.source_dsn, "Connecting to source broker")
                .await
                .context("Source broker connection failed")?;

        let source_channel = source_conn
            .create_channel()
            .await
            .context("Failed to create source channel")?;

        // One unacked message at a time per the consumption model.
        source_channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .context("Failed to set QoS")?;

        let bus_conn = amqp::connect_with_retry(&config.bus_dsn, "Connecting to bus broker")
            .await
            .context("Bus broker connection failed")?;

        let bus_channel = bus_conn
            .create_channel()
            .await
            .context("Failed to create bus channel")?;

        let egress = EgressRoute::new(
            Arc::new(TimestampTransformer::outbound()),
            Arc::new(BusSink::new(
                bus_channel,
                &config.bus_exchange,
                &config.bus_routing_key,
            )),
        );
        let blob = BlobSink::new(
            &config.blob_endpoint,
            &config.blob_container,
            config.blob_access_token.clone(),
        );
        let ingress = IngressRoute::new(
            Arc::new(TimestampTransformer::inbound()),
            vec![Arc::new(blob), Arc::new(egress)],
        );

        info!(
            event = "relay_connected",
            source_queue = %config.source_queue,
            bus_exchange = %config.bus_exchange,
            bus_routing_key = %config.bus_routing_key,
            "Connected to source and bus brokers"
        );

        {
            let mut state = health_state.write().await;
            state.liveness = HealthStatus::Healthy;
            state.readiness = HealthStatus::Healthy;
        }

        Ok(Self {
            source_channel,
            source_connection: source_conn,
            bus_connection: bus_conn,
            ingress,
            config,
            health_state,
        })
    }

    /// Check if connections are still alive
    fn is_connected(&self) -> bool {
        self.source_connection.status().connected() && self.bus_connection.status().connected()
    }

    async fn mark_unhealthy(&self) {
        let mut state = self.health_state.write().await;
        state.liveness = HealthStatus::Unhealthy;
        state.readiness = HealthStatus::Unhealthy;
    }

    async fn update_message_timestamp(&self) {
        let mut state = self.health_state.write().await;
        state.last_message_processed = Some(std::time::Instant::now());
    }

    async fn process_delivery(&self, delivery: &Delivery) -> anyhow::Result<()> {
        info!(
            event = "message_received",
            bytes = delivery.data.len(),
            delivery_tag = delivery.delivery_tag,
            content = %preview(&delivery.data),
            "Received message"
        );

        let outcome = match std::str::from_utf8(&delivery.data) {
            Ok(body) => {
                let mut message = Message::new(body);
                if let Some(headers) = delivery.properties.headers() {
                    message.headers = amqp::field_table_to_headers(headers);
                }
                self.ingress.handle(message).await
            }
            Err(e) => Err(RelayError::MalformedPayload(format!("body is not UTF-8: {e}"))),
        };

        match disposition(&outcome) {
            Disposition::Ack => {
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .context("Failed to ack")?;
                self.update_message_timestamp().await;
            }
            Disposition::Reject => {
                if let Err(e) = &outcome {
                    warn!(
                        event = "message_rejected",
                        delivery_tag = delivery.delivery_tag,
                        error = %e,
                        "Rejecting message without requeue"
                    );
                }
                delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        multiple: false,
                    })
                    .await
                    .context("Failed to nack")?;
            }
            Disposition::Requeue => {
                if let Err(e) = &outcome {
                    error!(
                        event = "message_requeued",
                        delivery_tag = delivery.delivery_tag,
                        error = %e,
                        "Delivery failed, returning message to the source queue"
                    );
                }
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        multiple: false,
                    })
                    .await
                    .context("Failed to nack")?;
            }
        }

        Ok(())
    }

    async fn consume(&self, mut consumer: Consumer) -> Result<(), Error> {
        while let Some(delivery_result) = consumer.next().await {
            // Check connection health before processing
            if !self.is_connected() {
                error!(event = "connection_lost", "Connection lost, stopping consumer loop");
                self.mark_unhealthy().await;
                return Err(anyhow::anyhow!("Connection lost during message processing"));
            }

            match delivery_result {
                Ok(delivery) => {
                    if let Err(e) = self.process_delivery(&delivery).await {
                        // ack/nack I/O failed; the channel is gone
                        error!(event = "channel_error", error = %e, "Broker channel error");
                        self.mark_unhealthy().await;
                        return Err(e);
                    }
                }
                Err(e) => {
                    error!(event = "consumer_error", error = %e, "Error receiving message");
                    self.mark_unhealthy().await;
                    return Err(anyhow::anyhow!("Consumer error: {e}"));
                }
            }
        }

        Ok(())
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            event = "consumer_starting",
            queue = %self.config.source_queue,
            "Starting to consume"
        );

        let consumer = self
            .source_channel
            .basic_consume(
                &self.config.source_queue,
                "relay_consumer",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .context("Failed to start consuming")?;

        info!(event = "consumer_started", "Consumer started, waiting for messages");

        self.consume(consumer).await?;

        warn!(event = "consumer_ended", "Consumer stream ended");
        self.mark_unhealthy().await;
        Err(anyhow::anyhow!("Consumer stream ended unexpectedly"))
    }
}

/// What happens to a delivery once the ingress route has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Ack,
    /// Return to the source queue for redelivery.
    Requeue,
    /// Reject without requeue; the broker's dead-letter policy applies.
    /// Requeueing a permanently invalid body would loop forever.
    Reject,
}

fn disposition(outcome: &crate::error::Result<()>) -> Disposition {
    match outcome {
        Ok(()) => Disposition::Ack,
        Err(RelayError::MalformedPayload(_)) => Disposition::Reject,
        Err(RelayError::DeliveryFailure { .. }) => Disposition::Requeue,
    }
}

/// Render a log-safe preview of the raw body, truncated to at most 200
/// bytes without splitting a multibyte character.
fn preview(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) if s.len() > 200 => {
            let mut end = 200;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => format!("<binary data, {} bytes>", data.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_handling_is_acked() {
        assert_eq!(disposition(&Ok(())), Disposition::Ack);
    }

    #[test]
    fn malformed_payloads_are_rejected_without_requeue() {
        let outcome = Err(RelayError::MalformedPayload("not json".to_string()));
        assert_eq!(disposition(&outcome), Disposition::Reject);
    }

    #[test]
    fn delivery_failures_are_requeued() {
        let outcome = Err(RelayError::delivery("blob", "store unavailable"));
        assert_eq!(disposition(&outcome), Disposition::Requeue);
    }

    #[test]
    fn preview_truncates_on_a_char_boundary() {
        // 249 bytes of valid JSON where byte 200 lands mid-character.
        let body = format!(r#"{{"kk":"{}"}}"#, "é".repeat(120));
        assert!(body.len() > 200);

        let p = preview(body.as_bytes());

        assert!(p.ends_with("..."));
        let prefix = p.strip_suffix("...").unwrap();
        assert!(prefix.len() <= 200);
        assert!(body.starts_with(prefix));
    }

    #[test]
    fn preview_keeps_short_bodies_whole() {
        assert_eq!(preview(b"{\"test\":\"message\"}"), "{\"test\":\"message\"}");
    }

    #[test]
    fn preview_marks_binary_bodies() {
        assert_eq!(preview(&[0xff, 0xfe, 0x00]), "<binary data, 3 bytes>");
    }
}
