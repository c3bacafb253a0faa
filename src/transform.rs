use crate::error::{RelayError, Result};
use crate::message::Message;
use async_trait::async_trait;
use chrono::Utc;

#[async_trait]
pub trait MessageTransformer: Send + Sync {
    /// Transform a `Message` before it is forwarded to the next stage.
    ///
    /// # Errors
    /// Implementations return an error when the message must not be
    /// forwarded, e.g. an invalid payload. The invoking route decides what
    /// happens to the original delivery.
    async fn transform(&self, input: Message) -> Result<Message>;
}

/// Stamp-and-passthrough transform: parses the body as JSON, re-serializes
/// it, and stamps the configured header with the current epoch milliseconds.
///
/// Both directions of the relay are the same operation with a different
/// header name, so there is one transformer parameterized by it.
pub struct TimestampTransformer {
    header: &'static str,
}

impl TimestampTransformer {
    /// Ingress-side transform, stamps `processedTimestamp`.
    pub fn inbound() -> Self {
        Self {
            header: "processedTimestamp",
        }
    }

    /// Egress-side transform, stamps `sentTimestamp`.
    pub fn outbound() -> Self {
        Self {
            header: "sentTimestamp",
        }
    }
}

#[async_trait]
impl MessageTransformer for TimestampTransformer {
    async fn transform(&self, mut input: Message) -> Result<Message> {
        let value: serde_json::Value = serde_json::from_str(&input.body)
            .map_err(|e| RelayError::MalformedPayload(e.to_string()))?;

        input.body = value.to_string();
        input.set_header(self.header, Utc::now().timestamp_millis());

        Ok(input)
    }
}
