use crate::error::{RelayError, Result};
use crate::message::Message;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

/// A delivery target for the fan-out stage. Targets are kept as an explicit
/// list so each one reports success or failure independently.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Short target name used in logs and `DeliveryFailure` errors.
    fn name(&self) -> &str;

    /// Deliver one message to this target.
    ///
    /// # Errors
    /// Returns `DeliveryFailure` when the target rejects the write, or
    /// `MalformedPayload` when an in-process target refuses the body.
    async fn deliver(&self, message: Message) -> Result<()>;
}

/// Write-only blob store sink: one HTTP `PUT` per message body.
///
/// Objects are named with a fresh UUID under the configured container;
/// partitioning beyond that is left to the store.
pub struct BlobSink {
    client: reqwest::Client,
    endpoint: String,
    container: String,
    access_token: Option<String>,
}

impl BlobSink {
    pub fn new(endpoint: &str, container: &str, access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            container: container.to_string(),
            access_token,
        }
    }

    fn object_url(&self) -> String {
        format!("{}/{}/{}.json", self.endpoint, self.container, Uuid::new_v4())
    }
}

#[async_trait]
impl MessageSink for BlobSink {
    fn name(&self) -> &str {
        "blob"
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        let url = self.object_url();

        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message.body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::delivery(self.name(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::delivery(
                self.name(),
                format!("blob store returned {status} for {url}"),
            ));
        }

        debug!(event = "blob_written", url = %url, "Stored message body as blob");
        Ok(())
    }
}
