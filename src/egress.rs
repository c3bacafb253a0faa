use crate::error::Result;
use crate::message::Message;
use crate::sink::MessageSink;
use crate::transform::MessageTransformer;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Receive → Transform → Publish.
///
/// The hand-off from ingress is a synchronous direct call: `EgressRoute` is
/// itself a delivery target, so transform or publish failures surface to the
/// ingress fan-out in the same call. Nothing is buffered in between.
pub struct EgressRoute {
    transformer: Arc<dyn MessageTransformer>,
    bus: Arc<dyn MessageSink>,
}

impl EgressRoute {
    pub fn new(transformer: Arc<dyn MessageTransformer>, bus: Arc<dyn MessageSink>) -> Self {
        Self { transformer, bus }
    }
}

#[async_trait]
impl MessageSink for EgressRoute {
    fn name(&self) -> &str {
        "egress"
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        let message = self.transformer.transform(message).await?;
        self.bus.deliver(message).await?;
        debug!(event = "published", target = self.bus.name(), "Published to bus");
        Ok(())
    }
}
