use crate::error::{RelayError, Result};
use crate::message::Message;
use crate::sink::MessageSink;
use crate::transform::MessageTransformer;
use std::sync::Arc;
use tracing::{debug, error};

/// Receive → Transform → Dispatch.
///
/// Applies the inbound transform, then delivers the result to every target in
/// order. The targets are an explicit list so each delivery succeeds or fails
/// on its own; every target is attempted even when an earlier one fails, and
/// the first failure is reported back to the consume loop after the pass.
pub struct IngressRoute {
    transformer: Arc<dyn MessageTransformer>,
    targets: Vec<Arc<dyn MessageSink>>,
}

impl IngressRoute {
    pub fn new(transformer: Arc<dyn MessageTransformer>, targets: Vec<Arc<dyn MessageSink>>) -> Self {
        Self { transformer, targets }
    }

    /// Run one message through the route.
    ///
    /// # Errors
    /// `MalformedPayload` if the transform rejects the body (nothing is
    /// dispatched), or the first `DeliveryFailure` raised by a target.
    pub async fn handle(&self, message: Message) -> Result<()> {
        let message = self.transformer.transform(message).await?;

        let mut first_failure: Option<RelayError> = None;
        for target in &self.targets {
            match target.deliver(message.clone()).await {
                Ok(()) => {
                    debug!(event = "dispatched", target = target.name(), "Delivered");
                }
                Err(e) => {
                    error!(
                        event = "dispatch_failed",
                        target = target.name(),
                        error = %e,
                        "Delivery failed"
                    );
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
