use thiserror::Error;

/// Failures a message can hit on its way through the relay.
///
/// Both variants surface synchronously to the route that invoked the failing
/// stage; redelivery and dead-lettering stay with the broker configuration.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The message body is not valid JSON (or not valid UTF-8 at ingress).
    /// The message is not forwarded past the failing stage.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A delivery target rejected the write. No automatic retry is attempted
    /// here; the consume loop decides whether the broker redelivers.
    #[error("delivery to '{target}' failed: {reason}")]
    DeliveryFailure { target: String, reason: String },
}

impl RelayError {
    pub fn delivery(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeliveryFailure {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
