use std::collections::BTreeMap;

/// A header value attached to a [`Message`]. Headers are ad-hoc key/value
/// pairs with no fixed schema; timestamps are carried as `Int` epoch millis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A message in transit: a UTF-8 text body plus uniquely-keyed headers.
///
/// Created at ingress, cloned per fan-out target, dropped once every delivery
/// has been attempted. Nothing is persisted beyond transit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub body: String,
    pub headers: BTreeMap<String, HeaderValue>,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Set a header, replacing any previous value under the same key.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Builder-style variant of [`set_header`](Self::set_header), handy in tests.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.set_header(name, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_unique_per_key() {
        let mut msg = Message::new("{}");
        msg.set_header("stage", "first");
        msg.set_header("stage", "second");

        assert_eq!(msg.headers.len(), 1);
        assert_eq!(msg.header("stage"), Some(&HeaderValue::Text("second".into())));
    }

    #[test]
    fn clone_is_independent() {
        let original = Message::new("{\"a\":1}").with_header("k", "v");
        let mut copy = original.clone();
        copy.set_header("k", "other");
        copy.body.push('x');

        assert_eq!(original.header("k"), Some(&HeaderValue::Text("v".into())));
        assert_eq!(original.body, "{\"a\":1}");
    }
}
