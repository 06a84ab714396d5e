//! Queue message envelope.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message travelling through a [`MessageQueue`](crate::infra::MessageQueue).
///
/// `receipt_handle` is only set on messages returned by a receive call and
/// identifies that particular delivery; acknowledging with a handle from an
/// expired lease fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub body: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_handle: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            body: body.into(),
            attributes: BTreeMap::new(),
            receipt_handle: None,
            created_at: Utc::now(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_has_no_receipt() {
        let message = Message::new("\"payload\"").with_attribute("messageType", "user_deletion");

        assert!(message.receipt_handle.is_none());
        assert_eq!(message.attribute("messageType"), Some("user_deletion"));
        assert_eq!(message.attribute("missing"), None);
    }
}
