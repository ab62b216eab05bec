//! Queue values: outgoing and received messages, batch entries and outcomes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed message attribute (`String`, `Number` or `Binary` data type).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: String,
}

impl MessageAttribute {
    pub fn number(value: impl ToString) -> Self {
        Self {
            data_type: "Number".into(),
            string_value: value.to_string(),
        }
    }
}

/// A message about to be sent. Identity is assigned by the queue service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutgoingMessage {
    pub body: String,

    /// Message group for FIFO (or fair) queues.
    pub group_id: Option<String>,

    pub attributes: BTreeMap<String, MessageAttribute>,
}

impl OutgoingMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_group_id(mut self, group_id: Option<String>) -> Self {
        self.group_id = group_id;
        self
    }

    /// Size the queue service counts against its message limit: the body
    /// plus every attribute's name, data type and value.
    pub fn size_bytes(&self) -> usize {
        let attributes: usize = self
            .attributes
            .iter()
            .map(|(name, attr)| name.len() + attr.data_type.len() + attr.string_value.len())
            .sum();
        self.body.len() + attributes
    }
}

/// One entry of a batch send; `id` is local to the batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchEntry {
    pub id: String,
    pub message: OutgoingMessage,
}

/// A message as handed back by a receive call.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReceivedMessage {
    pub message_id: String,

    /// Handle required to delete the message.
    pub receipt_handle: String,

    pub body: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, MessageAttribute>,
}

/// Result of sending one message.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SentMessage {
    pub message_id: String,

    /// Whether the body was stored in the object store and replaced by a pointer.
    pub offloaded: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BatchSuccess {
    pub id: String,
    pub message_id: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BatchFailure {
    pub id: String,
    pub code: String,
    pub message: Option<String>,
    pub sender_fault: bool,
}

/// Aggregated outcome of a batch send, possibly spanning several requests.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct BatchSendOutcome {
    pub successful: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
}

impl BatchSendOutcome {
    pub fn merge(&mut self, other: BatchSendOutcome) {
        self.successful.extend(other.successful);
        self.failed.extend(other.failed);
    }
}
