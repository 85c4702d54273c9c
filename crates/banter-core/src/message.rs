//! Chat messages and the append-only log view model.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in unix milliseconds.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// A single chat message, immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Broker-assigned unique message identifier.
    pub id: String,
    /// Display handle of the sender.
    pub sender: String,
    /// Message text.
    pub body: String,
    /// Send timestamp in unix milliseconds.
    pub sent_at: u64,
}

impl Message {
    /// Create a new message stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            body: body.into(),
            sent_at: current_timestamp_ms(),
        }
    }

    /// Override the send timestamp (used when ingesting broker deliveries).
    #[must_use]
    pub fn with_sent_at(mut self, sent_at: u64) -> Self {
        self.sent_at = sent_at;
        self
    }
}

/// Append-only, arrival-ordered sequence of messages.
///
/// The session appends every delivery the transport hands it, in arrival
/// order, and never removes or reorders entries. The broker orders delivery
/// per channel per subscriber but not globally across subscribers, so two
/// clients' logs may disagree on interleaving under partition; that is the
/// documented weak-ordering contract, not a defect. No deduplication by id
/// is performed: a reconnect-with-resume can replay deliveries, and callers
/// that care can key on [`Message::id`].
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message in arrival order.
    pub fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    /// Number of messages in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    /// The most recently appended message, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    /// Iterate over messages, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
