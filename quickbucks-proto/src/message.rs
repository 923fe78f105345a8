//! Chat message documents stored under `chats/{threadId}/messages`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskId;
use crate::user::UserId;

/// Number of messages fetched when a thread is opened.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Backend-assigned message identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wraps a raw document id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the two-party thread a message belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Wraps an already-derived thread id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single chat message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Document id (not part of the stored body).
    #[serde(skip)]
    pub id: MessageId,
    /// Trimmed, non-empty text.
    pub text: String,
    /// Author's user id.
    pub sender_id: UserId,
    /// Author's display name when the message was sent.
    pub sender_name: Option<String>,
    /// Author's avatar URL when the message was sent.
    pub sender_avatar: Option<String>,
    /// Backend-assigned send time.
    pub timestamp: DateTime<Utc>,
    /// Task the conversation is about, if it was opened from one.
    #[serde(default)]
    pub task_id: Option<TaskId>,
}

impl Message {
    /// Display ordering key: timestamp, then id for equal timestamps.
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, &MessageId) {
        (self.timestamp, &self.id)
    }
}
