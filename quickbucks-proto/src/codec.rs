//! JSON document codec for backend collections.
//!
//! Document bodies never carry their own id; the id lives in the document
//! path. [`encode_document`] strips it and [`decode_document`] puts it back.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::message::{Message, MessageId, ThreadId};
use crate::task::{Task, TaskId};
use crate::user::{UserId, UserProfile};

/// Collection holding task documents.
pub const TASKS_COLLECTION: &str = "tasks";

/// Collection holding user profile documents.
pub const USERS_COLLECTION: &str = "users";

/// Errors that can occur while encoding or decoding documents.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The JSON did not match the document shape.
    #[error("document shape mismatch: {0}")]
    Json(#[from] serde_json::Error),

    /// A document body must be a JSON object.
    #[error("document body is not an object")]
    NotAnObject,
}

/// A stored record whose id lives outside its body.
pub trait Document: Serialize + DeserializeOwned {
    /// Identifier type used in the document path.
    type Id: Clone;

    /// The document id.
    fn id(&self) -> &Self::Id;

    /// Replaces the document id.
    fn set_id(&mut self, id: Self::Id);
}

impl Document for Task {
    type Id = TaskId;

    fn id(&self) -> &TaskId {
        &self.id
    }

    fn set_id(&mut self, id: TaskId) {
        self.id = id;
    }
}

impl Document for Message {
    type Id = MessageId;

    fn id(&self) -> &MessageId {
        &self.id
    }

    fn set_id(&mut self, id: MessageId) {
        self.id = id;
    }
}

impl Document for UserProfile {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }

    fn set_id(&mut self, id: UserId) {
        self.id = id;
    }
}

/// Path of the message subcollection for a thread.
#[must_use]
pub fn messages_collection(thread: &ThreadId) -> String {
    format!("chats/{thread}/messages")
}

/// Encodes a document body.
///
/// # Errors
///
/// Returns [`CodecError::NotAnObject`] if the type does not serialize to a
/// JSON object, or [`CodecError::Json`] if serialization fails.
pub fn encode_document<D: Document>(doc: &D) -> Result<serde_json::Value, CodecError> {
    let value = serde_json::to_value(doc)?;
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }
    Ok(value)
}

/// Decodes a document body and attaches its id.
///
/// Unknown fields are ignored so documents written by other clients with
/// extra fields still load.
///
/// # Errors
///
/// Returns [`CodecError`] if the body is not an object or is missing a
/// required field.
pub fn decode_document<D: Document>(id: D::Id, body: serde_json::Value) -> Result<D, CodecError> {
    if !body.is_object() {
        return Err(CodecError::NotAnObject);
    }
    let mut doc: D = serde_json::from_value(body)?;
    doc.set_id(id);
    Ok(doc)
}
