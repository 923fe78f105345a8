//! Two-party chat threads.
//!
//! Both participants derive the same [`ThreadId`] with [`thread_id`], so a
//! conversation converges on one `chats/{threadId}/messages` collection no
//! matter who writes first.

pub mod thread;

pub use thread::{ThreadEvent, ThreadFeed, ThreadView};

use quickbucks_proto::message::{DEFAULT_MESSAGE_LIMIT, Message, ThreadId};
use quickbucks_proto::task::TaskId;
use quickbucks_proto::user::{Identity, UserId};

use crate::store::{AuthProvider, MessageRepository, NewMessage, StoreError};

/// Errors that can occur during chat operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The message was blank after trimming.
    #[error("message is empty")]
    Empty,

    /// No user is signed in.
    #[error("not signed in")]
    Unauthenticated,

    /// The backend failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Thread shared by two users: the ids sorted and joined with `_`.
#[must_use]
pub fn thread_id(a: &UserId, b: &UserId) -> ThreadId {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    ThreadId::new(format!("{first}_{second}"))
}

/// Chat tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    /// How many recent messages history and live feeds cover.
    pub message_limit: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }
}

/// Chat operations for the signed-in user.
pub struct ChatService<M, A> {
    messages: M,
    auth: A,
    settings: ChatSettings,
}

impl<M: MessageRepository, A: AuthProvider> ChatService<M, A> {
    /// Creates a service over the given collaborators.
    #[must_use]
    pub const fn new(messages: M, auth: A, settings: ChatSettings) -> Self {
        Self {
            messages,
            auth,
            settings,
        }
    }

    fn current_user(&self) -> Result<Identity, ChatError> {
        self.auth.current_user().ok_or(ChatError::Unauthenticated)
    }

    /// Sends `text` to `other`, optionally about a task.
    ///
    /// # Errors
    ///
    /// [`ChatError::Empty`] for blank text (nothing is written),
    /// [`ChatError::Unauthenticated`], or a backend failure.
    pub async fn send_message(
        &self,
        other: &UserId,
        text: &str,
        task: Option<&TaskId>,
    ) -> Result<Message, ChatError> {
        let sender = self.current_user()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Empty);
        }
        let thread = thread_id(&sender.id, other);
        let message = self
            .messages
            .append_message(
                &thread,
                NewMessage {
                    text: text.to_string(),
                    sender_id: sender.id.clone(),
                    sender_name: sender.display_name.clone(),
                    sender_avatar: sender.photo_url.clone(),
                    task_id: task.cloned(),
                },
            )
            .await?;
        tracing::debug!(thread = %thread, message_id = %message.id, "message sent");
        Ok(message)
    }

    /// The most recent messages exchanged with `other`, oldest first.
    ///
    /// # Errors
    ///
    /// [`ChatError::Unauthenticated`] or a backend failure.
    pub async fn history(&self, other: &UserId) -> Result<Vec<Message>, ChatError> {
        let user = self.current_user()?;
        let thread = thread_id(&user.id, other);
        let mut messages = self
            .messages
            .recent_messages(&thread, self.settings.message_limit)
            .await?;
        messages.reverse();
        Ok(messages)
    }

    /// Follows the conversation with `other` live.
    ///
    /// The first [`ThreadFeed::next_update`] yields the current window.
    ///
    /// # Errors
    ///
    /// [`ChatError::Unauthenticated`] or a backend failure.
    pub async fn open_thread(&self, other: &UserId) -> Result<ThreadFeed, ChatError> {
        let user = self.current_user()?;
        let thread = thread_id(&user.id, other);
        let subscription = self
            .messages
            .subscribe_messages(&thread, self.settings.message_limit)
            .await?;
        tracing::debug!(thread = %thread, "thread opened");
        Ok(ThreadFeed::new(thread, subscription))
    }
}
