//! Ordered, deduplicated view of one chat thread.
//!
//! History pages and live snapshots overlap; [`ThreadView`] merges both by
//! message id and keeps messages in `(timestamp, id)` order so equal
//! timestamps never interleave differently between renders.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use quickbucks_proto::message::{Message, MessageId, ThreadId};

use crate::store::Subscription;

/// Messages of one thread, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ThreadView {
    messages: BTreeMap<(DateTime<Utc>, MessageId), Message>,
    seen: HashSet<MessageId>,
}

impl ThreadView {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges messages in any order and returns the ones not seen before,
    /// oldest first.
    pub fn merge(&mut self, messages: impl IntoIterator<Item = Message>) -> Vec<Message> {
        let mut added: Vec<Message> = messages
            .into_iter()
            .filter(|message| self.seen.insert(message.id.clone()))
            .collect();
        added.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        for message in &added {
            self.messages.insert(
                (message.timestamp, message.id.clone()),
                message.clone(),
            );
        }
        added
    }

    /// Messages oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.values().next_back()
    }

    /// Whether a message with this id was merged.
    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.seen.contains(id)
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the view holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// What a [`ThreadFeed`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadEvent {
    /// A snapshot arrived; `added` holds the new messages, oldest first.
    /// Empty when the snapshot held nothing new.
    Updated {
        /// Newly merged messages.
        added: Vec<Message>,
    },
    /// The feed was closed or the producer went away.
    Closed,
}

/// Live view of a thread driven by a message subscription.
#[derive(Debug)]
pub struct ThreadFeed {
    thread: ThreadId,
    view: ThreadView,
    subscription: Subscription<Vec<Message>>,
}

impl ThreadFeed {
    /// Wraps a subscription to `thread`.
    #[must_use]
    pub fn new(thread: ThreadId, subscription: Subscription<Vec<Message>>) -> Self {
        Self {
            thread,
            view: ThreadView::new(),
            subscription,
        }
    }

    /// The thread being followed.
    #[must_use]
    pub const fn thread(&self) -> &ThreadId {
        &self.thread
    }

    /// Merges a page of history fetched separately.
    pub fn seed(&mut self, history: impl IntoIterator<Item = Message>) -> Vec<Message> {
        self.view.merge(history)
    }

    /// Current merged view.
    #[must_use]
    pub const fn view(&self) -> &ThreadView {
        &self.view
    }

    /// Waits for the next snapshot and merges it.
    pub async fn next_update(&mut self) -> ThreadEvent {
        match self.subscription.next().await {
            Some(snapshot) => {
                let added = self.view.merge(snapshot);
                if !added.is_empty() {
                    tracing::trace!(thread = %self.thread, added = added.len(), "thread updated");
                }
                ThreadEvent::Updated { added }
            }
            None => ThreadEvent::Closed,
        }
    }

    /// Stops following the thread. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.subscription.is_cancelled() {
            tracing::debug!(thread = %self.thread, "closing thread feed");
        }
        self.subscription.cancel();
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.subscription.is_cancelled()
    }
}
