//! Collaborator contracts for the backend.
//!
//! The domain services never talk to a concrete backend. They are built
//! from implementations of these traits:
//! - [`TaskRepository`]: the `tasks` collection
//! - [`MessageRepository`]: `chats/{threadId}/messages`, including live feeds
//! - [`UserRepository`]: the `users` collection
//! - [`ObjectStore`]: binary uploads (verification videos)
//! - [`AuthProvider`]: the signed-in identity
//!
//! [`memory`] provides in-process implementations of all of them.

pub mod memory;

use std::future::Future;

use tokio::sync::watch;

use quickbucks_proto::codec::CodecError;
use quickbucks_proto::message::{Message, ThreadId};
use quickbucks_proto::task::{
    Application, Location, Task, TaskCategory, TaskId, TaskStatus, VerificationVideo,
};
use quickbucks_proto::user::{Identity, UserId, UserProfile};

/// Errors reported by backend collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A write precondition did not hold against the current document.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The backend refused or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A stored document could not be decoded.
    #[error("malformed document: {0}")]
    Codec(#[from] CodecError),
}

/// Errors reported by the auth provider.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    /// Email and password do not match an account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// An account already uses this email.
    #[error("email already in use")]
    EmailInUse,

    /// The provider failed for another reason.
    #[error("auth provider error: {0}")]
    Provider(String),
}

/// The canonical task queries the repository must support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFilter {
    /// Open tasks posted by someone other than `viewer`.
    Available {
        /// The browsing user.
        viewer: UserId,
    },
    /// Every task posted by the given user.
    PostedBy(UserId),
    /// Every task assigned to the given user.
    AssignedTo(UserId),
}

impl TaskFilter {
    /// Whether `task` belongs in this query's result.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::Available { viewer } => {
                task.status == TaskStatus::Open && task.posted_by != *viewer
            }
            Self::PostedBy(user) => task.posted_by == *user,
            Self::AssignedTo(user) => task.assigned_to.as_ref() == Some(user),
        }
    }
}

/// Validated input for a new task document.
///
/// The repository fills in the id, `status = open`, `postedAt`, an empty
/// application list and `views = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    /// Trimmed title.
    pub title: String,
    /// Trimmed description.
    pub description: String,
    /// Budget within the allowed range.
    pub budget: f64,
    /// Address and pin.
    pub location: Location,
    /// Listing category.
    pub category: Option<TaskCategory>,
    /// Derived urgency flag.
    pub urgent: bool,
    /// Poster's user id.
    pub posted_by: UserId,
}

/// A partial update to a task document.
///
/// Every field is an independent operation. `append_application` and
/// `increment_views` commute with concurrent writers; `require_status` turns
/// the whole patch into a conditional write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    /// Apply only if the stored status still equals this value.
    pub require_status: Option<TaskStatus>,
    /// New status.
    pub status: Option<TaskStatus>,
    /// New assignee; `Some(None)` clears it.
    pub assigned_to: Option<Option<UserId>>,
    /// Application to append. Unique per tasker.
    pub append_application: Option<Application>,
    /// Replacement application list.
    pub applications: Option<Vec<Application>>,
    /// Amount to add to `views`.
    pub increment_views: u64,
    /// Verification video to attach, replacing any previous one.
    pub verification_video: Option<VerificationVideo>,
}

impl TaskPatch {
    /// Applies the patch to `task` in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if `require_status` does not match or
    /// the appended application's tasker already applied. `task` is left
    /// untouched on error.
    pub fn apply_to(&self, task: &mut Task) -> Result<(), StoreError> {
        if let Some(required) = self.require_status {
            if task.status != required {
                return Err(StoreError::Conflict(format!(
                    "task {} is {}, expected {required}",
                    task.id, task.status
                )));
            }
        }
        if let Some(application) = &self.append_application {
            if task.has_applied(&application.tasker_id) {
                return Err(StoreError::Conflict(format!(
                    "{} already applied to task {}",
                    application.tasker_id, task.id
                )));
            }
        }

        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(assignee) = &self.assigned_to {
            task.assigned_to.clone_from(assignee);
        }
        if let Some(applications) = &self.applications {
            task.applications.clone_from(applications);
        }
        if let Some(application) = &self.append_application {
            task.applications.push(application.clone());
        }
        task.views = task.views.saturating_add(self.increment_views);
        if let Some(video) = &self.verification_video {
            task.verification_video = Some(video.clone());
        }
        Ok(())
    }
}

/// Input for a new chat message; the backend assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Trimmed text.
    pub text: String,
    /// Author's user id.
    pub sender_id: UserId,
    /// Author's display name.
    pub sender_name: Option<String>,
    /// Author's avatar URL.
    pub sender_avatar: Option<String>,
    /// Related task.
    pub task_id: Option<TaskId>,
}

/// A cancellable stream of snapshots pushed by a collaborator.
///
/// Every snapshot is the full current state, so only the newest unread one
/// is kept: a slow reader skips intermediate snapshots but never misses the
/// latest. Cancelling is explicit via [`cancel`](Self::cancel) and
/// idempotent. Dropping the subscription also stops delivery.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: Option<watch::Receiver<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Creates a connected publisher/subscription pair.
    ///
    /// The first [`next`](Self::next) yields `initial`.
    #[must_use]
    pub fn channel(initial: T) -> (watch::Sender<T>, Self) {
        let (tx, mut rx) = watch::channel(initial);
        rx.mark_changed();
        (tx, Self { rx: Some(rx) })
    }

    /// Waits for a snapshot newer than the last one returned.
    ///
    /// Returns `None` once cancelled, or when the producer goes away and
    /// nothing unread remains.
    pub async fn next(&mut self) -> Option<T> {
        let rx = self.rx.as_mut()?;
        rx.changed().await.ok()?;
        Some(rx.borrow_and_update().clone())
    }

    /// Returns the newest snapshot if one has not been read yet.
    pub fn try_next(&mut self) -> Option<T> {
        let rx = self.rx.as_mut()?;
        if rx.has_changed().ok()? {
            Some(rx.borrow_and_update().clone())
        } else {
            None
        }
    }

    /// Stops delivery. Calling it again has no effect.
    pub fn cancel(&mut self) {
        if self.rx.take().is_some() {
            tracing::debug!("subscription cancelled");
        }
    }

    /// Whether [`cancel`](Self::cancel) was called.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.rx.is_none()
    }
}

/// The `tasks` collection.
pub trait TaskRepository: Send + Sync {
    /// Persists a new open task and returns its generated id.
    fn create_task(
        &self,
        task: NewTask,
    ) -> impl Future<Output = Result<TaskId, StoreError>> + Send;

    /// Fetches a task by id.
    fn get_task(&self, id: &TaskId) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Runs one of the canonical queries.
    fn query_tasks(
        &self,
        filter: &TaskFilter,
    ) -> impl Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Applies a patch to a stored task.
    ///
    /// Fails with [`StoreError::NotFound`] or [`StoreError::Conflict`].
    fn update_task(
        &self,
        id: &TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Message subcollections, one per thread.
pub trait MessageRepository: Send + Sync {
    /// Appends a message; the backend assigns id and timestamp.
    fn append_message(
        &self,
        thread: &ThreadId,
        message: NewMessage,
    ) -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Returns up to `limit` messages, most recent first.
    fn recent_messages(
        &self,
        thread: &ThreadId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Subscribes to the `limit` most recent messages of a thread.
    ///
    /// Each snapshot is ordered most recent first. The first snapshot is
    /// delivered immediately.
    fn subscribe_messages(
        &self,
        thread: &ThreadId,
        limit: usize,
    ) -> impl Future<Output = Result<Subscription<Vec<Message>>, StoreError>> + Send;
}

/// The `users` collection.
pub trait UserRepository: Send + Sync {
    /// Fetches a profile by user id.
    fn get_user(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<UserProfile, StoreError>> + Send;

    /// Creates or replaces a profile document.
    fn put_user(
        &self,
        profile: &UserProfile,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Binary object storage.
pub trait ObjectStore: Send + Sync {
    /// Uploads bytes to `path` and returns a download URL.
    fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;
}

/// Identity provider.
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<Identity>;

    /// Signs in with email and password.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Creates an account, signs it in, and returns its identity.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    /// Signs out the current user.
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Subscribes to auth-state changes. The current state is delivered first.
    fn subscribe(&self) -> Subscription<Option<Identity>>;
}
