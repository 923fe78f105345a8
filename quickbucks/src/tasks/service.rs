//! Task operations against the backend collaborators.
//!
//! Every mutator re-reads the task, decides locally with [`rules`], issues a
//! patch and returns the task as stored afterwards. Nothing is retried: a
//! failed write is reported.

use std::time::Duration;

use chrono::Utc;

use quickbucks_proto::task::{Task, TaskId, verification_object_path};
use quickbucks_proto::user::{Identity, UserId};

use super::filter::{TaskFilters, filter_and_sort};
use super::rules::{self, Rejection};
use super::validate::{TaskInput, TaskLimits, validate_task_input};
use super::TaskError;
use crate::store::{AuthProvider, ObjectStore, TaskFilter, TaskPatch, TaskRepository};
use crate::validation::{Field, Reason, ValidationError};

/// Content type of verification uploads.
const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Tunables for [`TaskService`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskSettings {
    /// Limits applied when posting a task.
    pub limits: TaskLimits,
    /// Longest accepted verification clip.
    pub max_video: Duration,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            limits: TaskLimits::default(),
            max_video: Duration::from_secs(30),
        }
    }
}

/// A recorded verification clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoClip {
    /// Encoded video bytes.
    pub bytes: Vec<u8>,
    /// Recorded length.
    pub duration: Duration,
}

/// Task operations for the signed-in user.
pub struct TaskService<R, A, O> {
    repo: R,
    auth: A,
    objects: O,
    settings: TaskSettings,
}

impl<R, A, O> TaskService<R, A, O>
where
    R: TaskRepository,
    A: AuthProvider,
    O: ObjectStore,
{
    /// Creates a service over the given collaborators.
    #[must_use]
    pub const fn new(repo: R, auth: A, objects: O, settings: TaskSettings) -> Self {
        Self {
            repo,
            auth,
            objects,
            settings,
        }
    }

    fn current_user(&self) -> Result<Identity, TaskError> {
        self.auth.current_user().ok_or(TaskError::Unauthenticated)
    }

    /// Validates and posts a new task as the signed-in user.
    ///
    /// # Errors
    ///
    /// [`TaskError::Unauthenticated`], [`TaskError::Validation`] (nothing is
    /// written), or a backend failure.
    pub async fn create_task(&self, input: &TaskInput) -> Result<Task, TaskError> {
        let user = self.current_user()?;
        let valid = validate_task_input(input, &self.settings.limits)?;
        let id = self.repo.create_task(valid.into_new_task(user.id.clone())).await?;
        tracing::info!(task_id = %id, poster = %user.id, "task posted");
        Ok(self.repo.get_task(&id).await?)
    }

    /// Fetches a task.
    ///
    /// # Errors
    ///
    /// [`TaskError::NotFound`] or a backend failure.
    pub async fn get_task(&self, id: &TaskId) -> Result<Task, TaskError> {
        Ok(self.repo.get_task(id).await?)
    }

    /// Open tasks posted by other users.
    ///
    /// # Errors
    ///
    /// [`TaskError::Unauthenticated`] or a backend failure.
    pub async fn available_tasks(&self) -> Result<Vec<Task>, TaskError> {
        let viewer = self.current_user()?.id;
        Ok(self.repo.query_tasks(&TaskFilter::Available { viewer }).await?)
    }

    /// Tasks posted by the signed-in user, newest first.
    ///
    /// # Errors
    ///
    /// [`TaskError::Unauthenticated`] or a backend failure.
    pub async fn my_tasks(&self) -> Result<Vec<Task>, TaskError> {
        let user = self.current_user()?.id;
        let tasks = self.repo.query_tasks(&TaskFilter::PostedBy(user)).await?;
        Ok(filter_and_sort(tasks, "", &TaskFilters::default()))
    }

    /// Available tasks narrowed by a search query and filters.
    ///
    /// # Errors
    ///
    /// [`TaskError::Unauthenticated`] or a backend failure.
    pub async fn browse(&self, query: &str, filters: &TaskFilters) -> Result<Vec<Task>, TaskError> {
        let tasks = self.available_tasks().await?;
        let total = tasks.len();
        let kept = filter_and_sort(tasks, query, filters);
        tracing::debug!(total, kept = kept.len(), sort = %filters.sort_by, "browse");
        Ok(kept)
    }

    /// Applies the signed-in user to a task.
    ///
    /// # Errors
    ///
    /// [`TaskError::Rejected`] with self-application, duplicate-application
    /// or wrong-status; [`TaskError::Conflict`] if the task changed under us.
    pub async fn apply(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.mutate(id, "applied", |task, user| {
            rules::apply_for_task(task, user, Utc::now())
        })
        .await
    }

    /// Cancels a task posted by the signed-in user.
    ///
    /// # Errors
    ///
    /// [`TaskError::Rejected`] with not-owner, or a backend failure.
    pub async fn cancel(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.mutate(id, "cancelled", |task, user| rules::cancel_task(task, &user.id))
            .await
    }

    /// Accepts `applicant` for a task posted by the signed-in user.
    ///
    /// # Errors
    ///
    /// [`TaskError::Rejected`] with not-owner, wrong-status or
    /// unknown-applicant, or a backend failure.
    pub async fn assign(&self, id: &TaskId, applicant: &UserId) -> Result<Task, TaskError> {
        self.mutate(id, "assigned", |task, user| {
            rules::assign_task(task, &user.id, applicant)
        })
        .await
    }

    /// Starts work on a task assigned to the signed-in user.
    ///
    /// # Errors
    ///
    /// [`TaskError::Rejected`] with not-assignee or wrong-status, or a
    /// backend failure.
    pub async fn start(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.mutate(id, "started", |task, user| rules::start_task(task, &user.id))
            .await
    }

    /// Approves reviewed work on a task posted by the signed-in user.
    ///
    /// # Errors
    ///
    /// [`TaskError::Rejected`] with not-owner or wrong-status, or a backend
    /// failure.
    pub async fn approve(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.mutate(id, "approved", |task, user| {
            rules::approve_completion(task, &user.id)
        })
        .await
    }

    /// Uploads a verification clip and moves the task to review.
    ///
    /// The clip is checked before anything is uploaded.
    ///
    /// # Errors
    ///
    /// [`TaskError::Validation`] for an empty or too long clip,
    /// [`TaskError::NotFound`], or a backend failure.
    pub async fn submit_verification(&self, id: &TaskId, clip: VideoClip) -> Result<Task, TaskError> {
        let user = self.current_user()?;
        if clip.bytes.is_empty() {
            return Err(ValidationError::new(Field::Video, Reason::Required).into());
        }
        if clip.duration > self.settings.max_video {
            return Err(ValidationError::new(
                Field::Video,
                Reason::DurationExceeded {
                    max_secs: self.settings.max_video.as_secs(),
                },
            )
            .into());
        }

        // An unknown task fails here, before anything is uploaded.
        self.repo.get_task(id).await?;
        let now = Utc::now();
        let path = verification_object_path(id, &user.id, now);
        let size = clip.bytes.len();
        let url = self.objects.upload(&path, clip.bytes, VIDEO_CONTENT_TYPE).await?;
        tracing::debug!(task_id = %id, path, size, "verification video uploaded");

        let patch = rules::submit_verification(&user.id, url, now);
        let task = self.write(id, patch).await?;
        tracing::info!(task_id = %id, uploader = %user.id, "verification submitted");
        Ok(task)
    }

    /// Re-reads the task, lets `decide` check it, and writes the result.
    async fn mutate<F>(&self, id: &TaskId, action: &str, decide: F) -> Result<Task, TaskError>
    where
        F: FnOnce(&Task, &Identity) -> Result<TaskPatch, Rejection>,
    {
        let user = self.current_user()?;
        let task = self.repo.get_task(id).await?;
        let patch = decide(&task, &user).inspect_err(|rejection| {
            tracing::debug!(task_id = %id, user = %user.id, reason = rejection.reason(), "action rejected");
        })?;
        let task = self.write(id, patch).await?;
        tracing::info!(task_id = %id, user = %user.id, status = %task.status, "task {action}");
        Ok(task)
    }

    /// Sends `patch` and returns the task as stored afterwards.
    ///
    /// The stored document may include writes from other clients that landed
    /// after our read.
    async fn write(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, TaskError> {
        if let Err(err) = self.repo.update_task(id, patch).await {
            tracing::warn!(task_id = %id, error = %err, "task update failed");
            return Err(err.into());
        }
        Ok(self.repo.get_task(id).await?)
    }
}
