//! Profile statistics derived from the task collection.
//!
//! Stored counters on the profile document are never trusted; completed
//! work and earnings are recomputed from the tasks on every request.

use chrono::{DateTime, Utc};
use serde::Serialize;

use quickbucks_proto::task::{Task, TaskStatus};
use quickbucks_proto::user::{UserId, UserProfile};

use crate::store::{StoreError, TaskFilter, TaskRepository, UserRepository};

/// Errors that can occur while loading a profile.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// No profile document exists for the user.
    #[error("profile not found: {0}")]
    NotFound(UserId),

    /// The backend failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Statistics shown on a profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    /// Tasks assigned to the user and completed.
    pub tasks_completed: usize,
    /// Sum of budgets of those tasks.
    pub total_earnings: f64,
    /// When the user joined.
    pub member_since: DateTime<Utc>,
}

/// Aggregates `tasks` into statistics for `user`.
///
/// Only tasks assigned to `user` with status `completed` count; anything else
/// in `tasks` is ignored.
#[must_use]
pub fn compute_stats(user: &UserId, tasks: &[Task], member_since: DateTime<Utc>) -> ProfileStats {
    let (tasks_completed, total_earnings) = tasks
        .iter()
        .filter(|task| task.assigned_to.as_ref() == Some(user))
        .filter(|task| task.status == TaskStatus::Completed)
        .fold((0, 0.0), |(count, sum), task| (count + 1, sum + task.budget));
    ProfileStats {
        tasks_completed,
        total_earnings,
        member_since,
    }
}

/// A profile together with its derived statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSummary {
    /// Stored profile document.
    pub profile: UserProfile,
    /// Recomputed statistics.
    pub stats: ProfileStats,
}

/// Loads profiles and their statistics.
pub struct ProfileService<R, U> {
    tasks: R,
    users: U,
}

impl<R: TaskRepository, U: UserRepository> ProfileService<R, U> {
    /// Creates a service over the given collaborators.
    #[must_use]
    pub const fn new(tasks: R, users: U) -> Self {
        Self { tasks, users }
    }

    /// Loads `user`'s profile and recomputes their statistics.
    ///
    /// # Errors
    ///
    /// [`ProfileError::NotFound`] if there is no profile, or a backend
    /// failure.
    pub async fn summary(&self, user: &UserId) -> Result<ProfileSummary, ProfileError> {
        let profile = match self.users.get_user(user).await {
            Ok(profile) => profile,
            Err(StoreError::NotFound(_)) => return Err(ProfileError::NotFound(user.clone())),
            Err(err) => return Err(err.into()),
        };
        let assigned = self
            .tasks
            .query_tasks(&TaskFilter::AssignedTo(user.clone()))
            .await?;
        let stats = compute_stats(user, &assigned, profile.created_at);
        if usize::try_from(profile.tasks_completed).ok() != Some(stats.tasks_completed) {
            tracing::debug!(
                user = %user,
                stored = profile.tasks_completed,
                derived = stats.tasks_completed,
                "stored completion counter is stale"
            );
        }
        Ok(ProfileSummary { profile, stats })
    }

    /// Statistics only.
    ///
    /// # Errors
    ///
    /// Same as [`summary`](Self::summary).
    pub async fn stats(&self, user: &UserId) -> Result<ProfileStats, ProfileError> {
        Ok(self.summary(user).await?.stats)
    }
}
