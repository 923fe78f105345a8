//! Lifecycle and eligibility rules.
//!
//! Each rule inspects the current task and either refuses with a
//! [`Rejection`] or returns the [`TaskPatch`] that performs the transition.
//! Patches carry a `require_status` precondition wherever the rule depends
//! on the status it observed, so a backend with conditional writes rejects
//! stale decisions with a conflict.

use chrono::{DateTime, Utc};
use thiserror::Error;

use quickbucks_proto::task::{
    Application, ApplicationStatus, Task, TaskStatus, VerificationVideo,
};
use quickbucks_proto::user::{Identity, UserId};

use crate::store::TaskPatch;

/// A business rule refused the action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The poster tried to apply to their own task.
    #[error("cannot apply to your own task")]
    SelfApplication,
    /// The user already applied.
    #[error("already applied to this task")]
    DuplicateApplication,
    /// The task is not in the status the action requires.
    #[error("task is {actual}, expected {expected}")]
    WrongStatus {
        /// Status the action requires.
        expected: TaskStatus,
        /// Status the task is in.
        actual: TaskStatus,
    },
    /// Only the poster may do this.
    #[error("only the poster can do this")]
    NotOwner,
    /// Only the assignee may do this.
    #[error("only the assigned tasker can do this")]
    NotAssignee,
    /// The chosen user never applied.
    #[error("{0} has not applied to this task")]
    UnknownApplicant(UserId),
}

impl Rejection {
    /// Stable machine-readable reason.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::SelfApplication => "self-application",
            Self::DuplicateApplication => "duplicate-application",
            Self::WrongStatus { .. } => "wrong-status",
            Self::NotOwner => "not-owner",
            Self::NotAssignee => "not-assignee",
            Self::UnknownApplicant(_) => "unknown-applicant",
        }
    }
}

fn require_status(task: &Task, expected: TaskStatus) -> Result<(), Rejection> {
    if task.status == expected {
        Ok(())
    } else {
        Err(Rejection::WrongStatus {
            expected,
            actual: task.status,
        })
    }
}

fn require_owner(task: &Task, user: &UserId) -> Result<(), Rejection> {
    if task.is_posted_by(user) {
        Ok(())
    } else {
        Err(Rejection::NotOwner)
    }
}

/// Applies `applicant` to an open task.
///
/// Appends a pending application stamped `now` and counts one view.
///
/// # Errors
///
/// [`Rejection::SelfApplication`], [`Rejection::DuplicateApplication`] or
/// [`Rejection::WrongStatus`], checked in that order.
pub fn apply_for_task(
    task: &Task,
    applicant: &Identity,
    now: DateTime<Utc>,
) -> Result<TaskPatch, Rejection> {
    if task.is_posted_by(&applicant.id) {
        return Err(Rejection::SelfApplication);
    }
    if task.has_applied(&applicant.id) {
        return Err(Rejection::DuplicateApplication);
    }
    require_status(task, TaskStatus::Open)?;

    Ok(TaskPatch {
        require_status: Some(TaskStatus::Open),
        append_application: Some(Application {
            tasker_id: applicant.id.clone(),
            tasker_name: applicant.display_name_or_id().to_string(),
            applied_at: now,
            status: ApplicationStatus::Pending,
        }),
        increment_views: 1,
        ..TaskPatch::default()
    })
}

/// Cancels a task on behalf of its poster and clears any assignee.
///
/// # Errors
///
/// [`Rejection::NotOwner`] unless `requester` posted the task.
pub fn cancel_task(task: &Task, requester: &UserId) -> Result<TaskPatch, Rejection> {
    require_owner(task, requester)?;
    Ok(TaskPatch {
        require_status: Some(task.status),
        status: Some(TaskStatus::Cancelled),
        assigned_to: Some(None),
        ..TaskPatch::default()
    })
}

/// Attaches a verification video and moves the task to review.
///
/// Applies whatever the current status is; a second upload replaces the
/// first.
#[must_use]
pub fn submit_verification(
    uploader: &UserId,
    url: impl Into<String>,
    now: DateTime<Utc>,
) -> TaskPatch {
    TaskPatch {
        status: Some(TaskStatus::PendingReview),
        verification_video: Some(VerificationVideo {
            url: url.into(),
            uploaded_at: now,
            uploaded_by: uploader.clone(),
        }),
        ..TaskPatch::default()
    }
}

/// Accepts `applicant` for an open task.
///
/// The chosen application becomes accepted and every other one rejected.
///
/// # Errors
///
/// [`Rejection::NotOwner`], [`Rejection::WrongStatus`] or
/// [`Rejection::UnknownApplicant`].
pub fn assign_task(
    task: &Task,
    requester: &UserId,
    applicant: &UserId,
) -> Result<TaskPatch, Rejection> {
    require_owner(task, requester)?;
    require_status(task, TaskStatus::Open)?;
    if !task.has_applied(applicant) {
        return Err(Rejection::UnknownApplicant(applicant.clone()));
    }

    let applications = task
        .applications
        .iter()
        .cloned()
        .map(|mut application| {
            application.status = if application.tasker_id == *applicant {
                ApplicationStatus::Accepted
            } else {
                ApplicationStatus::Rejected
            };
            application
        })
        .collect();

    Ok(TaskPatch {
        require_status: Some(TaskStatus::Open),
        status: Some(TaskStatus::Assigned),
        assigned_to: Some(Some(applicant.clone())),
        applications: Some(applications),
        ..TaskPatch::default()
    })
}

/// Marks an assigned task as started by its assignee.
///
/// # Errors
///
/// [`Rejection::NotAssignee`] or [`Rejection::WrongStatus`].
pub fn start_task(task: &Task, requester: &UserId) -> Result<TaskPatch, Rejection> {
    if task.assigned_to.as_ref() != Some(requester) {
        return Err(Rejection::NotAssignee);
    }
    require_status(task, TaskStatus::Assigned)?;
    Ok(TaskPatch {
        require_status: Some(TaskStatus::Assigned),
        status: Some(TaskStatus::InProgress),
        ..TaskPatch::default()
    })
}

/// Approves reviewed work on behalf of the poster.
///
/// # Errors
///
/// [`Rejection::NotOwner`] or [`Rejection::WrongStatus`].
pub fn approve_completion(task: &Task, requester: &UserId) -> Result<TaskPatch, Rejection> {
    require_owner(task, requester)?;
    require_status(task, TaskStatus::PendingReview)?;
    Ok(TaskPatch {
        require_status: Some(TaskStatus::PendingReview),
        status: Some(TaskStatus::Completed),
        ..TaskPatch::default()
    })
}
