//! Task documents for the `tasks` collection.
//!
//! A task moves through `open -> assigned -> in_progress -> pending_review ->
//! completed`, or to `cancelled` by its poster. Applications are kept in the
//! order they were made and are unique per tasker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Maximum task title length in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Maximum task description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Smallest budget a task may be posted with.
pub const MIN_BUDGET: f64 = 5.0;

/// Largest budget a task may be posted with.
pub const MAX_BUDGET: f64 = 1000.0;

/// Urgency levels above this value mark a task as urgent.
pub const URGENT_THRESHOLD: u8 = 2;

/// Opaque task identifier assigned by the repository on creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
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

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Where a task takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Human-entered street address.
    pub address: String,
    /// Map pin position.
    pub coordinates: Coordinates,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepting applications.
    Open,
    /// An applicant was accepted.
    Assigned,
    /// The assignee started working.
    InProgress,
    /// A verification video was uploaded and awaits the poster.
    PendingReview,
    /// The poster approved the work.
    Completed,
    /// The poster withdrew the task.
    Cancelled,
}

impl TaskStatus {
    /// Whether a task in this state carries an assignee.
    #[must_use]
    pub const fn allows_assignee(self) -> bool {
        matches!(
            self,
            Self::Assigned | Self::InProgress | Self::PendingReview | Self::Completed
        )
    }

    /// Label shown for this status in task lists.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Available",
            Self::Assigned => "Assigned",
            Self::InProgress => "In Progress",
            Self::PendingReview => "Pending Review",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Assigned => write!(f, "assigned"),
            Self::InProgress => write!(f, "in_progress"),
            Self::PendingReview => write!(f, "pending_review"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Marketplace category a task is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// Repairs and upkeep.
    HomeMaintenance,
    /// Cleaning jobs.
    Cleaning,
    /// Moving help.
    Moving,
    /// Flat-pack assembly.
    FurnitureAssembly,
    /// Pick-up and drop-off.
    Delivery,
    /// Garden and yard jobs.
    YardWork,
    /// Computer and gadget help.
    TechHelp,
    /// Anything else.
    Other,
}

impl TaskCategory {
    /// Every category, in display order.
    pub const ALL: [Self; 8] = [
        Self::HomeMaintenance,
        Self::Cleaning,
        Self::Moving,
        Self::FurnitureAssembly,
        Self::Delivery,
        Self::YardWork,
        Self::TechHelp,
        Self::Other,
    ];

    /// Stored name, e.g. `yard_work`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HomeMaintenance => "home_maintenance",
            Self::Cleaning => "cleaning",
            Self::Moving => "moving",
            Self::FurnitureAssembly => "furniture_assembly",
            Self::Delivery => "delivery",
            Self::YardWork => "yard_work",
            Self::TechHelp => "tech_help",
            Self::Other => "other",
        }
    }

    /// Human-readable category name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::HomeMaintenance => "Home Maintenance",
            Self::Cleaning => "Cleaning",
            Self::Moving => "Moving",
            Self::FurnitureAssembly => "Furniture Assembly",
            Self::Delivery => "Delivery",
            Self::YardWork => "Yard Work",
            Self::TechHelp => "Tech Help",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Review state of a single application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Waiting for the poster.
    Pending,
    /// The poster picked this applicant.
    Accepted,
    /// Another applicant was picked.
    Rejected,
}

/// An offer by a tasker to perform a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Applicant's user id.
    pub tasker_id: UserId,
    /// Applicant's display name at the time of applying.
    pub tasker_name: String,
    /// When the application was made.
    pub applied_at: DateTime<Utc>,
    /// Review state.
    pub status: ApplicationStatus,
}

/// Media evidence that a task was performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVideo {
    /// Download URL in the object store.
    pub url: String,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
    /// Who uploaded it.
    pub uploaded_by: UserId,
}

/// A document in the `tasks` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Document id (not part of the stored body).
    #[serde(skip)]
    pub id: TaskId,
    /// Short title, at most [`MAX_TITLE_CHARS`] characters.
    pub title: String,
    /// Details, at most [`MAX_DESCRIPTION_CHARS`] characters.
    pub description: String,
    /// Offered payment.
    pub budget: f64,
    /// Where the work happens.
    pub location: Location,
    /// Listing category; older documents have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TaskCategory>,
    /// Derived from the 1-3 urgency input.
    #[serde(default)]
    pub urgent: bool,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Poster's user id. Never changes.
    pub posted_by: UserId,
    /// Accepted applicant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
    /// Creation time. Never changes.
    pub posted_at: DateTime<Utc>,
    /// Applications in the order they were made.
    #[serde(default)]
    pub applications: Vec<Application>,
    /// Engagement counter, bumped once per application.
    #[serde(default)]
    pub views: u64,
    /// Present once a verification video was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_video: Option<VerificationVideo>,
}

/// A stored task that breaks one of the model invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// The poster appears among the applicants.
    #[error("poster {0} applied to their own task")]
    SelfApplication(UserId),
    /// A tasker applied more than once.
    #[error("tasker {0} applied more than once")]
    DuplicateApplication(UserId),
    /// An assignee is set while the status does not allow one.
    #[error("assignee set while task is {0}")]
    UnexpectedAssignee(TaskStatus),
    /// The task is pending review but has no verification video.
    #[error("pending review without a verification video")]
    ReviewWithoutVideo,
}

impl Task {
    /// Whether `user` posted this task.
    #[must_use]
    pub fn is_posted_by(&self, user: &UserId) -> bool {
        self.posted_by == *user
    }

    /// The application made by `user`, if any.
    #[must_use]
    pub fn application_by(&self, user: &UserId) -> Option<&Application> {
        self.applications.iter().find(|a| a.tasker_id == *user)
    }

    /// Whether `user` already applied.
    #[must_use]
    pub fn has_applied(&self, user: &UserId) -> bool {
        self.application_by(user).is_some()
    }

    /// Checks the structural invariants of the task model.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen = std::collections::HashSet::new();
        for application in &self.applications {
            if application.tasker_id == self.posted_by {
                return Err(InvariantViolation::SelfApplication(
                    application.tasker_id.clone(),
                ));
            }
            if !seen.insert(&application.tasker_id) {
                return Err(InvariantViolation::DuplicateApplication(
                    application.tasker_id.clone(),
                ));
            }
        }
        if self.assigned_to.is_some() && !self.status.allows_assignee() {
            return Err(InvariantViolation::UnexpectedAssignee(self.status));
        }
        if self.status == TaskStatus::PendingReview && self.verification_video.is_none() {
            return Err(InvariantViolation::ReviewWithoutVideo);
        }
        Ok(())
    }
}

/// Maps the 1-3 urgency input to the stored `urgent` flag.
#[must_use]
pub const fn is_urgent_level(level: u8) -> bool {
    level > URGENT_THRESHOLD
}

/// Object store path for a verification upload.
///
/// Format: `task-verification/{taskId}/{userId}_{millis}.mp4`.
#[must_use]
pub fn verification_object_path(task: &TaskId, uploader: &UserId, at: DateTime<Utc>) -> String {
    format!(
        "task-verification/{task}/{uploader}_{}.mp4",
        at.timestamp_millis()
    )
}
