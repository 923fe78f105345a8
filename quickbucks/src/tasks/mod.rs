//! Task marketplace rules.
//!
//! Pure decisions live in [`rules`], [`validate`] and [`filter`]; they never
//! touch a backend. [`TaskService`] wires them to the repository, object
//! store and auth provider.

pub mod filter;
pub mod geo;
pub mod rules;
pub mod service;
pub mod validate;

pub use filter::{PriceRange, SortBy, TaskFilters, filter_and_sort, matches_query};
pub use geo::haversine_km;
pub use rules::Rejection;
pub use service::{TaskService, TaskSettings, VideoClip};
pub use validate::{TaskInput, TaskLimits, ValidTask, validate_task_input};

use thiserror::Error;

use crate::store::StoreError;
use crate::validation::ValidationError;

/// Errors that can occur during task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Input was malformed; nothing was written.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    /// A business rule refused the action; nothing was written.
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    /// Task with the given ID was not found.
    #[error("task not found: {0}")]
    NotFound(String),
    /// The task changed between the read and the conditional write.
    #[error("task changed concurrently: {0}")]
    Conflict(String),
    /// No user is signed in.
    #[error("not signed in")]
    Unauthenticated,
    /// The backend failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(why) => Self::Conflict(why),
            other => Self::Store(other),
        }
    }
}
