//! Field-tagged input validation errors shared by the task and account flows.

use std::fmt;

/// Which input field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Task title.
    Title,
    /// Task description.
    Description,
    /// Task budget.
    Budget,
    /// Task address.
    Address,
    /// Task urgency level.
    Urgency,
    /// Verification video clip.
    Video,
    /// Account full name.
    FullName,
    /// Account email.
    Email,
    /// Account password.
    Password,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Budget => "budget",
            Self::Address => "address",
            Self::Urgency => "urgency",
            Self::Video => "video",
            Self::FullName => "full_name",
            Self::Email => "email",
            Self::Password => "password",
        };
        f.write_str(name)
    }
}

/// Why a field was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    /// Missing or blank.
    Required,
    /// Longer than `max` characters.
    TooLong {
        /// Maximum allowed characters.
        max: usize,
    },
    /// Shorter than `min` characters.
    TooShort {
        /// Minimum required characters.
        min: usize,
    },
    /// Not a finite number.
    NotANumber,
    /// Outside the inclusive range.
    OutOfRange {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Malformed value.
    InvalidFormat,
    /// Media longer than `max_secs`.
    DurationExceeded {
        /// Maximum allowed duration in seconds.
        max_secs: u64,
    },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "is required"),
            Self::TooLong { max } => write!(f, "exceeds {max} characters"),
            Self::TooShort { min } => write!(f, "must be at least {min} characters"),
            Self::NotANumber => write!(f, "is not a number"),
            Self::OutOfRange { min, max } => write!(f, "must be between {min} and {max}"),
            Self::InvalidFormat => write!(f, "is malformed"),
            Self::DurationExceeded { max_secs } => write!(f, "is longer than {max_secs}s"),
        }
    }
}

/// Input rejected before any backend call was made.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field} {reason}")]
pub struct ValidationError {
    /// The offending field.
    pub field: Field,
    /// What was wrong with it.
    pub reason: Reason,
}

impl ValidationError {
    /// Creates a field-tagged validation error.
    #[must_use]
    pub const fn new(field: Field, reason: Reason) -> Self {
        Self { field, reason }
    }
}

/// Trims `value` and checks it is non-empty and at most `max_chars` long.
///
/// # Errors
///
/// Returns [`Reason::Required`] or [`Reason::TooLong`] tagged with `field`.
pub fn required_text(value: &str, max_chars: usize, field: Field) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, Reason::Required));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ValidationError::new(field, Reason::TooLong { max: max_chars }));
    }
    Ok(trimmed.to_string())
}
