//! Validation of the "post a task" form.

use quickbucks_proto::task::{
    Coordinates, Location, MAX_BUDGET, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS, MIN_BUDGET,
    TaskCategory, is_urgent_level,
};
use quickbucks_proto::user::UserId;

use crate::store::NewTask;
use crate::validation::{Field, Reason, ValidationError, required_text};

/// Urgency inputs accepted by the form.
const URGENCY_LEVELS: std::ops::RangeInclusive<u8> = 1..=3;

/// Size and budget limits applied to new tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskLimits {
    /// Maximum title length in characters.
    pub max_title_chars: usize,
    /// Maximum description length in characters.
    pub max_description_chars: usize,
    /// Smallest accepted budget.
    pub min_budget: f64,
    /// Largest accepted budget.
    pub max_budget: f64,
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self {
            max_title_chars: MAX_TITLE_CHARS,
            max_description_chars: MAX_DESCRIPTION_CHARS,
            min_budget: MIN_BUDGET,
            max_budget: MAX_BUDGET,
        }
    }
}

/// Raw form input. The budget is kept as typed text.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInput {
    /// Title as typed.
    pub title: String,
    /// Description as typed.
    pub description: String,
    /// Budget as typed, e.g. `"30"` or `"12.50"`.
    pub budget: String,
    /// Street address as typed.
    pub address: String,
    /// Map pin chosen for the address.
    pub coordinates: Coordinates,
    /// Urgency slider value, 1 to 3.
    pub urgency: u8,
    /// Optional listing category.
    pub category: Option<TaskCategory>,
}

/// Input that passed [`validate_task_input`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTask {
    /// Trimmed title.
    pub title: String,
    /// Trimmed description.
    pub description: String,
    /// Parsed budget.
    pub budget: f64,
    /// Trimmed address with its pin.
    pub location: Location,
    /// Derived urgency flag.
    pub urgent: bool,
    /// Listing category.
    pub category: Option<TaskCategory>,
}

impl ValidTask {
    /// Repository input for a task posted by `poster`.
    #[must_use]
    pub fn into_new_task(self, poster: UserId) -> NewTask {
        NewTask {
            title: self.title,
            description: self.description,
            budget: self.budget,
            location: self.location,
            category: self.category,
            urgent: self.urgent,
            posted_by: poster,
        }
    }
}

/// Validates form input, stopping at the first bad field.
///
/// Fields are checked in the order title, description, budget, address,
/// urgency.
///
/// # Errors
///
/// Returns a [`ValidationError`] tagged with the offending field.
pub fn validate_task_input(input: &TaskInput, limits: &TaskLimits) -> Result<ValidTask, ValidationError> {
    let title = required_text(&input.title, limits.max_title_chars, Field::Title)?;
    let description = required_text(
        &input.description,
        limits.max_description_chars,
        Field::Description,
    )?;
    let budget = parse_budget(&input.budget, limits)?;
    let address = required_text(&input.address, usize::MAX, Field::Address)?;
    if !URGENCY_LEVELS.contains(&input.urgency) {
        return Err(ValidationError::new(
            Field::Urgency,
            Reason::OutOfRange {
                min: f64::from(*URGENCY_LEVELS.start()),
                max: f64::from(*URGENCY_LEVELS.end()),
            },
        ));
    }

    Ok(ValidTask {
        title,
        description,
        budget,
        location: Location {
            address,
            coordinates: input.coordinates,
        },
        urgent: is_urgent_level(input.urgency),
        category: input.category,
    })
}

fn parse_budget(raw: &str, limits: &TaskLimits) -> Result<f64, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new(Field::Budget, Reason::Required));
    }
    let budget: f64 = raw
        .parse()
        .map_err(|_| ValidationError::new(Field::Budget, Reason::NotANumber))?;
    if !budget.is_finite() {
        return Err(ValidationError::new(Field::Budget, Reason::NotANumber));
    }
    if budget < limits.min_budget || budget > limits.max_budget {
        return Err(ValidationError::new(
            Field::Budget,
            Reason::OutOfRange {
                min: limits.min_budget,
                max: limits.max_budget,
            },
        ));
    }
    Ok(budget)
}
