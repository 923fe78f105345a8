//! Search, filter and sort over a fetched task list.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use quickbucks_proto::task::{Coordinates, MAX_BUDGET, Task, TaskCategory};

use super::geo::haversine_km;

/// Default search radius in kilometres.
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// Ordering applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Newest first.
    #[default]
    Recent,
    /// Highest budget first.
    PriceHigh,
    /// Lowest budget first.
    PriceLow,
    /// Nearest first.
    Distance,
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Recent => "recent",
            Self::PriceHigh => "price_high",
            Self::PriceLow => "price_low",
            Self::Distance => "distance",
        })
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" => Ok(Self::Recent),
            "price_high" => Ok(Self::PriceHigh),
            "price_low" => Ok(Self::PriceLow),
            "distance" => Ok(Self::Distance),
            other => Err(format!(
                "unknown sort '{other}' (expected recent, price_high, price_low or distance)"
            )),
        }
    }
}

/// Inclusive budget range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Lowest budget kept.
    pub min: f64,
    /// Highest budget kept.
    pub max: f64,
}

impl PriceRange {
    /// Range from zero up to `max`.
    #[must_use]
    pub const fn up_to(max: f64) -> Self {
        Self { min: 0.0, max }
    }

    /// Whether `budget` lies within the range.
    #[must_use]
    pub fn contains(&self, budget: f64) -> bool {
        (self.min..=self.max).contains(&budget)
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::up_to(MAX_BUDGET)
    }
}

/// Browse filters. The default keeps every task, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilters {
    /// Categories to keep; empty keeps all.
    pub categories: BTreeSet<TaskCategory>,
    /// Budget range.
    pub price_range: PriceRange,
    /// Result ordering.
    pub sort_by: SortBy,
    /// Keep only urgent tasks.
    pub urgent_only: bool,
    /// Maximum distance from `origin` in kilometres.
    pub max_distance_km: f64,
    /// Reference point for distance filtering and sorting.
    pub origin: Option<Coordinates>,
}

impl Default for TaskFilters {
    fn default() -> Self {
        Self {
            categories: BTreeSet::new(),
            price_range: PriceRange::default(),
            sort_by: SortBy::Recent,
            urgent_only: false,
            max_distance_km: DEFAULT_RADIUS_KM,
            origin: None,
        }
    }
}

impl TaskFilters {
    fn keeps_category(&self, task: &Task) -> bool {
        self.categories.is_empty()
            || task
                .category
                .is_some_and(|category| self.categories.contains(&category))
    }
}

/// Case-insensitive substring match on title, description or address.
///
/// A blank query matches every task.
#[must_use]
pub fn matches_query(task: &Task, query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    [
        task.title.as_str(),
        task.description.as_str(),
        task.location.address.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Applies `query` and `filters` and sorts the survivors.
///
/// Distance filtering and the distance sort need `filters.origin`; without
/// one, distance does not narrow and every task counts as equally near.
/// Ties are broken by task id.
#[must_use]
pub fn filter_and_sort(tasks: Vec<Task>, query: &str, filters: &TaskFilters) -> Vec<Task> {
    let mut kept: Vec<(Task, f64)> = tasks
        .into_iter()
        .filter(|task| matches_query(task, query))
        .filter(|task| filters.keeps_category(task))
        .filter(|task| filters.price_range.contains(task.budget))
        .filter(|task| !filters.urgent_only || task.urgent)
        .map(|task| {
            let distance = filters
                .origin
                .map_or(0.0, |origin| haversine_km(origin, task.location.coordinates));
            (task, distance)
        })
        .filter(|(_, distance)| filters.origin.is_none() || *distance <= filters.max_distance_km)
        .collect();

    kept.sort_by(|(a, da), (b, db)| {
        let primary = match filters.sort_by {
            SortBy::Recent => b.posted_at.cmp(&a.posted_at),
            SortBy::PriceHigh => b.budget.total_cmp(&a.budget),
            SortBy::PriceLow => a.budget.total_cmp(&b.budget),
            SortBy::Distance => da.total_cmp(db),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });

    kept.into_iter().map(|(task, _)| task).collect()
}
