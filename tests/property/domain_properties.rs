//! Property tests for the pure domain rules.
//!
//! 1. Both participants derive the same thread id.
//! 2. Haversine distance is zero to itself, symmetric and bounded.
//! 3. Browse results honour the price range and the requested ordering.
//! 4. Well-formed task input validates; a single bad field is reported.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use quickbucks::chat::thread_id;
use quickbucks::tasks::{
    PriceRange, SortBy, TaskFilters, TaskInput, TaskLimits, filter_and_sort, haversine_km,
    validate_task_input,
};
use quickbucks::validation::{Field, Reason};
use quickbucks_proto::task::{Coordinates, Location, Task, TaskId, TaskStatus};
use quickbucks_proto::user::UserId;

/// Half the circumference of the sphere used for distances, rounded up.
const MAX_DISTANCE_KM: f64 = 20_015.1;

fn arb_coordinates() -> impl Strategy<Value = Coordinates> {
    (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| Coordinates::new(lat, lon))
}

fn arb_task() -> impl Strategy<Value = Task> {
    ("[a-z]{1,8}", 1u32..=1500, 0i64..1_000_000, any::<bool>()).prop_map(
        |(id, budget, minutes, urgent)| Task {
            id: TaskId::new(id),
            title: "Odd job".to_string(),
            description: "Help wanted".to_string(),
            budget: f64::from(budget),
            location: Location {
                address: "1 Main St".to_string(),
                coordinates: Coordinates::new(37.7749, -122.4194),
            },
            category: None,
            urgent,
            status: TaskStatus::Open,
            posted_by: UserId::new("poster"),
            assigned_to: None,
            posted_at: Utc.timestamp_millis_opt(minutes * 60_000).unwrap(),
            applications: Vec::new(),
            views: 0,
            verification_video: None,
        },
    )
}

fn arb_valid_input() -> impl Strategy<Value = TaskInput> {
    (
        "[A-Za-z][A-Za-z0-9 ]{0,98}",
        "[A-Za-z][A-Za-z0-9 .,]{0,300}",
        500u32..=100_000,
        "[0-9]{1,4} [A-Z][a-z]{2,10} St",
        1u8..=3,
    )
        .prop_map(|(title, description, cents, address, urgency)| TaskInput {
            title,
            description,
            budget: format!("{:.2}", f64::from(cents) / 100.0),
            address,
            coordinates: Coordinates::new(37.0, -122.0),
            urgency,
            category: None,
        })
}

proptest! {
    #[test]
    fn thread_id_is_commutative(a in "[a-zA-Z0-9]{1,20}", b in "[a-zA-Z0-9]{1,20}") {
        let (a, b) = (UserId::new(a), UserId::new(b));
        prop_assert_eq!(thread_id(&a, &b), thread_id(&b, &a));
    }

    #[test]
    fn distance_to_self_is_zero(p in arb_coordinates()) {
        prop_assert!(haversine_km(p, p).abs() < f64::EPSILON);
    }

    #[test]
    fn distance_is_symmetric_and_bounded(a in arb_coordinates(), b in arb_coordinates()) {
        let there = haversine_km(a, b);
        let back = haversine_km(b, a);
        prop_assert!((there - back).abs() < 1e-9, "{there} vs {back}");
        prop_assert!((0.0..=MAX_DISTANCE_KM).contains(&there), "{there}");
    }

    #[test]
    fn price_sorts_are_monotonic(
        tasks in proptest::collection::vec(arb_task(), 0..30),
        min in 0u32..500,
        span in 0u32..1000,
    ) {
        let range = PriceRange { min: f64::from(min), max: f64::from(min + span) };
        let low = TaskFilters { price_range: range, sort_by: SortBy::PriceLow, ..TaskFilters::default() };
        let high = TaskFilters { sort_by: SortBy::PriceHigh, ..low.clone() };

        let ascending = filter_and_sort(tasks.clone(), "", &low);
        let descending = filter_and_sort(tasks.clone(), "", &high);
        prop_assert_eq!(ascending.len(), descending.len());
        prop_assert!(ascending.iter().all(|t| range.contains(t.budget)));
        prop_assert_eq!(
            ascending.len(),
            tasks.iter().filter(|t| range.contains(t.budget)).count()
        );
        for pair in ascending.windows(2) {
            prop_assert!(pair[0].budget <= pair[1].budget);
        }
        for pair in descending.windows(2) {
            prop_assert!(pair[0].budget >= pair[1].budget);
        }
    }

    #[test]
    fn recent_sort_is_newest_first_and_urgent_filter_holds(
        tasks in proptest::collection::vec(arb_task(), 0..30),
    ) {
        let filters = TaskFilters { urgent_only: true, ..TaskFilters::default() };
        let found = filter_and_sort(tasks, "", &filters);
        prop_assert!(found.iter().all(|t| t.urgent));
        for pair in found.windows(2) {
            prop_assert!(pair[0].posted_at >= pair[1].posted_at);
        }
    }

    #[test]
    fn well_formed_input_validates(input in arb_valid_input()) {
        let valid = validate_task_input(&input, &TaskLimits::default()).unwrap();
        prop_assert_eq!(valid.title, input.title.trim());
        prop_assert!((5.0..=1000.0).contains(&valid.budget));
        prop_assert_eq!(valid.urgent, input.urgency == 3);
    }

    #[test]
    fn overlong_title_is_reported(input in arb_valid_input(), extra in 101usize..300) {
        let input = TaskInput { title: "t".repeat(extra), ..input };
        let err = validate_task_input(&input, &TaskLimits::default()).unwrap_err();
        prop_assert_eq!(err.field, Field::Title);
        prop_assert_eq!(err.reason, Reason::TooLong { max: 100 });
    }

    #[test]
    fn out_of_range_budget_is_reported(input in arb_valid_input(), over in 1001u32..100_000) {
        for budget in ["4.99".to_string(), over.to_string(), "-5".to_string()] {
            let input = TaskInput { budget, ..input.clone() };
            let err = validate_task_input(&input, &TaskLimits::default()).unwrap_err();
            prop_assert_eq!(err.field, Field::Budget);
            prop_assert!(matches!(err.reason, Reason::OutOfRange { .. }), "expected OutOfRange");
        }
    }

    #[test]
    fn non_numeric_budget_is_reported(input in arb_valid_input(), word in "[a-z]{1,8}") {
        let input = TaskInput { budget: word, ..input };
        let err = validate_task_input(&input, &TaskLimits::default()).unwrap_err();
        prop_assert_eq!(err.field, Field::Budget);
        prop_assert_eq!(err.reason, Reason::NotANumber);
    }

    #[test]
    fn urgency_outside_slider_is_reported(input in arb_valid_input(), urgency in 4u8..) {
        for urgency in [0, urgency] {
            let input = TaskInput { urgency, ..input.clone() };
            let err = validate_task_input(&input, &TaskLimits::default()).unwrap_err();
            prop_assert_eq!(err.field, Field::Urgency);
        }
    }
}
