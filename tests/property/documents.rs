//! Property tests for the document codec.
//!
//! 1. Arbitrary JSON never makes `decode_document` panic.
//! 2. Any task document survives encode -> decode with its id reattached.
//! 3. The urgency mapping matches the `> 2` threshold for every input.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use quickbucks_proto::codec::{decode_document, encode_document};
use quickbucks_proto::task::{
    Coordinates, Location, Task, TaskCategory, TaskId, TaskStatus, URGENT_THRESHOLD,
    is_urgent_level,
};
use quickbucks_proto::user::UserId;

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Open),
        Just(TaskStatus::Assigned),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::PendingReview),
        Just(TaskStatus::Completed),
        Just(TaskStatus::Cancelled),
    ]
}

fn arb_task() -> impl Strategy<Value = Task> {
    (
        "[a-zA-Z0-9 ]{1,100}",
        "[a-zA-Z0-9 .,]{1,300}",
        5u32..=1000,
        -900i32..900,
        -1800i32..1800,
        arb_status(),
        proptest::option::of(0usize..TaskCategory::ALL.len()),
        0i64..4_000_000_000_000,
        any::<u64>(),
    )
        .prop_map(
            |(title, description, budget, lat, lon, status, category, millis, views)| Task {
                id: TaskId::new("placeholder"),
                title,
                description,
                budget: f64::from(budget),
                location: Location {
                    address: "1 Test Way".to_string(),
                    coordinates: Coordinates::new(f64::from(lat) / 10.0, f64::from(lon) / 10.0),
                },
                category: category.map(|i| TaskCategory::ALL[i]),
                urgent: views % 2 == 0,
                status,
                posted_by: UserId::new("poster"),
                assigned_to: None,
                posted_at: Utc.timestamp_millis_opt(millis).unwrap(),
                applications: Vec::new(),
                views,
                verification_video: None,
            },
        )
}

proptest! {
    #[test]
    fn decode_never_panics(raw in "\\PC{0,256}") {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
            let _ = decode_document::<Task>(TaskId::new("x"), value);
        }
    }

    #[test]
    fn task_document_survives_codec(task in arb_task(), id in "[a-zA-Z0-9]{1,20}") {
        let body = encode_document(&task).unwrap();
        let decoded: Task = decode_document(TaskId::new(id.clone()), body).unwrap();
        let mut expected = task;
        expected.id = TaskId::new(id);
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn urgency_threshold(level in 0u8..=10) {
        prop_assert_eq!(is_urgent_level(level), level > URGENT_THRESHOLD);
    }
}
