//! Integration tests for the task lifecycle against the in-memory backend.
//!
//! Tests posting, applying, cancelling, assignment, verification upload and
//! approval through `TaskService`, with several users sharing one backend.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;

use quickbucks::store::memory::{InMemoryAuth, InMemoryBackend};
use quickbucks::store::{NewTask, StoreError, TaskFilter, TaskPatch, TaskRepository};
use quickbucks::tasks::rules::{self, Rejection};
use quickbucks::tasks::{
    SortBy, TaskError, TaskFilters, TaskInput, TaskService, TaskSettings, VideoClip,
};
use quickbucks::validation::{Field, Reason};
use quickbucks_proto::task::{ApplicationStatus, Coordinates, Task, TaskId, TaskStatus};
use quickbucks_proto::user::{Identity, UserId};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

type Service = TaskService<InMemoryBackend, InMemoryAuth, InMemoryBackend>;

/// A service acting as `user` on the shared backend.
fn service_for(backend: &InMemoryBackend, user: &str) -> Service {
    let auth = InMemoryAuth::signed_in(Identity::new(user, user.to_uppercase()));
    TaskService::new(backend.clone(), auth, backend.clone(), TaskSettings::default())
}

fn mow_lawn() -> TaskInput {
    TaskInput {
        title: "Mow lawn".to_string(),
        description: "Needs mowing".to_string(),
        budget: "30".to_string(),
        address: "123 Main St".to_string(),
        coordinates: Coordinates::new(37.7749, -122.4194),
        urgency: 1,
        category: None,
    }
}

fn clip(secs: u64) -> VideoClip {
    VideoClip {
        bytes: vec![0x00, 0x00, 0x00, 0x18, 0x66, 0x74, 0x79, 0x70],
        duration: Duration::from_secs(secs),
    }
}

/// Lands an application from `rival` just before the first update.
struct RacingRepository {
    inner: InMemoryBackend,
    rival: Identity,
    raced: AtomicBool,
}

impl TaskRepository for RacingRepository {
    async fn create_task(&self, task: NewTask) -> Result<TaskId, StoreError> {
        self.inner.create_task(task).await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, StoreError> {
        self.inner.get_task(id).await
    }

    async fn query_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.inner.query_tasks(filter).await
    }

    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<(), StoreError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let current = self.inner.get_task(id).await?;
            let rival = rules::apply_for_task(&current, &self.rival, Utc::now())
                .map_err(|r| StoreError::Backend(r.to_string()))?;
            self.inner.update_task(id, rival).await?;
        }
        self.inner.update_task(id, patch).await
    }
}

fn rejection(err: TaskError) -> Rejection {
    match err {
        TaskError::Rejected(rejection) => rejection,
        other => panic!("expected a rejection, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Posting and applying
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mow_lawn_scenario() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let applicant = service_for(&backend, "u2");
    let stranger = service_for(&backend, "u3");

    let task = owner.create_task(&mow_lawn()).await.unwrap();
    assert_eq!(task.status, TaskStatus::Open);
    assert!(task.applications.is_empty());
    assert_eq!(task.views, 0);
    assert_eq!(task.posted_by, UserId::new("u1"));

    let applied = applicant.apply(&task.id).await.unwrap();
    assert_eq!(applied.applications.len(), 1);
    assert_eq!(applied.applications[0].tasker_id, UserId::new("u2"));
    assert_eq!(applied.applications[0].tasker_name, "U2");
    assert_eq!(applied.applications[0].status, ApplicationStatus::Pending);
    assert_eq!(applied.views, 1);

    let err = applicant.apply(&task.id).await.unwrap_err();
    assert_eq!(rejection(err).reason(), "duplicate-application");
    let stored = owner.get_task(&task.id).await.unwrap();
    assert_eq!(stored.applications.len(), 1);
    assert_eq!(stored.views, 1);

    let err = stranger.cancel(&task.id).await.unwrap_err();
    assert_eq!(rejection(err), Rejection::NotOwner);

    let cancelled = owner.cancel(&task.id).await.unwrap();
    assert_eq!(cancelled.status, TaskStatus::Cancelled);
    assert_eq!(
        owner.get_task(&task.id).await.unwrap().status,
        TaskStatus::Cancelled
    );
}

#[tokio::test]
async fn poster_cannot_apply_to_own_task() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let task = owner.create_task(&mow_lawn()).await.unwrap();

    let err = owner.apply(&task.id).await.unwrap_err();
    assert_eq!(rejection(err), Rejection::SelfApplication);
    assert!(owner.get_task(&task.id).await.unwrap().applications.is_empty());
}

#[tokio::test]
async fn cannot_apply_to_cancelled_task() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let applicant = service_for(&backend, "u2");
    let task = owner.create_task(&mow_lawn()).await.unwrap();
    owner.cancel(&task.id).await.unwrap();

    let err = applicant.apply(&task.id).await.unwrap_err();
    assert_eq!(rejection(err).reason(), "wrong-status");
}

#[tokio::test]
async fn invalid_input_writes_nothing() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let mut input = mow_lawn();
    input.budget = "1001".to_string();

    let validation = match owner.create_task(&input).await {
        Err(TaskError::Validation(validation)) => validation,
        other => panic!("expected validation error, got {other:?}"),
    };
    assert_eq!(validation.field, Field::Budget);
    let posted = backend
        .query_tasks(&TaskFilter::PostedBy(UserId::new("u1")))
        .await
        .unwrap();
    assert!(posted.is_empty());
}

#[tokio::test]
async fn signed_out_user_is_unauthenticated() {
    let backend = InMemoryBackend::new();
    let service = TaskService::new(
        backend.clone(),
        InMemoryAuth::new(),
        backend.clone(),
        TaskSettings::default(),
    );
    assert!(matches!(
        service.create_task(&mow_lawn()).await,
        Err(TaskError::Unauthenticated)
    ));
    assert!(matches!(
        service.available_tasks().await,
        Err(TaskError::Unauthenticated)
    ));
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let backend = InMemoryBackend::new();
    let applicant = service_for(&backend, "u2");
    assert!(matches!(
        applicant.apply(&TaskId::new("missing")).await,
        Err(TaskError::NotFound(_))
    ));
}

#[tokio::test]
async fn network_failure_is_reported() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let applicant = service_for(&backend, "u2");
    let task = owner.create_task(&mow_lawn()).await.unwrap();

    backend.set_offline(true);
    assert!(matches!(
        applicant.apply(&task.id).await,
        Err(TaskError::Store(StoreError::Network(_)))
    ));
    backend.set_offline(false);
    assert!(owner.get_task(&task.id).await.unwrap().applications.is_empty());
}

#[tokio::test]
async fn stale_decision_is_a_conflict() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let task = owner.create_task(&mow_lawn()).await.unwrap();

    // Decided against the open task, written after the poster cancelled.
    let stale = rules::apply_for_task(&task, &Identity::new("u2", "U2"), Utc::now()).unwrap();
    owner.cancel(&task.id).await.unwrap();

    let err = backend.update_task(&task.id, stale).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    let stored = owner.get_task(&task.id).await.unwrap();
    assert!(stored.applications.is_empty());
    assert_eq!(stored.views, 0);
}

#[tokio::test]
async fn returned_task_includes_concurrent_writes() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let task = owner.create_task(&mow_lawn()).await.unwrap();

    let racing = RacingRepository {
        inner: backend.clone(),
        rival: Identity::new("u3", "U3"),
        raced: AtomicBool::new(false),
    };
    let applicant = TaskService::new(
        racing,
        InMemoryAuth::signed_in(Identity::new("u2", "U2")),
        backend.clone(),
        TaskSettings::default(),
    );

    let returned = applicant.apply(&task.id).await.unwrap();
    let stored = backend.get_task(&task.id).await.unwrap();
    assert_eq!(returned, stored);
    assert_eq!(returned.applications.len(), 2);
    assert_eq!(returned.views, 2);
    assert_eq!(returned.applications[0].tasker_id, UserId::new("u3"));
    assert_eq!(returned.applications[1].tasker_id, UserId::new("u2"));
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn feeds_split_by_poster() {
    let backend = InMemoryBackend::new();
    let u1 = service_for(&backend, "u1");
    let u2 = service_for(&backend, "u2");

    let mine = u1.create_task(&mow_lawn()).await.unwrap();
    let mut cheap = mow_lawn();
    cheap.title = "Walk dog".to_string();
    cheap.budget = "10".to_string();
    let theirs = u2.create_task(&cheap).await.unwrap();
    let closed = u2.create_task(&mow_lawn()).await.unwrap();
    u2.cancel(&closed.id).await.unwrap();

    let available = u1.available_tasks().await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, theirs.id);

    let my_tasks = u1.my_tasks().await.unwrap();
    assert_eq!(my_tasks.len(), 1);
    assert_eq!(my_tasks[0].id, mine.id);

    let found = u1.browse("DOG", &TaskFilters::default()).await.unwrap();
    assert_eq!(found.len(), 1);
    let nothing = u1.browse("piano", &TaskFilters::default()).await.unwrap();
    assert!(nothing.is_empty());
}

#[tokio::test]
async fn browse_sorts_by_price() {
    let backend = InMemoryBackend::new();
    let poster = service_for(&backend, "u1");
    for budget in ["300", "20", "75"] {
        let mut input = mow_lawn();
        input.budget = budget.to_string();
        poster.create_task(&input).await.unwrap();
    }
    let viewer = service_for(&backend, "u2");
    let filters = TaskFilters {
        sort_by: SortBy::PriceLow,
        ..TaskFilters::default()
    };
    let budgets: Vec<f64> = viewer
        .browse("", &filters)
        .await
        .unwrap()
        .iter()
        .map(|t| t.budget)
        .collect();
    assert_eq!(budgets, [20.0, 75.0, 300.0]);
}

// ---------------------------------------------------------------------------
// Assignment, verification and approval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_lifecycle_to_completion() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let tasker = service_for(&backend, "u2");
    let other = service_for(&backend, "u3");

    let task = owner.create_task(&mow_lawn()).await.unwrap();
    tasker.apply(&task.id).await.unwrap();
    other.apply(&task.id).await.unwrap();

    let err = owner.assign(&task.id, &UserId::new("u9")).await.unwrap_err();
    assert_eq!(rejection(err).reason(), "unknown-applicant");

    let assigned = owner.assign(&task.id, &UserId::new("u2")).await.unwrap();
    assert_eq!(assigned.status, TaskStatus::Assigned);
    assert_eq!(assigned.assigned_to, Some(UserId::new("u2")));
    assert_eq!(assigned.applications[0].status, ApplicationStatus::Accepted);
    assert_eq!(assigned.applications[1].status, ApplicationStatus::Rejected);

    let err = other.start(&task.id).await.unwrap_err();
    assert_eq!(rejection(err), Rejection::NotAssignee);
    let started = tasker.start(&task.id).await.unwrap();
    assert_eq!(started.status, TaskStatus::InProgress);

    let reviewed = tasker.submit_verification(&task.id, clip(12)).await.unwrap();
    assert_eq!(reviewed.status, TaskStatus::PendingReview);
    let video = reviewed.verification_video.clone().unwrap();
    assert_eq!(video.uploaded_by, UserId::new("u2"));
    let prefix = format!("memory://task-verification/{}/u2_", task.id);
    assert!(video.url.starts_with(&prefix), "{}", video.url);
    assert!(video.url.ends_with(".mp4"));
    let path = video.url.trim_start_matches("memory://");
    let (content_type, bytes) = backend.object(path).await.unwrap();
    assert_eq!(content_type, "video/mp4");
    assert_eq!(bytes, clip(12).bytes);

    let err = tasker.approve(&task.id).await.unwrap_err();
    assert_eq!(rejection(err), Rejection::NotOwner);
    let completed = owner.approve(&task.id).await.unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);
    assert_eq!(completed.assigned_to, Some(UserId::new("u2")));

    let stored = owner.get_task(&task.id).await.unwrap();
    assert_eq!(stored, completed);
    assert_eq!(stored.check_invariants(), Ok(()));
}

#[tokio::test]
async fn verification_clip_limits_checked_before_upload() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let tasker = service_for(&backend, "u2");
    let task = owner.create_task(&mow_lawn()).await.unwrap();

    let validation = match tasker.submit_verification(&task.id, clip(31)).await {
        Err(TaskError::Validation(validation)) => validation,
        other => panic!("expected validation error, got {other:?}"),
    };
    assert_eq!(validation.field, Field::Video);
    assert_eq!(validation.reason, Reason::DurationExceeded { max_secs: 30 });

    let empty = VideoClip {
        bytes: Vec::new(),
        duration: Duration::from_secs(5),
    };
    assert!(matches!(
        tasker.submit_verification(&task.id, empty).await,
        Err(TaskError::Validation(_))
    ));

    let stored = owner.get_task(&task.id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Open);
    assert!(stored.verification_video.is_none());
}

#[tokio::test]
async fn reupload_replaces_video() {
    let backend = InMemoryBackend::new();
    let owner = service_for(&backend, "u1");
    let tasker = service_for(&backend, "u2");
    let task = owner.create_task(&mow_lawn()).await.unwrap();

    let first = tasker.submit_verification(&task.id, clip(10)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let second = tasker.submit_verification(&task.id, clip(20)).await.unwrap();

    assert_eq!(second.status, TaskStatus::PendingReview);
    let (a, b) = (
        first.verification_video.unwrap(),
        second.verification_video.unwrap(),
    );
    assert_ne!(a.url, b.url);
    assert_eq!(
        owner.get_task(&task.id).await.unwrap().verification_video,
        Some(b)
    );
}
