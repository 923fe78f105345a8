//! Integration tests for sign-up, sign-in and session tracking.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use quickbucks::accounts::{AccountError, AccountService, SignUp};
use quickbucks::store::memory::{InMemoryAuth, InMemoryBackend};
use quickbucks::store::{AuthError, UserRepository};
use quickbucks::validation::Field;

fn ada() -> SignUp {
    SignUp {
        full_name: " Ada Lovelace ".to_string(),
        email: "ada@example.com".to_string(),
        password: "engine1".to_string(),
    }
}

fn field_of(err: AccountError) -> Field {
    match err {
        AccountError::Validation(validation) => validation.field,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn sign_up_writes_initial_profile() {
    let backend = InMemoryBackend::new();
    let accounts = AccountService::new(InMemoryAuth::new(), backend.clone());

    let profile = accounts.sign_up(&ada()).await.unwrap();
    assert_eq!(profile.full_name, "Ada Lovelace");
    assert_eq!(profile.tasks_completed, 0);
    assert!(profile.rating.abs() < f64::EPSILON);
    assert!(profile.skills.is_empty());
    assert!(!profile.is_tasker);

    let session = accounts.session().unwrap();
    assert_eq!(session.id, profile.id);
    assert_eq!(session.display_name.as_deref(), Some("Ada Lovelace"));

    let stored = backend.get_user(&profile.id).await.unwrap();
    assert_eq!(stored, profile);
}

#[tokio::test]
async fn sign_up_validates_before_contacting_provider() {
    let backend = InMemoryBackend::new();
    let auth = InMemoryAuth::new();
    let accounts = AccountService::new(auth.clone(), backend);

    let mut form = ada();
    form.full_name = String::new();
    assert_eq!(field_of(accounts.sign_up(&form).await.unwrap_err()), Field::FullName);

    let mut form = ada();
    form.email = "ada.example.com".to_string();
    assert_eq!(field_of(accounts.sign_up(&form).await.unwrap_err()), Field::Email);

    let mut form = ada();
    form.password = "12345".to_string();
    assert_eq!(field_of(accounts.sign_up(&form).await.unwrap_err()), Field::Password);

    assert!(accounts.session().is_none());
    let elsewhere = AccountService::new(auth.session(), InMemoryBackend::new());
    assert!(matches!(
        elsewhere.sign_in("ada@example.com", "12345").await,
        Err(AccountError::Auth(AuthError::InvalidCredentials))
    ));
}

#[tokio::test]
async fn duplicate_email_is_refused() {
    let backend = InMemoryBackend::new();
    let accounts = AccountService::new(InMemoryAuth::new(), backend);
    accounts.sign_up(&ada()).await.unwrap();

    let err = accounts.sign_up(&ada()).await.unwrap_err();
    assert!(matches!(err, AccountError::Auth(AuthError::EmailInUse)));
}

#[tokio::test]
async fn sign_in_and_out_on_another_device() {
    let backend = InMemoryBackend::new();
    let phone = InMemoryAuth::new();
    let tablet = phone.session();
    let on_phone = AccountService::new(phone, backend.clone());
    let on_tablet = AccountService::new(tablet, backend);

    let profile = on_phone.sign_up(&ada()).await.unwrap();
    assert!(on_tablet.session().is_none());

    let mut changes = on_tablet.watch_session();
    assert_eq!(changes.next().await, Some(None));

    let err = on_tablet.sign_in("ada@example.com", "wrong-pass").await.unwrap_err();
    assert!(matches!(err, AccountError::Auth(AuthError::InvalidCredentials)));

    let identity = on_tablet.sign_in("ada@example.com", "engine1").await.unwrap();
    assert_eq!(identity.id, profile.id);
    assert_eq!(changes.next().await, Some(Some(identity)));

    on_tablet.sign_out().await.unwrap();
    assert!(on_tablet.session().is_none());
    assert_eq!(changes.next().await, Some(None));
    assert!(on_phone.session().is_some());

    changes.cancel();
    assert!(changes.is_cancelled());
}

#[tokio::test]
async fn sign_in_rejects_blank_fields() {
    let accounts = AccountService::new(InMemoryAuth::new(), InMemoryBackend::new());
    assert_eq!(
        field_of(accounts.sign_in("", "engine1").await.unwrap_err()),
        Field::Email
    );
    assert_eq!(
        field_of(accounts.sign_in("ada@example.com", "").await.unwrap_err()),
        Field::Password
    );
}
