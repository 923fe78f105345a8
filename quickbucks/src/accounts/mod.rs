//! Sign-up, sign-in and session tracking.

use chrono::Utc;

use quickbucks_proto::user::{Identity, UserProfile};

use crate::store::{AuthError, AuthProvider, StoreError, Subscription, UserRepository};
use crate::validation::{Field, Reason, ValidationError, required_text};

/// Shortest accepted password.
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Longest accepted full name.
const MAX_FULL_NAME_CHARS: usize = 100;

/// Errors that can occur during account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Form input was malformed; the provider was not contacted.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The auth provider refused.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Writing the profile document failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Checks for a `local@domain.tld` shape with no whitespace.
///
/// # Errors
///
/// [`Reason::Required`] or [`Reason::InvalidFormat`] tagged
/// [`Field::Email`].
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::new(Field::Email, Reason::Required));
    }
    let malformed = || ValidationError::new(Field::Email, Reason::InvalidFormat);
    if email.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    let (local, domain) = email.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.contains('@') {
        return Err(malformed());
    }
    let has_dotted_domain = domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());
    if !has_dotted_domain {
        return Err(malformed());
    }
    Ok(email.to_string())
}

/// Checks the password is at least [`MIN_PASSWORD_CHARS`] long.
///
/// # Errors
///
/// [`Reason::Required`] or [`Reason::TooShort`] tagged [`Field::Password`].
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::new(Field::Password, Reason::Required));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::new(
            Field::Password,
            Reason::TooShort {
                min: MIN_PASSWORD_CHARS,
            },
        ));
    }
    Ok(())
}

/// Sign-up form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    /// Full name as typed.
    pub full_name: String,
    /// Email as typed.
    pub email: String,
    /// Password as typed.
    pub password: String,
}

/// Account flows backed by the auth provider and the `users` collection.
pub struct AccountService<A, U> {
    auth: A,
    users: U,
}

impl<A: AuthProvider, U: UserRepository> AccountService<A, U> {
    /// Creates a service over the given collaborators.
    #[must_use]
    pub const fn new(auth: A, users: U) -> Self {
        Self { auth, users }
    }

    /// Creates an account and its initial profile document.
    ///
    /// Fields are checked in the order full name, email, password before
    /// the provider is contacted.
    ///
    /// # Errors
    ///
    /// [`AccountError::Validation`], [`AccountError::Auth`] (for example
    /// email in use), or [`AccountError::Store`] if the profile write fails.
    pub async fn sign_up(&self, form: &SignUp) -> Result<UserProfile, AccountError> {
        let full_name = required_text(&form.full_name, MAX_FULL_NAME_CHARS, Field::FullName)?;
        let email = validate_email(&form.email)?;
        validate_password(&form.password)?;

        let identity = self.auth.sign_up(&email, &form.password, &full_name).await?;
        let profile = UserProfile::new_member(identity.id.clone(), full_name, email, Utc::now());
        if let Err(err) = self.users.put_user(&profile).await {
            tracing::error!(user = %identity.id, error = %err, "account created but profile write failed");
            return Err(err.into());
        }
        tracing::info!(user = %identity.id, "account created");
        Ok(profile)
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// [`AccountError::Validation`] for blank fields, or
    /// [`AccountError::Auth`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AccountError> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(ValidationError::new(Field::Password, Reason::Required).into());
        }
        let identity = self.auth.sign_in(&email, password).await.inspect_err(|err| {
            tracing::debug!(error = %err, "sign-in refused");
        })?;
        tracing::info!(user = %identity.id, "signed in");
        Ok(identity)
    }

    /// Signs out the current user.
    ///
    /// # Errors
    ///
    /// [`AccountError::Auth`] if the provider fails.
    pub async fn sign_out(&self) -> Result<(), AccountError> {
        self.auth.sign_out().await?;
        tracing::info!("signed out");
        Ok(())
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn session(&self) -> Option<Identity> {
        self.auth.current_user()
    }

    /// Follows sign-in and sign-out; the current state comes first.
    #[must_use]
    pub fn watch_session(&self) -> Subscription<Option<Identity>> {
        self.auth.subscribe()
    }
}
