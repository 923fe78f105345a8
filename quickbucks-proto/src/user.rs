//! User identity and profile documents.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque user identifier issued by the auth provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Auth provider user id.
    #[serde(rename = "uid")]
    pub id: UserId,
    /// Display name, if one was set at sign-up.
    pub display_name: Option<String>,
    /// Avatar URL, if any.
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl Identity {
    /// Creates an identity with a display name and no avatar.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            display_name: Some(display_name.into()),
            photo_url: None,
        }
    }

    /// Name to show for this user, falling back to the raw id.
    #[must_use]
    pub fn display_name_or_id(&self) -> &str {
        self.display_name.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

/// A document in the `users` collection.
///
/// `tasks_completed` and `rating` are stored for compatibility with existing
/// data but are not authoritative: statistics are recomputed from tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Document id (not part of the stored body).
    #[serde(skip)]
    pub id: UserId,
    /// Full name entered at sign-up.
    pub full_name: String,
    /// Sign-up email address.
    pub email: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// Stored completion counter (stale-prone).
    #[serde(default)]
    pub tasks_completed: u32,
    /// Stored rating value.
    #[serde(default)]
    pub rating: f64,
    /// Self-declared skills.
    #[serde(default)]
    pub skills: BTreeSet<String>,
    /// Whether the user offers to perform tasks.
    #[serde(default)]
    pub is_tasker: bool,
    /// Free-form biography.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl UserProfile {
    /// Profile document written when an account is first created.
    pub fn new_member(
        id: UserId,
        full_name: impl Into<String>,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            email: email.into(),
            created_at,
            tasks_completed: 0,
            rating: 0.0,
            skills: BTreeSet::new(),
            is_tasker: false,
            bio: None,
        }
    }
}
