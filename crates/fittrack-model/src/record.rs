//! Directory records: the application-level row kept for each account.
//!
//! The auth backend only knows credentials. Everything the application
//! cares about (role, suspension, profile fields) lives in a separate
//! `users` table keyed by the same [`UserId`]. This module has the three
//! shapes that table is read and written with:
//!
//! - [`UserRecord`] — a full row as read back.
//! - [`NewUserRecord`] — what an insert sends (the store fills `created_at`).
//! - [`UserPatch`] — a partial update; `None` fields are left untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Role, UserId};

// ---------------------------------------------------------------------------
// UserRecord
// ---------------------------------------------------------------------------

/// One row of the user directory.
///
/// Invariant (kept by the directory, not by this type): at most one record
/// per `id`, and `email` is unique across records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Same value as the auth backend's session subject.
    pub id: UserId,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Older rows may carry `null` here; that reads as "not suspended".
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_suspended: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// The name to show in the UI: the profile name if set, else the email.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }

    /// Returns `true` if this record has the admin role.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

// ---------------------------------------------------------------------------
// NewUserRecord
// ---------------------------------------------------------------------------

/// The payload of a directory insert.
///
/// `created_at` is absent on purpose: the store stamps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserRecord {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub is_suspended: bool,
}

impl NewUserRecord {
    /// A non-suspended record with the given role.
    pub fn new(id: UserId, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            email: email.into(),
            role,
            name: None,
            is_suspended: false,
        }
    }

    /// The record auto-provisioned for a session that has no directory row.
    pub fn customer(id: UserId, email: impl Into<String>) -> Self {
        Self::new(id, email, Role::Customer)
    }

    /// Sets the profile name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Materializes the full row, as a store does on insert.
    pub fn into_record(self, created_at: DateTime<Utc>) -> UserRecord {
        UserRecord {
            id: self.id,
            email: self.email,
            role: self.role,
            name: self.name,
            avatar_url: None,
            is_suspended: self.is_suspended,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// UserPatch
// ---------------------------------------------------------------------------

/// A partial update to a [`UserRecord`].
///
/// Serialized with `None` fields omitted, so the JSON body only names the
/// columns being changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_suspended: Option<bool>,
}

impl UserPatch {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_suspended(mut self, suspended: bool) -> Self {
        self.is_suspended = Some(suspended);
        self
    }

    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.avatar_url.is_none()
            && self.role.is_none()
            && self.is_suspended.is_none()
    }

    /// Writes every `Some` field into `record`.
    pub fn apply_to(&self, record: &mut UserRecord) {
        if let Some(name) = &self.name {
            record.name = Some(name.clone());
        }
        if let Some(url) = &self.avatar_url {
            record.avatar_url = Some(url.clone());
        }
        if let Some(role) = self.role {
            record.role = role;
        }
        if let Some(suspended) = self.is_suspended {
            record.is_suspended = suspended;
        }
    }
}
