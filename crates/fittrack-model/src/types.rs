//! Identity types: account ids and roles.
//!
//! These are the two values every other FitTrack layer keys on. A
//! [`UserId`] is the subject the auth backend assigns to an account and is
//! reused as the primary key of the account's directory record. A [`Role`]
//! decides which parts of the application the account may reach.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ModelError;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// The stable identifier of an account (the session "subject").
///
/// A newtype over [`Uuid`] so it can't be mixed up with any other id in a
/// function signature. `#[serde(transparent)]` keeps the JSON form a plain
/// string (`"5f0c…"`), matching what the hosted backend stores in its `id`
/// column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generates a fresh random (v4) id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase form, the same text the backend uses in
        // `id=eq.{id}` filters.
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|source| ModelError::InvalidId {
                value: s.to_string(),
                source,
            })
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// What an account is allowed to do.
///
/// - **Admin**: reaches the back-office (user management).
/// - **Customer**: the regular application.
///
/// New accounts that appear without a directory record are provisioned as
/// customers, which is why `Customer` is the `#[default]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Customer,
}

impl Role {
    /// The lowercase string stored in the directory's `role` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
        }
    }

    /// Returns `true` for [`Role::Admin`].
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "customer" => Ok(Self::Customer),
            _ => Err(ModelError::UnknownRole(s.to_string())),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
