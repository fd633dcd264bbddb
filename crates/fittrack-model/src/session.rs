//! Session types: what the auth backend hands out, and how it announces
//! that the current session changed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Proof of authentication for one subject.
///
/// Owned by the auth backend. FitTrack only observes it: the synchronizer
/// reads `subject` and `email` and never persists the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The account this session authenticates. Doubles as the directory key.
    pub subject: UserId,
    pub email: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Returns `true` if the session carries an expiry that is in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Tokens are credentials, so `Debug` prints only their length.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("subject", &self.subject)
            .field("email", &self.email)
            .field("access_token", &format_args!("<{} bytes>", self.access_token.len()))
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SessionChange
// ---------------------------------------------------------------------------

/// Why the backend emitted a [`SessionChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// A notification that the backend's current session changed.
///
/// `session` is the session *after* the change: `None` means nobody is
/// signed in any more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChange {
    pub kind: ChangeKind,
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: ChangeKind::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: ChangeKind::SignedOut,
            session: None,
        }
    }

    pub fn user_updated(session: Session) -> Self {
        Self {
            kind: ChangeKind::UserUpdated,
            session: Some(session),
        }
    }
}
