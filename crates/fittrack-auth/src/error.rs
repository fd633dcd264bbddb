//! Error types for the auth layer.

use fittrack_model::UserId;

/// Errors an [`AuthBackend`](crate::AuthBackend) can report.
///
/// These are returned as values and never retried by the backend itself.
/// Credential errors are final; only `Network` is worth a manual retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password. Both map to this one variant.
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// Sign-up for an email that already has an account.
    #[error("an account for {0} is already registered")]
    AlreadyRegistered(String),

    /// The password is shorter than the backend accepts.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// The operation needs an active session and there is none.
    #[error("no active session")]
    NotSignedIn,

    /// No account exists for the given subject.
    #[error("no account for subject {0}")]
    UnknownAccount(UserId),

    /// The backend couldn't be reached, or the response was unreadable.
    #[error("auth backend unreachable: {0}")]
    Network(String),

    /// Any other rejection, with the backend's message.
    #[error("auth backend rejected the request: {0}")]
    Rejected(String),
}
