//! The caller-facing error taxonomy.

use fittrack_auth::AuthError;
use fittrack_directory::DirectoryError;

/// Every failure a synchronizer command can return.
///
/// Backend errors are folded into the variants a UI distinguishes:
/// credential problems, suspension, directory writes, and transport
/// failures. Anything else from the auth backend arrives as
/// [`SyncError::Auth`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Unknown email, wrong password, or a wrong current password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The credentials were valid but the account is suspended.
    #[error("your account has been suspended. Please contact support.")]
    SuspendedAccount,

    /// Inserting or updating a user record failed.
    #[error("could not save user record: {0}")]
    DirectoryWrite(#[source] DirectoryError),

    /// Looking up a user record failed for a reason other than a miss.
    #[error("could not load user record: {0}")]
    DirectoryRead(#[source] DirectoryError),

    /// Either backend was unreachable.
    #[error("network error: {0}")]
    Network(String),

    /// Any other rejection from the auth backend.
    #[error(transparent)]
    Auth(AuthError),

    /// The command needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// The command needs an admin.
    #[error("this action requires an administrator")]
    Forbidden,

    /// A new password is shorter than allowed.
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
}

impl SyncError {
    /// Wraps a failed directory lookup. Transport failures become
    /// [`SyncError::Network`].
    pub fn read(err: DirectoryError) -> Self {
        if err.is_transport() {
            Self::Network(err.to_string())
        } else {
            Self::DirectoryRead(err)
        }
    }

    /// Returns `true` if retrying later might succeed.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::DirectoryWrite(e) | Self::DirectoryRead(e) => e.is_transport(),
            _ => false,
        }
    }
}

impl From<AuthError> for SyncError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::Network(msg) => Self::Network(msg),
            AuthError::NotSignedIn => Self::NotSignedIn,
            AuthError::WeakPassword { min } => Self::WeakPassword { min },
            other => Self::Auth(other),
        }
    }
}
