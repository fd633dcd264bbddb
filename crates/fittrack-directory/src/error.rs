//! Error types for the directory layer.

use fittrack_model::UserId;

/// Errors a [`UserDirectory`](crate::UserDirectory) can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// No record exists for this id. For lookups this is a "miss", not a
    /// failure: the synchronizer answers it by provisioning a record.
    #[error("no user record for {0}")]
    NotFound(UserId),

    /// An insert collided with an existing record's id.
    #[error("a user record for {0} already exists")]
    DuplicateId(UserId),

    /// An insert or update collided with another record's email.
    #[error("email {0} is already used by another record")]
    DuplicateEmail(String),

    /// The directory's command channel is full or closed.
    #[error("user directory is unavailable")]
    Unavailable,

    /// Transport failure talking to the store.
    #[error("user directory unreachable: {0}")]
    Network(String),

    /// Any other rejection, with the store's message.
    #[error("user directory rejected the request: {0}")]
    Rejected(String),
}

impl DirectoryError {
    /// Returns `true` for [`DirectoryError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if the store couldn't be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable)
    }
}
