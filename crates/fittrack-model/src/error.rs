//! Error types for the model layer.

/// Errors produced while parsing model values from text.
///
/// The hosted backend stores roles and ids as strings, so anything that
/// reads them back goes through `FromStr` and can fail here.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The role string is not one of `admin` / `customer`.
    #[error("unknown role: {0:?}")]
    UnknownRole(String),

    /// The id string is not a valid UUID.
    #[error("invalid user id {value:?}: {source}")]
    InvalidId {
        value: String,
        #[source]
        source: uuid::Error,
    },
}
