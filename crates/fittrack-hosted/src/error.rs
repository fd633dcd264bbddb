/// Errors raised by the hosted REST client itself.
///
/// Trait methods report [`AuthError`](fittrack_auth::AuthError) and
/// [`DirectoryError`](fittrack_directory::DirectoryError); this type covers
/// client construction and the HTTP round trip before a response is
/// classified.
#[derive(Debug, thiserror::Error)]
pub enum HostedError {
    /// The HTTP client couldn't be built (TLS backend, bad settings).
    #[error("could not build HTTP client: {0}")]
    ClientBuild(String),

    /// The request never got a response.
    #[error("request failed: {0}")]
    Transport(String),

    /// A response body didn't have the expected shape.
    #[error("unexpected response body: {0}")]
    Parse(String),
}

impl From<HostedError> for fittrack_auth::AuthError {
    fn from(err: HostedError) -> Self {
        fittrack_auth::AuthError::Network(err.to_string())
    }
}

impl From<HostedError> for fittrack_directory::DirectoryError {
    fn from(err: HostedError) -> Self {
        fittrack_directory::DirectoryError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use fittrack_auth::AuthError;
    use fittrack_directory::DirectoryError;

    use super::*;

    #[test]
    fn test_hosted_error_into_auth_error_is_network() {
        let err: AuthError = HostedError::Transport("dns failure".into()).into();
        assert!(matches!(err, AuthError::Network(msg) if msg.contains("dns failure")));
    }

    #[test]
    fn test_hosted_error_into_directory_error_is_transport() {
        let err: DirectoryError = HostedError::Parse("not json".into()).into();
        assert!(err.is_transport());
    }
}
