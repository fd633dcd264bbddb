//! Wire types and response classification.
//!
//! Pure functions over status codes and bodies, so the mapping from HTTP
//! responses to [`AuthError`] / [`DirectoryError`] is testable without a
//! server.

use chrono::{DateTime, Duration, Utc};
use fittrack_auth::{AuthError, MIN_PASSWORD_LEN};
use fittrack_directory::DirectoryError;
use fittrack_model::{Session, UserId};
use serde::Deserialize;

use crate::HostedError;

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

// =============================================================================
// AUTH BODIES
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: WireUser,
}

impl TokenResponse {
    pub(crate) fn into_session(self, now: DateTime<Utc>, fallback_email: &str) -> Session {
        Session {
            subject: self.user.id,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }
}

/// `/signup` answers with a full token response when email confirmation is
/// off, and with the bare user when it is on.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SignupResponse {
    WithSession(TokenResponse),
    UserOnly(WireUser),
}

impl SignupResponse {
    pub(crate) fn user(self) -> WireUser {
        match self {
            Self::WithSession(token) => token.user,
            Self::UserOnly(user) => user,
        }
    }
}

/// The error body shapes the auth and REST endpoints use. Every field is
/// optional because each endpoint fills a different subset.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ErrorBody {
    pub(crate) fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    pub(crate) fn text(&self) -> String {
        self.msg
            .as_ref()
            .or(self.message.as_ref())
            .or(self.error_description.as_ref())
            .or(self.error.as_ref())
            .cloned()
            .unwrap_or_else(|| "unknown error".to_string())
    }

    fn code_str(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => self.error_code.clone(),
        }
    }

    fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.msg, &self.message, &self.error_description, &self.details, &self.error_code]
            .into_iter()
            .flatten()
            .any(|s| s.to_lowercase().contains(&needle))
    }
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, HostedError> {
    serde_json::from_str(body).map_err(|e| HostedError::Parse(e.to_string()))
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Which auth endpoint produced an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthEndpoint<'a> {
    PasswordGrant,
    RefreshGrant,
    Signup { email: &'a str },
    Logout,
    Recover,
    UpdateUser,
    AdminDelete { subject: UserId },
}

pub(crate) fn classify_auth_error(endpoint: AuthEndpoint<'_>, status: u16, body: &str) -> AuthError {
    let err = ErrorBody::parse(body);
    match (endpoint, status) {
        (AuthEndpoint::PasswordGrant | AuthEndpoint::RefreshGrant, 400 | 401) => {
            AuthError::InvalidCredentials
        }
        (AuthEndpoint::Signup { email }, 400 | 422) if err.mentions("already registered") => {
            AuthError::AlreadyRegistered(email.to_string())
        }
        (AuthEndpoint::Signup { .. } | AuthEndpoint::UpdateUser, 400 | 422)
            if err.mentions("weak_password") || err.mentions("password should be") =>
        {
            AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            }
        }
        (AuthEndpoint::Logout | AuthEndpoint::UpdateUser, 401 | 403) => AuthError::NotSignedIn,
        (AuthEndpoint::AdminDelete { subject }, 404) => AuthError::UnknownAccount(subject),
        (_, 500..) => AuthError::Network(format!("HTTP {status}: {}", err.text())),
        _ => AuthError::Rejected(format!("HTTP {status}: {}", err.text())),
    }
}

/// Maps a failed `/rest/v1/users` response. `id` and `email` are the
/// values the request tried to write, used to name a uniqueness conflict.
pub(crate) fn classify_rest_error(status: u16, body: &str, id: Option<UserId>, email: Option<&str>) -> DirectoryError {
    let err = ErrorBody::parse(body);
    let conflict = status == 409 || err.code_str().as_deref() == Some(UNIQUE_VIOLATION);
    if conflict {
        if err.mentions("email") {
            return DirectoryError::DuplicateEmail(email.unwrap_or_default().to_string());
        }
        if let Some(id) = id {
            return DirectoryError::DuplicateId(id);
        }
    }
    if status >= 500 {
        return DirectoryError::Network(format!("HTTP {status}: {}", err.text()));
    }
    DirectoryError::Rejected(format!("HTTP {status}: {}", err.text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBJECT: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    #[test]
    fn test_token_response_into_session_sets_expiry() {
        let body = format!(
            r#"{{"access_token":"at","refresh_token":"rt","expires_in":3600,
                "token_type":"bearer","user":{{"id":"{SUBJECT}","email":"a@x.com"}}}}"#
        );
        let now = Utc::now();
        let session = parse_json::<TokenResponse>(&body).unwrap().into_session(now, "ignored");
        assert_eq!(session.subject.to_string(), SUBJECT);
        assert_eq!(session.email, "a@x.com");
        assert_eq!(session.refresh_token.as_deref(), Some("rt"));
        assert_eq!(session.expires_at, Some(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_signup_response_accepts_bare_user() {
        let body = format!(r#"{{"id":"{SUBJECT}","email":"a@x.com","aud":"authenticated"}}"#);
        let user = parse_json::<SignupResponse>(&body).unwrap().user();
        assert_eq!(user.id.to_string(), SUBJECT);
    }

    #[test]
    fn test_signup_response_accepts_token_response() {
        let body = format!(
            r#"{{"access_token":"at","user":{{"id":"{SUBJECT}","email":"a@x.com"}}}}"#
        );
        let parsed = parse_json::<SignupResponse>(&body).unwrap();
        assert!(matches!(parsed, SignupResponse::WithSession(_)));
    }

    #[test]
    fn test_classify_password_grant_400_is_invalid_credentials() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        let err = classify_auth_error(AuthEndpoint::PasswordGrant, 400, body);
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[test]
    fn test_classify_signup_already_registered() {
        let body = r#"{"code":422,"msg":"User already registered"}"#;
        let err = classify_auth_error(AuthEndpoint::Signup { email: "a@x.com" }, 422, body);
        assert_eq!(err, AuthError::AlreadyRegistered("a@x.com".into()));
    }

    #[test]
    fn test_classify_signup_weak_password() {
        let body = r#"{"code":422,"error_code":"weak_password","msg":"Password should be at least 6 characters."}"#;
        let err = classify_auth_error(AuthEndpoint::Signup { email: "a@x.com" }, 422, body);
        assert!(matches!(err, AuthError::WeakPassword { .. }));
    }

    #[test]
    fn test_classify_server_error_is_network() {
        let err = classify_auth_error(AuthEndpoint::Recover, 503, "upstream down");
        assert!(matches!(err, AuthError::Network(_)));
    }

    #[test]
    fn test_classify_admin_delete_404_is_unknown_account() {
        let subject: UserId = SUBJECT.parse().unwrap();
        let err = classify_auth_error(AuthEndpoint::AdminDelete { subject }, 404, "{}");
        assert_eq!(err, AuthError::UnknownAccount(subject));
    }

    #[test]
    fn test_classify_rest_unique_violation_on_primary_key_is_duplicate_id() {
        let id: UserId = SUBJECT.parse().unwrap();
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"users_pkey\"","details":"Key (id)=(...) already exists."}"#;
        let err = classify_rest_error(409, body, Some(id), Some("a@x.com"));
        assert_eq!(err, DirectoryError::DuplicateId(id));
    }

    #[test]
    fn test_classify_rest_unique_violation_on_email_is_duplicate_email() {
        let id: UserId = SUBJECT.parse().unwrap();
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"users_email_key\""}"#;
        let err = classify_rest_error(409, body, Some(id), Some("a@x.com"));
        assert_eq!(err, DirectoryError::DuplicateEmail("a@x.com".into()));
    }

    #[test]
    fn test_classify_rest_forbidden_is_rejected() {
        let body = r#"{"code":"42501","message":"new row violates row-level security policy"}"#;
        let err = classify_rest_error(403, body, None, None);
        assert!(matches!(err, DirectoryError::Rejected(msg) if msg.contains("row-level security")));
    }

    #[test]
    fn test_error_body_text_tolerates_non_json() {
        assert_eq!(ErrorBody::parse("<html>").text(), "unknown error");
    }
}
