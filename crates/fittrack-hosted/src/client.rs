//! Shared HTTP plumbing: one `reqwest::Client`, the project URL, the
//! `apikey` header, and the session both backends authorize with.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use fittrack_model::Session;
use reqwest::{Method, RequestBuilder};

use crate::{HostedConfig, HostedError};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// SESSION SLOT
// =============================================================================

/// The active session, shared by [`HostedAuth`](crate::HostedAuth) (which
/// writes it) and [`HostedDirectory`](crate::HostedDirectory) (which sends
/// its access token). Never held across an `.await`.
#[derive(Clone, Default)]
pub(crate) struct SessionSlot(Arc<RwLock<Option<Session>>>);

impl SessionSlot {
    pub(crate) fn get(&self) -> Option<Session> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn set(&self, session: Option<Session>) -> Option<Session> {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, session)
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// A status code and body, read in full.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone)]
pub(crate) struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestClient {
    pub(crate) fn new(config: &HostedConfig) -> Result<Self, HostedError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| HostedError::ClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Starts a request with `apikey` set and `Authorization` carrying
    /// `bearer`, or the anon key when there is no user token.
    pub(crate) fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let token = bearer.unwrap_or(&self.anon_key);
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {token}"))
    }

    /// Like [`request`](Self::request) but authorized with a privileged key.
    pub(crate) fn privileged(&self, method: Method, path: &str, key: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
    }

    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<RawResponse, HostedError> {
        let response = request
            .send()
            .await
            .map_err(|e| HostedError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HostedError::Transport(e.to_string()))?;
        tracing::trace!(status, "hosted response");
        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use fittrack_model::UserId;

    use super::*;

    #[test]
    fn test_url_strips_trailing_slash_from_base() {
        let client = RestClient::new(&HostedConfig::new("https://abc.example.co/", "k")).unwrap();
        assert_eq!(client.url("/auth/v1/logout"), "https://abc.example.co/auth/v1/logout");
    }

    #[test]
    fn test_session_slot_set_returns_previous() {
        let slot = SessionSlot::default();
        let session = Session {
            subject: UserId::new_v4(),
            email: "a@x.com".into(),
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
        };
        assert!(slot.set(Some(session.clone())).is_none());
        assert_eq!(slot.access_token().as_deref(), Some("tok"));
        assert_eq!(slot.set(None), Some(session));
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse { status: 201, body: String::new() }.is_success());
        assert!(!RawResponse { status: 409, body: String::new() }.is_success());
    }
}
