//! [`AuthBackend`] over the hosted auth REST endpoints.

use chrono::Utc;
use fittrack_auth::{AuthBackend, AuthError, Registration};
use fittrack_model::{ChangeKind, Session, SessionChange, UserId};
use reqwest::Method;
use serde_json::json;
use tokio::sync::broadcast;

use crate::client::{RestClient, SessionSlot};
use crate::wire::{self, AuthEndpoint, SignupResponse, TokenResponse};

const CHANGE_BUFFER: usize = 64;

/// The hosted auth service.
///
/// Keeps the active session in memory (shared with
/// [`HostedDirectory`](crate::HostedDirectory)) and broadcasts a
/// [`SessionChange`] whenever it changes.
pub struct HostedAuth {
    client: RestClient,
    session: SessionSlot,
    service_key: Option<String>,
    changes: broadcast::Sender<SessionChange>,
}

impl HostedAuth {
    pub(crate) fn new(client: RestClient, session: SessionSlot, service_key: Option<String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            client,
            session,
            service_key,
            changes,
        }
    }

    fn emit(&self, change: SessionChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    /// Exchanges the refresh token for a new session.
    async fn refresh(&self, expired: &Session) -> Result<Session, AuthError> {
        let Some(refresh_token) = expired.refresh_token.as_deref() else {
            return Err(AuthError::NotSignedIn);
        };
        let request = self
            .client
            .request(Method::POST, "/auth/v1/token?grant_type=refresh_token", None)
            .json(&json!({ "refresh_token": refresh_token }));
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(wire::classify_auth_error(
                AuthEndpoint::RefreshGrant,
                response.status,
                &response.body,
            ));
        }
        let token: TokenResponse = wire::parse_json(&response.body)?;
        Ok(token.into_session(Utc::now(), &expired.email))
    }
}

impl AuthBackend for HostedAuth {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.session.get() else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        match self.refresh(&session).await {
            Ok(fresh) => {
                tracing::debug!(subject = %fresh.subject, "session refreshed");
                self.session.set(Some(fresh.clone()));
                self.emit(SessionChange {
                    kind: ChangeKind::TokenRefreshed,
                    session: Some(fresh.clone()),
                });
                Ok(Some(fresh))
            }
            Err(AuthError::Network(e)) => Err(AuthError::Network(e)),
            Err(e) => {
                tracing::info!(subject = %session.subject, error = %e, "session expired");
                self.session.set(None);
                self.emit(SessionChange::signed_out());
                Ok(None)
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let request = self
            .client
            .request(Method::POST, "/auth/v1/token?grant_type=password", None)
            .json(&json!({ "email": email, "password": password }));
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(wire::classify_auth_error(
                AuthEndpoint::PasswordGrant,
                response.status,
                &response.body,
            ));
        }

        let token: TokenResponse = wire::parse_json(&response.body)?;
        let session = token.into_session(Utc::now(), email);
        self.session.set(Some(session.clone()));
        self.emit(SessionChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Registration, AuthError> {
        let request = self
            .client
            .request(Method::POST, "/auth/v1/signup", None)
            .json(&json!({ "email": email, "password": password }));
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(wire::classify_auth_error(
                AuthEndpoint::Signup { email },
                response.status,
                &response.body,
            ));
        }

        let user = wire::parse_json::<SignupResponse>(&response.body)?.user();
        Ok(Registration {
            subject: user.id,
            email: user.email.unwrap_or_else(|| email.to_string()),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.session.set(None) else {
            return Ok(());
        };
        self.emit(SessionChange::signed_out());

        // The local session is gone either way; a failed revoke only leaves
        // the token valid server-side until it expires.
        let request = self
            .client
            .request(Method::POST, "/auth/v1/logout", Some(session.access_token.as_str()));
        let response = self.client.execute(request).await?;
        if !response.is_success() && response.status != 401 {
            return Err(wire::classify_auth_error(
                AuthEndpoint::Logout,
                response.status,
                &response.body,
            ));
        }
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let request = self
            .client
            .request(Method::POST, "/auth/v1/recover", None)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(wire::classify_auth_error(
                AuthEndpoint::Recover,
                response.status,
                &response.body,
            ));
        }
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let session = self.session.get().ok_or(AuthError::NotSignedIn)?;
        let request = self
            .client
            .request(Method::PUT, "/auth/v1/user", Some(session.access_token.as_str()))
            .json(&json!({ "password": new_password }));
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(wire::classify_auth_error(
                AuthEndpoint::UpdateUser,
                response.status,
                &response.body,
            ));
        }
        self.emit(SessionChange::user_updated(session));
        Ok(())
    }

    async fn delete_account(&self, subject: UserId) -> Result<(), AuthError> {
        let Some(key) = self.service_key.as_deref() else {
            return Err(AuthError::Rejected(
                "deleting accounts requires FITTRACK_SERVICE_KEY".into(),
            ));
        };
        let path = format!("/auth/v1/admin/users/{subject}");
        let request = self.client.privileged(Method::DELETE, &path, key);
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(wire::classify_auth_error(
                AuthEndpoint::AdminDelete { subject },
                response.status,
                &response.body,
            ));
        }

        if self.session.get().is_some_and(|s| s.subject == subject) {
            self.session.set(None);
            self.emit(SessionChange::signed_out());
        }
        tracing::info!(%subject, "account deleted");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use crate::{HostedConfig, connect};

    use super::*;

    fn auth() -> HostedAuth {
        // Port 9 (discard) on localhost: nothing listens, every request fails fast.
        let config = HostedConfig::new("http://127.0.0.1:9", "anon");
        connect(&config).unwrap().0
    }

    #[tokio::test]
    async fn test_get_session_without_sign_in_is_none() {
        assert!(auth().get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_skips_request() {
        auth().sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_update_password_without_session_is_not_signed_in() {
        let err = auth().update_password("new-password").await.unwrap_err();
        assert_eq!(err, AuthError::NotSignedIn);
    }

    #[tokio::test]
    async fn test_delete_account_without_service_key_is_rejected() {
        let err = auth().delete_account(UserId::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_sign_in_unreachable_backend_is_network_error() {
        let err = auth()
            .sign_in_with_password("a@x.com", "pw123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Network(_)), "{err:?}");
    }
}
