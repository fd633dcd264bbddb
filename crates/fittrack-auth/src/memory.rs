//! An in-process auth backend.
//!
//! [`MemoryAuthBackend`] keeps accounts and the single active session in
//! memory and emits the same [`SessionChange`] notifications the hosted
//! service does. Tests and the demo use it in place of the real service.
//!
//! # Fault injection
//!
//! - [`set_offline`](MemoryAuthBackend::set_offline) makes every call fail
//!   with [`AuthError::Network`].
//! - [`set_latency`](MemoryAuthBackend::set_latency) delays every call, so
//!   tests can observe state while a request is in flight.
//!
//! Passwords are held in plain text. This backend is for development and
//! tests only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use fittrack_model::{Session, SessionChange, UserId};
use rand::Rng;
use tokio::sync::{broadcast, Mutex};

use crate::{AuthBackend, AuthError, Registration};

/// Shortest password [`MemoryAuthBackend`] accepts (the hosted service's default).
pub const MIN_PASSWORD_LEN: usize = 6;

/// How many unread notifications a subscriber may fall behind by before
/// it sees `Lagged`.
const CHANGE_BUFFER: usize = 64;

/// A password-reset request recorded by [`MemoryAuthBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRequest {
    pub email: String,
    pub redirect_to: String,
}

struct Account {
    subject: UserId,
    email: String,
    password: String,
}

/// Everything behind the lock.
#[derive(Default)]
struct AuthStore {
    /// Keyed by normalized (trimmed, lowercase) email.
    accounts: HashMap<String, Account>,
    /// The one signed-in session, like a browser client holds.
    active: Option<Session>,
    resets: Vec<ResetRequest>,
}

/// In-process [`AuthBackend`].
pub struct MemoryAuthBackend {
    store: Mutex<AuthStore>,
    changes: broadcast::Sender<SessionChange>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryAuthBackend {
    /// Creates an empty backend: no accounts, nobody signed in.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            store: Mutex::new(AuthStore::default()),
            changes,
            offline: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// While `true`, every call fails with [`AuthError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delays every call by `latency` before it touches any state.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Emits a notification as if the backend produced it on its own
    /// (another tab signing out, a token refresh).
    pub fn notify(&self, change: SessionChange) {
        // `send` only fails when nobody is subscribed, which is fine.
        let _ = self.changes.send(change);
    }

    /// Returns the active session without the simulated round trip.
    pub async fn peek_session(&self) -> Option<Session> {
        self.store.lock().await.active.clone()
    }

    /// Returns `true` if an account exists for `email`.
    pub async fn has_account(&self, email: &str) -> bool {
        self.store.lock().await.accounts.contains_key(&normalize(email))
    }

    /// Number of accounts.
    pub async fn account_count(&self) -> usize {
        self.store.lock().await.accounts.len()
    }

    /// Password-reset requests received so far, oldest first.
    pub async fn reset_requests(&self) -> Vec<ResetRequest> {
        self.store.lock().await.resets.clone()
    }

    /// Number of live [`subscribe`](AuthBackend::subscribe) receivers.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Simulates the network: waits out the latency, then fails if offline.
    async fn round_trip(&self) -> Result<(), AuthError> {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::Network("auth backend is offline".into()));
        }
        Ok(())
    }
}

impl Default for MemoryAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthBackend for MemoryAuthBackend {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.round_trip().await?;
        Ok(self.store.lock().await.active.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.round_trip().await?;

        let session = {
            let mut store = self.store.lock().await;
            let account = store
                .accounts
                .get(&normalize(email))
                .filter(|a| a.password == password)
                .ok_or(AuthError::InvalidCredentials)?;

            let session = Session {
                subject: account.subject,
                email: account.email.clone(),
                access_token: generate_token(),
                refresh_token: Some(generate_token()),
                expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
            };
            store.active = Some(session.clone());
            session
        };

        tracing::info!(subject = %session.subject, "signed in");
        // Notify after the lock is released so a subscriber that calls
        // straight back into the backend can't deadlock on it.
        self.notify(SessionChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Registration, AuthError> {
        self.round_trip().await?;

        let key = normalize(email);
        if !key.contains('@') {
            return Err(AuthError::Rejected(format!("invalid email address: {email:?}")));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let mut store = self.store.lock().await;
        if store.accounts.contains_key(&key) {
            return Err(AuthError::AlreadyRegistered(email.to_string()));
        }

        let subject = UserId::new_v4();
        store.accounts.insert(
            key.clone(),
            Account {
                subject,
                email: key.clone(),
                password: password.to_string(),
            },
        );

        tracing::info!(%subject, "account registered");
        Ok(Registration {
            subject,
            email: key,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.round_trip().await?;

        let previous = self.store.lock().await.active.take();
        if let Some(session) = previous {
            tracing::info!(subject = %session.subject, "signed out");
            self.notify(SessionChange::signed_out());
        }
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        self.round_trip().await?;

        // Recorded whether or not the account exists; the caller can't tell.
        self.store.lock().await.resets.push(ResetRequest {
            email: normalize(email),
            redirect_to: redirect_to.to_string(),
        });
        tracing::debug!("password reset requested");
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        self.round_trip().await?;

        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let session = {
            let mut store = self.store.lock().await;
            let session = store.active.clone().ok_or(AuthError::NotSignedIn)?;
            let account = store
                .accounts
                .get_mut(&normalize(&session.email))
                .ok_or(AuthError::UnknownAccount(session.subject))?;
            account.password = new_password.to_string();
            session
        };

        tracing::info!(subject = %session.subject, "password updated");
        self.notify(SessionChange::user_updated(session));
        Ok(())
    }

    async fn delete_account(&self, subject: UserId) -> Result<(), AuthError> {
        self.round_trip().await?;

        let was_active = {
            let mut store = self.store.lock().await;
            let key = store
                .accounts
                .iter()
                .find(|(_, a)| a.subject == subject)
                .map(|(k, _)| k.clone())
                .ok_or(AuthError::UnknownAccount(subject))?;
            store.accounts.remove(&key);

            let was_active = store.active.as_ref().is_some_and(|s| s.subject == subject);
            if was_active {
                store.active = None;
            }
            was_active
        };

        tracing::info!(%subject, "account deleted");
        if was_active {
            self.notify(SessionChange::signed_out());
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `MemoryAuthBackend`.
    //!
    //! Naming convention: `test_{function}_{scenario}_{expected}`.

    use fittrack_model::ChangeKind;

    use super::*;

    async fn backend_with_account() -> (MemoryAuthBackend, UserId) {
        let auth = MemoryAuthBackend::new();
        let reg = auth.sign_up("a@x.com", "pw123456").await.expect("sign up");
        (auth, reg.subject)
    }

    // =====================================================================
    // sign_up()
    // =====================================================================

    #[tokio::test]
    async fn test_sign_up_new_email_registers_without_session() {
        let auth = MemoryAuthBackend::new();

        let reg = auth.sign_up("A@X.com", "pw123456").await.expect("should succeed");

        assert_eq!(reg.email, "a@x.com");
        assert!(auth.has_account("a@x.com").await);
        assert!(auth.get_session().await.unwrap().is_none(), "sign-up must not sign in");
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_email_returns_already_registered() {
        let (auth, _) = backend_with_account().await;

        let result = auth.sign_up(" a@x.com", "another-pw").await;

        assert!(matches!(result, Err(AuthError::AlreadyRegistered(_))));
        assert_eq!(auth.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_sign_up_short_password_returns_weak_password() {
        let auth = MemoryAuthBackend::new();

        let result = auth.sign_up("a@x.com", "123").await;

        assert_eq!(result, Err(AuthError::WeakPassword { min: MIN_PASSWORD_LEN }));
    }

    #[tokio::test]
    async fn test_sign_up_without_at_sign_is_rejected() {
        let auth = MemoryAuthBackend::new();

        let result = auth.sign_up("not-an-email", "pw123456").await;

        assert!(matches!(result, Err(AuthError::Rejected(_))));
    }

    // =====================================================================
    // sign_in_with_password()
    // =====================================================================

    #[tokio::test]
    async fn test_sign_in_valid_credentials_starts_session() {
        let (auth, subject) = backend_with_account().await;

        let session = auth.sign_in_with_password("a@x.com", "pw123456").await.unwrap();

        assert_eq!(session.subject, subject);
        assert_eq!(session.access_token.len(), 32);
        assert_eq!(auth.get_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password_returns_invalid_credentials() {
        let (auth, _) = backend_with_account().await;

        let result = auth.sign_in_with_password("a@x.com", "wrong").await;

        assert_eq!(result, Err(AuthError::InvalidCredentials));
        assert!(auth.peek_session().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_unknown_email_returns_invalid_credentials() {
        let auth = MemoryAuthBackend::new();

        let result = auth.sign_in_with_password("nobody@x.com", "pw123456").await;

        assert_eq!(result, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_in_emits_signed_in_change() {
        let (auth, subject) = backend_with_account().await;
        let mut changes = auth.subscribe();

        auth.sign_in_with_password("a@x.com", "pw123456").await.unwrap();

        let change = changes.recv().await.expect("should receive change");
        assert_eq!(change.kind, ChangeKind::SignedIn);
        assert_eq!(change.session.map(|s| s.subject), Some(subject));
    }

    #[tokio::test]
    async fn test_sign_in_twice_issues_fresh_tokens() {
        let (auth, _) = backend_with_account().await;

        let first = auth.sign_in_with_password("a@x.com", "pw123456").await.unwrap();
        let second = auth.sign_in_with_password("a@x.com", "pw123456").await.unwrap();

        assert_ne!(first.access_token, second.access_token);
    }

    // =====================================================================
    // sign_out()
    // =====================================================================

    #[tokio::test]
    async fn test_sign_out_clears_session_and_notifies() {
        let (auth, _) = backend_with_account().await;
        auth.sign_in_with_password("a@x.com", "pw123456").await.unwrap();
        let mut changes = auth.subscribe();

        auth.sign_out().await.expect("should succeed");

        assert!(auth.get_session().await.unwrap().is_none());
        let change = changes.recv().await.unwrap();
        assert_eq!(change, SessionChange::signed_out());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_silent() {
        let auth = MemoryAuthBackend::new();
        let mut changes = auth.subscribe();

        auth.sign_out().await.expect("should succeed");

        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    // =====================================================================
    // update_password() / reset_password_for_email()
    // =====================================================================

    #[tokio::test]
    async fn test_update_password_changes_credentials() {
        let (auth, _) = backend_with_account().await;
        auth.sign_in_with_password("a@x.com", "pw123456").await.unwrap();

        auth.update_password("new-password").await.expect("should succeed");

        assert_eq!(
            auth.sign_in_with_password("a@x.com", "pw123456").await,
            Err(AuthError::InvalidCredentials)
        );
        assert!(auth.sign_in_with_password("a@x.com", "new-password").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_password_without_session_returns_not_signed_in() {
        let (auth, _) = backend_with_account().await;

        let result = auth.update_password("new-password").await;

        assert_eq!(result, Err(AuthError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_reset_password_records_request_for_unknown_email() {
        let auth = MemoryAuthBackend::new();

        auth.reset_password_for_email("Ghost@x.com", "https://app/reset-password")
            .await
            .expect("should succeed");

        assert_eq!(
            auth.reset_requests().await,
            vec![ResetRequest {
                email: "ghost@x.com".into(),
                redirect_to: "https://app/reset-password".into(),
            }]
        );
    }

    // =====================================================================
    // delete_account()
    // =====================================================================

    #[tokio::test]
    async fn test_delete_account_ends_its_active_session() {
        let (auth, subject) = backend_with_account().await;
        auth.sign_in_with_password("a@x.com", "pw123456").await.unwrap();

        auth.delete_account(subject).await.expect("should succeed");

        assert!(!auth.has_account("a@x.com").await);
        assert!(auth.peek_session().await.is_none());
    }

    #[tokio::test]
    async fn test_delete_account_unknown_subject_returns_error() {
        let auth = MemoryAuthBackend::new();
        let ghost = UserId::new_v4();

        let result = auth.delete_account(ghost).await;

        assert_eq!(result, Err(AuthError::UnknownAccount(ghost)));
    }

    // =====================================================================
    // Fault injection
    // =====================================================================

    #[tokio::test]
    async fn test_offline_backend_returns_network_error() {
        let (auth, _) = backend_with_account().await;
        auth.set_offline(true);

        assert!(matches!(auth.get_session().await, Err(AuthError::Network(_))));
        assert!(matches!(
            auth.sign_in_with_password("a@x.com", "pw123456").await,
            Err(AuthError::Network(_))
        ));

        auth.set_offline(false);
        assert!(auth.get_session().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_the_call() {
        let auth = MemoryAuthBackend::new();
        auth.set_latency(Duration::from_millis(250));
        let start = tokio::time::Instant::now();

        auth.get_session().await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
