//! The auth backend seam.
//!
//! FitTrack talks to its auth provider through the [`AuthBackend`] trait:
//! a handful of async request/response calls plus a broadcast feed of
//! [`SessionChange`] notifications. The synchronizer is written against
//! the trait, so the same code runs on:
//! - the hosted service (`fittrack-hosted`),
//! - the in-process [`MemoryAuthBackend`](crate::MemoryAuthBackend) used
//!   by tests and the demo.

use fittrack_model::{Session, SessionChange, UserId};
use tokio::sync::broadcast;

use crate::AuthError;

/// The result of a successful sign-up.
///
/// Sign-up creates the account but does not start a session; the caller
/// signs in separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The subject assigned to the new account.
    pub subject: UserId,
    pub email: String,
}

/// The operations FitTrack needs from its auth provider.
///
/// # Trait bounds
///
/// - `Send + Sync` → one backend is shared by the synchronizer's
///   background tasks and every caller.
/// - `'static` → it lives as long as the application.
///
/// Every method returns a `Send` future so callers can run them inside
/// `tokio::spawn`ed tasks.
///
/// # Example
///
/// ```rust
/// use fittrack_auth::{AuthBackend, MemoryAuthBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), fittrack_auth::AuthError> {
/// let auth = MemoryAuthBackend::new();
/// let reg = auth.sign_up("a@x.com", "pw123456").await?;
/// let session = auth.sign_in_with_password("a@x.com", "pw123456").await?;
/// assert_eq!(session.subject, reg.subject);
/// # Ok(())
/// # }
/// ```
pub trait AuthBackend: Send + Sync + 'static {
    /// Returns the current session, or `None` if nobody is signed in.
    fn get_session(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Session>, AuthError>> + Send;

    /// Checks credentials and starts a session.
    ///
    /// # Errors
    /// - [`AuthError::InvalidCredentials`] — unknown email or wrong password
    /// - [`AuthError::Network`] — backend unreachable
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Session, AuthError>> + Send;

    /// Creates an account. Does not start a session.
    ///
    /// # Errors
    /// - [`AuthError::AlreadyRegistered`] — the email is taken
    /// - [`AuthError::WeakPassword`] — the password is too short
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Registration, AuthError>> + Send;

    /// Ends the current session. Succeeds if there was none.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;

    /// Asks the backend to email a password-reset link that lands on
    /// `redirect_to`. Succeeds for unknown emails too.
    fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;

    /// Changes the password of the signed-in account.
    ///
    /// # Errors
    /// Returns [`AuthError::NotSignedIn`] without an active session.
    fn update_password(
        &self,
        new_password: &str,
    ) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;

    /// Deletes an account (admin operation). Ends its session if active.
    fn delete_account(
        &self,
        subject: UserId,
    ) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;

    /// Subscribes to session-change notifications.
    ///
    /// Each call returns an independent receiver. Dropping the receiver
    /// unsubscribes. A receiver that falls behind gets
    /// `RecvError::Lagged` and should re-query [`get_session`](Self::get_session).
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
}

/// Lets one backend be shared, e.g. kept by a caller after handing it to
/// the synchronizer.
impl<T: AuthBackend> AuthBackend for std::sync::Arc<T> {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        (**self).get_session().await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        (**self).sign_in_with_password(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Registration, AuthError> {
        (**self).sign_up(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        (**self).sign_out().await
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        (**self).reset_password_for_email(email, redirect_to).await
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        (**self).update_password(new_password).await
    }

    async fn delete_account(&self, subject: UserId) -> Result<(), AuthError> {
        (**self).delete_account(subject).await
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        (**self).subscribe()
    }
}
