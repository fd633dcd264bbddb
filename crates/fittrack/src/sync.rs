//! [`SessionSync`]: the session synchronizer and its commands.

use std::sync::{Arc, Mutex, PoisonError};

use fittrack_auth::AuthBackend;
use fittrack_directory::{DirectoryError, UserDirectory};
use fittrack_model::{NewUserRecord, Role, UserPatch, UserRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::admin::AdminConsole;
use crate::reconcile::{self, PassSource, SyncCore};
use crate::{AuthState, SyncConfig, SyncError};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`SessionSync`].
///
/// # Example
///
/// ```rust
/// use fittrack::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sync = SessionSyncBuilder::new()
///     .config(SyncConfig::with_site_url("https://app.fittrack.com"))
///     .build(MemoryAuthBackend::new(), MemoryDirectory::spawn());
///
/// let state = sync.initialize().await;
/// assert!(state.is_ready);
/// assert!(state.current_user.is_none());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SessionSyncBuilder {
    config: SyncConfig,
}

impl SessionSyncBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Subscribes to the backend's session changes and starts the
    /// reconciliation worker. Must be called inside a Tokio runtime.
    ///
    /// The returned synchronizer is not ready until
    /// [`initialize`](SessionSync::initialize) (or the first change
    /// notification) has been reconciled.
    pub fn build<A: AuthBackend, D: UserDirectory>(self, auth: A, directory: D) -> SessionSync<A, D> {
        // Subscribe before the first query so no change slips between them.
        let changes = auth.subscribe();
        let (core, slot) = SyncCore::new(auth, directory, self.config);
        let core = Arc::new(core);

        let worker = tokio::spawn(reconcile::run_worker(Arc::clone(&core), slot));
        let listener = tokio::spawn(reconcile::run_listener(Arc::clone(&core), changes));

        tracing::debug!("session synchronizer started");
        SessionSync {
            core,
            tasks: Mutex::new(Some(Tasks { worker, listener })),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSync
// ---------------------------------------------------------------------------

struct Tasks {
    worker: JoinHandle<()>,
    listener: JoinHandle<()>,
}

/// Profile fields a signed-in user may change themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Keeps [`AuthState`] in line with the auth backend's session and the
/// user directory.
///
/// Reads ([`current_user`](Self::current_user), [`is_ready`](Self::is_ready),
/// [`subscribe`](Self::subscribe)) never block. Commands return `Result`
/// and update the state themselves on success; session-change
/// notifications are reconciled in the background.
///
/// Dropping the synchronizer tears it down (see [`shutdown`](Self::shutdown)).
pub struct SessionSync<A: AuthBackend, D: UserDirectory> {
    core: Arc<SyncCore<A, D>>,
    tasks: Mutex<Option<Tasks>>,
}

impl<A: AuthBackend, D: UserDirectory> SessionSync<A, D> {
    /// Builds with default config and waits for the initial reconciliation.
    pub async fn start(auth: A, directory: D) -> Self {
        let sync = SessionSyncBuilder::new().build(auth, directory);
        sync.initialize().await;
        sync
    }

    // --- Reads -------------------------------------------------------------

    pub fn current_user(&self) -> Option<UserRecord> {
        self.core.state.snapshot().current_user
    }

    pub fn is_ready(&self) -> bool {
        self.core.state.snapshot().is_ready
    }

    pub fn state(&self) -> AuthState {
        self.core.state.snapshot()
    }

    /// A receiver that sees every published [`AuthState`].
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.core.state.subscribe()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.core.config
    }

    pub fn auth(&self) -> &A {
        &self.core.auth
    }

    pub fn directory(&self) -> &D {
        &self.core.directory
    }

    // --- Lifecycle ---------------------------------------------------------

    /// Reconciles the backend's current session and waits until the result
    /// (or a newer one) is published. Always ends with `is_ready == true`
    /// unless the synchronizer was shut down meanwhile.
    pub async fn initialize(&self) -> AuthState {
        tracing::debug!("initializing auth state");
        self.refresh().await
    }

    /// Re-runs reconciliation from the backend's current session.
    pub async fn refresh(&self) -> AuthState {
        if !self.core.state.is_mounted() {
            return self.core.state.snapshot();
        }
        let generation = self.core.submit(PassSource::Query);
        self.core.state.settled(generation).await
    }

    /// Unsubscribes from session changes and stops background work.
    ///
    /// Runs once; later calls do nothing. State writes that complete after
    /// this point are dropped, and pending `initialize`/`refresh` calls
    /// return the last published state.
    pub fn shutdown(&self) {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(tasks) = tasks else {
            return;
        };
        self.core.state.unmount();
        tasks.listener.abort();
        tasks.worker.abort();
        tracing::debug!("session synchronizer shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        !self.core.state.is_mounted()
    }

    // --- Commands ----------------------------------------------------------

    /// Signs in with email and password.
    ///
    /// On success the current user is the subject's directory record,
    /// provisioned as a customer if it was missing.
    ///
    /// # Errors
    /// - [`SyncError::InvalidCredentials`] — rejected by the backend
    /// - [`SyncError::SuspendedAccount`] — the record is suspended; the
    ///   backend session is signed out again and no user is published
    /// - [`SyncError::Network`], [`SyncError::DirectoryRead`],
    ///   [`SyncError::DirectoryWrite`] — the record couldn't be resolved;
    ///   the backend session is signed out again
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserRecord, SyncError> {
        let generation = self.core.state.next_generation();
        let session = self
            .core
            .auth
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|e| tracing::debug!(error = %e, "sign-in rejected"))?;

        let record = match self.core.resolve_user(&session).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(subject = %session.subject, error = %e, "could not resolve user record; ending session");
                if let Err(err) = self.core.auth.sign_out().await {
                    tracing::error!(subject = %session.subject, error = %err, "could not end unresolved session");
                }
                self.core.state.publish(generation, None);
                return Err(e);
            }
        };

        if record.is_suspended {
            tracing::warn!(subject = %record.id, "suspended account attempted sign-in");
            if let Err(e) = self.core.auth.sign_out().await {
                tracing::error!(subject = %record.id, error = %e, "could not end suspended session");
            }
            self.core.state.publish(generation, None);
            return Err(SyncError::SuspendedAccount);
        }

        self.core.state.publish(generation, Some(record.clone()));
        tracing::info!(subject = %record.id, role = %record.role, "signed in");
        Ok(record)
    }

    /// Registers a new account with `role` and writes its directory record.
    ///
    /// Does not sign in; the current user is unchanged.
    ///
    /// # Errors
    /// - [`SyncError::Auth`] / [`SyncError::WeakPassword`] — the backend
    ///   refused the registration
    /// - [`SyncError::DirectoryWrite`] — the account exists but its record
    ///   couldn't be written. With `compensate_failed_sign_up` set the
    ///   account is deleted again.
    pub async fn sign_up(&self, email: &str, password: &str, role: Role) -> Result<UserRecord, SyncError> {
        self.core.register(email, password, role, None).await
    }

    /// Clears the current user, then ends the backend session.
    ///
    /// The local state is cleared before the backend is asked, and again
    /// once it answers, so a pass that was already running can't bring the
    /// user back. This holds even when the backend call fails.
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        let previous = self.core.state.snapshot().current_user;
        self.core.state.publish(self.core.state.next_generation(), None);

        let result = self.core.auth.sign_out().await;
        self.core.state.publish(self.core.state.next_generation(), None);

        result.map_err(|e| {
            tracing::warn!(error = %e, "backend sign-out failed; local session cleared");
            SyncError::from(e)
        })?;
        if let Some(user) = previous {
            tracing::info!(subject = %user.id, "signed out");
        }
        Ok(())
    }

    /// Asks the backend to email a reset link for `email`, landing on
    /// [`SyncConfig::reset_redirect_url`]. State is unchanged.
    pub async fn reset_password(&self, email: &str) -> Result<(), SyncError> {
        self.core
            .auth
            .reset_password_for_email(email, &self.core.config.reset_redirect_url)
            .await?;
        tracing::info!("password reset requested");
        Ok(())
    }

    /// Updates the signed-in user's own profile fields.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<UserRecord, SyncError> {
        let current = self.current_user().ok_or(SyncError::NotSignedIn)?;

        let patch = UserPatch {
            name: update.name,
            avatar_url: update.avatar_url,
            ..UserPatch::default()
        };
        if patch.is_empty() {
            return Ok(current);
        }
        let generation = self.core.state.next_generation();

        self.core
            .directory
            .update_by_id(current.id, patch)
            .await
            .map_err(SyncError::DirectoryWrite)?;
        let record = self
            .core
            .directory
            .select_by_id(current.id)
            .await
            .map_err(SyncError::read)?;

        self.core.state.publish(generation, Some(record.clone()));
        tracing::info!(subject = %record.id, "profile updated");
        Ok(record)
    }

    /// Changes the signed-in user's password after re-checking the current one.
    ///
    /// # Errors
    /// - [`SyncError::WeakPassword`] — `new_password` is too short
    /// - [`SyncError::InvalidCredentials`] — `current_password` is wrong
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), SyncError> {
        let min = self.core.config.min_password_len;
        if new_password.chars().count() < min {
            return Err(SyncError::WeakPassword { min });
        }
        let user = self.current_user().ok_or(SyncError::NotSignedIn)?;

        self.core
            .auth
            .sign_in_with_password(&user.email, current_password)
            .await?;
        self.core.auth.update_password(new_password).await?;

        tracing::info!(subject = %user.id, "password changed");
        Ok(())
    }

    /// Admin operations, available while the current user is an admin.
    pub fn admin(&self) -> Result<AdminConsole<'_, A, D>, SyncError> {
        let user = self.current_user().ok_or(SyncError::NotSignedIn)?;
        if !user.is_admin() {
            return Err(SyncError::Forbidden);
        }
        Ok(AdminConsole::new(&self.core, user))
    }
}

impl<A: AuthBackend, D: UserDirectory> Drop for SessionSync<A, D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

impl<A: AuthBackend, D: UserDirectory> SyncCore<A, D> {
    /// Creates a backend account and its directory record.
    pub(crate) async fn register(
        &self,
        email: &str,
        password: &str,
        role: Role,
        name: Option<String>,
    ) -> Result<UserRecord, SyncError> {
        let registration = self.auth.sign_up(email, password).await?;
        let subject = registration.subject;

        let mut record = NewUserRecord::new(subject, registration.email, role);
        record.name = name.clone();

        match self.directory.insert(record).await {
            Ok(record) => {
                tracing::info!(%subject, %role, "account registered");
                Ok(record)
            }
            Err(DirectoryError::DuplicateId(_)) => {
                // Reconciliation got there first with a customer record.
                let patch = UserPatch {
                    name,
                    role: Some(role),
                    ..UserPatch::default()
                };
                self.directory
                    .update_by_id(subject, patch)
                    .await
                    .map_err(SyncError::DirectoryWrite)?;
                self.directory
                    .select_by_id(subject)
                    .await
                    .map_err(SyncError::read)
            }
            Err(e) => {
                tracing::error!(%subject, error = %e, "could not write user record for new account");
                if self.config.compensate_failed_sign_up {
                    match self.auth.delete_account(subject).await {
                        Ok(()) => tracing::warn!(%subject, "rolled back account without user record"),
                        Err(err) => {
                            tracing::error!(%subject, error = %err, "account left without user record")
                        }
                    }
                }
                Err(SyncError::DirectoryWrite(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use fittrack_auth::MemoryAuthBackend;
    use fittrack_directory::MemoryDirectory;

    use super::*;

    #[tokio::test]
    async fn test_update_profile_signed_out_takes_no_generation() {
        let sync = SessionSync::start(MemoryAuthBackend::new(), MemoryDirectory::spawn()).await;
        let before = sync.core.state.next_generation();

        let result = sync.update_profile(ProfileUpdate::default()).await;

        assert_eq!(result, Err(SyncError::NotSignedIn));
        assert_eq!(sync.core.state.next_generation(), before + 1);
    }

    #[tokio::test]
    async fn test_update_profile_empty_takes_no_generation() {
        let sync = SessionSync::start(MemoryAuthBackend::new(), MemoryDirectory::spawn()).await;
        sync.sign_up("a@x.com", "pw123456", Role::Customer).await.unwrap();
        let user = sync.sign_in("a@x.com", "pw123456").await.unwrap();
        // Let the sign-in notification's pass run first.
        sync.refresh().await;
        let before = sync.core.state.next_generation();

        let result = sync.update_profile(ProfileUpdate::default()).await;

        assert_eq!(result, Ok(user));
        assert_eq!(sync.core.state.next_generation(), before + 1);
    }
}
