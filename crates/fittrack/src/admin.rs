//! User management for admins.

use fittrack_auth::{AuthBackend, AuthError};
use fittrack_directory::{UserDirectory, search_users};
use fittrack_model::{Role, UserId, UserPatch, UserRecord};
use serde::{Deserialize, Serialize};

use crate::SyncError;
use crate::reconcile::SyncCore;

/// An account an admin creates from the user-management screen.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Admin-only operations, borrowed from a [`SessionSync`](crate::SessionSync)
/// whose current user is an admin.
///
/// Obtained with [`SessionSync::admin`](crate::SessionSync::admin). Once the
/// admin signs out or loses the admin role, every operation fails with
/// [`SyncError::NotSignedIn`] or [`SyncError::Forbidden`].
pub struct AdminConsole<'a, A, D> {
    core: &'a SyncCore<A, D>,
    admin: UserRecord,
}

impl<'a, A: AuthBackend, D: UserDirectory> AdminConsole<'a, A, D> {
    pub(crate) fn new(core: &'a SyncCore<A, D>, admin: UserRecord) -> Self {
        Self { core, admin }
    }

    /// The admin acting through this console.
    pub fn admin(&self) -> &UserRecord {
        &self.admin
    }

    /// Checks that the console's admin is still the current user and still
    /// an admin. Every operation calls this first.
    fn authorize(&self) -> Result<(), SyncError> {
        let current = self
            .core
            .state
            .snapshot()
            .current_user
            .ok_or(SyncError::NotSignedIn)?;
        if current.id != self.admin.id || !current.is_admin() {
            tracing::warn!(admin = %self.admin.id, "admin console used without admin session");
            return Err(SyncError::Forbidden);
        }
        Ok(())
    }

    /// Every record, newest first, whose email or name contains `query`
    /// (case-insensitive). A blank query lists everyone.
    pub async fn list_users(&self, query: &str) -> Result<Vec<UserRecord>, SyncError> {
        self.authorize()?;
        let records = self.core.directory.list_all().await.map_err(SyncError::read)?;
        Ok(search_users(&records, query).into_iter().cloned().collect())
    }

    /// Creates a backend account and its record.
    pub async fn create_user(&self, account: NewAccount) -> Result<UserRecord, SyncError> {
        self.authorize()?;
        let record = self
            .core
            .register(&account.email, &account.password, account.role, account.name)
            .await?;
        tracing::info!(admin = %self.admin.id, subject = %record.id, "admin created user");
        Ok(record)
    }

    /// Applies `patch` to a record and returns the result.
    ///
    /// # Errors
    /// [`SyncError::Forbidden`] if the patch would suspend the acting admin.
    pub async fn edit_user(&self, id: UserId, patch: UserPatch) -> Result<UserRecord, SyncError> {
        self.authorize()?;
        if id == self.admin.id && patch.is_suspended == Some(true) {
            return Err(SyncError::Forbidden);
        }
        let generation = self.core.state.next_generation();

        self.core
            .directory
            .update_by_id(id, patch)
            .await
            .map_err(SyncError::DirectoryWrite)?;
        let record = self
            .core
            .directory
            .select_by_id(id)
            .await
            .map_err(SyncError::read)?;

        if id == self.admin.id {
            self.core.state.publish(generation, Some(record.clone()));
        }
        tracing::info!(admin = %self.admin.id, subject = %id, "admin edited user");
        Ok(record)
    }

    /// Flips a record's suspension and returns the result.
    pub async fn toggle_suspension(&self, id: UserId) -> Result<UserRecord, SyncError> {
        self.authorize()?;
        let record = self
            .core
            .directory
            .select_by_id(id)
            .await
            .map_err(SyncError::read)?;
        let suspend = !record.is_suspended;
        let updated = self
            .edit_user(id, UserPatch::default().with_suspended(suspend))
            .await?;
        tracing::info!(subject = %id, suspended = suspend, "suspension toggled");
        Ok(updated)
    }

    /// Deletes a backend account and its record.
    ///
    /// A record whose backend account is already gone is still deleted.
    pub async fn delete_user(&self, id: UserId) -> Result<(), SyncError> {
        self.authorize()?;
        if id == self.admin.id {
            return Err(SyncError::Forbidden);
        }

        match self.core.auth.delete_account(id).await {
            Ok(()) => {}
            Err(AuthError::UnknownAccount(_)) => {
                tracing::warn!(subject = %id, "record has no backend account");
            }
            Err(e) => return Err(e.into()),
        }

        // Hosted stores cascade the record with the account.
        match self.core.directory.delete_by_id(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(SyncError::DirectoryWrite(e)),
        }
        tracing::info!(admin = %self.admin.id, subject = %id, "admin deleted user");
        Ok(())
    }
}
