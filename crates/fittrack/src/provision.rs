//! First-boot provisioning: make sure the directory exists and has an admin.

use fittrack_auth::AuthBackend;
use fittrack_directory::UserDirectory;
use fittrack_model::{NewUserRecord, Role, UserId};

use crate::{ProvisionConfig, SyncError};

/// What [`provision`] found or did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// An admin record already exists; nothing was created.
    AdminPresent,
    /// The default admin account was created.
    AdminCreated(UserId),
    /// Provisioning failed; the message is also logged.
    Failed(String),
}

/// Ensures the `users` table exists and creates the default admin if the
/// directory has none. Never fails: problems are logged and reported as
/// [`ProvisionOutcome::Failed`] so boot can continue.
pub async fn provision<A, D>(auth: &A, directory: &D, config: &ProvisionConfig) -> ProvisionOutcome
where
    A: AuthBackend,
    D: UserDirectory,
{
    tracing::info!("running directory provisioning");
    match try_provision(auth, directory, config).await {
        Ok(outcome) => {
            tracing::info!(?outcome, "directory provisioning complete");
            outcome
        }
        Err(e) => {
            tracing::error!(error = %e, "directory provisioning failed");
            ProvisionOutcome::Failed(e.to_string())
        }
    }
}

async fn try_provision<A, D>(auth: &A, directory: &D, config: &ProvisionConfig) -> Result<ProvisionOutcome, SyncError>
where
    A: AuthBackend,
    D: UserDirectory,
{
    directory.ensure_schema().await.map_err(SyncError::DirectoryWrite)?;

    if directory
        .exists_with_role(Role::Admin)
        .await
        .map_err(SyncError::read)?
    {
        return Ok(ProvisionOutcome::AdminPresent);
    }

    let registration = auth
        .sign_up(&config.admin_email, &config.admin_password)
        .await?;
    let record = NewUserRecord::new(registration.subject, registration.email, Role::Admin)
        .with_name(&config.admin_name);
    directory
        .insert(record)
        .await
        .map_err(SyncError::DirectoryWrite)?;

    tracing::info!(admin = %config.admin_email, "created default admin account");
    Ok(ProvisionOutcome::AdminCreated(registration.subject))
}
