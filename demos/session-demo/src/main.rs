//! Walks through the session lifecycle: provisioning, sign-up, sign-in,
//! suspension, and sign-out.
//!
//! Runs against the in-memory backends unless `FITTRACK_BACKEND_URL` is
//! set, in which case it talks to the hosted service.

use fittrack::prelude::*;
use fittrack_hosted::HostedConfig;

const CUSTOMER_EMAIL: &str = "demo.customer@fittrack.com";
const CUSTOMER_PASSWORD: &str = "demo-pass-123";

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

/// What the walkthrough observed, for the final summary and the tests.
#[derive(Debug, Default)]
struct Report {
    provision: Option<ProvisionOutcome>,
    customer_role: Option<Role>,
    suspended_sign_in: Option<SyncError>,
    signed_out_cleanly: bool,
}

async fn walkthrough<A, D>(auth: A, directory: D, admin: &ProvisionConfig) -> Result<Report, SyncError>
where
    A: AuthBackend,
    D: UserDirectory,
{
    let mut report = Report {
        provision: Some(provision(&auth, &directory, admin).await),
        ..Report::default()
    };

    let sync = SessionSyncBuilder::new()
        .config(SyncConfig::from_env())
        .build(auth, directory);
    let mut changes = sync.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().clone();
            let who = state.current_user.as_ref().map(|u| u.email.clone());
            tracing::info!(ready = state.is_ready, user = ?who, "auth state changed");
        }
    });

    let state = sync.initialize().await;
    tracing::info!(signed_in = state.is_signed_in(), "initialized");

    match sync.sign_up(CUSTOMER_EMAIL, CUSTOMER_PASSWORD, Role::Customer).await {
        Ok(user) => tracing::info!(subject = %user.id, "customer registered"),
        Err(SyncError::Auth(AuthError::AlreadyRegistered(_))) => {
            tracing::info!("customer already registered")
        }
        Err(e) => return Err(e),
    }

    let customer = sync.sign_in(CUSTOMER_EMAIL, CUSTOMER_PASSWORD).await?;
    report.customer_role = Some(customer.role);
    tracing::info!(
        gate = ?Access::evaluate(&sync.state(), Some(Role::Admin)),
        "customer on an admin route"
    );
    sync.sign_out().await?;

    sync.sign_in(&admin.admin_email, &admin.admin_password).await?;
    {
        let console = sync.admin()?;
        for user in console.list_users("").await? {
            tracing::info!(email = %user.email, role = %user.role, suspended = user.is_suspended, "user");
        }
        console.toggle_suspension(customer.id).await?;
    }
    sync.sign_out().await?;

    report.suspended_sign_in = sync.sign_in(CUSTOMER_EMAIL, CUSTOMER_PASSWORD).await.err();

    sync.sign_in(&admin.admin_email, &admin.admin_password).await?;
    sync.admin()?.toggle_suspension(customer.id).await?;
    sync.sign_out().await?;
    report.signed_out_cleanly = sync.current_user().is_none();

    sync.shutdown();
    Ok(report)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fittrack::init_tracing();
    let admin = ProvisionConfig::from_env();

    let report = if std::env::var_os("FITTRACK_BACKEND_URL").is_some() {
        let (auth, directory) = fittrack_hosted::connect(&HostedConfig::from_env())?;
        walkthrough(auth, directory, &admin).await?
    } else {
        tracing::info!("FITTRACK_BACKEND_URL not set; using in-memory backends");
        walkthrough(MemoryAuthBackend::new(), MemoryDirectory::spawn(), &admin).await?
    };

    tracing::info!(
        provision = ?report.provision,
        customer_role = ?report.customer_role,
        suspended_sign_in = ?report.suspended_sign_in,
        signed_out = report.signed_out_cleanly,
        "walkthrough finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_walkthrough_in_memory() {
        let report = walkthrough(
            MemoryAuthBackend::new(),
            MemoryDirectory::spawn(),
            &ProvisionConfig::default(),
        )
        .await
        .unwrap();

        assert!(matches!(report.provision, Some(ProvisionOutcome::AdminCreated(_))));
        assert_eq!(report.customer_role, Some(Role::Customer));
        assert_eq!(report.suspended_sign_in, Some(SyncError::SuspendedAccount));
        assert!(report.signed_out_cleanly);
    }
}
