//! # FitTrack
//!
//! Session synchronization for the FitTrack app.
//!
//! The auth backend owns sessions; the user directory owns application
//! records (role, suspension, profile). [`SessionSync`] keeps the two in
//! line and publishes the result as [`AuthState`]: who the current user is
//! and whether the first reconciliation has finished.
//!
//! Around it:
//! - [`AdminConsole`] — user management for admins
//! - [`Access`] — route gating from an [`AuthState`]
//! - [`provision`] — first-boot schema check and default admin
//!
//! ## Quick Start
//!
//! ```rust
//! use fittrack::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), SyncError> {
//! let auth = MemoryAuthBackend::new();
//! let directory = MemoryDirectory::spawn();
//! provision(&auth, &directory, &ProvisionConfig::default()).await;
//!
//! let sync = SessionSync::start(auth, directory).await;
//! sync.sign_up("ravi@example.com", "s3cret-pass", Role::Customer).await?;
//! let user = sync.sign_in("ravi@example.com", "s3cret-pass").await?;
//! assert_eq!(user.role, Role::Customer);
//!
//! sync.sign_out().await?;
//! assert!(sync.current_user().is_none());
//! # Ok(())
//! # }
//! ```

mod access;
mod admin;
mod config;
mod error;
mod provision;
mod reconcile;
mod state;
mod sync;
mod telemetry;

pub use access::Access;
pub use admin::{AdminConsole, NewAccount};
pub use config::{DEFAULT_SITE_URL, ProvisionConfig, SyncConfig};
pub use error::SyncError;
pub use provision::{ProvisionOutcome, provision};
pub use state::AuthState;
pub use sync::{ProfileUpdate, SessionSync, SessionSyncBuilder};
pub use telemetry::init_tracing;

/// Convenient re-exports for common usage.
///
/// ```rust
/// use fittrack::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Access, AdminConsole, AuthState, NewAccount, ProfileUpdate, ProvisionConfig,
        ProvisionOutcome, SessionSync, SessionSyncBuilder, SyncConfig, SyncError, provision,
    };
    pub use fittrack_auth::{AuthBackend, AuthError, MemoryAuthBackend};
    pub use fittrack_directory::{DirectoryError, DirectoryHandle, MemoryDirectory, UserDirectory};
    pub use fittrack_model::{Role, Session, SessionChange, UserId, UserPatch, UserRecord};
}
