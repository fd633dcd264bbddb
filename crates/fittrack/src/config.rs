//! Configuration for the synchronizer and the provisioning collaborator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Used when `FITTRACK_SITE_URL` is unset.
pub const DEFAULT_SITE_URL: &str = "http://localhost:5173";

/// Settings for [`SessionSync`](crate::SessionSync).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Where password-reset emails land.
    pub reset_redirect_url: String,
    /// Minimum length accepted by `change_password`.
    pub min_password_len: usize,
    /// Delete the backend account when its directory record can't be
    /// written during sign-up.
    pub compensate_failed_sign_up: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::with_site_url(DEFAULT_SITE_URL)
    }
}

impl SyncConfig {
    /// Defaults, with the reset redirect derived from `site`.
    pub fn with_site_url(site: &str) -> Self {
        Self {
            reset_redirect_url: format!("{}/reset-password", site.trim_end_matches('/')),
            min_password_len: 8,
            compensate_failed_sign_up: true,
        }
    }

    /// Reads `FITTRACK_SITE_URL`; falls back to [`DEFAULT_SITE_URL`].
    pub fn from_env() -> Self {
        match std::env::var("FITTRACK_SITE_URL") {
            Ok(site) if !site.is_empty() => Self::with_site_url(&site),
            _ => {
                tracing::debug!(site = DEFAULT_SITE_URL, "FITTRACK_SITE_URL not set");
                Self::default()
            }
        }
    }
}

/// The admin account [`provision`](crate::provision) creates when the
/// directory has none.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub admin_email: String,
    pub admin_password: String,
    pub admin_name: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            admin_email: "admin@fittrack.com".into(),
            admin_password: "Admin123!".into(),
            admin_name: "System Admin".into(),
        }
    }
}

impl ProvisionConfig {
    /// Defaults, overridden by `FITTRACK_ADMIN_EMAIL` and
    /// `FITTRACK_ADMIN_PASSWORD` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(email) = std::env::var("FITTRACK_ADMIN_EMAIL") {
            config.admin_email = email;
        }
        if let Ok(password) = std::env::var("FITTRACK_ADMIN_PASSWORD") {
            config.admin_password = password;
        }
        config
    }
}

impl fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("admin_email", &self.admin_email)
            .field("admin_name", &self.admin_name)
            .finish_non_exhaustive()
    }
}
