//! Connection settings for the hosted service.

use serde::{Deserialize, Serialize};

/// Used when `FITTRACK_BACKEND_URL` is unset. Never reaches a real project.
pub const PLACEHOLDER_URL: &str = "https://placeholder-project.fittrack.invalid";
/// Used when `FITTRACK_ANON_KEY` is unset.
pub const PLACEHOLDER_ANON_KEY: &str = "placeholder-anon-key";

/// Where the hosted service lives and how to authenticate to it.
#[derive(Clone, Serialize, Deserialize)]
pub struct HostedConfig {
    /// Project URL, e.g. `https://abc.example.co`. No trailing slash needed.
    pub base_url: String,
    /// Public key sent as `apikey` on every request.
    pub anon_key: String,
    /// Privileged key for admin endpoints (account deletion).
    #[serde(default)]
    pub service_key: Option<String>,
}

impl HostedConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            service_key: None,
        }
    }

    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    /// Reads `FITTRACK_BACKEND_URL`, `FITTRACK_ANON_KEY` and
    /// `FITTRACK_SERVICE_KEY`.
    ///
    /// Missing URL or key are logged and replaced with placeholders so the
    /// application still boots; requests will then fail as network errors.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup("FITTRACK_BACKEND_URL").filter(|v| !v.is_empty());
        let anon_key = lookup("FITTRACK_ANON_KEY").filter(|v| !v.is_empty());

        if base_url.is_none() || anon_key.is_none() {
            tracing::error!(
                "missing hosted backend credentials; set FITTRACK_BACKEND_URL and FITTRACK_ANON_KEY"
            );
        }
        let base_url = base_url.unwrap_or_else(|| {
            tracing::warn!(url = PLACEHOLDER_URL, "using fallback backend URL");
            PLACEHOLDER_URL.to_string()
        });
        let anon_key = anon_key.unwrap_or_else(|| {
            tracing::warn!("using fallback anon key");
            PLACEHOLDER_ANON_KEY.to_string()
        });

        Self {
            base_url,
            anon_key,
            service_key: lookup("FITTRACK_SERVICE_KEY").filter(|v| !v.is_empty()),
        }
    }

    /// Returns `true` if this config still points at the placeholder project.
    pub fn is_placeholder(&self) -> bool {
        self.base_url == PLACEHOLDER_URL || self.anon_key == PLACEHOLDER_ANON_KEY
    }
}

impl std::fmt::Debug for HostedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &self.service_key.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}
