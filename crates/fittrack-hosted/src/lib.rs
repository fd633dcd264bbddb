//! Hosted backends for FitTrack.
//!
//! Implements both seams, [`AuthBackend`](fittrack_auth::AuthBackend) and
//! [`UserDirectory`](fittrack_directory::UserDirectory), over the hosted
//! service's REST API:
//!
//! - [`HostedAuth`] talks to `/auth/v1/*` and keeps the active session.
//! - [`HostedDirectory`] talks to `/rest/v1/users`, authorized with that
//!   session's access token.
//!
//! Both are created together by [`connect`] so they share the session.

mod auth;
mod client;
mod config;
mod directory;
mod error;
mod wire;

pub use auth::HostedAuth;
pub use config::HostedConfig;
pub use directory::HostedDirectory;
pub use error::HostedError;

use client::{RestClient, SessionSlot};

/// Builds the hosted auth backend and directory, sharing one session.
///
/// # Errors
/// Returns [`HostedError::ClientBuild`] if the HTTP client can't be built.
pub fn connect(config: &HostedConfig) -> Result<(HostedAuth, HostedDirectory), HostedError> {
    let client = RestClient::new(config)?;
    let slot = SessionSlot::default();
    tracing::info!(base_url = %config.base_url, "hosted backend configured");
    Ok((
        HostedAuth::new(client.clone(), slot.clone(), config.service_key.clone()),
        HostedDirectory::new(client, slot),
    ))
}
