//! Auth backend seam for FitTrack.
//!
//! FitTrack doesn't check passwords itself. Credentials, sessions, and
//! password resets belong to a hosted auth service. This crate defines
//! what the rest of the application needs from that service:
//!
//! 1. **The seam** — the [`AuthBackend`] trait: session lookup, sign-in,
//!    sign-up, sign-out, password reset, and a change-notification feed.
//! 2. **An in-process backend** — [`MemoryAuthBackend`], used by tests and
//!    the demo, with fault injection (offline mode, latency).
//!
//! # How it fits in the stack
//!
//! ```text
//! fittrack (SessionSync)  ← calls the backend, listens to its changes
//!     ↕
//! Auth seam (this crate)  ← AuthBackend + implementations
//!     ↕
//! fittrack-model          ← Session, SessionChange, UserId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod memory;

pub use auth::{AuthBackend, Registration};
pub use error::AuthError;
pub use memory::{MemoryAuthBackend, ResetRequest, MIN_PASSWORD_LEN};
