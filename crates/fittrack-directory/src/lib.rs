//! User directory seam for FitTrack.
//!
//! The directory is the remote `users` table: one [`UserRecord`] per
//! account, holding role, suspension, and profile fields. It is reached
//! through request/response calls only.
//!
//! # Key types
//!
//! - [`UserDirectory`] — the trait the synchronizer and admin console use
//! - [`MemoryDirectory`] — spawns an in-process directory actor
//! - [`DirectoryHandle`] — cheap-to-clone handle to a running actor
//! - [`search_users`] — the admin screen's email/name filter
//!
//! [`UserRecord`]: fittrack_model::UserRecord

#![allow(async_fn_in_trait)]

mod directory;
mod error;
mod memory;
mod search;

pub use directory::UserDirectory;
pub use error::DirectoryError;
pub use memory::{DirectoryHandle, MemoryDirectory};
pub use search::search_users;
