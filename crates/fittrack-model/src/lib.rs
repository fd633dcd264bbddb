//! Shared data model for FitTrack.
//!
//! This crate defines the values that every other layer passes around:
//!
//! - **Identity** ([`UserId`], [`Role`]) — who an account is and what it may do.
//! - **Directory records** ([`UserRecord`], [`NewUserRecord`], [`UserPatch`]) —
//!   the application-level row kept for each account.
//! - **Sessions** ([`Session`], [`SessionChange`], [`ChangeKind`]) — what the
//!   auth backend hands out and the notifications it emits.
//! - **Errors** ([`ModelError`]) — parsing failures for the types above.
//!
//! # How it fits in the stack
//!
//! ```text
//! fittrack (SessionSync)   ← reconciles sessions with directory records
//!     ↕                ↕
//! fittrack-auth   fittrack-directory   ← backend seams
//!     ↕                ↕
//! fittrack-model (this crate)   ← plain data, no I/O
//! ```

mod error;
mod record;
mod session;
mod types;

pub use error::ModelError;
pub use record::{NewUserRecord, UserPatch, UserRecord};
pub use session::{ChangeKind, Session, SessionChange};
pub use types::{Role, UserId};
