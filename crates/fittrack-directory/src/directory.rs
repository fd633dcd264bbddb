//! The `UserDirectory` trait: how FitTrack reads and writes user records.

use fittrack_model::{NewUserRecord, Role, UserId, UserPatch, UserRecord};

use crate::DirectoryError;

/// Request/response access to the `users` table.
///
/// Implementations enforce the table's invariants: one record per `id`
/// ([`DirectoryError::DuplicateId`]) and unique, case-insensitive emails
/// ([`DirectoryError::DuplicateEmail`]).
pub trait UserDirectory: Send + Sync + 'static {
    /// Makes sure the `users` table exists. Idempotent.
    fn ensure_schema(&self) -> impl std::future::Future<Output = Result<(), DirectoryError>> + Send;

    /// Fetches one record.
    ///
    /// # Errors
    /// [`DirectoryError::NotFound`] if there is no record for `id`.
    fn select_by_id(
        &self,
        id: UserId,
    ) -> impl std::future::Future<Output = Result<UserRecord, DirectoryError>> + Send;

    /// Inserts a record and returns the stored row (with `created_at`).
    fn insert(
        &self,
        record: NewUserRecord,
    ) -> impl std::future::Future<Output = Result<UserRecord, DirectoryError>> + Send;

    /// Applies a partial update.
    ///
    /// # Errors
    /// [`DirectoryError::NotFound`] if there is no record for `id`.
    fn update_by_id(
        &self,
        id: UserId,
        patch: UserPatch,
    ) -> impl std::future::Future<Output = Result<(), DirectoryError>> + Send;

    /// Deletes a record.
    fn delete_by_id(
        &self,
        id: UserId,
    ) -> impl std::future::Future<Output = Result<(), DirectoryError>> + Send;

    /// Every record, newest (`created_at`) first.
    fn list_all(&self) -> impl std::future::Future<Output = Result<Vec<UserRecord>, DirectoryError>> + Send;

    /// Returns `true` if at least one record has `role`.
    fn exists_with_role(
        &self,
        role: Role,
    ) -> impl std::future::Future<Output = Result<bool, DirectoryError>> + Send;
}
