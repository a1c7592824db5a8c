//! Abstract contact store trait.
//!
//! The trait defines the narrow CRUD contract the identity resolver
//! consumes. By using a trait, we enable:
//! - In-memory backends for testing and embedded use
//! - A SQLite backend for single-process durable deployments
//!
//! The gateway carries no business logic: matching, promotion, and
//! traversal decisions all live in the resolver.

use thiserror::Error;

use crate::contact::{ContactId, ContactRecord};

/// Errors that can occur during contact store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Contact not found.
    #[error("Contact not found: {0}")]
    ContactNotFound(ContactId),

    /// A relational constraint was violated.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Backend error (I/O, lock, row mapping).
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Storage trait for contact records.
///
/// Every read excludes soft-deleted records. Operations fail with
/// [`StorageError`] on I/O or constraint failure; the store performs no
/// retries — retry policy, if any, belongs to the caller.
pub trait ContactStore: Send + Sync {
    /// Find records whose email exactly equals `email`.
    fn find_by_email(&self, email: &str) -> Result<Vec<ContactRecord>, StorageError>;

    /// Find records whose phone number exactly equals `phone`.
    fn find_by_phone(&self, phone: &str) -> Result<Vec<ContactRecord>, StorageError>;

    /// Fetch a single record by id.
    fn find_by_id(&self, id: ContactId) -> Result<Option<ContactRecord>, StorageError>;

    /// Find the direct secondary children of `parent`.
    fn find_by_linked_id(&self, parent: ContactId) -> Result<Vec<ContactRecord>, StorageError>;

    /// Fetch the given records ordered by `created_at` ascending
    /// (smallest id first on ties). Unknown ids are skipped.
    fn find_all_by_ids(&self, ids: &[ContactId]) -> Result<Vec<ContactRecord>, StorageError>;

    /// Insert a new primary record with a fresh id.
    ///
    /// Fails with [`StorageError::ConstraintViolation`] when both contact
    /// fields are absent.
    fn create_primary(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<ContactRecord, StorageError>;

    /// Insert a new secondary record with a fresh id, linked to `parent`.
    fn create_secondary(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        parent: ContactId,
    ) -> Result<ContactRecord, StorageError>;

    /// Repoint a record's parent link and refresh `updated_at`. Link
    /// precedence is left untouched.
    fn update_linked_id(&self, id: ContactId, parent: ContactId) -> Result<(), StorageError>;

    /// Flip a record's precedence to primary, clear its parent link, and
    /// refresh `updated_at`. Used by the resolver's corrective path when a
    /// matched set of secondaries has no reachable primary.
    fn promote_to_primary(&self, id: ContactId) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: the gateway must stay object-safe.
    fn _assert_contact_store_object_safe(_: &dyn ContactStore) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::ContactNotFound(ContactId::from_i64(9));
        assert!(err.to_string().contains("Contact not found: 9"));

        let err = StorageError::Backend("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
