//! Error types for idlink.
//!
//! All errors are strongly typed using thiserror. Validation errors carry
//! the exact client-facing wording; storage errors propagate from the
//! contact store untranslated.

use thiserror::Error;

use crate::storage::StorageError;

/// Client-side request validation errors.
///
/// These surface at the caller boundary as 400-class failures and reuse
/// the wording the public API has always emitted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither identifying field was supplied (empty strings count as absent).
    #[error("Either email or phoneNumber must be provided")]
    MissingContactField,

    /// The request body was not a JSON object.
    #[error("Request body must be a JSON object")]
    BodyNotAnObject,

    /// The email field carried a non-string value.
    #[error("Email must be a string")]
    EmailNotAString,

    /// The phone field carried something other than a string or number.
    #[error("Phone number must be a string or number")]
    PhoneNotAStringOrNumber,

    /// The email string has no `@`.
    #[error("Invalid email format")]
    InvalidEmailFormat,
}

/// Top-level error type for identity resolution.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Request validation failed; reject without touching the store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A contact store operation failed. Not retried here; retry policy
    /// belongs to the caller.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A broken internal assumption (e.g. an empty gathered cluster).
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable description.
        message: String,
    },
}

impl IdentityError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for identity resolution operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_wording() {
        assert_eq!(
            ValidationError::MissingContactField.to_string(),
            "Either email or phoneNumber must be provided"
        );
        assert_eq!(
            ValidationError::EmailNotAString.to_string(),
            "Email must be a string"
        );
        assert_eq!(
            ValidationError::PhoneNotAStringOrNumber.to_string(),
            "Phone number must be a string or number"
        );
        assert_eq!(
            ValidationError::InvalidEmailFormat.to_string(),
            "Invalid email format"
        );
    }

    #[test]
    fn test_identity_error_from_validation() {
        let err: IdentityError = ValidationError::MissingContactField.into();
        assert!(err.is_validation());
        assert!(!err.is_storage());
    }

    #[test]
    fn test_identity_error_from_storage() {
        let err: IdentityError = StorageError::Backend("disk full".to_string()).into();
        assert!(err.is_storage());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_identity_error_internal() {
        let err = IdentityError::internal("gathered cluster was empty");
        assert!(err.is_internal());
        assert!(err.to_string().contains("gathered cluster was empty"));
    }
}
