//! Identify request payload.
//!
//! A partial contact fact: an email, a phone number, or both. Empty
//! strings count as absent, matching the public API's behavior.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A partial contact fact submitted for identity resolution.
///
/// # Examples
///
/// ```
/// use idlink::IdentifyRequest;
///
/// let request = IdentifyRequest::new(Some("a@x.com".to_string()), None);
/// assert!(request.validate().is_ok());
/// assert_eq!(request.email(), Some("a@x.com"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    /// Exact email string, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Exact phone number string, if supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl IdentifyRequest {
    /// Creates a request from optional raw fields.
    #[must_use]
    pub fn new(email: Option<String>, phone_number: Option<String>) -> Self {
        Self {
            email,
            phone_number,
        }
    }

    /// The submitted email, with empty strings treated as absent.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }

    /// The submitted phone number, with empty strings treated as absent.
    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        self.phone_number.as_deref().filter(|p| !p.is_empty())
    }

    /// Checks the resolver precondition: at least one identifying field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email().is_none() && self.phone().is_none() {
            return Err(ValidationError::MissingContactField);
        }
        Ok(())
    }
}
