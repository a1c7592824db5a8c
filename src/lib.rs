//! # idlink - customer identity resolution
//!
//! idlink consolidates overlapping contact facts (emails, phone numbers)
//! into identity clusters, so repeat interactions using
//! different-but-overlapping contact details resolve to the same
//! underlying person.
//!
//! ## Core Concepts
//!
//! - **Contact record**: the sole persisted entity — an email and/or
//!   phone with link metadata
//! - **Cluster**: the transitive set of records linked to one primary
//! - **Primary record**: the chronologically oldest, authoritative record
//!   of a cluster
//! - **Consolidated view**: the response combining a cluster's primary
//!   id, distinct emails/phones (primary first), and sorted secondary ids
//!
//! Matching is exact string equality; there is no fuzzy matching or
//! normalization.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use idlink::{IdentifyRequest, IdentityResolver, InMemoryContactStore};
//!
//! let store = Arc::new(InMemoryContactStore::new());
//! let resolver = IdentityResolver::new(store);
//!
//! let request = IdentifyRequest::new(Some("a@x.com".to_string()), None);
//! let view = resolver.identify(&request).unwrap();
//! assert_eq!(view.emails, vec!["a@x.com"]);
//! assert!(view.secondary_ids.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod contact;
pub mod error;
pub mod request;
pub mod resolver;
pub mod storage;
pub mod view;

#[cfg(feature = "transport-http")]
pub mod transport;

// Re-export primary types at crate root for convenience
pub use contact::{ContactId, ContactRecord, LinkPrecedence};
pub use error::{IdentityError, IdentityResult, ValidationError};
pub use request::IdentifyRequest;
pub use resolver::IdentityResolver;
#[cfg(feature = "persistent")]
pub use storage::SqliteContactStore;
pub use storage::{ContactStore, InMemoryContactStore, StorageError};
pub use view::ConsolidatedView;
