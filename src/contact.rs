//! Contact record types and identity linkage.
//!
//! The contact record is the sole persisted entity. Records sharing an
//! email or phone number are linked into clusters: exactly one primary
//! record per cluster, with every other member pointing at it through
//! `linked_id`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned contact record identifier.
///
/// Ids are allocated monotonically by the contact store and never change.
/// Ordering follows allocation order, which makes the smallest id a
/// deterministic tiebreak when `created_at` values collide.
///
/// # Examples
///
/// ```
/// use idlink::ContactId;
///
/// let id = ContactId::from_i64(7);
/// assert_eq!(id.as_i64(), 7);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContactId(i64);

impl ContactId {
    /// Creates a contact id from a raw store key.
    #[must_use]
    pub const fn from_i64(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store key.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ContactId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ContactId> for i64 {
    fn from(id: ContactId) -> Self {
        id.0
    }
}

/// Position of a record within its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPrecedence {
    /// The authoritative, chronologically oldest record of a cluster.
    Primary,
    /// A cluster member linked to the primary via `linked_id`.
    Secondary,
}

impl LinkPrecedence {
    /// Returns the lowercase storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted contact record.
///
/// Every record carries at least one of `email` / `phone_number` (enforced
/// at creation by the store). Identity fields never change after creation;
/// only `linked_id`, `link_precedence` (corrective promotion) and the
/// bookkeeping timestamps may be rewritten.
///
/// Soft-deleted records keep their row but are excluded from every store
/// lookup and traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Store-assigned identifier, immutable.
    pub id: ContactId,

    /// Exact email string, if known.
    pub email: Option<String>,

    /// Exact phone number string, if known.
    pub phone_number: Option<String>,

    /// For secondaries, the id of the cluster's primary record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_id: Option<ContactId>,

    /// Primary or secondary.
    pub link_precedence: LinkPrecedence,

    /// Creation time, immutable; drives seniority comparisons.
    pub created_at: DateTime<Utc>,

    /// Refreshed whenever the record is relinked or promoted.
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker honored by all reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContactRecord {
    /// Creates a fresh primary record.
    #[must_use]
    pub fn new_primary(
        id: ContactId,
        email: Option<String>,
        phone_number: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            phone_number,
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    /// Creates a fresh secondary record linked to `parent`.
    #[must_use]
    pub fn new_secondary(
        id: ContactId,
        email: Option<String>,
        phone_number: Option<String>,
        parent: ContactId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            phone_number,
            linked_id: Some(parent),
            link_precedence: LinkPrecedence::Secondary,
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    /// Returns true if this record is its cluster's primary.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }

    /// Returns true if this record has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl PartialEq for ContactRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContactRecord {}

impl std::hash::Hash for ContactRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
