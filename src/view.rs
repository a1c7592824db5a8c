//! Consolidated identity view.
//!
//! The structured response for an identify call: the cluster's primary id,
//! the union of known emails and phone numbers, and the sorted secondary
//! ids. Ordering is deterministic — the primary's own values sort first,
//! everything else lexicographically.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::contact::{ContactId, ContactRecord};

/// The consolidated view of one identity cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedView {
    /// Id of the cluster's primary record.
    pub primary_id: ContactId,

    /// Distinct non-empty emails; the primary's email first, the rest
    /// lexicographic.
    pub emails: Vec<String>,

    /// Distinct non-empty phone numbers, same ordering rule.
    pub phone_numbers: Vec<String>,

    /// Ids of the cluster's secondary members, strictly ascending.
    pub secondary_ids: Vec<ContactId>,
}

impl ConsolidatedView {
    /// Builds the view for a freshly created primary with no secondaries.
    #[must_use]
    pub fn singleton(record: &ContactRecord) -> Self {
        Self {
            primary_id: record.id,
            emails: record.email.iter().cloned().collect(),
            phone_numbers: record.phone_number.iter().cloned().collect(),
            secondary_ids: Vec::new(),
        }
    }

    /// Consolidates a gathered cluster. Returns `None` for an empty
    /// cluster.
    ///
    /// The primary is the member flagged primary; if the cluster somehow
    /// carries none, the chronologically oldest member stands in so the
    /// view stays well-formed.
    #[must_use]
    pub fn from_cluster(cluster: &[ContactRecord]) -> Option<Self> {
        let primary = cluster
            .iter()
            .find(|c| c.is_primary())
            .or_else(|| cluster.iter().min_by_key(|c| (c.created_at, c.id)))?;

        let emails = ordered_values(
            cluster.iter().filter_map(|c| c.email.as_deref()),
            primary.email.as_deref(),
        );
        let phone_numbers = ordered_values(
            cluster.iter().filter_map(|c| c.phone_number.as_deref()),
            primary.phone_number.as_deref(),
        );

        let mut secondary_ids: Vec<ContactId> = cluster
            .iter()
            .filter(|c| !c.is_primary())
            .map(|c| c.id)
            .collect();
        secondary_ids.sort_unstable();

        Some(Self {
            primary_id: primary.id,
            emails,
            phone_numbers,
            secondary_ids,
        })
    }
}

/// Distinct non-empty values, `first` (the primary's own value) ahead of
/// the lexicographic rest.
fn ordered_values<'a>(
    values: impl Iterator<Item = &'a str>,
    first: Option<&str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<&str> = values
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .collect();
    out.sort_by(|a, b| {
        let a_first = Some(*a) == first;
        let b_first = Some(*b) == first;
        b_first.cmp(&a_first).then_with(|| a.cmp(b))
    });
    out.into_iter().map(str::to_string).collect()
}
