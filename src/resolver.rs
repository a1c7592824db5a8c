//! Identity resolution engine.
//!
//! The resolver consumes the contact store gateway and implements the
//! whole matching pipeline: match incoming facts against stored records,
//! select (or correctively promote) the cluster primary, gather the
//! cluster by walking the link graph, decide whether the fact carries new
//! information, and consolidate the result into a deterministic view.
//!
//! The resolver is stateless between calls; all state lives in the store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::contact::{ContactId, ContactRecord};
use crate::error::{IdentityError, IdentityResult};
use crate::request::IdentifyRequest;
use crate::storage::ContactStore;
use crate::view::ConsolidatedView;

/// Identity resolution engine over a pluggable contact store.
///
/// # Concurrency
///
/// Each `identify` call runs a read–write–re-read sequence with no store
/// transaction spanning it. The resolver therefore holds an internal gate
/// for the full call: two overlapping calls against the same cluster can
/// never both decide "new information" and write twice. The gate is the
/// critical-section contract; the store itself stays lock-agnostic.
pub struct IdentityResolver {
    store: Arc<dyn ContactStore>,
    write_gate: Mutex<()>,
}

impl IdentityResolver {
    /// Create a new resolver using the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            store,
            write_gate: Mutex::new(()),
        }
    }

    /// Resolve a contact fact to its consolidated identity cluster.
    ///
    /// Creates a new primary when nothing matches, and a new linked
    /// secondary when the fact adds an unseen email or phone to an
    /// existing cluster. Known facts perform no writes.
    ///
    /// # Errors
    ///
    /// [`IdentityError::Validation`] when both fields are absent;
    /// [`IdentityError::Storage`] propagated untranslated from the store.
    pub fn identify(&self, request: &IdentifyRequest) -> IdentityResult<ConsolidatedView> {
        request.validate()?;
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| IdentityError::internal("resolver write gate poisoned"))?;

        let matches = self.find_matching(request)?;
        if matches.is_empty() {
            let record = self
                .store
                .create_primary(request.email(), request.phone())?;
            tracing::debug!(id = %record.id, "created primary for unknown contact fact");
            return Ok(ConsolidatedView::singleton(&record));
        }

        let primary_id = self.select_primary(&matches)?;
        let mut cluster = self.gather_cluster(primary_id)?;

        if has_new_information(&cluster, request) {
            let secondary =
                self.store
                    .create_secondary(request.email(), request.phone(), primary_id)?;
            tracing::debug!(
                id = %secondary.id,
                primary = %primary_id,
                "fact carried new information; linked secondary"
            );
            cluster = self.gather_cluster(primary_id)?;
        }

        ConsolidatedView::from_cluster(&cluster)
            .ok_or_else(|| IdentityError::internal("gathered cluster was empty"))
    }

    /// Union of email and phone matches, deduplicated by id. Email
    /// matches come first; within each lookup the store's order holds.
    fn find_matching(&self, request: &IdentifyRequest) -> IdentityResult<Vec<ContactRecord>> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();

        if let Some(email) = request.email() {
            for record in self.store.find_by_email(email)? {
                if seen.insert(record.id) {
                    matches.push(record);
                }
            }
        }
        if let Some(phone) = request.phone() {
            for record in self.store.find_by_phone(phone)? {
                if seen.insert(record.id) {
                    matches.push(record);
                }
            }
        }

        Ok(matches)
    }

    /// The cluster primary: the oldest matched primary record, ties
    /// broken by smallest id.
    ///
    /// When every match is a secondary the cluster has lost its root
    /// (the primary was deleted out from under it). That state is
    /// repaired here by promoting the oldest match to a real primary
    /// before traversal begins.
    fn select_primary(&self, matches: &[ContactRecord]) -> IdentityResult<ContactId> {
        if let Some(primary) = matches
            .iter()
            .filter(|c| c.is_primary())
            .min_by_key(|c| (c.created_at, c.id))
        {
            return Ok(primary.id);
        }

        let oldest = matches
            .iter()
            .min_by_key(|c| (c.created_at, c.id))
            .ok_or_else(|| IdentityError::internal("primary selection over empty match set"))?;
        tracing::warn!(
            id = %oldest.id,
            "matched records have no reachable primary; promoting oldest"
        );
        self.store.promote_to_primary(oldest.id)?;
        Ok(oldest.id)
    }

    /// Gather every record reachable from `primary_id` through the link
    /// graph.
    ///
    /// Explicit worklist with a visited-set guard — no recursion, bounded
    /// depth, immune to cycles and revisits. Membership is what matters;
    /// the collected ids are materialized through `find_all_by_ids` so
    /// the returned cluster is ordered by `created_at`.
    fn gather_cluster(&self, primary_id: ContactId) -> IdentityResult<Vec<ContactRecord>> {
        let mut pending = vec![primary_id];
        let mut visited: HashSet<ContactId> = HashSet::new();
        let mut member_ids = Vec::new();

        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(record) = self.store.find_by_id(current)? else {
                continue;
            };
            member_ids.push(record.id);
            for child in self.store.find_by_linked_id(current)? {
                if !visited.contains(&child.id) {
                    pending.push(child.id);
                }
            }
        }

        Ok(self.store.find_all_by_ids(&member_ids)?)
    }
}

/// True when the incoming fact names an email or phone the cluster does
/// not already know.
fn has_new_information(cluster: &[ContactRecord], request: &IdentifyRequest) -> bool {
    let known_emails: HashSet<&str> = cluster.iter().filter_map(|c| c.email.as_deref()).collect();
    let known_phones: HashSet<&str> = cluster
        .iter()
        .filter_map(|c| c.phone_number.as_deref())
        .collect();

    if let Some(email) = request.email() {
        if !known_emails.contains(email) {
            return true;
        }
    }
    if let Some(phone) = request.phone() {
        if !known_phones.contains(phone) {
            return true;
        }
    }
    false
}
