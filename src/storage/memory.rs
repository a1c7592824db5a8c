//! In-memory contact store.
//!
//! Thread-safe in-memory implementation of the contact store trait. It is
//! intended for embedded usage, tests, and as a reference implementation.
//! Lookup keys are the raw submitted strings; matching is exact equality.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::Utc;

use crate::contact::{ContactId, ContactRecord, LinkPrecedence};
use crate::storage::traits::{ContactStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct ContactState {
    records: BTreeMap<i64, ContactRecord>,
    by_email: HashMap<String, BTreeSet<i64>>,
    by_phone: HashMap<String, BTreeSet<i64>>,
    by_linked: HashMap<i64, BTreeSet<i64>>,
    next_id: i64,
}

impl ContactState {
    fn allocate_id(&mut self) -> ContactId {
        self.next_id += 1;
        ContactId::from_i64(self.next_id)
    }

    fn insert_record(&mut self, record: ContactRecord) {
        let id = record.id.as_i64();
        if let Some(email) = record.email.as_ref() {
            self.by_email.entry(email.clone()).or_default().insert(id);
        }
        if let Some(phone) = record.phone_number.as_ref() {
            self.by_phone.entry(phone.clone()).or_default().insert(id);
        }
        if let Some(parent) = record.linked_id {
            self.by_linked
                .entry(parent.as_i64())
                .or_default()
                .insert(id);
        }
        self.records.insert(id, record);
    }

    fn unlink(&mut self, id: i64, parent: ContactId) {
        if let Some(children) = self.by_linked.get_mut(&parent.as_i64()) {
            children.remove(&id);
            if children.is_empty() {
                self.by_linked.remove(&parent.as_i64());
            }
        }
    }

    /// Soft-deleted rows stay in `records` but are invisible to reads.
    fn live(&self, id: i64) -> Option<&ContactRecord> {
        self.records.get(&id).filter(|r| !r.is_deleted())
    }

    fn collect_live(&self, ids: Option<&BTreeSet<i64>>) -> Vec<ContactRecord> {
        ids.map(|set| set.iter().filter_map(|id| self.live(*id)).cloned().collect())
            .unwrap_or_default()
    }
}

fn require_contact_field(
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<(), StorageError> {
    if email.is_none() && phone.is_none() {
        return Err(StorageError::ConstraintViolation(
            "contact record requires an email or a phone number".to_string(),
        ));
    }
    Ok(())
}

/// Thread-safe in-memory contact store.
#[derive(Debug, Default)]
pub struct InMemoryContactStore {
    state: RwLock<ContactState>,
}

impl InMemoryContactStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Soft-delete a record: the row stays but every subsequent read
    /// skips it.
    pub fn mark_deleted(&self, id: ContactId) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("mark_deleted"))?;
        let record = state
            .records
            .get_mut(&id.as_i64())
            .ok_or(StorageError::ContactNotFound(id))?;
        record.deleted_at = Some(Utc::now());
        Ok(())
    }

    /// Number of live (non-deleted) records. Test instrumentation for
    /// write-count assertions.
    pub fn record_count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record_count"))?;
        Ok(state.records.values().filter(|r| !r.is_deleted()).count())
    }
}

impl ContactStore for InMemoryContactStore {
    fn find_by_email(&self, email: &str) -> Result<Vec<ContactRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("find_by_email"))?;
        Ok(state.collect_live(state.by_email.get(email)))
    }

    fn find_by_phone(&self, phone: &str) -> Result<Vec<ContactRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("find_by_phone"))?;
        Ok(state.collect_live(state.by_phone.get(phone)))
    }

    fn find_by_id(&self, id: ContactId) -> Result<Option<ContactRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("find_by_id"))?;
        Ok(state.live(id.as_i64()).cloned())
    }

    fn find_by_linked_id(&self, parent: ContactId) -> Result<Vec<ContactRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("find_by_linked_id"))?;
        Ok(state.collect_live(state.by_linked.get(&parent.as_i64())))
    }

    fn find_all_by_ids(&self, ids: &[ContactId]) -> Result<Vec<ContactRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("find_all_by_ids"))?;
        let unique: BTreeSet<i64> = ids.iter().map(ContactId::as_i64).collect();
        let mut records: Vec<ContactRecord> = unique
            .iter()
            .filter_map(|id| state.live(*id))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }

    fn create_primary(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<ContactRecord, StorageError> {
        require_contact_field(email, phone)?;
        let mut state = self.state.write().map_err(|_| lock_err("create_primary"))?;
        let id = state.allocate_id();
        let record = ContactRecord::new_primary(
            id,
            email.map(str::to_string),
            phone.map(str::to_string),
            Utc::now(),
        );
        state.insert_record(record.clone());
        Ok(record)
    }

    fn create_secondary(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        parent: ContactId,
    ) -> Result<ContactRecord, StorageError> {
        require_contact_field(email, phone)?;
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("create_secondary"))?;
        if !state.records.contains_key(&parent.as_i64()) {
            return Err(StorageError::ContactNotFound(parent));
        }
        let id = state.allocate_id();
        let record = ContactRecord::new_secondary(
            id,
            email.map(str::to_string),
            phone.map(str::to_string),
            parent,
            Utc::now(),
        );
        state.insert_record(record.clone());
        Ok(record)
    }

    fn update_linked_id(&self, id: ContactId, parent: ContactId) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("update_linked_id"))?;
        if !state.records.contains_key(&parent.as_i64()) {
            return Err(StorageError::ContactNotFound(parent));
        }
        let previous = {
            let record = state
                .records
                .get_mut(&id.as_i64())
                .ok_or(StorageError::ContactNotFound(id))?;
            let previous = record.linked_id;
            record.linked_id = Some(parent);
            record.updated_at = Utc::now();
            previous
        };
        if let Some(old_parent) = previous {
            state.unlink(id.as_i64(), old_parent);
        }
        state
            .by_linked
            .entry(parent.as_i64())
            .or_default()
            .insert(id.as_i64());
        Ok(())
    }

    fn promote_to_primary(&self, id: ContactId) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("promote_to_primary"))?;
        let previous = {
            let record = state
                .records
                .get_mut(&id.as_i64())
                .ok_or(StorageError::ContactNotFound(id))?;
            let previous = record.linked_id;
            record.linked_id = None;
            record.link_precedence = LinkPrecedence::Primary;
            record.updated_at = Utc::now();
            previous
        };
        if let Some(old_parent) = previous {
            state.unlink(id.as_i64(), old_parent);
        }
        Ok(())
    }
}
