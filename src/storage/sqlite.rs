//! SQLite contact store.
//!
//! Single-process durable backend. The schema is the canonical `Contact`
//! table: auto-increment id, nullable contact fields, a self-referential
//! `linkedId` foreign key, and secondary indexes backing the gateway
//! lookups. Timestamps are stored as RFC 3339 text with microsecond
//! precision so lexicographic ordering equals chronological ordering.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::contact::{ContactId, ContactRecord, LinkPrecedence};
use crate::storage::traits::{ContactStore, StorageError};

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(err.to_string())
            }
            _ => Self::Backend(format!("sqlite: {err}")),
        }
    }
}

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                format!("bad timestamp '{raw}': {e}").into(),
            )
        })
}

const SELECT_COLUMNS: &str =
    "id, email, phoneNumber, linkedId, linkPrecedence, createdAt, updatedAt, deletedAt";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ContactRecord> {
    let precedence: String = row.get(4)?;
    let link_precedence = match precedence.as_str() {
        "primary" => LinkPrecedence::Primary,
        "secondary" => LinkPrecedence::Secondary,
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown linkPrecedence '{other}'").into(),
            ))
        }
    };

    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    let deleted_at: Option<String> = row.get(7)?;

    Ok(ContactRecord {
        id: ContactId::from_i64(row.get(0)?),
        email: row.get(1)?,
        phone_number: row.get(2)?,
        linked_id: row.get::<_, Option<i64>>(3)?.map(ContactId::from_i64),
        link_precedence,
        created_at: decode_ts(&created_at, 5)?,
        updated_at: decode_ts(&updated_at, 6)?,
        deleted_at: match deleted_at {
            Some(raw) => Some(decode_ts(&raw, 7)?),
            None => None,
        },
    })
}

/// SQLite-backed contact store.
pub struct SqliteContactStore {
    conn: Mutex<Connection>,
}

impl SqliteContactStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Soft-delete a record; the row stays but every read skips it.
    pub fn mark_deleted(&self, id: ContactId) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err("mark_deleted"))?;
        let changed = conn.execute(
            "UPDATE Contact SET deletedAt = ?1 WHERE id = ?2",
            params![encode_ts(Utc::now()), id.as_i64()],
        )?;
        if changed == 0 {
            return Err(StorageError::ContactNotFound(id));
        }
        Ok(())
    }
}

fn migrate(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS Contact (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          phoneNumber TEXT,
          email TEXT,
          linkedId INTEGER REFERENCES Contact(id),
          linkPrecedence TEXT NOT NULL CHECK(linkPrecedence IN ('primary', 'secondary')),
          createdAt TEXT NOT NULL,
          updatedAt TEXT NOT NULL,
          deletedAt TEXT,
          CHECK (email IS NOT NULL OR phoneNumber IS NOT NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_contact_email ON Contact(email);
        CREATE INDEX IF NOT EXISTS idx_contact_phone ON Contact(phoneNumber);
        CREATE INDEX IF NOT EXISTS idx_contact_linked_id ON Contact(linkedId);
        "#,
    )?;
    Ok(())
}

fn get_record(conn: &Connection, id: ContactId) -> Result<Option<ContactRecord>, StorageError> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM Contact WHERE id = ?1 AND deletedAt IS NULL"
            ),
            params![id.as_i64()],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

fn query_records<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<ContactRecord>, StorageError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, record_from_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

fn row_exists(conn: &Connection, id: ContactId) -> Result<bool, StorageError> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM Contact WHERE id = ?1)",
        params![id.as_i64()],
        |row| row.get(0),
    )?;
    Ok(exists != 0)
}

impl ContactStore for SqliteContactStore {
    fn find_by_email(&self, email: &str) -> Result<Vec<ContactRecord>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err("find_by_email"))?;
        query_records(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM Contact \
                 WHERE email = ?1 AND deletedAt IS NULL ORDER BY id ASC"
            ),
            params![email],
        )
    }

    fn find_by_phone(&self, phone: &str) -> Result<Vec<ContactRecord>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err("find_by_phone"))?;
        query_records(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM Contact \
                 WHERE phoneNumber = ?1 AND deletedAt IS NULL ORDER BY id ASC"
            ),
            params![phone],
        )
    }

    fn find_by_id(&self, id: ContactId) -> Result<Option<ContactRecord>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err("find_by_id"))?;
        get_record(&conn, id)
    }

    fn find_by_linked_id(&self, parent: ContactId) -> Result<Vec<ContactRecord>, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| lock_err("find_by_linked_id"))?;
        query_records(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM Contact \
                 WHERE linkedId = ?1 AND deletedAt IS NULL ORDER BY id ASC"
            ),
            params![parent.as_i64()],
        )
    }

    fn find_all_by_ids(&self, ids: &[ContactId]) -> Result<Vec<ContactRecord>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().map_err(|_| lock_err("find_all_by_ids"))?;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM Contact \
             WHERE id IN ({placeholders}) AND deletedAt IS NULL \
             ORDER BY createdAt ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(ids.iter().map(ContactId::as_i64)),
            record_from_row,
        )?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn create_primary(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<ContactRecord, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err("create_primary"))?;
        let now = encode_ts(Utc::now());
        conn.execute(
            "INSERT INTO Contact (email, phoneNumber, linkPrecedence, createdAt, updatedAt) \
             VALUES (?1, ?2, 'primary', ?3, ?3)",
            params![email, phone, now],
        )?;
        let id = ContactId::from_i64(conn.last_insert_rowid());
        get_record(&conn, id)?
            .ok_or_else(|| StorageError::Backend("row missing after insert".to_string()))
    }

    fn create_secondary(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        parent: ContactId,
    ) -> Result<ContactRecord, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err("create_secondary"))?;
        if !row_exists(&conn, parent)? {
            return Err(StorageError::ContactNotFound(parent));
        }
        let now = encode_ts(Utc::now());
        conn.execute(
            "INSERT INTO Contact \
             (email, phoneNumber, linkedId, linkPrecedence, createdAt, updatedAt) \
             VALUES (?1, ?2, ?3, 'secondary', ?4, ?4)",
            params![email, phone, parent.as_i64(), now],
        )?;
        let id = ContactId::from_i64(conn.last_insert_rowid());
        get_record(&conn, id)?
            .ok_or_else(|| StorageError::Backend("row missing after insert".to_string()))
    }

    fn update_linked_id(&self, id: ContactId, parent: ContactId) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err("update_linked_id"))?;
        if !row_exists(&conn, parent)? {
            return Err(StorageError::ContactNotFound(parent));
        }
        let changed = conn.execute(
            "UPDATE Contact SET linkedId = ?1, updatedAt = ?2 WHERE id = ?3",
            params![parent.as_i64(), encode_ts(Utc::now()), id.as_i64()],
        )?;
        if changed == 0 {
            return Err(StorageError::ContactNotFound(id));
        }
        Ok(())
    }

    fn promote_to_primary(&self, id: ContactId) -> Result<(), StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| lock_err("promote_to_primary"))?;
        let changed = conn.execute(
            "UPDATE Contact \
             SET linkPrecedence = 'primary', linkedId = NULL, updatedAt = ?1 \
             WHERE id = ?2",
            params![encode_ts(Utc::now()), id.as_i64()],
        )?;
        if changed == 0 {
            return Err(StorageError::ContactNotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_find_round_trip() {
        let store = SqliteContactStore::open_in_memory().unwrap();
        let created = store.create_primary(Some("a@x.com"), Some("111")).unwrap();

        let by_email = store.find_by_email("a@x.com").unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].id, created.id);
        assert_eq!(by_email[0].email.as_deref(), Some("a@x.com"));
        assert_eq!(by_email[0].created_at, created.created_at);
        assert!(by_email[0].is_primary());

        let by_phone = store.find_by_phone("111").unwrap();
        assert_eq!(by_phone.len(), 1);
        assert_eq!(by_phone[0].id, created.id);
    }

    #[test]
    fn test_schema_rejects_empty_contact() {
        let store = SqliteContactStore::open_in_memory().unwrap();
        let err = store.create_primary(None, None).unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
    }

    #[test]
    fn test_secondary_links_and_children_lookup() {
        let store = SqliteContactStore::open_in_memory().unwrap();
        let primary = store.create_primary(Some("a@x.com"), None).unwrap();
        let child = store
            .create_secondary(None, Some("222"), primary.id)
            .unwrap();

        assert_eq!(child.linked_id, Some(primary.id));
        assert!(!child.is_primary());

        let children = store.find_by_linked_id(primary.id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);
    }

    #[test]
    fn test_secondary_requires_existing_parent() {
        let store = SqliteContactStore::open_in_memory().unwrap();
        let err = store
            .create_secondary(Some("a@x.com"), None, ContactId::from_i64(40))
            .unwrap_err();
        assert!(matches!(err, StorageError::ContactNotFound(_)));
    }

    #[test]
    fn test_soft_delete_excluded_from_reads() {
        let store = SqliteContactStore::open_in_memory().unwrap();
        let record = store.create_primary(Some("a@x.com"), Some("111")).unwrap();
        store.mark_deleted(record.id).unwrap();

        assert!(store.find_by_id(record.id).unwrap().is_none());
        assert!(store.find_by_email("a@x.com").unwrap().is_empty());
        assert!(store.find_by_phone("111").unwrap().is_empty());
        assert!(store.find_all_by_ids(&[record.id]).unwrap().is_empty());
    }

    #[test]
    fn test_find_all_by_ids_ordering() {
        let store = SqliteContactStore::open_in_memory().unwrap();
        let a = store.create_primary(Some("a@x.com"), None).unwrap();
        let b = store.create_primary(Some("b@x.com"), None).unwrap();
        let c = store.create_primary(Some("c@x.com"), None).unwrap();

        let records = store.find_all_by_ids(&[c.id, b.id, a.id]).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_update_linked_id_keeps_precedence() {
        let store = SqliteContactStore::open_in_memory().unwrap();
        let a = store.create_primary(Some("a@x.com"), None).unwrap();
        let b = store.create_primary(Some("b@x.com"), None).unwrap();
        let child = store.create_secondary(None, Some("111"), a.id).unwrap();

        store.update_linked_id(child.id, b.id).unwrap();

        let moved = store.find_by_id(child.id).unwrap().unwrap();
        assert_eq!(moved.linked_id, Some(b.id));
        assert!(!moved.is_primary());
        assert!(moved.updated_at >= moved.created_at);
    }

    #[test]
    fn test_promote_to_primary() {
        let store = SqliteContactStore::open_in_memory().unwrap();
        let a = store.create_primary(Some("a@x.com"), None).unwrap();
        let child = store.create_secondary(None, Some("111"), a.id).unwrap();

        store.promote_to_primary(child.id).unwrap();

        let promoted = store.find_by_id(child.id).unwrap().unwrap();
        assert!(promoted.is_primary());
        assert!(promoted.linked_id.is_none());
    }

    #[test]
    fn test_reopen_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.db");

        let id = {
            let store = SqliteContactStore::open(&path).unwrap();
            store.create_primary(Some("a@x.com"), None).unwrap().id
        };

        let store = SqliteContactStore::open(&path).unwrap();
        let record = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(record.email.as_deref(), Some("a@x.com"));
    }
}
