//! Contact store gateway and its backends.
//!
//! The trait defines the abstract interface; backends are selected by
//! feature: the in-memory store is always available, the SQLite store is
//! behind the `persistent` feature.

mod memory;
#[cfg(feature = "persistent")]
mod sqlite;
mod traits;

pub use memory::InMemoryContactStore;
#[cfg(feature = "persistent")]
pub use sqlite::SqliteContactStore;
pub use traits::{ContactStore, StorageError};
