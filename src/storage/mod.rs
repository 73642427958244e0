//! Durable session storage.
//!
//! The bill is mirrored into a small key-value store, one JSON value per
//! key. Empty collections are removed rather than stored, so a fresh session
//! can be told apart from one that once had zero items.

mod memory_store;
mod session;
mod sqlite_store;
pub mod wire;

pub use memory_store::MemoryStore;
pub use session::Session;
pub use sqlite_store::SqliteStore;

use crate::error::Result;

pub const ITEMS_KEY: &str = "items";
pub const PEOPLE_KEY: &str = "people";
pub const TAX_KEY: &str = "tax";
pub const HISTORY_KEY: &str = "previousSplit";
pub const SPLIT_TAX_KEY: &str = "splitTax";
pub const CUSTOM_SPLIT_KEY: &str = "customSplit";

/// A single write in an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvWrite {
    Set { key: String, value: String },
    Remove { key: String },
}

impl KvWrite {
    pub fn set(key: &str, value: String) -> Self {
        KvWrite::Set {
            key: key.to_string(),
            value,
        }
    }

    pub fn remove(key: &str) -> Self {
        KvWrite::Remove {
            key: key.to_string(),
        }
    }
}

/// Local durable key-value storage.
///
/// `apply` must be all-or-nothing: either every write in the batch lands or
/// none does.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn apply(&mut self, writes: &[KvWrite]) -> Result<()>;
}
