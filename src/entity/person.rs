// src/entity/person.rs
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ItemId;

/// A participant in the bill.
///
/// `paid_for` holds the items this person is one of the payers of. An item
/// missing from the set is the same as "not a payer".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub paid_for: BTreeSet<ItemId>,
}

impl Person {
    pub fn new(name: String) -> Self {
        Self {
            name,
            paid_for: BTreeSet::new(),
        }
    }

    pub fn pays_for(&self, item: &ItemId) -> bool {
        self.paid_for.contains(item)
    }

    /// Case-insensitive name match, the same rule used for uniqueness.
    pub fn is_named(&self, name: &str) -> bool {
        same_name(&self.name, name)
    }
}

/// Compare two person names the way the bill does: trimmed, case-insensitive.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
