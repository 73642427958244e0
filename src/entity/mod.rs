mod history;
mod item;
mod person;

pub use history::{BillHistory, BillHistoryEntry, HISTORY_CAPACITY};
pub use item::{Item, NewItem};
pub use person::{same_name, Person};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of an item, assigned when the item enters the bill.
///
/// Assignment and custom split data are keyed by this id, so deleting an
/// item never requires renumbering anything. Positional indices only exist
/// at the API and persistence boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Percentage share of one item per person name (0-100 each).
pub type CustomSplit = BTreeMap<String, f64>;
