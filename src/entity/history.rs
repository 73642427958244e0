// src/entity/history.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Item, Person};

/// Maximum number of superseded bills kept around for restoring.
pub const HISTORY_CAPACITY: usize = 5;

/// Immutable snapshot of a bill taken when it was replaced or cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillHistoryEntry {
    pub people: Vec<Person>,
    pub items: Vec<Item>,
    pub tax: f64,
    pub created_at: DateTime<Utc>,
}

impl BillHistoryEntry {
    pub fn item_total(&self) -> f64 {
        self.items.iter().map(|i| i.price).sum()
    }

    pub fn final_total(&self) -> f64 {
        self.item_total() + self.tax
    }
}

/// Newest-first ring buffer of superseded bills.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillHistory {
    entries: Vec<BillHistoryEntry>,
}

impl BillHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from previously persisted entries, enforcing the same rules as
    /// [`BillHistory::push`].
    pub fn from_entries(entries: Vec<BillHistoryEntry>) -> Self {
        let mut entries: Vec<_> = entries
            .into_iter()
            .filter(|e| !e.items.is_empty())
            .collect();
        entries.truncate(HISTORY_CAPACITY);
        Self { entries }
    }

    /// Push a snapshot to the front. Snapshots without items are dropped and
    /// the oldest entry is evicted beyond capacity. Returns whether the
    /// snapshot was kept.
    pub fn push(&mut self, entry: BillHistoryEntry) -> bool {
        if entry.items.is_empty() {
            return false;
        }
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAPACITY);
        true
    }

    /// Remove and return the entry at `index`.
    pub fn take(&mut self, index: usize) -> Option<BillHistoryEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn entries(&self) -> &[BillHistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
