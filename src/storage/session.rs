use std::collections::BTreeMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::wire::{self, StoredHistoryEntry, StoredItem, StoredPerson};
use super::{
    KeyValueStore, KvWrite, CUSTOM_SPLIT_KEY, HISTORY_KEY, ITEMS_KEY, PEOPLE_KEY, SPLIT_TAX_KEY,
    TAX_KEY,
};
use crate::bill::{compute_split, summarize, Bill, PersonShare, SplitSummary};
use crate::entity::{BillHistory, BillHistoryEntry, CustomSplit, Item, NewItem, Person};
use crate::error::{BillsplitError, Result};

/// The live bill, its history, and the store they are mirrored into.
///
/// Every mutating method applies the change in memory, then writes the
/// affected keys in one batch. If the write fails the in-memory state is
/// rolled back, so callers never observe a change that was not persisted.
pub struct Session<S: KeyValueStore> {
    bill: Bill,
    history: BillHistory,
    store: S,
}

impl<S: KeyValueStore> Session<S> {
    /// Load a session from `store`.
    ///
    /// Each key is read independently. A missing key leaves its field at the
    /// default; an unreadable one is logged and treated as missing.
    pub fn open(store: S) -> Result<Self> {
        let stored_items: Vec<StoredItem> = load_json(&store, ITEMS_KEY)?.unwrap_or_default();
        let items = match wire::items_from_wire(stored_items) {
            Ok(items) => items,
            Err(e) => {
                warn!("Ignoring stored items: {}", e);
                Vec::new()
            }
        };

        let stored_people: Vec<StoredPerson> = load_json(&store, PEOPLE_KEY)?.unwrap_or_default();
        let people = wire::people_from_wire(&items, stored_people);

        let tax = store
            .get(TAX_KEY)?
            .map(|raw| crate::bill::parse_tax(&raw))
            .unwrap_or(0.0);

        let split_tax = store
            .get(SPLIT_TAX_KEY)?
            .map(|raw| raw.trim() == "true")
            .unwrap_or(false);

        let stored_splits: BTreeMap<usize, CustomSplit> =
            load_json(&store, CUSTOM_SPLIT_KEY)?.unwrap_or_default();
        let custom_splits = wire::custom_splits_from_wire(&items, stored_splits);

        let stored_history: Vec<StoredHistoryEntry> =
            load_json(&store, HISTORY_KEY)?.unwrap_or_default();
        let history = BillHistory::from_entries(
            stored_history
                .into_iter()
                .filter_map(|entry| match wire::history_entry_from_wire(entry) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Skipping unreadable history entry: {}", e);
                        None
                    }
                })
                .collect(),
        );

        let bill = Bill::from_parts(items, people, tax, split_tax, custom_splits);
        debug!(
            "Opened session: {} items, {} people, {} history entries",
            bill.items().len(),
            bill.people().len(),
            history.len()
        );

        Ok(Self {
            bill,
            history,
            store,
        })
    }

    pub fn bill(&self) -> &Bill {
        &self.bill
    }

    pub fn history(&self) -> &BillHistory {
        &self.history
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn split(&self) -> Vec<PersonShare> {
        compute_split(&self.bill)
    }

    pub fn summary(&self) -> SplitSummary {
        summarize(&self.bill)
    }

    pub fn add_person(&mut self, name: &str) -> Result<Person> {
        self.transact(|bill, _| bill.add_person(name).cloned())
    }

    pub fn delete_person(&mut self, name: &str) -> Result<Person> {
        self.transact(|bill, _| bill.delete_person(name))
    }

    /// Add an item and return its index.
    pub fn add_item(&mut self, name: &str, price: f64) -> Result<usize> {
        self.transact(|bill, _| {
            bill.add_item(name, price)?;
            Ok(bill.items().len() - 1)
        })
    }

    pub fn edit_item(&mut self, index: usize, name: &str, price: f64) -> Result<Item> {
        self.transact(|bill, _| bill.edit_item(index, name, price).cloned())
    }

    pub fn delete_item(&mut self, index: usize) -> Result<Item> {
        self.transact(|bill, _| bill.delete_item(index))
    }

    /// Toggle an assignment. Unknown people or indices are a no-op and
    /// return `Ok(None)`.
    pub fn toggle_payment(&mut self, index: usize, person: &str) -> Result<Option<bool>> {
        let known = self.bill.items().get(index).is_some() && self.bill.person(person).is_some();
        if !known {
            debug!("Ignoring toggle of item {} for {:?}", index, person);
            return Ok(None);
        }
        self.transact(|bill, _| Ok(bill.toggle_payment(index, person)))
    }

    pub fn set_tax(&mut self, value: f64) -> Result<f64> {
        self.transact(|bill, _| Ok(bill.set_tax(value)))
    }

    pub fn set_split_tax(&mut self, enabled: bool) -> Result<()> {
        self.transact(|bill, _| {
            bill.set_split_tax(enabled);
            Ok(())
        })
    }

    pub fn set_custom_split(&mut self, index: usize, mapping: &CustomSplit) -> Result<()> {
        self.transact(|bill, _| bill.set_custom_split(index, mapping))
    }

    pub fn clear_custom_split(&mut self, index: usize) -> Result<bool> {
        self.transact(|bill, _| bill.clear_custom_split(index))
    }

    /// Replace the bill with new items, archiving the outgoing one.
    pub fn replace_all(&mut self, items: Vec<NewItem>, tax: f64, total: f64) -> Result<()> {
        self.transact(|bill, history| {
            let previous = bill.replace_all(items, tax, total)?;
            archive(history, &previous);
            Ok(())
        })
    }

    /// Empty the bill, archiving the outgoing one.
    pub fn clear_to_empty(&mut self) -> Result<()> {
        self.transact(|bill, history| {
            let previous = bill.clear_to_empty();
            archive(history, &previous);
            Ok(())
        })
    }

    /// Push the current bill to the front of the history without changing
    /// it. Bills without items are not archived; returns whether it was.
    pub fn archive_current_bill(&mut self) -> Result<bool> {
        self.transact(|bill, history| Ok(archive(history, bill)))
    }

    /// Pop a history entry and make it the current bill.
    ///
    /// Restoring is one-shot: the entry leaves the history. The outgoing
    /// bill is not archived.
    pub fn restore_from_history(&mut self, index: usize) -> Result<()> {
        self.transact(|bill, history| {
            let len = history.len();
            let entry = history
                .take(index)
                .ok_or(BillsplitError::HistoryEntryNotFound { index, len })?;
            info!(
                "Restoring bill from {} ({} items)",
                entry.created_at.to_rfc3339(),
                entry.items.len()
            );
            bill.restore(entry);
            Ok(())
        })
    }

    /// Delete a history entry without restoring it.
    pub fn discard_history_entry(&mut self, index: usize) -> Result<BillHistoryEntry> {
        self.transact(|_, history| {
            let len = history.len();
            history
                .take(index)
                .ok_or(BillsplitError::HistoryEntryNotFound { index, len })
        })
    }

    fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Bill, &mut BillHistory) -> Result<T>,
    ) -> Result<T> {
        let saved_bill = self.bill.clone();
        let saved_history = self.history.clone();

        let out = op(&mut self.bill, &mut self.history)?;

        let history_changed = self.history != saved_history;
        if let Err(e) = self.persist(history_changed) {
            warn!("Failed to persist session, rolling back: {}", e);
            self.bill = saved_bill;
            self.history = saved_history;
            return Err(e);
        }
        Ok(out)
    }

    fn persist(&mut self, include_history: bool) -> Result<()> {
        let mut writes = bill_writes(&self.bill)?;
        if include_history {
            writes.push(history_write(&self.history)?);
        }
        self.store.apply(&writes)
    }
}

fn archive(history: &mut BillHistory, bill: &Bill) -> bool {
    let kept = history.push(bill.snapshot(Utc::now()));
    if kept {
        info!("Archived bill with {} items", bill.items().len());
    }
    kept
}

fn load_json<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring unreadable '{}' entry: {}", key, e);
            Ok(None)
        }
    }
}

fn collection_write<T: Serialize>(key: &str, values: &[T]) -> Result<KvWrite> {
    if values.is_empty() {
        Ok(KvWrite::remove(key))
    } else {
        Ok(KvWrite::set(key, serde_json::to_string(values)?))
    }
}

fn bill_writes(bill: &Bill) -> Result<Vec<KvWrite>> {
    let custom_splits = wire::custom_splits_to_wire(bill);
    Ok(vec![
        collection_write(ITEMS_KEY, &wire::items_to_wire(bill.items()))?,
        collection_write(
            PEOPLE_KEY,
            &wire::people_to_wire(bill.items(), bill.people()),
        )?,
        KvWrite::set(TAX_KEY, wire::format_tax(bill.tax())),
        if bill.split_tax() {
            KvWrite::set(SPLIT_TAX_KEY, "true".to_string())
        } else {
            KvWrite::remove(SPLIT_TAX_KEY)
        },
        if custom_splits.is_empty() {
            KvWrite::remove(CUSTOM_SPLIT_KEY)
        } else {
            KvWrite::set(CUSTOM_SPLIT_KEY, serde_json::to_string(&custom_splits)?)
        },
    ])
}

fn history_write(history: &BillHistory) -> Result<KvWrite> {
    let entries: Vec<StoredHistoryEntry> = history
        .entries()
        .iter()
        .map(wire::history_entry_to_wire)
        .collect();
    collection_write(HISTORY_KEY, &entries)
}
