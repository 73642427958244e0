//! Persisted and over-the-wire representation of a bill.
//!
//! Inside the engine items carry stable ids; here, as in the stored session
//! and the HTTP API, everything is keyed by item position:
//! `{"name": "Alice", "paidFor": {"0": true}}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::bill::input::validate_price;
use crate::bill::{Bill, BillState};
use crate::entity::{BillHistoryEntry, CustomSplit, Item, ItemId, Person};
use crate::error::{BillsplitError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPerson {
    pub name: String,
    #[serde(rename = "paidFor", default)]
    pub paid_for: BTreeMap<usize, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredHistoryEntry {
    #[serde(default)]
    pub people: Vec<StoredPerson>,
    pub items: Vec<StoredItem>,
    #[serde(
        serialize_with = "serialize_tax",
        deserialize_with = "deserialize_tax",
        default
    )]
    pub tax: f64,
    pub time_created: DateTime<Utc>,
}

/// Full view of the current bill, as returned by the API and `show --json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDocument {
    pub state: BillState,
    pub items: Vec<StoredItem>,
    pub people: Vec<StoredPerson>,
    pub tax: f64,
    pub split_tax: bool,
    pub custom_split: BTreeMap<usize, CustomSplit>,
    pub final_total: f64,
}

impl BillDocument {
    pub fn from_bill(bill: &Bill) -> Self {
        Self {
            state: bill.state(),
            items: items_to_wire(bill.items()),
            people: people_to_wire(bill.items(), bill.people()),
            tax: bill.tax(),
            split_tax: bill.split_tax(),
            custom_split: custom_splits_to_wire(bill),
            final_total: bill.final_total(),
        }
    }
}

/// Tax is stored as a decimal string but accepted as a number too.
#[derive(Deserialize)]
#[serde(untagged)]
enum TaxValue {
    Number(f64),
    Text(String),
}

fn serialize_tax<S: Serializer>(tax: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_tax(*tax))
}

fn deserialize_tax<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(match TaxValue::deserialize(deserializer)? {
        TaxValue::Number(n) => crate::bill::input::coerce_tax(n),
        TaxValue::Text(s) => crate::bill::parse_tax(&s),
    })
}

pub fn format_tax(tax: f64) -> String {
    tax.to_string()
}

pub fn items_to_wire(items: &[Item]) -> Vec<StoredItem> {
    items
        .iter()
        .map(|i| StoredItem {
            name: i.name.clone(),
            price: i.price,
        })
        .collect()
}

/// Only `true` assignments are written; a missing index means "not a payer".
pub fn people_to_wire(items: &[Item], people: &[Person]) -> Vec<StoredPerson> {
    people
        .iter()
        .map(|person| StoredPerson {
            name: person.name.clone(),
            paid_for: items
                .iter()
                .enumerate()
                .filter(|(_, item)| person.pays_for(&item.id))
                .map(|(idx, _)| (idx, true))
                .collect(),
        })
        .collect()
}

pub fn custom_splits_to_wire(bill: &Bill) -> BTreeMap<usize, CustomSplit> {
    bill.custom_splits()
        .iter()
        .filter_map(|(id, split)| bill.item_index(id).map(|idx| (idx, split.clone())))
        .collect()
}

/// Give stored items fresh ids. Fails if any item is invalid, so indices in
/// the accompanying people data never point at the wrong item.
pub fn items_from_wire(items: Vec<StoredItem>) -> Result<Vec<Item>> {
    items
        .into_iter()
        .map(|i| {
            let name = i.name.trim().to_string();
            if name.is_empty() {
                return Err(BillsplitError::EmptyItemName);
            }
            Ok(Item::new(name, validate_price(i.price)?))
        })
        .collect()
}

/// Resolve index-keyed assignments against `items`. Indices past the end
/// are dropped, as are empty or repeated names.
pub fn people_from_wire(items: &[Item], people: Vec<StoredPerson>) -> Vec<Person> {
    let mut resolved: Vec<Person> = Vec::with_capacity(people.len());
    for stored in people {
        let name = stored.name.trim();
        if name.is_empty() || resolved.iter().any(|p| p.is_named(name)) {
            debug!("Skipping stored person {:?}", stored.name);
            continue;
        }
        let mut person = Person::new(name.to_string());
        for (idx, paying) in stored.paid_for {
            match items.get(idx) {
                Some(item) if paying => {
                    person.paid_for.insert(item.id);
                }
                Some(_) => {}
                None => debug!("Dropping assignment of {} to missing item {}", name, idx),
            }
        }
        resolved.push(person);
    }
    resolved
}

pub fn custom_splits_from_wire(
    items: &[Item],
    splits: BTreeMap<usize, CustomSplit>,
) -> BTreeMap<ItemId, CustomSplit> {
    splits
        .into_iter()
        .filter_map(|(idx, split)| items.get(idx).map(|item| (item.id, split)))
        .collect()
}

pub fn history_entry_to_wire(entry: &BillHistoryEntry) -> StoredHistoryEntry {
    StoredHistoryEntry {
        people: people_to_wire(&entry.items, &entry.people),
        items: items_to_wire(&entry.items),
        tax: entry.tax,
        time_created: entry.created_at,
    }
}

pub fn history_entry_from_wire(stored: StoredHistoryEntry) -> Result<BillHistoryEntry> {
    let items = items_from_wire(stored.items)?;
    let people = people_from_wire(&items, stored.people);
    Ok(BillHistoryEntry {
        people,
        items,
        tax: stored.tax,
        created_at: stored.time_created,
    })
}
