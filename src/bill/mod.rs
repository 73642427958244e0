//! The bill model.
//!
//! [`Bill`] is the single authoritative aggregate: items, participants, tax,
//! payer assignments and custom percentage splits. Every mutation either
//! applies completely or leaves the bill untouched.

pub mod input;
pub mod split;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entity::{same_name, BillHistoryEntry, CustomSplit, Item, ItemId, NewItem, Person};
use crate::error::{BillsplitError, Result};

pub use input::{parse_price, parse_tax, PERCENT_EPSILON};
pub use split::{compute_split, summarize, PersonShare, SplitSummary};

/// Lifecycle of a bill. Derived from the items, so it can never go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BillState {
    Empty,
    Populated,
}

impl std::fmt::Display for BillState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillState::Empty => write!(f, "empty"),
            BillState::Populated => write!(f, "populated"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bill {
    items: Vec<Item>,
    people: Vec<Person>,
    tax: f64,
    split_tax: bool,
    custom_splits: BTreeMap<ItemId, CustomSplit>,
}

impl Bill {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a bill from stored parts.
    ///
    /// Assignments and custom splits that refer to items not in `items` are
    /// discarded, as are unbalanced custom splits.
    pub(crate) fn from_parts(
        items: Vec<Item>,
        people: Vec<Person>,
        tax: f64,
        split_tax: bool,
        custom_splits: BTreeMap<ItemId, CustomSplit>,
    ) -> Self {
        let mut bill = Self {
            items,
            people,
            tax: input::coerce_tax(tax),
            split_tax,
            custom_splits,
        };
        let known: Vec<ItemId> = bill.items.iter().map(|i| i.id).collect();
        for person in &mut bill.people {
            person.paid_for.retain(|id| known.contains(id));
        }
        bill.custom_splits.retain(|id, _| known.contains(id));
        for id in known {
            bill.reconcile_custom_split(id);
        }
        bill
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn tax(&self) -> f64 {
        self.tax
    }

    pub fn split_tax(&self) -> bool {
        self.split_tax
    }

    pub fn state(&self) -> BillState {
        if self.items.is_empty() {
            BillState::Empty
        } else {
            BillState::Populated
        }
    }

    pub fn item_total(&self) -> f64 {
        self.items.iter().map(|i| i.price).sum()
    }

    /// Sum of all item prices plus tax. Always recomputed.
    pub fn final_total(&self) -> f64 {
        self.item_total() + self.tax
    }

    pub fn item(&self, index: usize) -> Result<&Item> {
        self.items.get(index).ok_or(BillsplitError::IndexOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    pub fn item_index(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id == *id)
    }

    pub fn person(&self, name: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.is_named(name))
    }

    /// People currently marked as payers of `item`, in insertion order.
    pub fn payers_of(&self, item: &ItemId) -> impl Iterator<Item = &Person> {
        let item = *item;
        self.people.iter().filter(move |p| p.pays_for(&item))
    }

    pub fn custom_split(&self, index: usize) -> Option<&CustomSplit> {
        self.items
            .get(index)
            .and_then(|item| self.custom_splits.get(&item.id))
    }

    pub fn custom_split_for(&self, item: &ItemId) -> Option<&CustomSplit> {
        self.custom_splits.get(item)
    }

    pub fn custom_splits(&self) -> &BTreeMap<ItemId, CustomSplit> {
        &self.custom_splits
    }

    /// Add a participant. Names are unique case-insensitively.
    pub fn add_person(&mut self, name: &str) -> Result<&Person> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BillsplitError::EmptyPersonName);
        }
        if self.person(name).is_some() {
            return Err(BillsplitError::DuplicateName(name.to_string()));
        }

        debug!("Adding person {:?}", name);
        self.people.push(Person::new(name.to_string()));
        let idx = self.people.len() - 1;
        Ok(&self.people[idx])
    }

    /// Remove a participant and purge their custom split percentages.
    pub fn delete_person(&mut self, name: &str) -> Result<Person> {
        let pos = self
            .people
            .iter()
            .position(|p| p.is_named(name))
            .ok_or_else(|| BillsplitError::PersonNotFound(name.trim().to_string()))?;

        let removed = self.people.remove(pos);
        debug!("Deleted person {:?}", removed.name);

        let affected: Vec<ItemId> = self.custom_splits.keys().copied().collect();
        for id in affected {
            self.reconcile_custom_split(id);
        }
        Ok(removed)
    }

    /// Append an item. Nobody is assigned to it yet.
    pub fn add_item(&mut self, name: &str, price: f64) -> Result<&Item> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BillsplitError::EmptyItemName);
        }
        let price = input::validate_price(price)?;

        debug!("Adding item {:?} at {}", name, price);
        self.items.push(Item::new(name.to_string(), price));
        let idx = self.items.len() - 1;
        Ok(&self.items[idx])
    }

    /// Replace the name and price of the item at `index`.
    ///
    /// Fail-soft per field: an empty name or an invalid price keeps the
    /// previous value. Only an out-of-range index is an error.
    pub fn edit_item(&mut self, index: usize, name: &str, price: f64) -> Result<&Item> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(BillsplitError::IndexOutOfRange { index, len })?;

        let name = name.trim();
        if name.is_empty() {
            warn!("Ignoring empty name for item {}", index);
        } else {
            item.name = name.to_string();
        }

        match input::validate_price(price) {
            Ok(price) => item.price = price,
            Err(_) => warn!(
                "Ignoring invalid price {} for item {}, keeping {}",
                price, index, item.price
            ),
        }

        Ok(&self.items[index])
    }

    /// Remove the item at `index` together with its assignments and split.
    ///
    /// Later items move down one position; because assignments are keyed by
    /// [`ItemId`] they follow their items automatically.
    pub fn delete_item(&mut self, index: usize) -> Result<Item> {
        if index >= self.items.len() {
            return Err(BillsplitError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }

        let removed = self.items.remove(index);
        for person in &mut self.people {
            person.paid_for.remove(&removed.id);
        }
        self.custom_splits.remove(&removed.id);

        debug!("Deleted item {} ({:?})", index, removed.name);
        Ok(removed)
    }

    /// Flip whether `person` is a payer of the item at `index`.
    ///
    /// Unknown people and indices are a silent no-op (`None`); otherwise
    /// returns the new assignment state.
    pub fn toggle_payment(&mut self, index: usize, person: &str) -> Option<bool> {
        let item_id = self.items.get(index)?.id;
        let person = self.people.iter_mut().find(|p| p.is_named(person))?;

        let now_paying = if person.paid_for.remove(&item_id) {
            false
        } else {
            person.paid_for.insert(item_id);
            true
        };
        debug!(
            "{} is {} a payer of item {}",
            person.name,
            if now_paying { "now" } else { "no longer" },
            index
        );

        if !now_paying {
            self.reconcile_custom_split(item_id);
        }
        Some(now_paying)
    }

    /// Set the bill's tax. Invalid values become 0. Returns the applied value.
    pub fn set_tax(&mut self, value: f64) -> f64 {
        self.tax = input::coerce_tax(value);
        self.tax
    }

    pub fn set_split_tax(&mut self, enabled: bool) {
        self.split_tax = enabled;
    }

    /// Store a percentage split for the item at `index`.
    ///
    /// Every entry must be within 0-100, and the entries belonging to the
    /// item's current payers must add up to exactly 100. Entries for people
    /// who are not payers are dropped. Nothing is stored on failure.
    pub fn set_custom_split(&mut self, index: usize, mapping: &CustomSplit) -> Result<()> {
        let item_id = self.item(index)?.id;

        for (i, (name, value)) in mapping.iter().enumerate() {
            if mapping.keys().skip(i + 1).any(|other| same_name(other, name)) {
                return Err(BillsplitError::DuplicateSplitEntry(name.trim().to_string()));
            }
            if !input::is_valid_percentage(*value) {
                return Err(BillsplitError::InvalidPercentage {
                    name: name.clone(),
                    value: *value,
                });
            }
        }

        let mut split = CustomSplit::new();
        for payer in self.payers_of(&item_id) {
            if let Some((_, value)) = mapping.iter().find(|(name, _)| same_name(name, &payer.name)) {
                split.insert(payer.name.clone(), *value);
            }
        }

        let total: f64 = split.values().sum();
        if !input::is_balanced(total) {
            return Err(BillsplitError::SplitNotBalanced { total });
        }

        debug!("Custom split for item {}: {:?}", index, split);
        self.custom_splits.insert(item_id, split);
        Ok(())
    }

    /// Drop the custom split for the item at `index`, returning to an equal
    /// split. Returns whether there was one.
    pub fn clear_custom_split(&mut self, index: usize) -> Result<bool> {
        let item_id = self.item(index)?.id;
        Ok(self.custom_splits.remove(&item_id).is_some())
    }

    /// Replace the whole bill with freshly extracted data.
    ///
    /// People and custom splits are cleared; `total` is only checked against
    /// the recomputed total, never stored. Returns the outgoing bill so the
    /// caller can archive it. The bill is unchanged on error.
    pub fn replace_all(&mut self, items: Vec<NewItem>, tax: f64, total: f64) -> Result<Bill> {
        let mut validated = Vec::with_capacity(items.len());
        for item in items {
            let name = item.name.trim();
            if name.is_empty() {
                return Err(BillsplitError::EmptyItemName);
            }
            let price = input::validate_price(item.price)?;
            validated.push(Item::new(name.to_string(), price));
        }

        let next = Bill {
            items: validated,
            people: Vec::new(),
            tax: input::coerce_tax(tax),
            split_tax: self.split_tax,
            custom_splits: BTreeMap::new(),
        };

        let computed = next.final_total();
        if (computed - total).abs() > 0.01 {
            warn!(
                "Receipt total {:.2} differs from computed total {:.2}; using computed",
                total, computed
            );
        }

        info!(
            "Replacing bill: {} items, tax {:.2}",
            next.items.len(),
            next.tax
        );
        Ok(std::mem::replace(self, next))
    }

    /// Empty the bill, keeping only the split-tax preference. Returns the
    /// outgoing bill.
    pub fn clear_to_empty(&mut self) -> Bill {
        let next = Bill {
            split_tax: self.split_tax,
            ..Bill::default()
        };
        info!("Clearing bill");
        std::mem::replace(self, next)
    }

    /// Make a history entry the current bill. Returns the outgoing bill.
    pub fn restore(&mut self, entry: BillHistoryEntry) -> Bill {
        let next = Bill::from_parts(
            entry.items,
            entry.people,
            entry.tax,
            self.split_tax,
            BTreeMap::new(),
        );
        std::mem::replace(self, next)
    }

    pub fn snapshot(&self, created_at: DateTime<Utc>) -> BillHistoryEntry {
        BillHistoryEntry {
            people: self.people.clone(),
            items: self.items.clone(),
            tax: self.tax,
            created_at,
        }
    }

    /// Purge split entries of people who no longer pay for `item`, and drop
    /// the split entirely once the remaining entries stop adding up to 100.
    ///
    /// Kept entries are re-keyed to the payer's name as stored on the bill.
    fn reconcile_custom_split(&mut self, item: ItemId) {
        let payers: Vec<String> = self.payers_of(&item).map(|p| p.name.clone()).collect();
        let Some(split) = self.custom_splits.get_mut(&item) else {
            return;
        };

        let rekeyed: CustomSplit = payers
            .into_iter()
            .filter_map(|payer| {
                let value = split
                    .iter()
                    .find(|(name, _)| same_name(name, &payer))
                    .map(|(_, value)| *value)?;
                Some((payer, value))
            })
            .collect();
        *split = rekeyed;
        let total: f64 = split.values().sum();
        if !input::is_balanced(total) {
            debug!(
                "Custom split for item {} no longer balances ({}%), reverting to equal split",
                item, total
            );
            self.custom_splits.remove(&item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(entries: &[(&str, f64)]) -> CustomSplit {
        entries
            .iter()
            .map(|(name, pct)| (name.to_string(), *pct))
            .collect()
    }

    fn pizza_bill() -> Bill {
        let mut bill = Bill::new();
        bill.add_item("Pizza", 20.0).unwrap();
        bill.add_person("Alice").unwrap();
        bill.add_person("Bob").unwrap();
        bill.toggle_payment(0, "Alice");
        bill.toggle_payment(0, "Bob");
        bill
    }

    #[test]
    fn test_new_bill_is_empty() {
        let bill = Bill::new();
        assert_eq!(bill.state(), BillState::Empty);
        assert_eq!(bill.final_total(), 0.0);
    }

    #[test]
    fn test_add_person_rejects_duplicates_case_insensitively() {
        let mut bill = Bill::new();
        bill.add_person("Alice").unwrap();

        let result = bill.add_person("  alice ");
        assert!(matches!(result, Err(BillsplitError::DuplicateName(_))));
        assert_eq!(bill.people().len(), 1);
        assert_eq!(bill.people()[0].name, "Alice");
    }

    #[test]
    fn test_add_person_rejects_empty_name() {
        let mut bill = Bill::new();
        assert!(matches!(
            bill.add_person("   "),
            Err(BillsplitError::EmptyPersonName)
        ));
        assert!(bill.people().is_empty());
    }

    #[test]
    fn test_add_item_validates() {
        let mut bill = Bill::new();
        assert!(matches!(
            bill.add_item("Milk", -1.0),
            Err(BillsplitError::InvalidPrice(_))
        ));
        assert!(matches!(
            bill.add_item("Milk", f64::NAN),
            Err(BillsplitError::InvalidPrice(_))
        ));
        assert!(matches!(
            bill.add_item(" ", 1.0),
            Err(BillsplitError::EmptyItemName)
        ));
        assert!(bill.items().is_empty());

        let item = bill.add_item(" Milk ", 2.5).unwrap();
        assert_eq!(item.name, "Milk");
        assert_eq!(bill.state(), BillState::Populated);
    }

    #[test]
    fn test_final_total_tracks_mutations() {
        let mut bill = Bill::new();
        bill.add_item("Coffee", 4.0).unwrap();
        bill.add_item("Bagel", 3.0).unwrap();
        bill.set_tax(0.7);
        assert!((bill.final_total() - 7.7).abs() < 1e-9);

        bill.edit_item(1, "Bagel", 5.0).unwrap();
        assert!((bill.final_total() - 9.7).abs() < 1e-9);

        bill.delete_item(0).unwrap();
        assert!((bill.final_total() - 5.7).abs() < 1e-9);
    }

    #[test]
    fn test_edit_item_is_fail_soft() {
        let mut bill = Bill::new();
        bill.add_item("Coffee", 4.0).unwrap();

        let item = bill.edit_item(0, "Latte", -2.0).unwrap();
        assert_eq!(item.name, "Latte");
        assert_eq!(item.price, 4.0);

        let item = bill.edit_item(0, "", 5.0).unwrap();
        assert_eq!(item.name, "Latte");
        assert_eq!(item.price, 5.0);
    }

    #[test]
    fn test_edit_item_out_of_range() {
        let mut bill = Bill::new();
        assert!(matches!(
            bill.edit_item(0, "x", 1.0),
            Err(BillsplitError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_delete_item_shifts_assignments() {
        let mut bill = Bill::new();
        for (i, name) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            bill.add_item(name, i as f64 + 1.0).unwrap();
        }
        bill.add_person("Alice").unwrap();
        bill.toggle_payment(3, "Alice");
        bill.toggle_payment(4, "Alice");

        bill.delete_item(3).unwrap();

        let alice = bill.person("Alice").unwrap();
        assert_eq!(alice.paid_for.len(), 1);
        // Former index 4 ("E") is now index 3 and still assigned.
        assert_eq!(bill.items()[3].name, "E");
        assert!(alice.pays_for(&bill.items()[3].id));
    }

    #[test]
    fn test_delete_item_moves_custom_split_with_item() {
        let mut bill = pizza_bill();
        bill.add_item("Salad", 10.0).unwrap();
        bill.toggle_payment(1, "Alice");
        bill.toggle_payment(1, "Bob");
        bill.set_custom_split(1, &split(&[("Alice", 70.0), ("Bob", 30.0)]))
            .unwrap();

        bill.delete_item(0).unwrap();

        let custom = bill.custom_split(0).unwrap();
        assert_eq!(custom.get("Alice"), Some(&70.0));
        assert_eq!(bill.custom_splits().len(), 1);
    }

    #[test]
    fn test_delete_item_out_of_range() {
        let mut bill = Bill::new();
        bill.add_item("A", 1.0).unwrap();
        assert!(matches!(
            bill.delete_item(1),
            Err(BillsplitError::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert_eq!(bill.items().len(), 1);
    }

    #[test]
    fn test_toggle_payment_flips() {
        let mut bill = Bill::new();
        bill.add_item("A", 1.0).unwrap();
        bill.add_person("Alice").unwrap();

        assert_eq!(bill.toggle_payment(0, "alice"), Some(true));
        assert!(bill.people()[0].pays_for(&bill.items()[0].id));
        assert_eq!(bill.toggle_payment(0, "Alice"), Some(false));
        assert!(bill.people()[0].paid_for.is_empty());
    }

    #[test]
    fn test_toggle_payment_unknown_is_noop() {
        let mut bill = Bill::new();
        bill.add_item("A", 1.0).unwrap();
        bill.add_person("Alice").unwrap();
        let before = bill.clone();

        assert_eq!(bill.toggle_payment(0, "Mallory"), None);
        assert_eq!(bill.toggle_payment(7, "Alice"), None);
        assert_eq!(bill, before);
    }

    #[test]
    fn test_set_tax_coerces_invalid() {
        let mut bill = Bill::new();
        assert_eq!(bill.set_tax(1.5), 1.5);
        assert_eq!(bill.set_tax(-2.0), 0.0);
        assert_eq!(bill.set_tax(f64::INFINITY), 0.0);
        assert_eq!(bill.tax(), 0.0);
    }

    #[test]
    fn test_custom_split_must_balance() {
        let mut bill = pizza_bill();

        let result = bill.set_custom_split(0, &split(&[("Alice", 60.0), ("Bob", 39.0)]));
        assert!(matches!(result, Err(BillsplitError::SplitNotBalanced { .. })));
        assert!(bill.custom_split(0).is_none());

        bill.set_custom_split(0, &split(&[("Alice", 60.0), ("Bob", 40.0)]))
            .unwrap();
        assert_eq!(bill.custom_split(0).unwrap().get("Bob"), Some(&40.0));
    }

    #[test]
    fn test_custom_split_rejects_out_of_range_percentage() {
        let mut bill = pizza_bill();
        let result = bill.set_custom_split(0, &split(&[("Alice", 120.0), ("Bob", -20.0)]));
        assert!(matches!(
            result,
            Err(BillsplitError::InvalidPercentage { .. })
        ));
    }

    #[test]
    fn test_custom_split_ignores_non_payers() {
        let mut bill = pizza_bill();
        bill.add_person("Carol").unwrap();

        // Carol is not a payer, so her 50% does not count towards the total.
        let result = bill.set_custom_split(
            0,
            &split(&[("Alice", 50.0), ("Bob", 50.0), ("Carol", 50.0)]),
        );
        assert!(result.is_ok());
        assert!(!bill.custom_split(0).unwrap().contains_key("Carol"));
    }

    #[test]
    fn test_custom_split_keys_match_case_insensitively() {
        let mut bill = pizza_bill();
        bill.set_custom_split(0, &split(&[("alice", 25.0), ("BOB", 75.0)]))
            .unwrap();
        let custom = bill.custom_split(0).unwrap();
        assert_eq!(custom.get("Alice"), Some(&25.0));
        assert_eq!(custom.get("Bob"), Some(&75.0));
    }

    #[test]
    fn test_custom_split_rejects_case_duplicate_names() {
        let mut bill = pizza_bill();
        let result = bill.set_custom_split(
            0,
            &split(&[("alice", 60.0), ("Alice", 10.0), ("Bob", 40.0)]),
        );
        assert!(matches!(
            result,
            Err(BillsplitError::DuplicateSplitEntry(ref name)) if name.eq_ignore_ascii_case("alice")
        ));
        assert!(bill.custom_split(0).is_none());
    }

    #[test]
    fn test_from_parts_rekeys_split_to_stored_names() {
        let item = Item::new("Pizza".to_string(), 20.0);
        let mut alice = Person::new("Alice".to_string());
        let mut bob = Person::new("Bob".to_string());
        alice.paid_for.insert(item.id);
        bob.paid_for.insert(item.id);

        let mut splits = BTreeMap::new();
        splits.insert(item.id, split(&[("alice", 60.0), ("BOB", 40.0)]));

        let bill = Bill::from_parts(vec![item], vec![alice, bob], 0.0, false, splits);
        let custom = bill.custom_split(0).unwrap();
        assert_eq!(custom.get("Alice"), Some(&60.0));
        assert_eq!(custom.get("Bob"), Some(&40.0));

        let shares = compute_split(&bill);
        assert_eq!(shares[0].amount, 12.0);
        assert_eq!(shares[1].amount, 8.0);
    }

    #[test]
    fn test_custom_split_without_payers_fails() {
        let mut bill = Bill::new();
        bill.add_item("Pizza", 20.0).unwrap();
        bill.add_person("Alice").unwrap();
        let result = bill.set_custom_split(0, &split(&[("Alice", 100.0)]));
        assert!(matches!(
            result,
            Err(BillsplitError::SplitNotBalanced { total }) if total == 0.0
        ));
    }

    #[test]
    fn test_unmarking_payer_purges_and_invalidates_split() {
        let mut bill = pizza_bill();
        bill.set_custom_split(0, &split(&[("Alice", 60.0), ("Bob", 40.0)]))
            .unwrap();

        bill.toggle_payment(0, "Bob");
        assert!(bill.custom_split(0).is_none());
    }

    #[test]
    fn test_unmarking_zero_share_payer_keeps_split() {
        let mut bill = pizza_bill();
        bill.add_person("Carol").unwrap();
        bill.toggle_payment(0, "Carol");
        bill.set_custom_split(
            0,
            &split(&[("Alice", 60.0), ("Bob", 40.0), ("Carol", 0.0)]),
        )
        .unwrap();

        bill.toggle_payment(0, "Carol");
        let custom = bill.custom_split(0).unwrap();
        assert!(!custom.contains_key("Carol"));
        assert_eq!(custom.len(), 2);
    }

    #[test]
    fn test_adding_payer_keeps_balanced_split() {
        let mut bill = pizza_bill();
        bill.add_person("Carol").unwrap();
        bill.set_custom_split(0, &split(&[("Alice", 60.0), ("Bob", 40.0)]))
            .unwrap();

        bill.toggle_payment(0, "Carol");
        assert!(bill.custom_split(0).is_some());
    }

    #[test]
    fn test_delete_person_purges_split_entries() {
        let mut bill = pizza_bill();
        bill.set_custom_split(0, &split(&[("Alice", 100.0), ("Bob", 0.0)]))
            .unwrap();

        let removed = bill.delete_person("bob").unwrap();
        assert_eq!(removed.name, "Bob");
        let custom = bill.custom_split(0).unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom.get("Alice"), Some(&100.0));
    }

    #[test]
    fn test_delete_unknown_person() {
        let mut bill = Bill::new();
        assert!(matches!(
            bill.delete_person("Nobody"),
            Err(BillsplitError::PersonNotFound(_))
        ));
    }

    #[test]
    fn test_replace_all_resets_people_and_splits() {
        let mut bill = pizza_bill();
        bill.set_split_tax(true);
        bill.set_custom_split(0, &split(&[("Alice", 50.0), ("Bob", 50.0)]))
            .unwrap();

        let previous = bill
            .replace_all(
                vec![NewItem::new("Coffee", 4.0), NewItem::new("Bagel", 3.0)],
                0.7,
                999.0,
            )
            .unwrap();

        assert_eq!(previous.items().len(), 1);
        assert_eq!(previous.people().len(), 2);
        assert_eq!(bill.items().len(), 2);
        assert!(bill.people().is_empty());
        assert!(bill.custom_splits().is_empty());
        assert!(bill.split_tax());
        // Supplied total is ignored in favour of the recomputed one.
        assert!((bill.final_total() - 7.7).abs() < 1e-9);
    }

    #[test]
    fn test_replace_all_is_atomic_on_invalid_item() {
        let mut bill = pizza_bill();
        let before = bill.clone();

        let result = bill.replace_all(
            vec![NewItem::new("Good", 1.0), NewItem::new("Bad", -1.0)],
            0.0,
            0.0,
        );
        assert!(result.is_err());
        assert_eq!(bill, before);
    }

    #[test]
    fn test_clear_to_empty() {
        let mut bill = pizza_bill();
        bill.set_tax(2.0);
        let previous = bill.clear_to_empty();

        assert_eq!(previous.items().len(), 1);
        assert_eq!(bill.state(), BillState::Empty);
        assert!(bill.people().is_empty());
        assert_eq!(bill.tax(), 0.0);
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut bill = pizza_bill();
        bill.set_tax(1.0);
        let snapshot = bill.snapshot(Utc::now());

        bill.clear_to_empty();
        bill.restore(snapshot);

        assert_eq!(bill.items().len(), 1);
        assert_eq!(bill.people().len(), 2);
        assert_eq!(bill.payers_of(&bill.items()[0].id).count(), 2);
        assert_eq!(bill.tax(), 1.0);
    }

    #[test]
    fn test_from_parts_drops_dangling_assignments() {
        let item = Item::new("A".to_string(), 1.0);
        let mut person = Person::new("Alice".to_string());
        person.paid_for.insert(item.id);
        person.paid_for.insert(ItemId::new());

        let mut splits = BTreeMap::new();
        splits.insert(ItemId::new(), split(&[("Alice", 100.0)]));

        let bill = Bill::from_parts(vec![item], vec![person], 0.0, false, splits);
        assert_eq!(bill.people()[0].paid_for.len(), 1);
        assert!(bill.custom_splits().is_empty());
    }
}
