//! Per-person split calculation.
//!
//! Everything here is a pure function of a [`Bill`]: calling it twice on an
//! unchanged bill gives identical output. No rounding happens here; amounts
//! are rounded to cents only when displayed.

use serde::Serialize;

use super::Bill;

/// What one participant owes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonShare {
    pub name: String,
    pub amount: f64,
}

/// Split output plus the totals needed to explain it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    /// One entry per person, in insertion order.
    pub shares: Vec<PersonShare>,
    /// Tax added to every person when tax is split, else 0.
    pub tax_share: f64,
    pub item_total: f64,
    pub tax: f64,
    pub final_total: f64,
    /// Sum of all shares. Differs from `final_total` when items have no
    /// payers or tax is not split.
    pub assigned_total: f64,
    /// Indices of items nobody is paying for.
    pub unassigned_items: Vec<usize>,
}

/// Compute what each person owes.
///
/// Tax is divided evenly between everyone when `split_tax` is on. Each item
/// is divided among its payers, equally or by its custom percentages. Items
/// without payers are not charged to anyone.
pub fn compute_split(bill: &Bill) -> Vec<PersonShare> {
    let people = bill.people();
    let tax_share = tax_share(bill);
    let mut amounts = vec![tax_share; people.len()];

    for item in bill.items() {
        let payers: Vec<usize> = people
            .iter()
            .enumerate()
            .filter(|(_, p)| p.pays_for(&item.id))
            .map(|(i, _)| i)
            .collect();
        if payers.is_empty() {
            continue;
        }

        match bill.custom_split_for(&item.id) {
            Some(custom) => {
                for &i in &payers {
                    let pct = custom.get(&people[i].name).copied().unwrap_or(0.0);
                    amounts[i] += item.price * pct / 100.0;
                }
            }
            None => {
                let each = item.price / payers.len() as f64;
                for &i in &payers {
                    amounts[i] += each;
                }
            }
        }
    }

    people
        .iter()
        .zip(amounts)
        .map(|(person, amount)| PersonShare {
            name: person.name.clone(),
            amount,
        })
        .collect()
}

pub fn summarize(bill: &Bill) -> SplitSummary {
    let shares = compute_split(bill);
    let assigned_total = shares.iter().map(|s| s.amount).sum();
    let unassigned_items = bill
        .items()
        .iter()
        .enumerate()
        .filter(|(_, item)| bill.payers_of(&item.id).next().is_none())
        .map(|(i, _)| i)
        .collect();

    SplitSummary {
        shares,
        tax_share: tax_share(bill),
        item_total: bill.item_total(),
        tax: bill.tax(),
        final_total: bill.final_total(),
        assigned_total,
        unassigned_items,
    }
}

fn tax_share(bill: &Bill) -> f64 {
    let people = bill.people().len();
    if bill.split_tax() && people > 0 {
        bill.tax() / people as f64
    } else {
        0.0
    }
}
