//! Reconciliation warnings for a computed split.
//!
//! Per-person amounts only add up to the bill's final total when every item
//! has a payer and tax is shared. These warnings say which part is missing.

use serde::Serialize;

use crate::bill::{Bill, SplitSummary};
use crate::report::format_amount;

/// Why the per-person amounts do not cover the whole bill.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Items that nobody is paying for.
    UnassignedItems { names: Vec<String>, amount: f64 },
    /// Tax exists but is not being split.
    TaxNotSplit { tax: f64 },
    /// The bill has items but no people.
    NoParticipants { item_count: usize },
}

/// Explain any gap between `summary.assigned_total` and the final total.
pub fn check_split(bill: &Bill, summary: &SplitSummary) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if bill.items().is_empty() {
        return warnings;
    }

    if bill.people().is_empty() {
        warnings.push(Warning::NoParticipants {
            item_count: bill.items().len(),
        });
    } else if !summary.unassigned_items.is_empty() {
        let items = summary
            .unassigned_items
            .iter()
            .filter_map(|&idx| bill.items().get(idx));
        let (names, amount) = items.fold((Vec::new(), 0.0), |(mut names, amount), item| {
            names.push(item.name.clone());
            (names, amount + item.price)
        });
        warnings.push(Warning::UnassignedItems { names, amount });
    }

    if bill.tax() > 0.0 && (!bill.split_tax() || bill.people().is_empty()) {
        warnings.push(Warning::TaxNotSplit { tax: bill.tax() });
    }

    warnings
}

pub fn format_warning(warning: &Warning) -> String {
    match warning {
        Warning::UnassignedItems { names, amount } => format!(
            "Warning: {} not assigned to anyone ({}): {}",
            if names.len() == 1 { "1 item is" } else { "items are" },
            format_amount(*amount),
            names.join(", ")
        ),
        Warning::TaxNotSplit { tax } => format!(
            "Warning: tax of {} is not included in anyone's share",
            format_amount(*tax)
        ),
        Warning::NoParticipants { item_count } => format!(
            "Warning: {} item(s) but nobody to split them between",
            item_count
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::summarize;

    fn bill_with_items() -> Bill {
        let mut bill = Bill::new();
        bill.add_item("Coffee", 4.0).unwrap();
        bill.add_item("Bagel", 3.0).unwrap();
        bill
    }

    #[test]
    fn test_empty_bill_has_no_warnings() {
        let bill = Bill::new();
        assert!(check_split(&bill, &summarize(&bill)).is_empty());
    }

    #[test]
    fn test_no_participants() {
        let bill = bill_with_items();
        let warnings = check_split(&bill, &summarize(&bill));
        assert_eq!(warnings, vec![Warning::NoParticipants { item_count: 2 }]);
    }

    #[test]
    fn test_unassigned_items() {
        let mut bill = bill_with_items();
        bill.add_person("Alice").unwrap();
        bill.toggle_payment(0, "Alice");

        let warnings = check_split(&bill, &summarize(&bill));
        assert_eq!(
            warnings,
            vec![Warning::UnassignedItems {
                names: vec!["Bagel".to_string()],
                amount: 3.0
            }]
        );
    }

    #[test]
    fn test_tax_not_split() {
        let mut bill = bill_with_items();
        bill.add_person("Alice").unwrap();
        bill.toggle_payment(0, "Alice");
        bill.toggle_payment(1, "Alice");
        bill.set_tax(0.7);

        let warnings = check_split(&bill, &summarize(&bill));
        assert_eq!(warnings, vec![Warning::TaxNotSplit { tax: 0.7 }]);

        bill.set_split_tax(true);
        assert!(check_split(&bill, &summarize(&bill)).is_empty());
    }

    #[test]
    fn test_format_unassigned() {
        let msg = format_warning(&Warning::UnassignedItems {
            names: vec!["Bagel".to_string()],
            amount: 3.0,
        });
        assert!(msg.contains("Bagel"));
        assert!(msg.contains("3.00"));
    }

    #[test]
    fn test_format_tax_not_split() {
        let msg = format_warning(&Warning::TaxNotSplit { tax: 0.7 });
        assert!(msg.contains("0.70"));
    }
}
