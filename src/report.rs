//! Human-readable bill summaries.
//!
//! Amounts are kept at full precision everywhere else; this is the only
//! place they are rounded to cents.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::bill::{Bill, SplitSummary};
use crate::entity::BillHistory;
use crate::warnings::{format_warning, Warning};

/// Format an amount as dollars with two decimals.
pub fn format_amount(amount: f64) -> String {
    // Avoid printing "-0.00" for tiny negative rounding noise.
    let cents = (amount * 100.0).round() / 100.0;
    if cents == 0.0 {
        "$0.00".to_string()
    } else if cents < 0.0 {
        format!("-${:.2}", -cents)
    } else {
        format!("${:.2}", cents)
    }
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn payer_names(bill: &Bill, index: usize) -> Vec<String> {
    let Some(item) = bill.items().get(index) else {
        return Vec::new();
    };
    let custom = bill.custom_split_for(&item.id);
    bill.payers_of(&item.id)
        .map(|p| match custom.and_then(|c| c.get(&p.name)) {
            Some(pct) => format!("{} {}%", p.name, pct),
            None => p.name.clone(),
        })
        .collect()
}

/// Plain-text summary for the terminal.
pub fn render_text(bill: &Bill, summary: &SplitSummary, warnings: &[Warning]) -> String {
    let mut out = String::new();

    if bill.items().is_empty() {
        out.push_str("No items on this bill.\n");
    } else {
        out.push_str("Items:\n");
        for (idx, item) in bill.items().iter().enumerate() {
            let payers = payer_names(bill, idx);
            let _ = writeln!(
                out,
                "  [{}] {:<24} {:>10}  {}",
                idx,
                item.name,
                format_amount(item.price),
                if payers.is_empty() {
                    "-".to_string()
                } else {
                    payers.join(", ")
                }
            );
        }
    }

    if !summary.shares.is_empty() {
        out.push_str("\nPeople:\n");
        for share in &summary.shares {
            let _ = writeln!(out, "  {:<28} {:>10}", share.name, format_amount(share.amount));
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Subtotal: {}", format_amount(summary.item_total));
    let _ = writeln!(
        out,
        "Tax:      {}{}",
        format_amount(summary.tax),
        if bill.split_tax() { " (split)" } else { "" }
    );
    let _ = writeln!(out, "Total:    {}", format_amount(summary.final_total));

    for warning in warnings {
        let _ = writeln!(out, "{}", format_warning(warning));
    }

    out
}

/// Markdown summary, suitable for pasting into a chat or an issue.
pub fn render_markdown(bill: &Bill, summary: &SplitSummary, warnings: &[Warning]) -> String {
    let mut out = String::from("# Bill\n\n");

    if bill.items().is_empty() {
        out.push_str("_No items._\n");
    } else {
        out.push_str("| # | Item | Price | Paid by |\n|---|---|---:|---|\n");
        for (idx, item) in bill.items().iter().enumerate() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                idx,
                escape_cell(&item.name),
                format_amount(item.price),
                escape_cell(&payer_names(bill, idx).join(", "))
            );
        }
    }

    if !summary.shares.is_empty() {
        out.push_str("\n## Split\n\n| Person | Owes |\n|---|---:|\n");
        for share in &summary.shares {
            let _ = writeln!(
                out,
                "| {} | {} |",
                escape_cell(&share.name),
                format_amount(share.amount)
            );
        }
    }

    out.push_str("\n## Totals\n\n");
    let _ = writeln!(out, "- Subtotal: {}", format_amount(summary.item_total));
    let _ = writeln!(
        out,
        "- Tax: {}{}",
        format_amount(summary.tax),
        if bill.split_tax() {
            ", split evenly"
        } else {
            ""
        }
    );
    let _ = writeln!(out, "- **Total: {}**", format_amount(summary.final_total));

    if !warnings.is_empty() {
        out.push('\n');
        for warning in warnings {
            let _ = writeln!(out, "> {}", format_warning(warning));
        }
    }

    out
}

/// One line per archived bill, newest first.
pub fn render_history(history: &BillHistory) -> String {
    if history.is_empty() {
        return "No previous bills.\n".to_string();
    }
    let mut out = String::new();
    for (idx, entry) in history.entries().iter().enumerate() {
        let _ = writeln!(
            out,
            "[{}] {}  {} items, {} people  total {}",
            idx,
            format_timestamp(&entry.created_at),
            entry.items.len(),
            entry.people.len(),
            format_amount(entry.final_total())
        );
    }
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
