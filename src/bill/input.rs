//! Parsing of user-supplied amounts.
//!
//! Prices are strict: anything that is not a finite, non-negative number is
//! rejected. Tax is fail-soft: anything unusable becomes 0.

use tracing::warn;

use crate::error::{BillsplitError, Result};

/// Tolerance used when checking that percentages add up to exactly 100.
///
/// Only absorbs binary floating point representation error; it is far too
/// small to hide a real mismatch like 99.99.
pub const PERCENT_EPSILON: f64 = 1e-9;

/// Parse a price typed by a user (`"4.00"`, `"$4"`, `" 12.5 "`).
pub fn parse_price(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    let number = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
    match number.parse::<f64>() {
        Ok(price) => validate_price(price).map_err(|_| BillsplitError::InvalidPrice(raw.to_string())),
        Err(_) => Err(BillsplitError::InvalidPrice(raw.to_string())),
    }
}

/// Accept a numeric price only if it is finite and non-negative.
pub fn validate_price(price: f64) -> Result<f64> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(BillsplitError::InvalidPrice(price.to_string()))
    }
}

/// Parse a tax value, coercing anything invalid (including negatives) to 0.
pub fn parse_tax(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let number = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
    match number.parse::<f64>() {
        Ok(value) => coerce_tax(value),
        Err(_) => {
            if !trimmed.is_empty() {
                warn!("Unparsable tax {:?}, using 0", raw);
            }
            0.0
        }
    }
}

pub fn coerce_tax(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!("Invalid tax {}, using 0", value);
        0.0
    }
}

pub fn is_valid_percentage(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}

pub fn is_balanced(total: f64) -> bool {
    (total - 100.0).abs() <= PERCENT_EPSILON
}
