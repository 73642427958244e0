// src/entity/item.rs
use serde::{Deserialize, Serialize};

use super::ItemId;

/// A single receipt line.
///
/// Prices are kept at full floating precision; rounding to cents only
/// happens when a value is displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub price: f64,
}

impl Item {
    pub fn new(name: String, price: f64) -> Self {
        Self {
            id: ItemId::new(),
            name,
            price,
        }
    }
}

/// An item as supplied by a caller or the extraction gateway, before it
/// has been given an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub price: f64,
}

impl NewItem {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}
