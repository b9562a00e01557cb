//! Cart State
//!
//! The pending purchase selection. Totals are recomputed inside every
//! mutating call, so they are never stale relative to the items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogItem, ItemId};
use crate::error::{Result, StoreError};

/// Upper bound for a single line's quantity
pub const MAX_QUANTITY: u32 = 99;

/// One cart line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub item: CatalogItem,

    /// Price captured when the item was first added
    pub unit_price: Decimal,

    /// Between 1 and [`MAX_QUANTITY`]
    pub quantity: u32,

    pub added_at: DateTime<Utc>,
}

impl CartItem {
    fn new(item: CatalogItem) -> Self {
        Self {
            unit_price: item.price,
            item,
            quantity: 1,
            added_at: Utc::now(),
        }
    }

    pub const fn id(&self) -> ItemId {
        self.item.id
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Cart contents, derived totals and panel visibility
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
    total_items: u64,
    total_price: Decimal,
    is_open: bool,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit; an existing line is incremented instead of duplicated.
    /// A line already at [`MAX_QUANTITY`] stays there.
    pub fn add_item(&mut self, item: CatalogItem) {
        if let Some(line) = self.items.iter_mut().find(|l| l.id() == item.id) {
            if line.quantity >= MAX_QUANTITY {
                tracing::debug!(item_id = %item.id, "Cart line already at quantity limit");
            }
            line.quantity = line.quantity.saturating_add(1).min(MAX_QUANTITY);
        } else {
            self.items.push(CartItem::new(item));
        }
        self.recompute();
    }

    pub fn remove_item(&mut self, id: ItemId) {
        self.items.retain(|l| l.id() != id);
        self.recompute();
    }

    /// Absolute set. Zero or negative removes the line; unknown ids are ignored.
    /// Quantities above [`MAX_QUANTITY`] are rejected and leave the cart as is.
    pub fn update_quantity(&mut self, id: ItemId, quantity: i64) -> Result<()> {
        if quantity > i64::from(MAX_QUANTITY) {
            return Err(StoreError::InvalidInput(format!(
                "quantity {quantity} is above the limit of {MAX_QUANTITY}"
            )));
        }
        let Some(pos) = self.items.iter().position(|l| l.id() == id) else {
            return Ok(());
        };

        match u32::try_from(quantity) {
            Ok(n) if n > 0 => self.items[pos].quantity = n,
            _ => {
                self.items.remove(pos);
            }
        }
        self.recompute();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.recompute();
    }

    pub const fn open(&mut self) {
        self.is_open = true;
    }

    pub const fn close(&mut self) {
        self.is_open = false;
    }

    pub const fn toggle(&mut self) {
        self.is_open = !self.is_open;
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&CartItem> {
        self.items.iter().find(|l| l.id() == id)
    }

    pub const fn total_items(&self) -> u64 {
        self.total_items
    }

    pub const fn total_price(&self) -> Decimal {
        self.total_price
    }

    pub const fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn recompute(&mut self) {
        self.total_items = self.items.iter().map(|l| u64::from(l.quantity)).sum();
        self.total_price = self.items.iter().map(CartItem::line_total).sum();
    }
}
