//! Wishlist State

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogItem, ImageRef, ItemId};

/// A saved-for-later item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub id: ItemId,
    pub title: String,
    pub image: String,
    pub platform: String,
    pub unit_price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount: Option<String>,
}

impl From<&CatalogItem> for WishlistEntry {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            image: item.image_url().to_string(),
            platform: item.platform.clone(),
            unit_price: item.price,
            original_price: item.original_price,
            discount: item.discount.clone(),
        }
    }
}

impl From<&WishlistEntry> for CatalogItem {
    fn from(entry: &WishlistEntry) -> Self {
        let mut item = Self::new(entry.id, entry.title.clone(), entry.unit_price)
            .with_platform(entry.platform.clone())
            .with_image(ImageRef::SingleImage(entry.image.clone()));
        item.original_price = entry.original_price;
        item.discount.clone_from(&entry.discount);
        item
    }
}

/// Insertion-ordered set of wishlist entries, unique by item id
#[derive(Clone, Debug, Default)]
pub struct Wishlist {
    entries: Vec<WishlistEntry>,
    index: HashSet<ItemId>,
}

impl Wishlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the item was already saved.
    pub fn add(&mut self, item: &CatalogItem) -> bool {
        if !self.index.insert(item.id) {
            return false;
        }
        self.entries.push(WishlistEntry::from(item));
        true
    }

    pub fn remove(&mut self, id: ItemId) -> bool {
        if !self.index.remove(&id) {
            return false;
        }
        self.entries.retain(|e| e.id != id);
        true
    }

    /// Heart-icon behavior. Returns whether the item is saved afterwards.
    pub fn toggle(&mut self, item: &CatalogItem) -> bool {
        if self.contains(item.id) {
            self.remove(item.id);
            false
        } else {
            self.add(item)
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&WishlistEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[WishlistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
