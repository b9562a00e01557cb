//! Inventory Ledger
//!
//! Purchased license keys, kept in the local store as one JSON array under
//! `keys::INVENTORY`. Earlier writers used different shapes, so reading is
//! lenient: a blob that is not an array reads as empty and elements that do
//! not decode are skipped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyshop_core::cart::CartItem;
use keyshop_core::catalog::DEFAULT_PLATFORM;
use keyshop_core::store::keys;
use keyshop_core::{ItemId, LocalStore, Result, wire};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::license::LicenseKey;

fn default_platform() -> String {
    DEFAULT_PLATFORM.to_string()
}

/// One owned license key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    #[serde(deserialize_with = "wire::id_string")]
    pub id: String,

    /// Missing in entries written before item ids were recorded
    #[serde(rename = "itemId", default)]
    pub item_id: Option<ItemId>,

    #[serde(rename = "gameName", default)]
    pub item_name: String,

    #[serde(rename = "gameImage", default)]
    pub item_image: String,

    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(rename = "cdKey")]
    pub license_key: LicenseKey,

    #[serde(rename = "purchaseDate", default)]
    pub purchased_at: DateTime<Utc>,
}

impl InventoryEntry {
    /// Mint a fresh entry for one purchased unit of `line`
    pub fn mint(line: &CartItem, purchased_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            item_id: Some(line.id()),
            item_name: line.item.title.clone(),
            item_image: line.item.image_url().to_string(),
            platform: line.item.platform.clone(),
            license_key: LicenseKey::generate(),
            purchased_at,
        }
    }
}

/// One entry per unit, in cart order, all sharing one timestamp
pub fn mint_entries(lines: &[CartItem], purchased_at: DateTime<Utc>) -> Vec<InventoryEntry> {
    lines
        .iter()
        .flat_map(|line| (0..line.quantity).map(move |_| InventoryEntry::mint(line, purchased_at)))
        .collect()
}

/// Reader/writer for the persisted inventory
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn LocalStore>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// All readable entries. Never fails; unreadable data reads as empty.
    pub fn load(&self) -> Vec<InventoryEntry> {
        self.read().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Inventory unavailable");
            Vec::new()
        })
    }

    /// Like `load`, but a failed store read is an error rather than an empty ledger
    fn read(&self) -> Result<Vec<InventoryEntry>> {
        Ok(self.store.get(keys::INVENTORY)?.map(|raw| decode(&raw)).unwrap_or_default())
    }

    /// Append `entries` and write the whole ledger back in a single set.
    /// Returns the new ledger length. Nothing is written when the existing
    /// ledger cannot be read.
    pub fn append(&self, entries: &[InventoryEntry]) -> Result<usize> {
        let mut all = self.read()?;
        all.extend_from_slice(entries);

        let raw = serde_json::to_string(&all)?;
        self.store.set(keys::INVENTORY, &raw)?;

        tracing::debug!(added = entries.len(), total = all.len(), "Inventory written");
        Ok(all.len())
    }

    /// Look up an entry by its license key
    pub fn find_by_key(&self, key: &str) -> Option<InventoryEntry> {
        let key = LicenseKey::from_string(key);
        self.load().into_iter().find(|e| e.license_key == key)
    }

    /// Entries bought for one catalog item
    pub fn for_item(&self, id: ItemId) -> Vec<InventoryEntry> {
        self.load()
            .into_iter()
            .filter(|e| e.item_id == Some(id))
            .collect()
    }
}

fn decode(raw: &str) -> Vec<InventoryEntry> {
    let elements = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(elements)) => elements,
        Ok(_) => {
            tracing::warn!("Inventory is not a list, treating as empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Inventory is not valid JSON, treating as empty");
            return Vec::new();
        }
    };

    let total = elements.len();
    let entries: Vec<InventoryEntry> = elements
        .into_iter()
        .filter_map(|element| serde_json::from_value(element).ok())
        .collect();

    if entries.len() < total {
        tracing::warn!(skipped = total - entries.len(), "Skipped unreadable inventory entries");
    }
    entries
}
