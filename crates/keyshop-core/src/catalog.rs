//! Catalog Items
//!
//! Typed catalog records and the normalization of the backend's `ApiItem`
//! payload into them.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::wire;

/// Image shown when an item has none
pub const PLACEHOLDER_IMAGE: &str = "/placeholder-game.jpg";

/// Platform assumed when the backend omits one
pub const DEFAULT_PLATFORM: &str = "steam";

/// Catalog item identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemId(u64);

impl ItemId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Ids arrive as numbers from some endpoints and numeric strings from others.
impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .map(Self)
                .ok_or_else(|| de::Error::custom(format!("invalid item id {n}"))),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Self)
                .map_err(|_| de::Error::custom(format!("invalid item id {s:?}"))),
            other => Err(de::Error::custom(format!("expected item id, found {other}"))),
        }
    }
}

/// Item artwork: one image or a gallery
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    SingleImage(String),
    ImageList(Vec<String>),
}

impl ImageRef {
    /// Build from resolved paths; an empty list yields the placeholder.
    pub fn from_paths(mut paths: Vec<String>) -> Self {
        match paths.len() {
            0 => Self::SingleImage(PLACEHOLDER_IMAGE.into()),
            1 => Self::SingleImage(paths.remove(0)),
            _ => Self::ImageList(paths),
        }
    }

    /// The image used on cards, cart rows and inventory entries
    pub fn primary(&self) -> &str {
        match self {
            Self::SingleImage(path) => path,
            Self::ImageList(paths) => paths.first().map_or(PLACEHOLDER_IMAGE, String::as_str),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        match self {
            Self::SingleImage(path) => vec![path.as_str()],
            Self::ImageList(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

impl Default for ImageRef {
    fn default() -> Self {
        Self::SingleImage(PLACEHOLDER_IMAGE.into())
    }
}

/// A purchasable game key listing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,

    pub title: String,

    pub description: Option<String>,

    pub image: ImageRef,

    /// Storefront the key redeems on (steam, epic, ...)
    pub platform: String,

    pub price: Decimal,

    /// Pre-discount price, present only for items on sale
    pub original_price: Option<Decimal>,

    /// Discount label such as "-25%"
    pub discount: Option<String>,

    pub tags: Vec<String>,

    pub category: Option<String>,

    pub is_new: bool,

    pub is_best_seller: bool,
}

impl CatalogItem {
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            image: ImageRef::default(),
            platform: DEFAULT_PLATFORM.into(),
            price,
            original_price: None,
            discount: None,
            tags: Vec::new(),
            category: None,
            is_new: false,
            is_best_seller: false,
        }
    }

    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = image;
        self
    }

    #[must_use]
    pub fn with_original_price(mut self, original: Decimal, discount: impl Into<String>) -> Self {
        self.original_price = Some(original);
        self.discount = Some(discount.into());
        self
    }

    pub fn image_url(&self) -> &str {
        self.image.primary()
    }

    pub const fn is_on_sale(&self) -> bool {
        self.original_price.is_some()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Item record as the backend sends it
#[derive(Clone, Debug, Deserialize)]
pub struct ApiItem {
    #[serde(alias = "id")]
    pub game_id: ItemId,

    #[serde(default, alias = "title")]
    pub game_name: Option<String>,

    #[serde(default, alias = "description")]
    pub game_description: Option<String>,

    #[serde(default, alias = "price", deserialize_with = "wire::lenient_decimal")]
    pub game_price: Decimal,

    #[serde(default)]
    pub game_image: Option<Value>,

    /// Fallback image field used by older records
    #[serde(default)]
    pub image: Option<Value>,

    #[serde(default, alias = "tags")]
    pub game_tag: Option<Value>,

    #[serde(default)]
    pub platform: Option<String>,

    #[serde(default, rename = "originalPrice", deserialize_with = "wire::lenient_opt_decimal")]
    pub original_price: Option<Decimal>,

    #[serde(default)]
    pub discount: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default, rename = "isNew", deserialize_with = "wire::lenient_bool")]
    pub is_new: bool,

    #[serde(default, rename = "isBestSeller", deserialize_with = "wire::lenient_bool")]
    pub is_best_seller: bool,
}

impl ApiItem {
    /// Normalize into a `CatalogItem`, resolving upload paths against `asset_base`.
    pub fn normalize(self, asset_base: &str) -> CatalogItem {
        let mut paths = self
            .game_image
            .as_ref()
            .map(wire::image_paths_from_value)
            .unwrap_or_default();
        if paths.is_empty() {
            paths = self
                .image
                .as_ref()
                .map(wire::image_paths_from_value)
                .unwrap_or_default();
        }
        let paths = paths
            .iter()
            .map(|p| wire::resolve_asset(p, asset_base))
            .collect();

        CatalogItem {
            id: self.game_id,
            title: self
                .game_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown Game".into()),
            description: self.game_description.filter(|d| !d.is_empty()),
            image: ImageRef::from_paths(paths),
            platform: self
                .platform
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PLATFORM.into()),
            price: self.game_price,
            original_price: self.original_price,
            discount: self.discount.filter(|d| !d.is_empty()),
            tags: self
                .game_tag
                .as_ref()
                .map(wire::tags_from_value)
                .unwrap_or_default(),
            category: self.category,
            is_new: self.is_new,
            is_best_seller: self.is_best_seller,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const ASSETS: &str = "http://localhost:3002";

    #[test]
    fn test_normalize_gallery_item() {
        let raw: ApiItem = serde_json::from_value(json!({
            "game_id": 7,
            "game_name": "Hollow Knight",
            "game_price": "199.00",
            "game_image": "[\"uploads/games/hk/1.jpg\",\"uploads/games/hk/2.jpg\"]",
            "game_tag": "metroidvania, indie"
        }))
        .unwrap();

        let item = raw.normalize(ASSETS);
        assert_eq!(item.id, ItemId::new(7));
        assert_eq!(item.price, dec!(199.00));
        assert_eq!(item.platform, "steam");
        assert_eq!(item.image_url(), "http://localhost:3002/uploads/games/hk/1.jpg");
        assert_eq!(item.image.all().len(), 2);
        assert!(item.has_tag("Indie"));
        assert!(!item.is_on_sale());
    }

    #[test]
    fn test_normalize_sparse_item() {
        let raw: ApiItem = serde_json::from_value(json!({
            "game_id": "12",
            "game_price": "oops",
            "isNew": null
        }))
        .unwrap();

        let item = raw.normalize(ASSETS);
        assert_eq!(item.id, ItemId::new(12));
        assert_eq!(item.title, "Unknown Game");
        assert_eq!(item.price, Decimal::ZERO);
        assert_eq!(item.image, ImageRef::SingleImage(PLACEHOLDER_IMAGE.into()));
        assert!(!item.is_new);
    }

    #[test]
    fn test_image_ref_serializes_untagged() {
        let single = serde_json::to_value(ImageRef::SingleImage("a.jpg".into())).unwrap();
        assert_eq!(single, json!("a.jpg"));

        let list: ImageRef = serde_json::from_value(json!(["a.jpg", "b.jpg"])).unwrap();
        assert_eq!(list.primary(), "a.jpg");
    }
}
