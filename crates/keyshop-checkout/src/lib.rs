//! # keyshop-checkout
//!
//! Purchase flow for keyshop: debit the remote balance, mint one license
//! key per unit, persist them to the local inventory.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ validate │──▶│ PUT balance  │──▶│ GET user     │──▶│ mint + store │
//! │ (local)  │   │ (point of no │   │ (fallback to │   │ keys, clear  │
//! │          │   │  return)     │   │  local calc) │   │ cart         │
//! └──────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Only one checkout runs at a time per `CheckoutPipeline`; an overlapping
//! call fails with `CheckoutError::InFlight`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keyshop_checkout::Storefront;
//! use keyshop_core::{Credentials, FileLocalStore, ItemId, MockStoreApi};
//!
//! let shop = Storefront::new(Arc::new(MockStoreApi::new()), Arc::new(FileLocalStore::from_env()));
//! shop.login(&Credentials { username: "demo".into(), password: "demo".into() }).await?;
//! shop.add_to_cart_by_id(ItemId::new(2)).await?;
//!
//! let receipt = shop.checkout().await?;
//! for entry in &receipt.entries {
//!     println!("{}: {}", entry.item_name, entry.license_key);
//! }
//! ```

pub mod checkout;
pub mod error;
pub mod inventory;
pub mod license;
pub mod storefront;

pub use checkout::{CheckoutPipeline, CheckoutReceipt};
pub use error::{CheckoutError, Result, ValidationFailure};
pub use inventory::{InventoryEntry, InventoryLedger};
pub use license::LicenseKey;
pub use storefront::Storefront;
