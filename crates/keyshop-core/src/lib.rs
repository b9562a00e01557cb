//! # keyshop-core
//!
//! Storefront state for a game-key shop: catalog records, cart, wishlist
//! and the authenticated session, plus the seams to the outside world.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        keyshop-core                           │
//! │  ┌──────────┐  ┌──────────┐  ┌────────────────┐               │
//! │  │   Cart   │  │ Wishlist │  │ SessionContext │               │
//! │  └──────────┘  └──────────┘  └───────┬────────┘               │
//! │                                      │                        │
//! │                    ┌─────────────────┴──────────┐             │
//! │                    │ StoreApi      LocalStore   │             │
//! │                    │ (Strategy)    (key/value)  │             │
//! │                    └────────────────────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! `StoreApi` hides the backend (HTTP in production, `MockStoreApi` in
//! tests). `LocalStore` hides where the session snapshot and inventory
//! ledger are kept.

pub mod api;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod session;
pub mod store;
pub mod wire;
pub mod wishlist;

pub use api::{Credentials, MockStoreApi, Registration, RemoteUser, StoreApi, UserUpdate};
pub use cart::{Cart, CartItem, MAX_QUANTITY};
pub use catalog::{ApiItem, CatalogItem, ImageRef, ItemId};
pub use error::{Result, StoreError};
pub use session::{SessionContext, UserId, UserSession};
pub use store::{FileLocalStore, LocalStore, MemoryLocalStore};
pub use wishlist::{Wishlist, WishlistEntry};
