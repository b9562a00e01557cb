//! Application State

use std::sync::Arc;

use keyshop_checkout::Storefront;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Session, cart, wishlist, inventory and checkout for the local shopper
    pub shop: Arc<Storefront>,
}

impl AppState {
    pub fn new(shop: Storefront) -> Self {
        Self { shop: Arc::new(shop) }
    }
}
