//! Storefront
//!
//! One value owning everything a shopper touches: session, cart, wishlist,
//! inventory and the checkout pipeline. Construct it once and share it.

use std::sync::Arc;

use keyshop_core::{
    Cart, CatalogItem, Credentials, ItemId, LocalStore, Registration, Result, SessionContext, StoreApi, StoreError,
    UserSession, Wishlist, WishlistEntry,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::checkout::{CheckoutPipeline, CheckoutReceipt};
use crate::inventory::{InventoryEntry, InventoryLedger};

pub struct Storefront {
    api: Arc<dyn StoreApi>,
    session: SessionContext,
    cart: RwLock<Cart>,
    wishlist: RwLock<Wishlist>,
    ledger: InventoryLedger,
    pipeline: CheckoutPipeline,
}

impl Storefront {
    /// Restores the session from `store`; cart and wishlist start empty.
    pub fn new(api: Arc<dyn StoreApi>, store: Arc<dyn LocalStore>) -> Self {
        let ledger = InventoryLedger::new(store.clone());
        Self {
            session: SessionContext::restore(store),
            cart: RwLock::new(Cart::new()),
            wishlist: RwLock::new(Wishlist::new()),
            pipeline: CheckoutPipeline::new(api.clone(), ledger.clone()),
            ledger,
            api,
        }
    }

    pub fn api(&self) -> &dyn StoreApi {
        self.api.as_ref()
    }

    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    // --- Catalog ---

    pub async fn catalog(&self) -> Result<Vec<CatalogItem>> {
        self.api.list_items().await
    }

    pub async fn item(&self, id: ItemId) -> Result<CatalogItem> {
        self.api.get_item(id).await
    }

    pub async fn search(&self, name: &str) -> Result<Vec<CatalogItem>> {
        self.api.search_items(name).await
    }

    pub async fn price_range(&self, min: Decimal, max: Decimal) -> Result<Vec<CatalogItem>> {
        if min > max {
            return Err(StoreError::InvalidInput(format!("min price {min} is above max price {max}")));
        }
        self.api.items_in_price_range(min, max).await
    }

    // --- Session ---

    pub async fn current_user(&self) -> Option<UserSession> {
        self.session.current().await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<UserSession> {
        self.session.login(self.api(), credentials).await
    }

    pub async fn register(&self, registration: &Registration) -> Result<UserSession> {
        self.session.register(self.api(), registration).await
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub async fn refresh_balance(&self) -> Result<Decimal> {
        self.session.refresh_balance(self.api()).await
    }

    // --- Cart ---

    /// Snapshot of the cart
    pub async fn cart(&self) -> Cart {
        self.cart.read().await.clone()
    }

    pub async fn add_to_cart(&self, item: CatalogItem) -> Cart {
        let mut cart = self.cart.write().await;
        tracing::debug!(item_id = %item.id, "Add to cart");
        cart.add_item(item);
        cart.clone()
    }

    /// Fetch the item from the backend, then add it
    pub async fn add_to_cart_by_id(&self, id: ItemId) -> Result<Cart> {
        let item = self.api.get_item(id).await?;
        Ok(self.add_to_cart(item).await)
    }

    pub async fn remove_from_cart(&self, id: ItemId) -> Cart {
        let mut cart = self.cart.write().await;
        cart.remove_item(id);
        cart.clone()
    }

    pub async fn update_quantity(&self, id: ItemId, quantity: i64) -> Result<Cart> {
        let mut cart = self.cart.write().await;
        cart.update_quantity(id, quantity)?;
        Ok(cart.clone())
    }

    pub async fn clear_cart(&self) -> Cart {
        let mut cart = self.cart.write().await;
        cart.clear();
        cart.clone()
    }

    pub async fn open_cart(&self) -> bool {
        let mut cart = self.cart.write().await;
        cart.open();
        cart.is_open()
    }

    pub async fn close_cart(&self) -> bool {
        let mut cart = self.cart.write().await;
        cart.close();
        cart.is_open()
    }

    pub async fn toggle_cart(&self) -> bool {
        let mut cart = self.cart.write().await;
        cart.toggle();
        cart.is_open()
    }

    // --- Wishlist ---

    pub async fn wishlist(&self) -> Vec<WishlistEntry> {
        self.wishlist.read().await.entries().to_vec()
    }

    pub async fn is_wishlisted(&self, id: ItemId) -> bool {
        self.wishlist.read().await.contains(id)
    }

    /// Returns `true` when the item is now on the wishlist
    pub async fn toggle_wishlist(&self, item: &CatalogItem) -> bool {
        self.wishlist.write().await.toggle(item)
    }

    /// The item lookup runs without holding the wishlist lock
    pub async fn toggle_wishlist_by_id(&self, id: ItemId) -> Result<bool> {
        if self.wishlist.write().await.remove(id) {
            return Ok(false);
        }
        let item = self.api.get_item(id).await?;
        self.wishlist.write().await.add(&item);
        Ok(true)
    }

    pub async fn remove_from_wishlist(&self, id: ItemId) -> bool {
        self.wishlist.write().await.remove(id)
    }

    pub async fn clear_wishlist(&self) {
        self.wishlist.write().await.clear();
    }

    /// Put a wishlisted item in the cart. The wishlist entry is kept.
    pub async fn move_wishlist_to_cart(&self, id: ItemId) -> Result<Cart> {
        let item = self
            .wishlist
            .read()
            .await
            .get(id)
            .map(CatalogItem::from)
            .ok_or_else(|| StoreError::NotFound(format!("Item {id} is not on the wishlist")))?;
        Ok(self.add_to_cart(item).await)
    }

    // --- Checkout & inventory ---

    pub async fn checkout(&self) -> crate::Result<CheckoutReceipt> {
        self.pipeline.run(&self.session, &self.cart).await
    }

    pub fn is_checking_out(&self) -> bool {
        self.pipeline.is_in_flight()
    }

    pub fn inventory(&self) -> Vec<InventoryEntry> {
        self.ledger.load()
    }
}
