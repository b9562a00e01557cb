//! Checkout Pipeline
//!
//! Turns the cart into owned license keys:
//!
//! 1. validate: logged in, cart not empty, quantities within
//!    `MAX_QUANTITY`, balance covers the total
//! 2. debit the remote balance (`PUT /users/{id}`)
//! 3. refresh the session from the backend
//! 4. mint one key per unit and append them to the inventory
//! 5. clear and close the cart
//!
//! Nothing is mutated before step 2 succeeds. The cart stays write-locked
//! for the whole run, so it cannot change between the debit and the mint.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use keyshop_core::{Cart, MAX_QUANTITY, SessionContext, StoreApi, UserUpdate};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{CheckoutError, Result, ValidationFailure};
use crate::inventory::{InventoryEntry, InventoryLedger, mint_entries};

/// Outcome of a successful checkout
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutReceipt {
    /// Newly minted entries, in cart order
    pub entries: Vec<InventoryEntry>,

    /// Amount debited
    pub charged: Decimal,

    /// Balance after the debit
    pub balance: Decimal,
}

/// Releases the in-flight flag when the run ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs checkouts one at a time
pub struct CheckoutPipeline {
    api: Arc<dyn StoreApi>,
    ledger: InventoryLedger,
    in_flight: AtomicBool,
}

impl CheckoutPipeline {
    pub fn new(api: Arc<dyn StoreApi>, ledger: InventoryLedger) -> Self {
        Self {
            api,
            ledger,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn claim(&self) -> Result<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlightGuard(&self.in_flight))
            .map_err(|_| CheckoutError::InFlight)
    }

    /// Purchase everything in `cart` for the current session user
    pub async fn run(&self, session: &SessionContext, cart: &RwLock<Cart>) -> Result<CheckoutReceipt> {
        let _guard = self.claim()?;

        let user = session.current().await.ok_or(CheckoutError::Unauthenticated)?;
        let mut cart = cart.write().await;

        if cart.is_empty() {
            return Err(ValidationFailure::EmptyCart.into());
        }

        // A deserialized cart can carry lines the cart API would have refused
        if let Some(line) = cart.items().iter().find(|l| l.quantity == 0 || l.quantity > MAX_QUANTITY) {
            tracing::warn!(user_id = %user.id, item_id = %line.id(), quantity = line.quantity, "Checkout refused: quantity out of range");
            return Err(ValidationFailure::QuantityLimit {
                item: line.id(),
                quantity: line.quantity,
                limit: MAX_QUANTITY,
            }
            .into());
        }

        let total = cart.total_price();
        if total > user.balance {
            tracing::info!(user_id = %user.id, %total, balance = %user.balance, "Checkout refused: insufficient balance");
            return Err(ValidationFailure::InsufficientBalance {
                needed: total,
                available: user.balance,
            }
            .into());
        }

        let new_balance = user.balance - total;
        self.api
            .update_user(&user.id, &UserUpdate::balance(new_balance))
            .await
            .map_err(|e| {
                tracing::warn!(user_id = %user.id, error = %e, "Balance debit failed");
                CheckoutError::Transport(e)
            })?;

        // The debit went through; from here on the purchase is not rolled back.
        let balance = match session.refresh_balance(self.api.as_ref()).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Session refresh failed, using computed balance");
                if let Err(e) = session.set_balance(new_balance).await {
                    tracing::warn!(error = %e, "Could not update cached balance");
                }
                new_balance
            }
        };

        let entries = mint_entries(cart.items(), Utc::now());
        self.ledger.append(&entries).map_err(|e| {
            tracing::error!(user_id = %user.id, charged = %total, keys = entries.len(), error = %e, "Inventory write failed after debit");
            CheckoutError::Persistence(e)
        })?;

        cart.clear();
        cart.close();

        tracing::info!(user_id = %user.id, charged = %total, %balance, keys = entries.len(), "Checkout complete");
        Ok(CheckoutReceipt {
            entries,
            charged: total,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use keyshop_core::store::keys;
    use keyshop_core::{CatalogItem, Credentials, ItemId, LocalStore, MemoryLocalStore, MockStoreApi, StoreError, UserId};
    use rust_decimal_macros::dec;

    /// Local store whose inventory writes always fail
    struct ReadOnlyInventory(MemoryLocalStore);

    impl LocalStore for ReadOnlyInventory {
        fn get(&self, key: &str) -> keyshop_core::Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> keyshop_core::Result<()> {
            if key == keys::INVENTORY {
                return Err(StoreError::Storage("disk full".into()));
            }
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> keyshop_core::Result<()> {
            self.0.remove(key)
        }
    }

    struct Fixture {
        api: Arc<MockStoreApi>,
        ledger: InventoryLedger,
        session: Arc<SessionContext>,
        cart: Arc<RwLock<Cart>>,
        pipeline: Arc<CheckoutPipeline>,
    }

    fn demo_id() -> UserId {
        UserId::from_string("1")
    }

    async fn fixture_with(api: MockStoreApi, store: Arc<dyn LocalStore>, balance: Decimal) -> Fixture {
        let api = Arc::new(api);
        api.set_balance(&demo_id(), balance).await;

        let session = Arc::new(SessionContext::restore(store.clone()));
        session
            .login(
                api.as_ref(),
                &Credentials {
                    username: "demo".into(),
                    password: "demo".into(),
                },
            )
            .await
            .unwrap();

        let ledger = InventoryLedger::new(store);
        Fixture {
            pipeline: Arc::new(CheckoutPipeline::new(api.clone(), ledger.clone())),
            api,
            ledger,
            session,
            cart: Arc::new(RwLock::new(Cart::new())),
        }
    }

    async fn fixture(balance: Decimal) -> Fixture {
        fixture_with(MockStoreApi::new(), Arc::new(MemoryLocalStore::new()), balance).await
    }

    impl Fixture {
        async fn add(&self, id: u64, price: Decimal, times: usize) {
            let mut cart = self.cart.write().await;
            for _ in 0..times {
                cart.add_item(CatalogItem::new(id, format!("Game {id}"), price));
            }
        }

        async fn checkout(&self) -> Result<CheckoutReceipt> {
            self.pipeline.run(&self.session, &self.cart).await
        }

        async fn cached_balance(&self) -> Decimal {
            self.session.current().await.unwrap().balance
        }
    }

    #[tokio::test]
    async fn test_successful_checkout() {
        let f = fixture(dec!(250)).await;
        f.add(1, dec!(50), 2).await;
        f.add(2, dec!(100), 1).await;
        f.cart.write().await.open();

        let receipt = f.checkout().await.unwrap();

        assert_eq!(receipt.charged, dec!(200));
        assert_eq!(receipt.balance, dec!(50));
        assert_eq!(receipt.entries.len(), 3);
        assert_eq!(f.api.balance_of(&demo_id()).await, Some(dec!(50)));
        assert_eq!(f.cached_balance().await, dec!(50));

        let cart = f.cart.read().await;
        assert!(cart.is_empty());
        assert!(!cart.is_open());

        let ledger = f.ledger.load();
        assert_eq!(ledger, receipt.entries);
        let first_item = ledger.iter().filter(|e| e.item_name == "Game 1").count();
        assert_eq!(first_item, 2);

        let keys: std::collections::HashSet<_> = ledger.iter().map(|e| e.license_key.clone()).collect();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn test_exact_balance_is_enough() {
        let f = fixture(dec!(100)).await;
        f.add(1, dec!(100), 1).await;

        let receipt = f.checkout().await.unwrap();
        assert_eq!(receipt.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_insufficient_balance_changes_nothing() {
        let f = fixture(dec!(100)).await;
        f.add(1, dec!(80), 2).await;

        let err = f.checkout().await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationFailure::InsufficientBalance { needed, available })
                if needed == dec!(160) && available == dec!(100)
        ));

        assert_eq!(f.api.update_calls(), 0);
        assert_eq!(f.api.balance_of(&demo_id()).await, Some(dec!(100)));
        assert_eq!(f.cart.read().await.total_items(), 2);
        assert!(f.ledger.load().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let f = fixture(dec!(100)).await;

        let err = f.checkout().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(ValidationFailure::EmptyCart)));
        assert_eq!(f.api.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_logged_out_is_rejected() {
        let f = fixture(dec!(100)).await;
        f.add(1, dec!(10), 1).await;
        f.session.logout().await;

        let err = f.checkout().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Unauthenticated));
        assert_eq!(err.redirect(), Some("/login"));
        assert_eq!(f.cart.read().await.total_items(), 1);
    }

    #[tokio::test]
    async fn test_failed_debit_is_repeatable() {
        let f = fixture(dec!(500)).await;
        f.add(1, dec!(120), 1).await;
        f.api.fail_updates(true);

        for _ in 0..2 {
            let err = f.checkout().await.unwrap_err();
            assert!(matches!(err, CheckoutError::Transport(_)));
            assert!(err.is_retryable());
        }

        assert_eq!(f.api.update_calls(), 2);
        assert_eq!(f.api.balance_of(&demo_id()).await, Some(dec!(500)));
        assert_eq!(f.cached_balance().await, dec!(500));
        assert_eq!(f.cart.read().await.total_price(), dec!(120));
        assert!(f.ledger.load().is_empty());
        assert!(!f.pipeline.is_in_flight());

        f.api.fail_updates(false);
        assert!(f.checkout().await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_failure_uses_computed_balance() {
        let f = fixture(dec!(300)).await;
        f.add(1, dec!(100), 1).await;
        f.api.fail_reads(true);

        let receipt = f.checkout().await.unwrap();

        assert_eq!(receipt.balance, dec!(200));
        assert_eq!(f.cached_balance().await, dec!(200));
        assert_eq!(f.ledger.load().len(), 1);
    }

    #[tokio::test]
    async fn test_inventory_failure_after_debit() {
        let store = Arc::new(ReadOnlyInventory(MemoryLocalStore::new()));
        let f = fixture_with(MockStoreApi::new(), store, dec!(300)).await;
        f.add(1, dec!(100), 1).await;

        let err = f.checkout().await.unwrap_err();

        assert!(matches!(err, CheckoutError::Persistence(_)));
        assert!(!err.is_retryable());
        // Charged, but the cart is kept so the purchase is not silently lost
        assert_eq!(f.api.balance_of(&demo_id()).await, Some(dec!(200)));
        assert_eq!(f.cart.read().await.total_items(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_inventory_is_replaced() {
        let store = Arc::new(MemoryLocalStore::new());
        store.set(keys::INVENTORY, "][").unwrap();
        let f = fixture_with(MockStoreApi::new(), store, dec!(300)).await;
        f.add(1, dec!(100), 2).await;

        let receipt = f.checkout().await.unwrap();
        assert_eq!(f.ledger.load(), receipt.entries);
    }

    #[tokio::test]
    async fn test_overlapping_checkout_is_rejected() {
        let api = MockStoreApi::new().with_latency(Duration::from_millis(100));
        let f = fixture_with(api, Arc::new(MemoryLocalStore::new()), dec!(300)).await;
        f.add(1, dec!(100), 1).await;

        let first = {
            let (pipeline, session, cart) = (f.pipeline.clone(), f.session.clone(), f.cart.clone());
            tokio::spawn(async move { pipeline.run(&session, &cart).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.pipeline.is_in_flight());

        let second = f.checkout().await;
        assert!(matches!(second, Err(CheckoutError::InFlight)));

        let receipt = first.await.unwrap().unwrap();
        assert_eq!(receipt.entries.len(), 1);
        assert_eq!(f.api.update_calls(), 1);
        assert_eq!(f.api.balance_of(&demo_id()).await, Some(dec!(200)));
        assert!(!f.pipeline.is_in_flight());
    }

    #[tokio::test]
    async fn test_oversized_free_line_is_rejected_before_debit() {
        let f = fixture(dec!(0)).await;
        f.add(6, Decimal::ZERO, 1).await;

        let err = f
            .cart
            .write()
            .await
            .update_quantity(ItemId::new(6), i64::from(u32::MAX))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        // Same line smuggled in through a stored cart
        let mut raw = serde_json::to_value(&*f.cart.read().await).unwrap();
        raw["items"][0]["quantity"] = serde_json::json!(u32::MAX);
        *f.cart.write().await = serde_json::from_value(raw).unwrap();

        let err = f.checkout().await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationFailure::QuantityLimit { quantity, limit, .. })
                if quantity == u32::MAX && limit == MAX_QUANTITY
        ));
        assert_eq!(f.api.update_calls(), 0);
        assert!(f.ledger.load().is_empty());
        assert_eq!(f.cart.read().await.items().len(), 1);
    }

    #[tokio::test]
    async fn test_free_line_at_limit_mints_limit_keys() {
        let f = fixture(dec!(0)).await;
        f.add(6, Decimal::ZERO, MAX_QUANTITY as usize + 5).await;

        let receipt = f.checkout().await.unwrap();
        assert_eq!(receipt.entries.len(), MAX_QUANTITY as usize);
        assert_eq!(receipt.charged, Decimal::ZERO);
    }
}
