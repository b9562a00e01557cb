//! Mock Store API
//!
//! For testing and demo purposes. Holds users and a static catalog in memory
//! and can be told to fail or to respond slowly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use super::{Credentials, Registration, RemoteUser, StoreApi, UserUpdate};
use crate::catalog::{CatalogItem, ItemId};
use crate::error::{Result, StoreError};
use crate::session::UserId;

struct Account {
    user: RemoteUser,
    password: String,
}

/// In-memory stand-in for the backend
pub struct MockStoreApi {
    accounts: RwLock<HashMap<UserId, Account>>,
    items: RwLock<Vec<CatalogItem>>,
    latency: Duration,
    fail_updates: AtomicBool,
    fail_reads: AtomicBool,
    update_calls: AtomicUsize,
}

impl Default for MockStoreApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStoreApi {
    /// Demo backend: one user (`demo` / `demo`, balance 1000) and a small catalog
    pub fn new() -> Self {
        let demo = demo_user();
        let mut accounts = HashMap::new();
        accounts.insert(
            demo.id.clone(),
            Account {
                user: demo,
                password: "demo".into(),
            },
        );

        Self {
            accounts: RwLock::new(accounts),
            items: RwLock::new(demo_catalog()),
            ..Self::empty()
        }
    }

    /// No users, no items
    pub fn empty() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            items: RwLock::new(Vec::new()),
            latency: Duration::ZERO,
            fail_updates: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every user request (for testing overlapping checkouts)
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn insert_user(&self, user: RemoteUser, password: impl Into<String>) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(
            user.id.clone(),
            Account {
                user,
                password: password.into(),
            },
        );
    }

    pub async fn insert_item(&self, item: CatalogItem) {
        let mut items = self.items.write().await;
        items.retain(|i| i.id != item.id);
        items.push(item);
    }

    pub async fn set_balance(&self, id: &UserId, balance: Decimal) {
        if let Some(account) = self.accounts.write().await.get_mut(id) {
            account.user.balance = balance;
        }
    }

    pub async fn balance_of(&self, id: &UserId) -> Option<Decimal> {
        self.accounts.read().await.get(id).map(|a| a.user.balance)
    }

    /// Make `update_user` fail with a 500
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make `get_user` fail with a 503
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of `update_user` calls received, failed ones included
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl StoreApi for MockStoreApi {
    async fn get_user(&self, id: &UserId) -> Result<RemoteUser> {
        self.delay().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                message: "mock read failure".into(),
            });
        }
        self.accounts
            .read()
            .await
            .get(id)
            .map(|a| a.user.clone())
            .ok_or_else(|| StoreError::NotFound(format!("User {id}")))
    }

    async fn update_user(&self, id: &UserId, update: &UserUpdate) -> Result<RemoteUser> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 500,
                message: "mock update failure".into(),
            });
        }

        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("User {id}")))?;

        if let Some(username) = &update.username {
            account.user.username.clone_from(username);
        }
        if let Some(email) = &update.email {
            account.user.email.clone_from(email);
        }
        if let Some(balance) = update.balance {
            account.user.balance = balance;
        }
        Ok(account.user.clone())
    }

    async fn login(&self, credentials: &Credentials) -> Result<RemoteUser> {
        self.delay().await;
        self.accounts
            .read()
            .await
            .values()
            .find(|a| {
                (a.user.username == credentials.username || a.user.email == credentials.username)
                    && a.password == credentials.password
            })
            .map(|a| a.user.clone())
            .ok_or_else(|| StoreError::Auth("invalid username or password".into()))
    }

    async fn register(&self, registration: &Registration) -> Result<RemoteUser> {
        self.delay().await;
        let mut accounts = self.accounts.write().await;

        let taken = accounts.values().any(|a| {
            a.user.username == registration.username || a.user.email == registration.email
        });
        if taken {
            return Err(StoreError::Api {
                status: 409,
                message: "username or email already registered".into(),
            });
        }

        let user = RemoteUser {
            id: UserId::from_string((accounts.len() + 1).to_string()),
            username: registration.username.clone(),
            email: registration.email.clone(),
            balance: Decimal::ZERO,
        };
        accounts.insert(
            user.id.clone(),
            Account {
                user: user.clone(),
                password: registration.password.clone(),
            },
        );
        Ok(user)
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>> {
        Ok(self.items.read().await.clone())
    }

    async fn get_item(&self, id: ItemId) -> Result<CatalogItem> {
        self.delay().await;
        self.items
            .read()
            .await
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Item {id}")))
    }

    async fn health_check(&self) -> bool {
        true // Mock always healthy
    }

    fn name(&self) -> &str {
        "MockStore"
    }
}

fn demo_user() -> RemoteUser {
    RemoteUser {
        id: UserId::from_string("1"),
        username: "demo".into(),
        email: "demo@example.com".into(),
        balance: dec!(1000),
    }
}

fn demo_catalog() -> Vec<CatalogItem> {
    vec![
        CatalogItem::new(1, "Elden Ring", dec!(1590)),
        CatalogItem::new(2, "Hades", dec!(299)).with_original_price(dec!(399), "-25%"),
        CatalogItem::new(3, "Stardew Valley", dec!(239)),
        CatalogItem::new(4, "Forza Horizon 5", dec!(1099)).with_platform("xbox"),
        CatalogItem::new(5, "Alan Wake 2", dec!(1190)).with_platform("epic"),
    ]
}
