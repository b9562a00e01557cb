//! Remote Store API
//!
//! The backend is an opaque REST collaborator. `StoreApi` is the seam the
//! storefront talks through, so the HTTP client and the in-memory mock are
//! interchangeable.

mod mock;

pub use mock::MockStoreApi;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use crate::catalog::{CatalogItem, ItemId};
use crate::error::Result;
use crate::session::UserId;
use crate::wire;

/// User record as returned by `GET /users/{id}`
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RemoteUser {
    #[serde(alias = "user_id")]
    pub id: UserId,

    #[serde(default, alias = "name")]
    pub username: String,

    #[serde(default)]
    pub email: String,

    /// Sent as a numeric string; garbage reads as zero
    #[serde(default, deserialize_with = "wire::lenient_decimal")]
    pub balance: Decimal,
}

fn balance_as_number<S: Serializer>(balance: &Option<Decimal>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match balance {
        Some(balance) => rust_decimal::serde::float::serialize(balance, serializer),
        None => serializer.serialize_none(),
    }
}

/// Body for `PUT /users/{id}`; absent fields are left untouched remotely
#[derive(Clone, Debug, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "balance_as_number")]
    pub balance: Option<Decimal>,
}

impl UserUpdate {
    pub fn balance(balance: Decimal) -> Self {
        Self {
            balance: Some(balance),
            ..Default::default()
        }
    }
}

/// Login request. `username` may also be an email address.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Registration request
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Remote API client trait (Strategy pattern)
#[async_trait]
pub trait StoreApi: Send + Sync {
    /// `GET /users/{id}`
    async fn get_user(&self, id: &UserId) -> Result<RemoteUser>;

    /// `PUT /users/{id}`
    async fn update_user(&self, id: &UserId, update: &UserUpdate) -> Result<RemoteUser>;

    /// `POST /users/login`
    async fn login(&self, credentials: &Credentials) -> Result<RemoteUser>;

    /// `POST /users/register`
    async fn register(&self, registration: &Registration) -> Result<RemoteUser>;

    /// `GET /items`
    async fn list_items(&self) -> Result<Vec<CatalogItem>>;

    /// `GET /items/{id}`
    async fn get_item(&self, id: ItemId) -> Result<CatalogItem>;

    /// Case-insensitive title search
    async fn search_items(&self, name: &str) -> Result<Vec<CatalogItem>> {
        let needle = name.to_lowercase();
        Ok(self
            .list_items()
            .await?
            .into_iter()
            .filter(|item| item.title.to_lowercase().contains(&needle))
            .collect())
    }

    /// Items priced within `[min, max]`
    async fn items_in_price_range(&self, min: Decimal, max: Decimal) -> Result<Vec<CatalogItem>> {
        Ok(self
            .list_items()
            .await?
            .into_iter()
            .filter(|item| item.price >= min && item.price <= max)
            .collect())
    }

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Backend name for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_remote_user_string_balance() {
        let user: RemoteUser = serde_json::from_value(json!({
            "id": 4,
            "username": "mali",
            "email": "mali@example.com",
            "balance": "1250.75"
        }))
        .unwrap();

        assert_eq!(user.id.as_str(), "4");
        assert_eq!(user.balance, dec!(1250.75));
    }

    #[test]
    fn test_remote_user_missing_balance() {
        let user: RemoteUser = serde_json::from_value(json!({"id": "9", "username": "x"})).unwrap();
        assert_eq!(user.balance, Decimal::ZERO);
    }

    #[test]
    fn test_balance_update_is_a_number() {
        let body = serde_json::to_value(UserUpdate::balance(dec!(50.25))).unwrap();
        assert_eq!(body, json!({"balance": 50.25}));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "mali".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
