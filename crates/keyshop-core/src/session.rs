//! Session Management
//!
//! The authenticated user lives in a `SessionContext` that is constructed
//! once per application and passed to whatever needs it. The session is
//! mirrored into the local store so it survives a restart.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;

use crate::api::{Credentials, Registration, RemoteUser, StoreApi};
use crate::error::{Result, StoreError};
use crate::store::{LocalStore, keys};
use crate::wire;

/// Backend user identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct UserId(String);

impl UserId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        wire::id_string(deserializer).map(Self)
    }
}

/// The logged-in user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub id: UserId,

    pub username: String,

    pub email: String,

    #[serde(default, deserialize_with = "wire::lenient_decimal")]
    pub balance: Decimal,
}

impl From<RemoteUser> for UserSession {
    fn from(user: RemoteUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            balance: user.balance,
        }
    }
}

/// Owner of the current `UserSession`
pub struct SessionContext {
    store: Arc<dyn LocalStore>,
    current: RwLock<Option<UserSession>>,
}

impl SessionContext {
    /// Load the mirrored session, if any. An unreadable snapshot means logged out.
    pub fn restore(store: Arc<dyn LocalStore>) -> Self {
        let current = match store.get(keys::USER) {
            Ok(Some(raw)) => match serde_json::from_str::<UserSession>(&raw) {
                Ok(session) => {
                    tracing::debug!(user_id = %session.id, "Restored session");
                    Some(session)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable session snapshot");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Session snapshot unavailable");
                None
            }
        };

        Self {
            store,
            current: RwLock::new(current),
        }
    }

    pub async fn current(&self) -> Option<UserSession> {
        self.current.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn login(&self, api: &dyn StoreApi, credentials: &Credentials) -> Result<UserSession> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(StoreError::Auth("username and password are required".into()));
        }

        let session = UserSession::from(api.login(credentials).await?);
        tracing::info!(user_id = %session.id, username = %session.username, "Logged in");

        self.replace(Some(session.clone())).await;
        Ok(session)
    }

    pub async fn register(&self, api: &dyn StoreApi, registration: &Registration) -> Result<UserSession> {
        if registration.username.trim().is_empty()
            || registration.email.trim().is_empty()
            || registration.password.is_empty()
        {
            return Err(StoreError::Auth("username, email and password are required".into()));
        }

        let session = UserSession::from(api.register(registration).await?);
        tracing::info!(user_id = %session.id, "Registered account");

        self.replace(Some(session.clone())).await;
        Ok(session)
    }

    pub async fn logout(&self) {
        if let Some(session) = self.current().await {
            tracing::info!(user_id = %session.id, "Logged out");
        }
        self.replace(None).await;
    }

    /// Re-fetch the user from the backend and overwrite the cached session.
    pub async fn refresh_balance(&self, api: &dyn StoreApi) -> Result<Decimal> {
        let id = self
            .current()
            .await
            .map(|s| s.id)
            .ok_or_else(|| StoreError::Auth("no active session".into()))?;

        let session = UserSession::from(api.get_user(&id).await?);
        let balance = session.balance;

        self.replace(Some(session)).await;
        Ok(balance)
    }

    /// Overwrite the cached balance without a round trip.
    pub async fn set_balance(&self, balance: Decimal) -> Result<()> {
        let mut session = self
            .current()
            .await
            .ok_or_else(|| StoreError::Auth("no active session".into()))?;
        session.balance = balance;
        self.replace(Some(session)).await;
        Ok(())
    }

    // The in-memory value is authoritative; the mirror is best effort.
    async fn replace(&self, session: Option<UserSession>) {
        let mirrored = match &session {
            Some(s) => serde_json::to_string(s)
                .map_err(StoreError::from)
                .and_then(|raw| self.store.set(keys::USER, &raw)),
            None => self.store.remove(keys::USER),
        };
        if let Err(e) = mirrored {
            tracing::warn!(error = %e, "Failed to mirror session to local store");
        }

        *self.current.write().await = session;
    }
}
