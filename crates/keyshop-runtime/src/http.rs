//! HTTP Store API
//!
//! Implementation of `StoreApi` against the REST backend.

use std::time::Duration;

use async_trait::async_trait;
use keyshop_core::{
    ApiItem, CatalogItem, Credentials, ItemId, Registration, RemoteUser, Result, StoreApi, StoreError, UserId,
    UserUpdate,
};
use reqwest::RequestBuilder;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Backend connection configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    /// REST API root, e.g. `http://localhost:3002/api`
    pub base_url: String,

    /// Root that relative `uploads/...` image paths are served from
    pub asset_base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3002/api".into(),
            asset_base_url: "http://localhost:3002".into(),
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            base_url: lookup("KEYSHOP_API_BASE_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.base_url),
            asset_base_url: lookup("KEYSHOP_ASSET_BASE_URL")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.asset_base_url),
            timeout_secs: lookup("KEYSHOP_API_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Login responses come either bare or wrapped in `{ "user": ... }`
#[derive(Deserialize)]
#[serde(untagged)]
enum UserEnvelope {
    Wrapped { user: RemoteUser },
    Bare(RemoteUser),
}

impl UserEnvelope {
    fn into_user(self) -> RemoteUser {
        match self {
            Self::Wrapped { user } | Self::Bare(user) => user,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemsEnvelope {
    List(Vec<Value>),
    Wrapped {
        #[serde(alias = "data")]
        items: Vec<Value>,
    },
}

impl ItemsEnvelope {
    fn into_values(self) -> Vec<Value> {
        match self {
            Self::List(items) | Self::Wrapped { items } => items,
        }
    }
}

/// Decode item records one by one; malformed records are dropped.
fn decode_items(values: Vec<Value>, asset_base: &str) -> Vec<CatalogItem> {
    let total = values.len();
    let items: Vec<CatalogItem> = values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<ApiItem>(v).ok())
        .map(|raw| raw.normalize(asset_base))
        .collect();

    if items.len() < total {
        tracing::warn!(skipped = total - items.len(), "Dropped malformed catalog records");
    }
    items
}

/// Error text from a failed response body: `message`, then `error`, then a generic line
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|field| v.get(field).and_then(Value::as_str).map(String::from))
        })
        .unwrap_or_else(|| format!("HTTP error! status: {status}"))
}

fn status_error(status: u16, body: &str) -> StoreError {
    let message = error_message(status, body);
    match status {
        401 | 403 => StoreError::Auth(message),
        404 => StoreError::NotFound(message),
        _ => StoreError::Api { status, message },
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Unavailable("request timed out".into())
    } else if err.is_decode() {
        StoreError::Parse(err.to_string())
    } else {
        StoreError::Unavailable(err.to_string())
    }
}

/// REST backend client
pub struct HttpStoreApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpStoreApi {
    /// Create from configuration
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ApiConfig::from_env())
    }

    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        self.client.get(url)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        self.client.post(url)
    }

    fn put(&self, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!(%url, "PUT");
        self.client.put(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let err = status_error(status.as_u16(), &body);
            tracing::debug!(status = status.as_u16(), error = %err, "Request failed");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn fetch_items(&self, request: RequestBuilder) -> Result<Vec<CatalogItem>> {
        let envelope: ItemsEnvelope = self.send(request).await?;
        Ok(decode_items(envelope.into_values(), &self.config.asset_base_url))
    }
}

#[async_trait]
impl StoreApi for HttpStoreApi {
    async fn get_user(&self, id: &UserId) -> Result<RemoteUser> {
        self.send(self.get(&format!("users/{id}"))).await
    }

    async fn update_user(&self, id: &UserId, update: &UserUpdate) -> Result<RemoteUser> {
        self.send::<UserEnvelope>(self.put(&format!("users/{id}")).json(update))
            .await
            .map(UserEnvelope::into_user)
    }

    async fn login(&self, credentials: &Credentials) -> Result<RemoteUser> {
        self.send::<UserEnvelope>(self.post("users/login").json(credentials))
            .await
            .map(UserEnvelope::into_user)
    }

    async fn register(&self, registration: &Registration) -> Result<RemoteUser> {
        self.send::<UserEnvelope>(self.post("users/register").json(registration))
            .await
            .map(UserEnvelope::into_user)
    }

    async fn list_items(&self) -> Result<Vec<CatalogItem>> {
        self.fetch_items(self.get("items")).await
    }

    async fn get_item(&self, id: ItemId) -> Result<CatalogItem> {
        let raw: ApiItem = self.send(self.get(&format!("items/{id}"))).await?;
        Ok(raw.normalize(&self.config.asset_base_url))
    }

    async fn search_items(&self, name: &str) -> Result<Vec<CatalogItem>> {
        self.fetch_items(self.get("items/search").query(&[("name", name)]))
            .await
    }

    async fn items_in_price_range(&self, min: Decimal, max: Decimal) -> Result<Vec<CatalogItem>> {
        let (min, max) = (min.to_string(), max.to_string());
        self.fetch_items(self.get("items/price-range").query(&[("min", min), ("max", max)]))
            .await
    }

    async fn health_check(&self) -> bool {
        match self.get("items").send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Store API health check failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "HttpStore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer exactly one request with a canned response; returns the API base URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}/api")
    }

    fn client(base_url: String) -> HttpStoreApi {
        HttpStoreApi::new(ApiConfig {
            base_url,
            asset_base_url: "http://cdn.test".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn demo() -> Credentials {
        Credentials {
            username: "demo".into(),
            password: "demo".into(),
        }
    }

    #[test]
    fn test_config_defaults_and_overrides() {
        let config = ApiConfig::from_lookup(|_| None);
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.timeout_secs, 10);

        let config = ApiConfig::from_lookup(|name| match name {
            "KEYSHOP_API_BASE_URL" => Some("https://shop.test/api/".into()),
            "KEYSHOP_API_TIMEOUT_SECS" => Some("not a number".into()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://shop.test/api/");
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_url_joining() {
        let api = client("http://host/api/".into());
        assert_eq!(api.url("/users/1"), "http://host/api/users/1");
        assert_eq!(api.url("items"), "http://host/api/items");
    }

    #[test]
    fn test_error_message_fields() {
        assert_eq!(error_message(400, r#"{"message":"Username taken"}"#), "Username taken");
        assert_eq!(error_message(400, r#"{"error":"Bad input"}"#), "Bad input");
        assert_eq!(error_message(502, "<html>bad gateway</html>"), "HTTP error! status: 502");
        assert!(matches!(status_error(401, "{}"), StoreError::Auth(_)));
    }

    #[tokio::test]
    async fn test_login_accepts_wrapped_user() {
        let base = serve_once(
            "200 OK",
            r#"{"message":"ok","user":{"id":3,"username":"demo","email":"d@x","balance":"75.50"}}"#,
        )
        .await;

        let user = client(base).login(&demo()).await.unwrap();
        assert_eq!(user.id.as_str(), "3");
        assert_eq!(user.balance, dec!(75.50));
    }

    #[tokio::test]
    async fn test_get_user_bare() {
        let base = serve_once("200 OK", r#"{"id":"1","username":"demo","email":"d@x","balance":1000}"#).await;

        let user = client(base).get_user(&UserId::from_string("1")).await.unwrap();
        assert_eq!(user.balance, dec!(1000));
    }

    #[tokio::test]
    async fn test_failed_update_surfaces_message() {
        let base = serve_once("500 Internal Server Error", r#"{"error":"db down"}"#).await;

        let err = client(base)
            .update_user(&UserId::from_string("1"), &UserUpdate::balance(dec!(5)))
            .await
            .unwrap_err();

        match err {
            StoreError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_items_are_normalized() {
        let base = serve_once(
            "200 OK",
            r#"[
                {"game_id": 1, "game_name": "Hades", "game_price": "299.00", "game_image": "uploads/hades.jpg"},
                {"game_name": "no id"},
                {"game_id": "2", "game_name": "Celeste", "game_price": 99, "game_image": "[\"uploads/c1.jpg\",\"uploads/c2.jpg\"]", "platform": "gog"}
            ]"#,
        )
        .await;

        let items = client(base).list_items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].image_url(), "http://cdn.test/uploads/hades.jpg");
        assert_eq!(items[0].price, dec!(299));
        assert_eq!(items[1].id, ItemId::new(2));
        assert_eq!(items[1].image.all().len(), 2);
        assert_eq!(items[1].platform, "gog");
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(format!("http://{addr}/api"));
        let err = api.get_user(&UserId::from_string("1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable());
        assert!(!api.health_check().await);
    }
}
