//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use keyshop_checkout::{CheckoutError, CheckoutReceipt, InventoryEntry, ValidationFailure};
use keyshop_core::{Cart, CatalogItem, Credentials, ItemId, Registration, StoreError, UserSession, WishlistEntry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: String,
    pub backend_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
            redirect: None,
            retryable: false,
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub name: Option<String>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub item_id: ItemId,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartVisibility {
    pub is_open: bool,
}

#[derive(Debug, Serialize)]
pub struct WishlistToggle {
    pub item_id: ItemId,
    pub wishlisted: bool,
}

// ============================================================================
// Error mapping
// ============================================================================

fn store_error(err: &StoreError) -> ApiError {
    let (status, code) = match err {
        StoreError::Auth(_) => (StatusCode::UNAUTHORIZED, "AUTH_FAILED"),
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        StoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        StoreError::Api { status, .. } if (400..500).contains(status) => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST),
            "REMOTE_REJECTED",
        ),
        StoreError::Api { .. } | StoreError::Unavailable(_) | StoreError::Parse(_) => {
            (StatusCode::BAD_GATEWAY, "REMOTE_ERROR")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };

    if status.is_server_error() {
        tracing::error!("Store error: {}", err);
    } else {
        tracing::debug!("Store error: {}", err);
    }

    let (status, Json(mut body)) = api_error(status, err.user_message(), code);
    body.retryable = err.is_retryable();
    (status, Json(body))
}

fn checkout_error(err: &CheckoutError) -> ApiError {
    let (status, code) = match err {
        CheckoutError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        CheckoutError::InFlight => (StatusCode::CONFLICT, "CHECKOUT_IN_PROGRESS"),
        CheckoutError::Validation(ValidationFailure::EmptyCart) => (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_CART"),
        CheckoutError::Validation(ValidationFailure::InsufficientBalance { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BALANCE")
        }
        CheckoutError::Validation(ValidationFailure::QuantityLimit { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "QUANTITY_LIMIT")
        }
        CheckoutError::Transport(_) => (StatusCode::BAD_GATEWAY, "PAYMENT_FAILED"),
        CheckoutError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INVENTORY_WRITE_FAILED"),
    };

    let (status, Json(mut body)) = api_error(status, err.user_message(), code);
    body.redirect = err.redirect();
    body.retryable = matches!(err, CheckoutError::Transport(_));
    (status, Json(body))
}

fn unauthenticated() -> ApiError {
    let (status, Json(mut body)) = api_error(StatusCode::UNAUTHORIZED, "Not logged in", "UNAUTHENTICATED");
    body.redirect = Some("/login");
    (status, Json(body))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let api = state.shop.api();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend: api.name().to_string(),
        backend_connected: api.health_check().await,
    })
}

// --- Catalog ---

/// List, search (`?name=`) or filter by price (`?min=&max=`)
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<Vec<CatalogItem>>, ApiError> {
    let items = match query {
        ItemQuery { name: Some(name), .. } if !name.trim().is_empty() => state.shop.search(name.trim()).await,
        ItemQuery { min: None, max: None, .. } => state.shop.catalog().await,
        ItemQuery { min, max, .. } => {
            state
                .shop
                .price_range(min.unwrap_or(Decimal::ZERO), max.unwrap_or(Decimal::MAX))
                .await
        }
    };

    items.map(Json).map_err(|e| store_error(&e))
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<CatalogItem>, ApiError> {
    state
        .shop
        .item(ItemId::new(id))
        .await
        .map(Json)
        .map_err(|e| store_error(&e))
}

// --- Session ---

pub async fn current_session(State(state): State<AppState>) -> Result<Json<UserSession>, ApiError> {
    state.shop.current_user().await.map(Json).ok_or_else(unauthenticated)
}

pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<UserSession>, ApiError> {
    state
        .shop
        .login(&credentials)
        .await
        .map(Json)
        .map_err(|e| store_error(&e))
}

pub async fn register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<(StatusCode, Json<UserSession>), ApiError> {
    state
        .shop
        .register(&registration)
        .await
        .map(|user| (StatusCode::CREATED, Json(user)))
        .map_err(|e| store_error(&e))
}

pub async fn logout(State(state): State<AppState>) -> StatusCode {
    state.shop.logout().await;
    StatusCode::NO_CONTENT
}

pub async fn refresh_balance(State(state): State<AppState>) -> Result<Json<BalanceResponse>, ApiError> {
    if state.shop.current_user().await.is_none() {
        return Err(unauthenticated());
    }

    state
        .shop
        .refresh_balance()
        .await
        .map(|balance| Json(BalanceResponse { balance }))
        .map_err(|e| store_error(&e))
}

// --- Cart ---

pub async fn get_cart(State(state): State<AppState>) -> Json<Cart> {
    Json(state.shop.cart().await)
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    Json(payload): Json<ItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    state
        .shop
        .add_to_cart_by_id(payload.item_id)
        .await
        .map(Json)
        .map_err(|e| store_error(&e))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(payload): Json<QuantityRequest>,
) -> Result<Json<Cart>, ApiError> {
    state
        .shop
        .update_quantity(ItemId::new(id), payload.quantity)
        .await
        .map(Json)
        .map_err(|e| store_error(&e))
}

pub async fn remove_cart_item(State(state): State<AppState>, Path(id): Path<u64>) -> Json<Cart> {
    Json(state.shop.remove_from_cart(ItemId::new(id)).await)
}

pub async fn clear_cart(State(state): State<AppState>) -> Json<Cart> {
    Json(state.shop.clear_cart().await)
}

pub async fn open_cart(State(state): State<AppState>) -> Json<CartVisibility> {
    Json(CartVisibility {
        is_open: state.shop.open_cart().await,
    })
}

pub async fn close_cart(State(state): State<AppState>) -> Json<CartVisibility> {
    Json(CartVisibility {
        is_open: state.shop.close_cart().await,
    })
}

pub async fn toggle_cart(State(state): State<AppState>) -> Json<CartVisibility> {
    Json(CartVisibility {
        is_open: state.shop.toggle_cart().await,
    })
}

// --- Wishlist ---

pub async fn get_wishlist(State(state): State<AppState>) -> Json<Vec<WishlistEntry>> {
    Json(state.shop.wishlist().await)
}

pub async fn toggle_wishlist(
    State(state): State<AppState>,
    Json(payload): Json<ItemRequest>,
) -> Result<Json<WishlistToggle>, ApiError> {
    let wishlisted = state
        .shop
        .toggle_wishlist_by_id(payload.item_id)
        .await
        .map_err(|e| store_error(&e))?;

    Ok(Json(WishlistToggle {
        item_id: payload.item_id,
        wishlisted,
    }))
}

pub async fn remove_wishlist_item(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<Vec<WishlistEntry>> {
    state.shop.remove_from_wishlist(ItemId::new(id)).await;
    Json(state.shop.wishlist().await)
}

pub async fn clear_wishlist(State(state): State<AppState>) -> StatusCode {
    state.shop.clear_wishlist().await;
    StatusCode::NO_CONTENT
}

pub async fn wishlist_to_cart(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<Cart>, ApiError> {
    state
        .shop
        .move_wishlist_to_cart(ItemId::new(id))
        .await
        .map(Json)
        .map_err(|e| store_error(&e))
}

// --- Checkout & inventory ---

pub async fn checkout(State(state): State<AppState>) -> Result<Json<CheckoutReceipt>, ApiError> {
    state.shop.checkout().await.map(Json).map_err(|e| {
        match &e {
            CheckoutError::Persistence(_) => tracing::error!("Checkout error: {}", e),
            CheckoutError::Transport(_) => tracing::warn!("Checkout error: {}", e),
            _ => tracing::debug!("Checkout refused: {}", e),
        }
        checkout_error(&e)
    })
}

pub async fn inventory(State(state): State<AppState>) -> Result<Json<Vec<InventoryEntry>>, ApiError> {
    if state.shop.current_user().await.is_none() {
        return Err(unauthenticated());
    }
    Ok(Json(state.shop.inventory()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use keyshop_checkout::Storefront;
    use keyshop_core::{MemoryLocalStore, MockStoreApi};
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::app;
    use crate::state::AppState;

    fn test_app() -> Router {
        let shop = Storefront::new(Arc::new(MockStoreApi::new()), Arc::new(MemoryLocalStore::new()));
        app(AppState::new(shop))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn login(app: &Router) {
        let (status, _) = call(
            app,
            "POST",
            "/api/session/login",
            Some(json!({"username": "demo", "password": "demo"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_checkout_requires_login() {
        let app = test_app();
        call(&app, "POST", "/api/cart/items", Some(json!({"item_id": 3}))).await;

        let (status, body) = call(&app, "POST", "/api/checkout", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["redirect"], "/login");
    }

    #[tokio::test]
    async fn test_empty_cart_checkout_is_unprocessable() {
        let app = test_app();
        login(&app).await;

        let (status, body) = call(&app, "POST", "/api/checkout", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "EMPTY_CART");
    }

    #[tokio::test]
    async fn test_quantity_above_limit_is_bad_request() {
        let app = test_app();
        call(&app, "POST", "/api/cart/items", Some(json!({"item_id": 3}))).await;

        let (status, body) = call(&app, "PUT", "/api/cart/items/3", Some(json!({"quantity": 4_294_967_295_u64}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");

        let (_, cart) = call(&app, "GET", "/api/cart", None).await;
        assert_eq!(cart["total_items"], 1);
    }

    #[tokio::test]
    async fn test_purchase_flow() {
        let app = test_app();
        login(&app).await;

        call(&app, "POST", "/api/cart/items", Some(json!({"item_id": 2}))).await;
        let (_, cart) = call(&app, "PUT", "/api/cart/items/2", Some(json!({"quantity": 2}))).await;
        assert_eq!(cart["total_items"], 2);

        let (status, receipt) = call(&app, "POST", "/api/checkout", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["entries"].as_array().unwrap().len(), 2);
        assert_eq!(receipt["charged"], dec!(598).to_string());

        let (_, inventory) = call(&app, "GET", "/api/inventory", None).await;
        assert_eq!(inventory.as_array().unwrap().len(), 2);
        assert_eq!(inventory[0]["gameName"], "Hades");

        let (_, cart) = call(&app, "GET", "/api/cart", None).await;
        assert_eq!(cart["items"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let app = test_app();
        login(&app).await;
        call(&app, "POST", "/api/cart/items", Some(json!({"item_id": 1}))).await;

        let (status, body) = call(&app, "POST", "/api/checkout", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "INSUFFICIENT_BALANCE");
    }

    #[tokio::test]
    async fn test_item_queries() {
        let app = test_app();

        let (_, all) = call(&app, "GET", "/api/items", None).await;
        assert_eq!(all.as_array().unwrap().len(), 5);

        let (_, found) = call(&app, "GET", "/api/items?name=stardew", None).await;
        assert_eq!(found[0]["title"], "Stardew Valley");

        let (_, cheap) = call(&app, "GET", "/api/items?max=300", None).await;
        assert_eq!(cheap.as_array().unwrap().len(), 2);

        let (status, _) = call(&app, "GET", "/api/items?min=10&max=1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "GET", "/api/items/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wishlist_routes() {
        let app = test_app();

        let (_, toggled) = call(&app, "POST", "/api/wishlist/toggle", Some(json!({"item_id": 4}))).await;
        assert_eq!(toggled["wishlisted"], true);

        let (_, cart) = call(&app, "POST", "/api/wishlist/4/cart", None).await;
        assert_eq!(cart["total_items"], 1);

        let (_, entries) = call(&app, "DELETE", "/api/wishlist/4", None).await;
        assert!(entries.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cart_visibility_routes() {
        let app = test_app();

        let (_, body) = call(&app, "POST", "/api/cart/toggle", None).await;
        assert_eq!(body["is_open"], true);
        let (_, body) = call(&app, "POST", "/api/cart/close", None).await;
        assert_eq!(body["is_open"], false);
    }
}
