//! keyshop HTTP Server
//!
//! Axum-based JSON action surface over one `Storefront`: catalog, session,
//! cart, wishlist, checkout and inventory.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use keyshop_checkout::Storefront;
use keyshop_core::{FileLocalStore, MockStoreApi, StoreApi};
use keyshop_runtime::HttpStoreApi;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::{
    add_to_cart, checkout, clear_cart, clear_wishlist, close_cart, current_session, get_cart, get_item,
    get_wishlist, health_check, inventory, list_items, login, logout, open_cart, refresh_balance, register,
    remove_cart_item, remove_wishlist_item, toggle_cart, toggle_wishlist, update_cart_item, wishlist_to_cart,
};
use crate::state::AppState;

/// Build the router
fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Catalog
        .route("/api/items", get(list_items))
        .route("/api/items/{id}", get(get_item))
        // Session
        .route("/api/session", get(current_session))
        .route("/api/session/login", post(login))
        .route("/api/session/register", post(register))
        .route("/api/session/logout", post(logout))
        .route("/api/session/refresh", post(refresh_balance))
        // Cart
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_to_cart))
        .route("/api/cart/items/{id}", put(update_cart_item).delete(remove_cart_item))
        .route("/api/cart/open", post(open_cart))
        .route("/api/cart/close", post(close_cart))
        .route("/api/cart/toggle", post(toggle_cart))
        // Wishlist
        .route("/api/wishlist", get(get_wishlist).delete(clear_wishlist))
        .route("/api/wishlist/toggle", post(toggle_wishlist))
        .route("/api/wishlist/{id}", delete(remove_wishlist_item))
        .route("/api/wishlist/{id}/cart", post(wishlist_to_cart))
        // Checkout & inventory
        .route("/api/checkout", post(checkout))
        .route("/api/inventory", get(inventory))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `KEYSHOP_BACKEND=mock` serves the built-in demo catalog instead of the REST API
fn backend_from_env() -> anyhow::Result<Arc<dyn StoreApi>> {
    match std::env::var("KEYSHOP_BACKEND").as_deref() {
        Ok("mock") => Ok(Arc::new(MockStoreApi::new())),
        _ => Ok(Arc::new(HttpStoreApi::from_env()?)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let api = backend_from_env()?;
    if api.health_check().await {
        tracing::info!("✓ Connected to {}", api.name());
    } else {
        tracing::warn!("⚠ {} not reachable - catalog and checkout will fail", api.name());
        tracing::warn!("  Check KEYSHOP_API_BASE_URL or set KEYSHOP_BACKEND=mock");
    }

    let store = FileLocalStore::from_env();
    tracing::info!("Local data directory: {}", store.dir().display());

    let shop = Storefront::new(api, Arc::new(store));
    if let Some(user) = shop.current_user().await {
        tracing::info!("Restored session for {}", user.username);
    }

    let state = AppState::new(shop);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 keyshop server running on http://{}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
