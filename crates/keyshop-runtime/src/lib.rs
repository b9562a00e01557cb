//! # keyshop-runtime
//!
//! Production backend for keyshop: a `reqwest` client implementing
//! `StoreApi` against the shop's REST API.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keyshop_runtime::HttpStoreApi;
//!
//! let api = HttpStoreApi::from_env()?;
//! let shop = Storefront::new(Arc::new(api), store);
//! ```

pub mod http;

pub use http::{ApiConfig, HttpStoreApi};

// Re-export core types for convenience
pub use keyshop_core::{Result, StoreApi, StoreError};
