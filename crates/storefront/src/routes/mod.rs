//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (cart store ping)
//!
//! # Cart API (JSON)
//! POST /api/cart               - Validate and re-present an anonymous cart
//! GET  /api/cart/{user_id}     - Stored cart for a user
//! POST /api/cart/{user_id}     - Merge a client cart into the stored cart
//! ```
//!
//! Unknown paths answer 404 with the same JSON error body as every other
//! failure.

pub mod cart;
pub mod health;

use axum::{
    Router,
    http::Uri,
    routing::{get, post},
};

use crate::error::AppError;
use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(cart::preview))
        .route("/{user_id}", get(cart::load).post(cart::sync))
}

/// Create the health check router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health::health))
        .route("/ready", get(health::readiness))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/health", health_routes())
        .nest("/api/cart", cart_routes())
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
