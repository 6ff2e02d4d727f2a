//! Integration tests for Cartseal.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartseal-integration-tests
//! ```
//!
//! The tests drive the real storefront router in-process with
//! `tower::ServiceExt::oneshot`, backed by `MemoryCartStore`. No database or
//! listening socket is needed.
//!
//! # Test Categories
//!
//! - `cart_api` - Anonymous preview, load and sync over HTTP
//! - `cart_concurrency` - Concurrent syncs and store failures
//! - `health` - Liveness and readiness

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

use cartseal_core::crypto::{IdentifierCipher, KeyPair};
use cartseal_storefront::config::CartSettings;
use cartseal_storefront::services::cart::{CartStore, MemoryCartStore};
use cartseal_storefront::state::AppState;

/// Largest response body the helpers will read.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A storefront router wired to an in-memory store and a fresh key pair.
pub struct TestContext {
    /// Router under test.
    pub router: Router,
    /// Cipher sharing the router's keys, for minting and reading tokens.
    pub cipher: IdentifierCipher,
    /// Store behind the router.
    pub store: Arc<dyn CartStore>,
}

/// A response with its body parsed as JSON (`Value::Null` if empty or not JSON).
#[derive(Debug)]
pub struct TestResponse {
    /// Status code.
    pub status: StatusCode,
    /// Parsed body.
    pub body: Value,
}

impl TestContext {
    /// Context with default cart settings and an empty `MemoryCartStore`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(CartSettings::default())
    }

    /// Context with custom cart settings and an empty `MemoryCartStore`.
    #[must_use]
    pub fn with_settings(settings: CartSettings) -> Self {
        Self::with_store(settings, Arc::new(MemoryCartStore::new()))
    }

    /// Context over an arbitrary store.
    #[must_use]
    pub fn with_store(settings: CartSettings, store: Arc<dyn CartStore>) -> Self {
        let keys = KeyPair::generate();
        let state = AppState::new(&keys, settings, Arc::clone(&store));

        Self {
            router: cartseal_storefront::app(state),
            cipher: IdentifierCipher::new(&keys),
            store,
        }
    }

    /// Encode a product id the way a previous response would have.
    ///
    /// # Panics
    ///
    /// Panics if `id` is empty.
    #[must_use]
    pub fn token(&self, id: &str) -> String {
        self.cipher
            .encode(id)
            .expect("non-empty id encodes")
            .into_inner()
    }

    /// Decode a token from a response.
    ///
    /// # Panics
    ///
    /// Panics if the token does not decode with the context's keys.
    #[must_use]
    pub fn product_of(&self, token: &str) -> String {
        self.cipher.decode(token).expect("token decodes")
    }

    /// Send a request with an optional JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(&self, method: Method, uri: &str, body: Option<&Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        self.send_request(request).await
    }

    /// Send a prepared request.
    ///
    /// # Panics
    ///
    /// Panics if the body cannot be read.
    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), MAX_BODY_BYTES)
            .await
            .expect("readable body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// `GET` a path.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    /// `POST` a JSON body.
    pub async fn post(&self, uri: &str, body: &Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body)).await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `CartLineRequest` JSON object.
#[must_use]
pub fn line(product_hashed_id: &str, variant_id: &str, quantity: i64) -> Value {
    serde_json::json!({
        "product_hashed_id": product_hashed_id,
        "variant_id": variant_id,
        "quantity": quantity,
    })
}

/// The `user_cart` array of a response, sorted by variant for stable asserts.
///
/// # Panics
///
/// Panics if the body has no `user_cart` array.
#[must_use]
pub fn user_cart(body: &Value) -> Vec<Value> {
    let mut lines = body["user_cart"]
        .as_array()
        .expect("user_cart array")
        .clone();
    lines.sort_by(|a, b| {
        a["variant_id"]
            .as_str()
            .cmp(&b["variant_id"].as_str())
    });
    lines
}
