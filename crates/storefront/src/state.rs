//! Application state shared across handlers.

use std::sync::Arc;

use cartseal_core::crypto::{IdentifierCipher, KeyPair};

use crate::config::CartSettings;
use crate::services::cart::{CartReconciler, CartStore};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// cart reconciler and the cart store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    carts: CartReconciler,
    store: Arc<dyn CartStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The cipher's shared key is derived once here and reused for every
    /// request.
    ///
    /// # Arguments
    ///
    /// * `key_pair` - Identifier cipher key pair
    /// * `settings` - Cart reconciliation settings
    /// * `store` - Persisted cart gateway
    #[must_use]
    pub fn new(key_pair: &KeyPair, settings: CartSettings, store: Arc<dyn CartStore>) -> Self {
        let cipher = Arc::new(IdentifierCipher::new(key_pair));
        let carts = CartReconciler::new(cipher, Arc::clone(&store), settings);

        Self {
            inner: Arc::new(AppStateInner {
                carts,
                store,
            }),
        }
    }

    /// Get a reference to the cart reconciler.
    #[must_use]
    pub fn carts(&self) -> &CartReconciler {
        &self.inner.carts
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn store(&self) -> &dyn CartStore {
        self.inner.store.as_ref()
    }
}
