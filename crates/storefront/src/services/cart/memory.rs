//! In-process cart store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use cartseal_core::{Cart, UserId};

use super::store::{CartStore, PersistedCart, StoreError, UNSAVED_VERSION};

/// [`CartStore`] backed by a `HashMap` behind a `RwLock`.
///
/// Honors the same compare-and-swap contract as the `PostgreSQL` adapter.
/// State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: RwLock<HashMap<UserId, PersistedCart>>,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a stored cart.
    pub async fn len(&self) -> usize {
        self.carts.read().await.len()
    }

    /// Whether no carts are stored.
    pub async fn is_empty(&self) -> bool {
        self.carts.read().await.is_empty()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn load_cart(&self, user_id: UserId) -> Result<Option<PersistedCart>, StoreError> {
        Ok(self.carts.read().await.get(&user_id).cloned())
    }

    async fn save_cart(
        &self,
        user_id: UserId,
        cart: &Cart,
        expected_version: i64,
    ) -> Result<i64, StoreError> {
        let mut carts = self.carts.write().await;

        let current = carts.get(&user_id).map_or(UNSAVED_VERSION, |c| c.version);
        if current != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
            });
        }

        let version = current + 1;
        carts.insert(
            user_id,
            PersistedCart {
                user_id,
                cart: cart.clone(),
                version,
                updated_at: Utc::now(),
            },
        );
        Ok(version)
    }
}
