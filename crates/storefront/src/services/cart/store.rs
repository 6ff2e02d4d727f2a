//! Persisted cart gateway.
//!
//! The reconciler only needs two calls from storage: load a user's cart and
//! replace it atomically. Adapters:
//!
//! - [`PgCartStore`](crate::db::carts::PgCartStore) - `PostgreSQL` (production)
//! - [`MemoryCartStore`](super::memory::MemoryCartStore) - in-process map (tests, local dev)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use cartseal_core::{Cart, UserId};

/// Version of a cart that has never been saved.
pub const UNSAVED_VERSION: i64 = 0;

/// A user's cart as stored, with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedCart {
    /// Owner of the cart.
    pub user_id: UserId,
    /// Stored lines.
    pub cart: Cart,
    /// Incremented on every successful save. Never [`UNSAVED_VERSION`].
    pub version: i64,
    /// When the cart was last written.
    pub updated_at: DateTime<Utc>,
}

/// Errors returned by a [`CartStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or the query failed.
    #[error("cart store unavailable: {0}")]
    Unavailable(String),

    /// Another writer saved the cart after it was loaded.
    #[error("cart version conflict (expected {expected})")]
    VersionConflict {
        /// The version the caller based its write on.
        expected: i64,
    },

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Storage contract for persisted carts.
///
/// `save_cart` is a compare-and-swap: it succeeds only if the stored version
/// equals `expected_version` ([`UNSAVED_VERSION`] meaning "no cart stored
/// yet"), and it replaces the whole cart in one write.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Load the cart for a user, `None` if the user has never saved one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on I/O failure and
    /// `StoreError::DataCorruption` if the stored document is invalid.
    async fn load_cart(&self, user_id: UserId) -> Result<Option<PersistedCart>, StoreError>;

    /// Replace the user's cart if it is still at `expected_version`.
    ///
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::VersionConflict` if the cart changed since it was
    /// loaded, and `StoreError::Unavailable` on I/O failure.
    async fn save_cart(
        &self,
        user_id: UserId,
        cart: &Cart,
        expected_version: i64,
    ) -> Result<i64, StoreError>;

    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if it is not.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
