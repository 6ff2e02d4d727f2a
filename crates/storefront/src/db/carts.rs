//! Persisted cart repository.
//!
//! Each user has at most one row in `storefront.user_cart`. Lines are a
//! JSONB array of `{product_id, variant_id, quantity}` documents and
//! `version` is bumped on every write. Writes are single statements guarded
//! by the version the caller loaded, so a dropped request future either
//! committed the whole cart or nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use cartseal_core::{Cart, UserId};

use crate::services::cart::{CartStore, PersistedCart, StoreError, UNSAVED_VERSION};

type CartRow = (i32, serde_json::Value, i64, DateTime<Utc>);

/// [`CartStore`] backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn load_cart(&self, user_id: UserId) -> Result<Option<PersistedCart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT user_id, lines, version, updated_at
            FROM storefront.user_cart
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_cart).transpose()
    }

    async fn save_cart(
        &self,
        user_id: UserId,
        cart: &Cart,
        expected_version: i64,
    ) -> Result<i64, StoreError> {
        let version = if expected_version == UNSAVED_VERSION {
            sqlx::query_scalar::<_, i64>(
                r"
                INSERT INTO storefront.user_cart (user_id, lines, version, updated_at)
                VALUES ($1, $2, 1, now())
                ON CONFLICT (user_id) DO NOTHING
                RETURNING version
                ",
            )
            .bind(user_id)
            .bind(Json(cart))
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query_scalar::<_, i64>(
                r"
                UPDATE storefront.user_cart
                SET lines = $2, version = version + 1, updated_at = now()
                WHERE user_id = $1 AND version = $3
                RETURNING version
                ",
            )
            .bind(user_id)
            .bind(Json(cart))
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?
        };

        version.ok_or(StoreError::VersionConflict {
            expected: expected_version,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// Convert a database row into a domain cart.
fn row_to_cart(row: CartRow) -> Result<PersistedCart, StoreError> {
    let (user_id, lines, version, updated_at) = row;

    let cart: Cart = serde_json::from_value(lines).map_err(|e| {
        StoreError::DataCorruption(format!("invalid cart document for user {user_id}: {e}"))
    })?;

    if version <= UNSAVED_VERSION {
        return Err(StoreError::DataCorruption(format!(
            "invalid cart version {version} for user {user_id}"
        )));
    }

    Ok(PersistedCart {
        user_id: UserId::new(user_id),
        cart,
        version,
        updated_at,
    })
}
