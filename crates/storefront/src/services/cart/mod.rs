//! Cart reconciliation service.
//!
//! Merges the anonymous cart a client holds with the cart stored for the
//! user, persists the result, and hands it back with product ids re-encoded.
//!
//! # Sync flow
//!
//! ```text
//! ReceivedRequest -> DecodedLocalCart -> LoadedPersistedCart -> Merged -> Committed -> Presented
//!                                         ^                                  |
//!                                         +------ version conflict ----------+
//! ```
//!
//! Invalid client lines are handled per [`InvalidLinePolicy`]: dropped and
//! reported back, or fatal to the request. Storage failures are never
//! swallowed. The commit is a single compare-and-swap on the cart version,
//! so a concurrent writer forces a reload and re-merge instead of being
//! silently overwritten.

pub mod memory;
pub mod store;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{Span, instrument};

use cartseal_core::crypto::{CipherError, IdentifierCipher};
use cartseal_core::{
    Cart, CartLine, CartLineRequest, CartLineResponse, Quantity, UserId, VariantId,
};

use crate::config::{CartSettings, InvalidLinePolicy};

pub use memory::MemoryCartStore;
pub use store::{CartStore, PersistedCart, StoreError, UNSAVED_VERSION};

/// Why a client cart line was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The product token is missing, not a string, or malformed.
    InvalidToken,
    /// The product token failed authentication.
    TamperedToken,
    /// The variant id is missing, not a string, or empty.
    InvalidVariant,
    /// The quantity is not a positive integer.
    InvalidQuantity,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidToken => "invalid product token",
            Self::TamperedToken => "product token failed verification",
            Self::InvalidVariant => "invalid variant id",
            Self::InvalidQuantity => "invalid quantity",
        };
        f.write_str(s)
    }
}

/// A client line that was left out of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedLine {
    /// Position of the line in the submitted array.
    pub index: usize,
    /// Machine-readable reason.
    pub reason: RejectReason,
}

/// Result of validating a client cart payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCart {
    /// Accepted lines with plain identifiers.
    pub cart: Cart,
    /// Lines that failed validation, in submission order.
    pub rejected: Vec<RejectedLine>,
}

/// A cart ready to be returned to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSnapshot {
    /// Lines with freshly encoded product tokens.
    pub user_cart: Vec<CartLineResponse>,
    /// Client lines that were dropped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected_lines: Vec<RejectedLine>,
    /// Stored version, absent for anonymous carts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartServiceError {
    /// A client line is invalid and the policy is to reject the request.
    #[error("cart line {} rejected: {}", .0.index, .0.reason)]
    InvalidLine(RejectedLine),

    /// The cart exceeds the configured line limit.
    #[error("cart has too many lines ({count}, maximum {max})")]
    TooManyLines {
        /// Lines in the offending cart.
        count: usize,
        /// Configured limit.
        max: usize,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every commit attempt lost a race with another writer.
    #[error("cart was modified concurrently {attempts} times in a row")]
    Contended {
        /// Attempts made.
        attempts: u32,
    },

    /// A product id could not be encoded for the response.
    #[error("failed to encode product id: {0}")]
    Encode(#[source] CipherError),
}

/// Stage of a cart sync, recorded on the tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncStage {
    DecodedLocalCart,
    LoadedPersistedCart,
    Merged,
    Committed,
    Presented,
}

impl SyncStage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::DecodedLocalCart => "decoded_local_cart",
            Self::LoadedPersistedCart => "loaded_persisted_cart",
            Self::Merged => "merged",
            Self::Committed => "committed",
            Self::Presented => "presented",
        }
    }

    fn record(self) {
        Span::current().record("stage", self.as_str());
    }
}

/// Reconciles client and stored carts.
///
/// Cheap to clone; the cipher and store are shared.
#[derive(Clone)]
pub struct CartReconciler {
    cipher: Arc<IdentifierCipher>,
    store: Arc<dyn CartStore>,
    settings: CartSettings,
}

impl CartReconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(
        cipher: Arc<IdentifierCipher>,
        store: Arc<dyn CartStore>,
        settings: CartSettings,
    ) -> Self {
        Self {
            cipher,
            store,
            settings,
        }
    }

    /// Decode and validate every client line.
    ///
    /// Lines that fail are collected in [`ResolvedCart::rejected`] rather
    /// than failing the batch. Repeated keys keep the last submitted
    /// quantity.
    #[must_use]
    pub fn resolve_client_cart(&self, lines: &[CartLineRequest]) -> ResolvedCart {
        let mut resolved = ResolvedCart::default();

        for (index, request) in lines.iter().enumerate() {
            match self.resolve_line(request) {
                Ok(line) => {
                    resolved.cart.upsert(line);
                }
                Err(reason) => {
                    if reason == RejectReason::TamperedToken {
                        tracing::warn!(
                            line = index,
                            "Cart line token failed authentication (possible tampering)"
                        );
                    } else {
                        tracing::debug!(line = index, %reason, "Dropping invalid cart line");
                    }
                    resolved.rejected.push(RejectedLine { index, reason });
                }
            }
        }

        resolved
    }

    fn resolve_line(&self, request: &CartLineRequest) -> Result<CartLine, RejectReason> {
        let token = request.product_token().ok_or(RejectReason::InvalidToken)?;
        let product_id = self
            .cipher
            .decode_product(token)
            .map_err(|e| match e {
                CipherError::Decryption => RejectReason::TamperedToken,
                CipherError::InvalidInput(_) | CipherError::Encryption => {
                    RejectReason::InvalidToken
                }
            })?;
        let variant_id = request
            .variant()
            .and_then(|raw| VariantId::parse(raw).ok())
            .ok_or(RejectReason::InvalidVariant)?;
        let quantity = request
            .requested_quantity()
            .and_then(|raw| Quantity::new(raw).ok())
            .ok_or(RejectReason::InvalidQuantity)?;

        Ok(CartLine::new(product_id, variant_id, quantity))
    }

    /// Encode every product id for the client.
    ///
    /// # Errors
    ///
    /// Returns `CipherError` if an id cannot be encoded.
    pub fn present_cart(&self, cart: &Cart) -> Result<Vec<CartLineResponse>, CipherError> {
        cart.lines()
            .map(|line| {
                Ok(CartLineResponse {
                    product_hashed_id: self.cipher.encode(line.product_id.as_str())?,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                })
            })
            .collect()
    }

    /// Write `cart` as the user's stored cart in one request.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::VersionConflict` if the cart changed since
    /// `expected_version` was read.
    pub async fn commit(
        &self,
        user_id: UserId,
        cart: &Cart,
        expected_version: i64,
    ) -> Result<i64, StoreError> {
        self.store.save_cart(user_id, cart, expected_version).await
    }

    /// Validate a client cart without persisting it (anonymous visitors).
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::InvalidLine` under the reject policy,
    /// `CartServiceError::TooManyLines` if the cart is too large.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub fn preview(&self, lines: &[CartLineRequest]) -> Result<CartSnapshot, CartServiceError> {
        let resolved = self.accept(lines)?;
        let user_cart = self
            .present_cart(&resolved.cart)
            .map_err(CartServiceError::Encode)?;

        Ok(CartSnapshot {
            user_cart,
            rejected_lines: resolved.rejected,
            version: None,
        })
    }

    /// Return the user's stored cart.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Store` if the store fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn load(&self, user_id: UserId) -> Result<CartSnapshot, CartServiceError> {
        let persisted = self.store.load_cart(user_id).await?;
        let (cart, version) =
            persisted.map_or_else(|| (Cart::new(), UNSAVED_VERSION), |p| (p.cart, p.version));

        let user_cart = self
            .present_cart(&cart)
            .map_err(CartServiceError::Encode)?;

        Ok(CartSnapshot {
            user_cart,
            rejected_lines: Vec::new(),
            version: Some(version),
        })
    }

    /// Merge a client cart into the user's stored cart and persist it.
    ///
    /// Client quantities overwrite stored quantities for the same
    /// product and variant. On a version conflict the stored cart is
    /// reloaded and the merge repeated, up to
    /// [`CartSettings::commit_attempts`] times.
    ///
    /// # Errors
    ///
    /// - `CartServiceError::InvalidLine` / `TooManyLines` for bad input.
    /// - `CartServiceError::Store` if the store fails.
    /// - `CartServiceError::Contended` if every attempt lost a race.
    #[instrument(skip(self, lines), fields(user_id = %user_id, lines = lines.len(), stage = tracing::field::Empty))]
    pub async fn sync(
        &self,
        user_id: UserId,
        lines: &[CartLineRequest],
    ) -> Result<CartSnapshot, CartServiceError> {
        let local = self.accept(lines)?;
        SyncStage::DecodedLocalCart.record();

        let attempts = self.settings.commit_attempts.max(1);
        for attempt in 1..=attempts {
            let persisted = self.store.load_cart(user_id).await?;
            SyncStage::LoadedPersistedCart.record();

            let (stored, expected_version) = persisted
                .map_or_else(|| (Cart::new(), UNSAVED_VERSION), |p| (p.cart, p.version));

            let merged = Cart::merge(&local.cart, &stored);
            self.check_size(merged.len())?;
            SyncStage::Merged.record();

            let version = if merged == stored {
                // Nothing to write; the stored cart already reflects the client.
                expected_version
            } else {
                match self.commit(user_id, &merged, expected_version).await {
                    Ok(version) => version,
                    Err(StoreError::VersionConflict { expected }) => {
                        tracing::warn!(
                            attempt,
                            expected_version = expected,
                            "Cart changed during sync, retrying"
                        );
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            };
            SyncStage::Committed.record();

            let user_cart = self
                .present_cart(&merged)
                .map_err(CartServiceError::Encode)?;
            SyncStage::Presented.record();

            tracing::info!(
                merged_lines = merged.len(),
                rejected_lines = local.rejected.len(),
                version,
                "Cart synced"
            );

            return Ok(CartSnapshot {
                user_cart,
                rejected_lines: local.rejected,
                version: Some(version),
            });
        }

        Err(CartServiceError::Contended { attempts })
    }

    /// Resolve client lines and apply the size limit and line policy.
    fn accept(&self, lines: &[CartLineRequest]) -> Result<ResolvedCart, CartServiceError> {
        self.check_size(lines.len())?;

        let resolved = self.resolve_client_cart(lines);
        if self.settings.invalid_line_policy == InvalidLinePolicy::Reject
            && let Some(first) = resolved.rejected.first()
        {
            return Err(CartServiceError::InvalidLine(first.clone()));
        }
        Ok(resolved)
    }

    const fn check_size(&self, count: usize) -> Result<(), CartServiceError> {
        if count > self.settings.max_lines {
            return Err(CartServiceError::TooManyLines {
                count,
                max: self.settings.max_lines,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for CartReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartReconciler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cartseal_core::crypto::KeyPair;
    use cartseal_core::{CartLineKey, ProductId};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cipher() -> Arc<IdentifierCipher> {
        Arc::new(IdentifierCipher::new(&KeyPair::generate()))
    }

    fn reconciler_with(
        cipher: Arc<IdentifierCipher>,
        store: Arc<dyn CartStore>,
        settings: CartSettings,
    ) -> CartReconciler {
        CartReconciler::new(cipher, store, settings)
    }

    fn request(cipher: &IdentifierCipher, product: &str, variant: &str, qty: i64) -> CartLineRequest {
        CartLineRequest::new(cipher.encode(product).unwrap().as_str(), variant, qty)
    }

    fn stored_line(product: &str, variant: &str, qty: i64) -> CartLine {
        CartLine::new(
            ProductId::parse(product).unwrap(),
            VariantId::parse(variant).unwrap(),
            Quantity::new(qty).unwrap(),
        )
    }

    fn key(product: &str, variant: &str) -> CartLineKey {
        CartLineKey::new(
            ProductId::parse(product).unwrap(),
            VariantId::parse(variant).unwrap(),
        )
    }

    #[test]
    fn test_resolve_collects_rejected_lines() {
        let cipher = cipher();
        let reconciler = reconciler_with(
            cipher.clone(),
            Arc::new(MemoryCartStore::new()),
            CartSettings::default(),
        );

        let lines = vec![
            request(&cipher, "p1", "v1", 2),
            CartLineRequest::new("not-base64!!", "v1", 1),
            request(&cipher, "p2", "", 1),
            request(&cipher, "p3", "v1", 0),
        ];

        let resolved = reconciler.resolve_client_cart(&lines);

        assert_eq!(resolved.cart.len(), 1);
        assert_eq!(
            resolved.rejected,
            vec![
                RejectedLine {
                    index: 1,
                    reason: RejectReason::InvalidToken
                },
                RejectedLine {
                    index: 2,
                    reason: RejectReason::InvalidVariant
                },
                RejectedLine {
                    index: 3,
                    reason: RejectReason::InvalidQuantity
                },
            ]
        );
    }

    #[test]
    fn test_resolve_rejects_wrongly_typed_fields_per_line() {
        let cipher = cipher();
        let reconciler = reconciler_with(
            cipher.clone(),
            Arc::new(MemoryCartStore::new()),
            CartSettings::default(),
        );
        let token = cipher.encode("p1").unwrap().into_inner();

        let lines: Vec<CartLineRequest> = serde_json::from_value(serde_json::json!([
            {"product_hashed_id": token, "variant_id": "v1", "quantity": 1.5},
            {"product_hashed_id": token, "variant_id": "v2", "quantity": "2"},
            {"product_hashed_id": null, "variant_id": "v3", "quantity": 1},
            {"product_hashed_id": token, "variant_id": 4, "quantity": 1},
            {"variant_id": "v5", "quantity": 1},
            {"product_hashed_id": token, "variant_id": "v6", "quantity": 2},
        ]))
        .unwrap();

        let resolved = reconciler.resolve_client_cart(&lines);

        assert_eq!(resolved.cart.len(), 1);
        assert_eq!(resolved.cart.quantity(&key("p1", "v6")).unwrap().get(), 2);
        let reasons: Vec<(usize, RejectReason)> = resolved
            .rejected
            .iter()
            .map(|r| (r.index, r.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (0, RejectReason::InvalidQuantity),
                (1, RejectReason::InvalidQuantity),
                (2, RejectReason::InvalidToken),
                (3, RejectReason::InvalidVariant),
                (4, RejectReason::InvalidToken),
            ]
        );
    }

    #[test]
    fn test_resolve_flags_foreign_tokens_as_tampered() {
        let ours = cipher();
        let theirs = cipher();
        let reconciler = reconciler_with(
            ours,
            Arc::new(MemoryCartStore::new()),
            CartSettings::default(),
        );

        let resolved = reconciler.resolve_client_cart(&[request(&theirs, "p1", "v1", 1)]);
        assert!(resolved.cart.is_empty());
        assert_eq!(resolved.rejected[0].reason, RejectReason::TamperedToken);
    }

    #[test]
    fn test_resolve_duplicate_keys_last_wins() {
        let cipher = cipher();
        let reconciler = reconciler_with(
            cipher.clone(),
            Arc::new(MemoryCartStore::new()),
            CartSettings::default(),
        );

        let resolved = reconciler.resolve_client_cart(&[
            request(&cipher, "p1", "v1", 2),
            request(&cipher, "p1", "v1", 6),
        ]);
        assert_eq!(resolved.cart.quantity(&key("p1", "v1")).unwrap().get(), 6);
    }

    #[test]
    fn test_preview_reencodes_product_ids() {
        let cipher = cipher();
        let reconciler = reconciler_with(
            cipher.clone(),
            Arc::new(MemoryCartStore::new()),
            CartSettings::default(),
        );
        let submitted = request(&cipher, "p1", "v1", 3);

        let snapshot = reconciler.preview(std::slice::from_ref(&submitted)).unwrap();

        assert_eq!(snapshot.user_cart.len(), 1);
        let line = &snapshot.user_cart[0];
        assert_eq!(line.quantity.get(), 3);
        assert_eq!(line.variant_id.as_str(), "v1");
        assert_ne!(Some(line.product_hashed_id.as_str()), submitted.product_token());
        assert_eq!(cipher.decode(line.product_hashed_id.as_str()).unwrap(), "p1");
        assert!(snapshot.version.is_none());
    }

    #[test]
    fn test_reject_policy_fails_request() {
        let cipher = cipher();
        let settings = CartSettings {
            invalid_line_policy: InvalidLinePolicy::Reject,
            ..CartSettings::default()
        };
        let reconciler =
            reconciler_with(cipher.clone(), Arc::new(MemoryCartStore::new()), settings);

        let err = reconciler
            .preview(&[request(&cipher, "p1", "v1", 1), request(&cipher, "p2", "v1", -1)])
            .unwrap_err();
        assert!(matches!(
            err,
            CartServiceError::InvalidLine(RejectedLine {
                index: 1,
                reason: RejectReason::InvalidQuantity
            })
        ));
    }

    #[test]
    fn test_too_many_lines() {
        let cipher = cipher();
        let settings = CartSettings {
            max_lines: 1,
            ..CartSettings::default()
        };
        let reconciler =
            reconciler_with(cipher.clone(), Arc::new(MemoryCartStore::new()), settings);

        let err = reconciler
            .preview(&[request(&cipher, "p1", "v1", 1), request(&cipher, "p2", "v1", 1)])
            .unwrap_err();
        assert!(matches!(
            err,
            CartServiceError::TooManyLines { count: 2, max: 1 }
        ));
    }

    #[tokio::test]
    async fn test_sync_overwrites_and_unions() {
        let cipher = cipher();
        let store = Arc::new(MemoryCartStore::new());
        let user = UserId::new(1);
        store
            .save_cart(
                user,
                &Cart::from(vec![stored_line("p1", "v1", 5), stored_line("p9", "v1", 1)]),
                UNSAVED_VERSION,
            )
            .await
            .unwrap();

        let reconciler = reconciler_with(cipher.clone(), store.clone(), CartSettings::default());
        let snapshot = reconciler
            .sync(
                user,
                &[request(&cipher, "p1", "v1", 2), request(&cipher, "p2", "v2", 1)],
            )
            .await
            .unwrap();

        assert_eq!(snapshot.version, Some(2));
        assert_eq!(snapshot.user_cart.len(), 3);

        let stored = store.load_cart(user).await.unwrap().unwrap().cart;
        assert_eq!(stored.quantity(&key("p1", "v1")).unwrap().get(), 2);
        assert_eq!(stored.quantity(&key("p2", "v2")).unwrap().get(), 1);
        assert_eq!(stored.quantity(&key("p9", "v1")).unwrap().get(), 1);
    }

    #[tokio::test]
    async fn test_sync_without_changes_skips_write() {
        let cipher = cipher();
        let store = Arc::new(MemoryCartStore::new());
        let user = UserId::new(1);
        store
            .save_cart(user, &Cart::from(vec![stored_line("p1", "v1", 5)]), UNSAVED_VERSION)
            .await
            .unwrap();

        let reconciler = reconciler_with(cipher.clone(), store.clone(), CartSettings::default());
        let snapshot = reconciler
            .sync(user, &[request(&cipher, "p1", "v1", 5)])
            .await
            .unwrap();

        assert_eq!(snapshot.version, Some(1));
        assert_eq!(store.load_cart(user).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_load_presents_stored_cart() {
        let cipher = cipher();
        let store = Arc::new(MemoryCartStore::new());
        let user = UserId::new(3);
        store
            .save_cart(user, &Cart::from(vec![stored_line("p1", "v1", 4)]), UNSAVED_VERSION)
            .await
            .unwrap();

        let reconciler = reconciler_with(cipher.clone(), store, CartSettings::default());
        let snapshot = reconciler.load(user).await.unwrap();

        assert_eq!(snapshot.version, Some(1));
        assert_eq!(snapshot.user_cart.len(), 1);
        assert_eq!(
            cipher
                .decode(snapshot.user_cart[0].product_hashed_id.as_str())
                .unwrap(),
            "p1"
        );
    }

    /// Store that reports a conflict on the first `conflicts` saves.
    struct RacingStore {
        inner: MemoryCartStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl CartStore for RacingStore {
        async fn load_cart(&self, user_id: UserId) -> Result<Option<PersistedCart>, StoreError> {
            self.inner.load_cart(user_id).await
        }

        async fn save_cart(
            &self,
            user_id: UserId,
            cart: &Cart,
            expected_version: i64,
        ) -> Result<i64, StoreError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                // Simulate another request landing first.
                let current = self
                    .inner
                    .load_cart(user_id)
                    .await?
                    .map_or(UNSAVED_VERSION, |p| p.version);
                let mut other = self
                    .inner
                    .load_cart(user_id)
                    .await?
                    .map(|p| p.cart)
                    .unwrap_or_default();
                other.upsert(stored_line("other", "v1", 1));
                self.inner.save_cart(user_id, &other, current).await?;
                return Err(StoreError::VersionConflict {
                    expected: expected_version,
                });
            }
            self.inner.save_cart(user_id, cart, expected_version).await
        }
    }

    #[tokio::test]
    async fn test_sync_retries_on_conflict_without_losing_updates() {
        let cipher = cipher();
        let store = Arc::new(RacingStore {
            inner: MemoryCartStore::new(),
            conflicts: AtomicU32::new(1),
        });
        let user = UserId::new(1);

        let reconciler = reconciler_with(cipher.clone(), store.clone(), CartSettings::default());
        reconciler
            .sync(user, &[request(&cipher, "p1", "v1", 2)])
            .await
            .unwrap();

        let stored = store.inner.load_cart(user).await.unwrap().unwrap().cart;
        assert!(stored.contains(&key("other", "v1")));
        assert!(stored.contains(&key("p1", "v1")));
    }

    #[tokio::test]
    async fn test_sync_gives_up_after_attempts() {
        let cipher = cipher();
        let store = Arc::new(RacingStore {
            inner: MemoryCartStore::new(),
            conflicts: AtomicU32::new(10),
        });
        let settings = CartSettings {
            commit_attempts: 2,
            ..CartSettings::default()
        };

        let reconciler = reconciler_with(cipher.clone(), store, settings);
        let err = reconciler
            .sync(UserId::new(1), &[request(&cipher, "p1", "v1", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, CartServiceError::Contended { attempts: 2 }));
    }

    /// Store that is always down.
    struct DownStore;

    #[async_trait]
    impl CartStore for DownStore {
        async fn load_cart(&self, _user_id: UserId) -> Result<Option<PersistedCart>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn save_cart(
            &self,
            _user_id: UserId,
            _cart: &Cart,
            _expected_version: i64,
        ) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        let cipher = cipher();
        let reconciler =
            reconciler_with(cipher.clone(), Arc::new(DownStore), CartSettings::default());

        let err = reconciler
            .sync(UserId::new(1), &[request(&cipher, "p1", "v1", 2)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CartServiceError::Store(StoreError::Unavailable(_))
        ));
    }
}
