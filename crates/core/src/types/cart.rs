//! Cart data model and merge policy.
//!
//! A [`Cart`] holds at most one line per [`CartLineKey`] (product + variant).
//! Two carts are reconciled with [`Cart::merge`], which implements the
//! overwrite policy: a quantity present in the client cart replaces the
//! stored quantity for the same key, it is never added to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::{ProductId, VariantId};
use super::quantity::Quantity;
use super::token::OpaqueToken;

/// Uniqueness key of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CartLineKey {
    /// Product primary key.
    pub product_id: ProductId,
    /// Variant identifier within the product.
    pub variant_id: VariantId,
}

impl CartLineKey {
    /// Create a key from its parts.
    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: VariantId) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }
}

/// A single cart line with plain (server-side) identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product primary key (never sent to clients in this form).
    pub product_id: ProductId,
    /// Variant identifier within the product.
    pub variant_id: VariantId,
    /// Number of units.
    pub quantity: Quantity,
}

impl CartLine {
    /// Create a cart line.
    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: VariantId, quantity: Quantity) -> Self {
        Self {
            product_id,
            variant_id,
            quantity,
        }
    }

    /// The composite key of this line.
    #[must_use]
    pub fn key(&self) -> CartLineKey {
        CartLineKey::new(self.product_id.clone(), self.variant_id.clone())
    }
}

/// An unordered collection of cart lines, unique by [`CartLineKey`].
///
/// Iteration follows key order so that responses and stored documents are
/// deterministic. Serializes as a JSON array of [`CartLine`]; when an array
/// contains the same key twice, the later entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct Cart {
    lines: BTreeMap<CartLineKey, Quantity>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a line, replacing the quantity of an existing line with the same key.
    ///
    /// Returns the replaced quantity, if any.
    pub fn upsert(&mut self, line: CartLine) -> Option<Quantity> {
        let CartLine {
            product_id,
            variant_id,
            quantity,
        } = line;
        self.lines
            .insert(CartLineKey::new(product_id, variant_id), quantity)
    }

    /// Quantity stored for a key.
    #[must_use]
    pub fn quantity(&self, key: &CartLineKey) -> Option<Quantity> {
        self.lines.get(key).copied()
    }

    /// Whether the cart has a line for the key.
    #[must_use]
    pub fn contains(&self, key: &CartLineKey) -> bool {
        self.lines.contains_key(key)
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.values().map(|q| u64::from(q.get())).sum()
    }

    /// Iterate over the lines in key order.
    pub fn lines(&self) -> impl Iterator<Item = CartLine> + '_ {
        self.lines.iter().map(|(key, quantity)| {
            CartLine::new(key.product_id.clone(), key.variant_id.clone(), *quantity)
        })
    }

    /// Reconcile a client-held cart with a stored cart.
    ///
    /// The result contains every key of either input. For keys present in
    /// `local` the local quantity is used; other keys keep the `persisted`
    /// quantity. Quantities are never summed, so replaying the same client
    /// cart any number of times yields the same result.
    #[must_use]
    pub fn merge(local: &Self, persisted: &Self) -> Self {
        let mut merged = persisted.clone();
        for (key, quantity) in &local.lines {
            merged.lines.insert(key.clone(), *quantity);
        }
        merged
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        lines.into_iter().collect()
    }
}

impl From<Cart> for Vec<CartLine> {
    fn from(cart: Cart) -> Self {
        cart.lines
            .into_iter()
            .map(|(key, quantity)| CartLine::new(key.product_id, key.variant_id, quantity))
            .collect()
    }
}

impl FromIterator<CartLine> for Cart {
    fn from_iter<I: IntoIterator<Item = CartLine>>(iter: I) -> Self {
        let mut cart = Self::new();
        for line in iter {
            cart.upsert(line);
        }
        cart
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// A cart line as submitted by a client.
///
/// Every field is kept as raw JSON so each line is validated on its own: a
/// missing field, a `null` or a value of the wrong type rejects that line
/// only, never the rest of the payload. Any JSON value deserializes; values
/// that are not objects yield a line with every field `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct CartLineRequest {
    /// Opaque token for the product primary key.
    pub product_hashed_id: Value,
    /// Variant identifier (plaintext).
    pub variant_id: Value,
    /// Requested quantity; must be a positive integer.
    pub quantity: Value,
}

impl CartLineRequest {
    /// Build a well-typed request line.
    #[must_use]
    pub fn new(product_hashed_id: &str, variant_id: &str, quantity: i64) -> Self {
        Self {
            product_hashed_id: Value::from(product_hashed_id),
            variant_id: Value::from(variant_id),
            quantity: Value::from(quantity),
        }
    }

    /// The product token, if it is a string.
    #[must_use]
    pub fn product_token(&self) -> Option<&str> {
        self.product_hashed_id.as_str()
    }

    /// The variant id, if it is a string.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant_id.as_str()
    }

    /// The quantity, if it is an integral JSON number.
    ///
    /// Fractions and numeric strings such as `"2"` are not quantities.
    #[must_use]
    pub fn requested_quantity(&self) -> Option<i64> {
        self.quantity.as_i64()
    }
}

impl From<Value> for CartLineRequest {
    fn from(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        Self {
            product_hashed_id: fields.remove("product_hashed_id").unwrap_or_default(),
            variant_id: fields.remove("variant_id").unwrap_or_default(),
            quantity: fields.remove("quantity").unwrap_or_default(),
        }
    }
}

/// A cart line as returned to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineResponse {
    /// Freshly encoded product token.
    pub product_hashed_id: OpaqueToken,
    /// Variant identifier (plaintext).
    pub variant_id: VariantId,
    /// Line quantity.
    pub quantity: Quantity,
}
