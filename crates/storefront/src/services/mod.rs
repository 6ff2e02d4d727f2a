//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart` - Cart reconciliation (decode, merge, persist, re-encode)

pub mod cart;
