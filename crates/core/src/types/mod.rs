//! Core types for Cartseal.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod quantity;
pub mod token;

pub use cart::{Cart, CartLine, CartLineKey, CartLineRequest, CartLineResponse};
pub use id::*;
pub use quantity::{Quantity, QuantityError};
pub use token::OpaqueToken;
