//! Cartseal Core - identifier cipher and cart model.
//!
//! This crate provides the pieces shared by every Cartseal component:
//! - `storefront` - Cart API service
//! - `cli` - Key generation, token debugging and migrations
//!
//! # Architecture
//!
//! The core crate contains only types, pure functions and the cipher - no
//! database access, no HTTP. Every cart operation in the service decodes
//! client tokens with [`crypto::IdentifierCipher`], works on the plain ids
//! in [`types`], and encodes them again before responding.
//!
//! # Modules
//!
//! - [`crypto`] - Opaque identifier tokens (NaCl box with the service's own key pair)
//! - [`types`] - Type-safe IDs, quantities, tokens and the cart model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod crypto;
pub mod types;

pub use crypto::{CipherError, IdentifierCipher, KeyError, KeyPair};
pub use types::*;
