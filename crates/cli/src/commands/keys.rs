//! Identifier cipher key management.
//!
//! # Usage
//!
//! ```bash
//! cartseal keys generate >> .env
//! ```

use cartseal_core::crypto::KeyPair;
use cartseal_storefront::config::{PUBLIC_KEY_VAR, SECRET_KEY_VAR};

/// Render a fresh key pair as `.env` lines.
#[must_use]
pub fn generate() -> String {
    let keys = KeyPair::generate();
    format!(
        "{PUBLIC_KEY_VAR}={}\n{SECRET_KEY_VAR}={}\n",
        keys.public_base64(),
        keys.secret_base64()
    )
}
