//! Encode and decode opaque identifier tokens from the shell.
//!
//! Uses the same key material as the storefront, read from
//! `CARTSEAL_PUBLIC_KEY_BASE64` and `CARTSEAL_SECRET_KEY_BASE64`.
//!
//! # Usage
//!
//! ```bash
//! cartseal token encode 64f1c0ffee
//! cartseal token decode 'q0Zx...%3D'
//! ```

use cartseal_core::crypto::{CipherError, IdentifierCipher, KeyPair};
use cartseal_storefront::config::{ConfigError, PUBLIC_KEY_VAR, SECRET_KEY_VAR, load_key_pair};
use secrecy::SecretString;
use thiserror::Error;

/// Errors from token commands.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Key material could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cipher rejected the input.
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Load the cipher key pair from the environment.
///
/// # Errors
///
/// Returns `ConfigError` if either key is missing or invalid.
pub fn key_pair_from_env() -> Result<KeyPair, ConfigError> {
    dotenvy::dotenv().ok();

    let public = std::env::var(PUBLIC_KEY_VAR)
        .map_err(|_| ConfigError::MissingEnvVar(PUBLIC_KEY_VAR.to_string()))?;
    let secret = std::env::var(SECRET_KEY_VAR)
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(SECRET_KEY_VAR.to_string()))?;

    load_key_pair(&public, &secret)
}

/// Encode a plain identifier into a token.
///
/// # Errors
///
/// Returns `TokenError` if the input is empty or encryption fails.
pub fn encode(keys: &KeyPair, plain: &str) -> Result<String, TokenError> {
    let cipher = IdentifierCipher::new(keys);
    Ok(cipher.encode(plain)?.into_inner())
}

/// Decode a token back into the plain identifier.
///
/// # Errors
///
/// Returns `TokenError` if the token is malformed or fails authentication.
pub fn decode(keys: &KeyPair, token: &str) -> Result<String, TokenError> {
    let cipher = IdentifierCipher::new(keys);
    Ok(cipher.decode(token)?)
}
