//! Opaque identifier token type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A client-visible token standing in for an internal primary key.
///
/// Produced by [`IdentifierCipher::encode`](crate::crypto::IdentifierCipher::encode).
/// The text is `base64(nonce || ciphertext)` escaped as a URI component,
/// with `! ' ( ) *` left literal, so it can be embedded in URL paths and
/// query strings as-is.
///
/// Holding an `OpaqueToken` says nothing about validity: tokens arriving
/// from clients are only trusted once they have been decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueToken(String);

impl OpaqueToken {
    pub(crate) const fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token and returns its text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for OpaqueToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OpaqueToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
