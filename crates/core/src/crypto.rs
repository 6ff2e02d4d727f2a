//! Opaque identifier cipher.
//!
//! Turns internal primary keys into tamper-evident tokens and back.
//!
//! # Construction
//!
//! The service holds one X25519 [`KeyPair`] and seals every identifier in a
//! NaCl box addressed from itself to itself. Because both sides of the box
//! are the same key pair, the X25519 shared secret is a constant: it is
//! computed once in [`IdentifierCipher::new`] and from then on the box is
//! plain XSalsa20-Poly1305 authenticated symmetric encryption. Tokens are
//! byte-compatible with `nacl.box(msg, nonce, publicKey, secretKey)`.
//!
//! # Token format
//!
//! ```text
//! base64( nonce[24] || ciphertext[len(msg) + 16] )
//!   -> URI-component escaping, with %21 %27 %28 %29 %2A put back as ! ' ( ) *
//! ```

use base64::{Engine, engine::general_purpose::STANDARD};
use crypto_box::aead::Aead;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::RngCore;

use crate::types::id::ProductId;
use crate::types::token::OpaqueToken;

/// Length of an X25519 scalar in bytes (public and secret).
pub const KEY_LEN: usize = 32;

/// Length of the per-token nonce in bytes.
pub const NONCE_LEN: usize = 24;

/// Length of the Poly1305 authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Characters that `encodeURIComponent` leaves literal but a generic
/// percent-encoder escapes. Restored after encoding.
const LITERAL_ESCAPES: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Errors produced while encoding or decoding identifiers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// The input is not something this cipher could have produced.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Authentication failed: the token was tampered with, truncated, or
    /// sealed under a different key.
    #[error("decryption failed")]
    Decryption,
    /// Sealing failed. Not expected for in-memory inputs.
    #[error("encryption failed")]
    Encryption,
}

/// Errors produced while loading key material.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// A key is not valid base64.
    #[error("{which} key is not valid base64")]
    InvalidEncoding {
        /// `"public"` or `"secret"`.
        which: &'static str,
    },
    /// A key has the wrong number of bytes.
    #[error("{which} key must be {expected} bytes (got {actual})")]
    InvalidLength {
        /// `"public"` or `"secret"`.
        which: &'static str,
        /// Required length.
        expected: usize,
        /// Decoded length.
        actual: usize,
    },
    /// The public key is not the one derived from the secret key.
    #[error("public key does not belong to the secret key")]
    Mismatch,
}

// =============================================================================
// Key Pair
// =============================================================================

/// The service's X25519 key pair.
///
/// Loaded once at startup and held for the process lifetime. `Debug` never
/// prints the secret scalar.
pub struct KeyPair {
    public: PublicKey,
    secret: SecretKey,
}

impl KeyPair {
    /// Build a key pair from raw scalars.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if either slice is not 32 bytes,
    /// or [`KeyError::Mismatch`] if `public` is not derived from `secret`.
    pub fn from_bytes(public: &[u8], secret: &[u8]) -> Result<Self, KeyError> {
        let public: [u8; KEY_LEN] = public.try_into().map_err(|_| KeyError::InvalidLength {
            which: "public",
            expected: KEY_LEN,
            actual: public.len(),
        })?;
        let secret: [u8; KEY_LEN] = secret.try_into().map_err(|_| KeyError::InvalidLength {
            which: "secret",
            expected: KEY_LEN,
            actual: secret.len(),
        })?;

        let secret = SecretKey::from(secret);
        let public = PublicKey::from(public);
        if secret.public_key().as_bytes() != public.as_bytes() {
            return Err(KeyError::Mismatch);
        }

        Ok(Self { public, secret })
    }

    /// Build a key pair from the base64 text stored in configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidEncoding`] for malformed base64, otherwise
    /// the errors of [`KeyPair::from_bytes`].
    pub fn from_base64(public: &str, secret: &str) -> Result<Self, KeyError> {
        let public = STANDARD
            .decode(public.trim())
            .map_err(|_| KeyError::InvalidEncoding { which: "public" })?;
        let secret = STANDARD
            .decode(secret.trim())
            .map_err(|_| KeyError::InvalidEncoding { which: "secret" })?;
        Self::from_bytes(&public, &secret)
    }

    /// Generate a fresh key pair from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { public, secret }
    }

    /// Public scalar as base64.
    #[must_use]
    pub fn public_base64(&self) -> String {
        STANDARD.encode(self.public.as_bytes())
    }

    /// Secret scalar as base64. Only for writing fresh keys out once.
    #[must_use]
    pub fn secret_base64(&self) -> String {
        STANDARD.encode(self.secret.to_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_base64())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Box Cipher
// =============================================================================

/// Authenticated encryption under a fixed key.
///
/// Separates the symmetric primitive from token framing, so the framing can
/// be exercised with any sealed-box implementation.
pub trait BoxCipher: Send + Sync {
    /// Seal `msg` under `nonce`. The output is `msg.len() + TAG_LEN` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encryption`] if the primitive fails.
    fn seal(&self, nonce: &[u8; NONCE_LEN], msg: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Open `ciphertext` sealed under `nonce`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decryption`] if authentication fails.
    fn open(&self, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// NaCl box from the service key pair to itself, precomputed.
pub struct SelfBox {
    inner: SalsaBox,
}

impl SelfBox {
    /// Derive the shared key for `keys` boxed to itself.
    #[must_use]
    pub fn new(keys: &KeyPair) -> Self {
        Self {
            inner: SalsaBox::new(&keys.public, &keys.secret),
        }
    }
}

impl BoxCipher for SelfBox {
    fn seal(&self, nonce: &[u8; NONCE_LEN], msg: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.inner
            .encrypt(GenericArray::from_slice(nonce), msg)
            .map_err(|_| CipherError::Encryption)
    }

    fn open(&self, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        self.inner
            .decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decryption)
    }
}

// =============================================================================
// Identifier Cipher
// =============================================================================

/// Encodes primary keys into [`OpaqueToken`]s and decodes them back.
///
/// Stateless after construction; share it behind an `Arc`.
///
/// ```
/// use cartseal_core::crypto::{IdentifierCipher, KeyPair};
///
/// let cipher = IdentifierCipher::new(&KeyPair::generate());
/// let token = cipher.encode("66f1c0ffee00000000000001").unwrap();
/// assert_eq!(cipher.decode(token.as_str()).unwrap(), "66f1c0ffee00000000000001");
/// ```
pub struct IdentifierCipher<C = SelfBox> {
    cipher: C,
}

impl IdentifierCipher<SelfBox> {
    /// Create a cipher for the service key pair.
    #[must_use]
    pub fn new(keys: &KeyPair) -> Self {
        Self::with_box(SelfBox::new(keys))
    }
}

impl<C: BoxCipher> IdentifierCipher<C> {
    /// Create a cipher over an arbitrary sealed-box primitive.
    pub const fn with_box(cipher: C) -> Self {
        Self { cipher }
    }

    /// Encode a plain identifier.
    ///
    /// Every call draws a fresh nonce, so encoding the same identifier twice
    /// yields two different tokens.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidInput`] if `plain` is empty.
    pub fn encode(&self, plain: &str) -> Result<OpaqueToken, CipherError> {
        if plain.is_empty() {
            return Err(CipherError::InvalidInput(
                "identifier must be a non-empty string".to_owned(),
            ));
        }

        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let sealed = self.cipher.seal(&nonce, plain.as_bytes())?;

        let mut framed = Vec::with_capacity(NONCE_LEN + sealed.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&sealed);

        Ok(OpaqueToken::from_encoded(escape_component(
            &STANDARD.encode(framed),
        )))
    }

    /// Decode a token back into the plain identifier.
    ///
    /// # Errors
    ///
    /// - [`CipherError::InvalidInput`] if the token is empty, not valid
    ///   percent-encoded base64, shorter than a nonce, or opens to non-UTF-8.
    /// - [`CipherError::Decryption`] if authentication fails.
    pub fn decode(&self, token: &str) -> Result<String, CipherError> {
        if token.is_empty() {
            return Err(CipherError::InvalidInput(
                "token must be a non-empty string".to_owned(),
            ));
        }

        let text = unescape_component(token)?;
        let framed = STANDARD
            .decode(text.as_bytes())
            .map_err(|e| CipherError::InvalidInput(format!("token is not valid base64: {e}")))?;

        if framed.len() < NONCE_LEN {
            return Err(CipherError::InvalidInput(format!(
                "token is shorter than a nonce ({} < {NONCE_LEN} bytes)",
                framed.len()
            )));
        }
        let (nonce, ciphertext) = framed.split_at(NONCE_LEN);
        let nonce: &[u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| CipherError::InvalidInput("malformed nonce".to_owned()))?;

        let plain = self.cipher.open(nonce, ciphertext)?;

        String::from_utf8(plain)
            .map_err(|_| CipherError::InvalidInput("identifier is not UTF-8".to_owned()))
    }

    /// Decode a product token into a validated [`ProductId`].
    ///
    /// # Errors
    ///
    /// Returns the errors of [`IdentifierCipher::decode`], or
    /// [`CipherError::InvalidInput`] if the identifier is empty.
    pub fn decode_product(&self, token: &str) -> Result<ProductId, CipherError> {
        let plain = self.decode(token)?;
        ProductId::parse(&plain).map_err(|e| CipherError::InvalidInput(e.to_string()))
    }
}

impl<C> std::fmt::Debug for IdentifierCipher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierCipher").finish_non_exhaustive()
    }
}

/// URI-component escaping with `! ' ( ) *` left literal.
fn escape_component(text: &str) -> String {
    let mut escaped = urlencoding::encode(text).into_owned();
    for (escape, literal) in LITERAL_ESCAPES {
        escaped = escaped.replace(escape, literal);
    }
    escaped
}

/// Reverse of [`escape_component`].
///
/// Tokens that were escaped twice on the way in (`%252B`) are unescaped a
/// second time. Literal `+` is kept, so a raw base64 token also decodes.
fn unescape_component(token: &str) -> Result<String, CipherError> {
    let mut text = decode_percent(token)?;
    if text.contains('%') {
        text = decode_percent(&text)?;
    }
    Ok(text)
}

fn decode_percent(text: &str) -> Result<String, CipherError> {
    urlencoding::decode(text)
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| CipherError::InvalidInput("token is not valid percent-encoding".to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Fixed scalars so failures are reproducible.
    const SECRET: [u8; KEY_LEN] = [7u8; KEY_LEN];

    fn fixed_keys() -> KeyPair {
        let secret = SecretKey::from(SECRET);
        let public = secret.public_key();
        KeyPair::from_bytes(public.as_bytes(), &SECRET).unwrap()
    }

    fn cipher() -> IdentifierCipher {
        IdentifierCipher::new(&fixed_keys())
    }

    #[test]
    fn test_roundtrip_object_id() {
        let cipher = cipher();
        let token = cipher.encode("66f1c0ffee00000000000001").unwrap();
        assert_eq!(
            cipher.decode(token.as_str()).unwrap(),
            "66f1c0ffee00000000000001"
        );
    }

    #[test]
    fn test_encode_is_not_deterministic() {
        let cipher = cipher();
        let a = cipher.encode("p1").unwrap();
        let b = cipher.encode("p1").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decode(a.as_str()).unwrap(), "p1");
        assert_eq!(cipher.decode(b.as_str()).unwrap(), "p1");
    }

    #[test]
    fn test_token_is_url_component_safe() {
        let cipher = cipher();
        for _ in 0..64 {
            let token = cipher.encode("66f1c0ffee00000000000001").unwrap();
            assert!(
                token
                    .as_str()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "%-_.~!'()*".contains(c)),
                "unexpected character in {token}"
            );
            assert!(!token.as_str().contains('+'));
            assert!(!token.as_str().contains('/'));
            assert!(!token.as_str().contains('='));
        }
    }

    #[test]
    fn test_token_length_matches_frame() {
        let cipher = cipher();
        let token = cipher.encode("abc").unwrap();
        let raw = STANDARD
            .decode(unescape_component(token.as_str()).unwrap())
            .unwrap();
        assert_eq!(raw.len(), NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn test_encode_rejects_empty() {
        assert!(matches!(
            cipher().encode(""),
            Err(CipherError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(
            cipher().decode(""),
            Err(CipherError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_rejects_malformed_base64() {
        assert!(matches!(
            cipher().decode("not-base64!!"),
            Err(CipherError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_rejects_input_shorter_than_nonce() {
        let short = STANDARD.encode([0u8; NONCE_LEN - 1]);
        assert!(matches!(
            cipher().decode(&short),
            Err(CipherError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_truncated_ciphertext_fails_authentication() {
        let cipher = cipher();
        let token = cipher.encode("66f1c0ffee00000000000001").unwrap();
        let mut raw = STANDARD
            .decode(unescape_component(token.as_str()).unwrap())
            .unwrap();
        raw.truncate(NONCE_LEN + 4);
        assert_eq!(
            cipher.decode(&STANDARD.encode(raw)),
            Err(CipherError::Decryption)
        );
    }

    #[test]
    fn test_decode_with_wrong_key_fails() {
        let token = cipher().encode("p1").unwrap();
        let other = IdentifierCipher::new(&KeyPair::generate());
        assert_eq!(other.decode(token.as_str()), Err(CipherError::Decryption));
    }

    #[test]
    fn test_decode_accepts_raw_and_double_escaped_tokens() {
        let cipher = cipher();
        let token = cipher.encode("66f1c0ffee00000000000001").unwrap();
        let raw = unescape_component(token.as_str()).unwrap();
        let double = urlencoding::encode(token.as_str()).into_owned();

        assert_eq!(cipher.decode(&raw).unwrap(), "66f1c0ffee00000000000001");
        assert_eq!(cipher.decode(&double).unwrap(), "66f1c0ffee00000000000001");
    }

    #[test]
    fn test_decode_product_validates() {
        let cipher = cipher();
        let token = cipher.encode("p1").unwrap();
        assert_eq!(cipher.decode_product(token.as_str()).unwrap().as_str(), "p1");
    }

    #[test]
    fn test_escape_restores_literal_characters() {
        assert_eq!(escape_component("a!b'c(d)e*f"), "a!b'c(d)e*f");
        assert_eq!(escape_component("a+b/c="), "a%2Bb%2Fc%3D");
    }

    #[test]
    fn test_key_pair_rejects_wrong_lengths() {
        let err = KeyPair::from_bytes(&[1u8; 31], &SECRET).unwrap_err();
        assert_eq!(
            err,
            KeyError::InvalidLength {
                which: "public",
                expected: KEY_LEN,
                actual: 31
            }
        );

        let public = SecretKey::from(SECRET).public_key();
        let err = KeyPair::from_bytes(public.as_bytes(), &[1u8; 33]).unwrap_err();
        assert!(matches!(
            err,
            KeyError::InvalidLength {
                which: "secret",
                ..
            }
        ));
    }

    #[test]
    fn test_key_pair_rejects_mismatched_public_key() {
        let err = KeyPair::from_bytes(&[9u8; KEY_LEN], &SECRET).unwrap_err();
        assert_eq!(err, KeyError::Mismatch);
    }

    #[test]
    fn test_key_pair_base64_roundtrip() {
        let keys = KeyPair::generate();
        let loaded = KeyPair::from_base64(&keys.public_base64(), &keys.secret_base64()).unwrap();

        let token = IdentifierCipher::new(&keys).encode("p1").unwrap();
        assert_eq!(
            IdentifierCipher::new(&loaded).decode(token.as_str()).unwrap(),
            "p1"
        );
    }

    #[test]
    fn test_key_pair_rejects_bad_base64() {
        assert_eq!(
            KeyPair::from_base64("***", "AAAA").unwrap_err(),
            KeyError::InvalidEncoding { which: "public" }
        );
    }

    #[test]
    fn test_key_pair_debug_redacts_secret() {
        let keys = fixed_keys();
        let debug = format!("{keys:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&keys.secret_base64()));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plain in "\\PC{1,64}") {
            let cipher = cipher();
            let token = cipher.encode(&plain).unwrap();
            prop_assert_eq!(cipher.decode(token.as_str()).unwrap(), plain);
        }

        #[test]
        fn prop_roundtrip_hex_ids(plain in "[0-9a-f]{24}") {
            let cipher = cipher();
            let token = cipher.encode(&plain).unwrap();
            prop_assert_eq!(cipher.decode(token.as_str()).unwrap(), plain);
        }

        #[test]
        fn prop_single_byte_flip_is_detected(offset in 0usize..(24 + TAG_LEN), bit in 0u8..8) {
            let cipher = cipher();
            let token = cipher.encode("66f1c0ffee00000000000001").unwrap();
            let mut raw = STANDARD
                .decode(unescape_component(token.as_str()).unwrap())
                .unwrap();
            let idx = NONCE_LEN + offset;
            raw[idx] ^= 1 << bit;
            let tampered = escape_component(&STANDARD.encode(raw));
            prop_assert_eq!(cipher.decode(&tampered), Err(CipherError::Decryption));
        }
    }
}
