//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CARTSEAL_PUBLIC_KEY_BASE64` - Identifier cipher public key (32 bytes, base64)
//! - `CARTSEAL_SECRET_KEY_BASE64` - Identifier cipher secret key (32 bytes, base64)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CART_INVALID_LINE_POLICY` - `drop` or `reject` (default: drop)
//! - `CART_COMMIT_ATTEMPTS` - Optimistic commit attempts, 1-10 (default: 3)
//! - `CART_MAX_LINES` - Maximum distinct lines per cart (default: 100)
//! - `LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0-1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate, 0.0-1.0 (default: 0.0)
//!
//! Key material is validated here, so a process with missing or malformed
//! keys exits before it binds a socket.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use cartseal_core::crypto::{KeyError, KeyPair};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Environment variable holding the public key.
pub const PUBLIC_KEY_VAR: &str = "CARTSEAL_PUBLIC_KEY_BASE64";
/// Environment variable holding the secret key.
pub const SECRET_KEY_VAR: &str = "CARTSEAL_SECRET_KEY_BASE64";

const MIN_ENTROPY_BITS_PER_BYTE: f64 = 3.3;
const MAX_COMMIT_ATTEMPTS: u32 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(#[from] KeyError),
}

/// What to do with a client cart line that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidLinePolicy {
    /// Drop the line and report it back in `rejected_lines`.
    #[default]
    Drop,
    /// Fail the whole request with 400.
    Reject,
}

impl FromStr for InvalidLinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "reject" => Ok(Self::Reject),
            other => Err(format!("expected 'drop' or 'reject', got '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Cart reconciliation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSettings {
    /// Handling of client lines that fail validation.
    pub invalid_line_policy: InvalidLinePolicy,
    /// How many load/merge/commit cycles to try before giving up on a
    /// contended cart.
    pub commit_attempts: u32,
    /// Maximum distinct lines in a submitted or merged cart.
    pub max_lines: usize,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            invalid_line_policy: InvalidLinePolicy::Drop,
            commit_attempts: 3,
            max_lines: 100,
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Identifier cipher key pair
    pub key_pair: Arc<KeyPair>,
    /// Cart reconciliation settings
    pub cart: CartSettings,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., production, staging)
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if the key material is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;

        let key_pair = load_key_pair(
            &get_required_env(PUBLIC_KEY_VAR)?,
            &get_required_secret(SECRET_KEY_VAR)?,
        )?;

        let cart = CartSettings::from_env()?;
        let log_format = parse_env_or_default::<LogFormat>("LOG_FORMAT", "pretty")?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = parse_rate("SENTRY_SAMPLE_RATE", "1.0")?;
        let sentry_traces_sample_rate = parse_rate("SENTRY_TRACES_SAMPLE_RATE", "0.0")?;

        Ok(Self {
            database_url,
            host,
            port,
            key_pair: Arc::new(key_pair),
            cart,
            log_format,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CartSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let invalid_line_policy =
            parse_env_or_default::<InvalidLinePolicy>("CART_INVALID_LINE_POLICY", "drop")?;

        let commit_attempts = parse_env_or_default::<u32>(
            "CART_COMMIT_ATTEMPTS",
            &defaults.commit_attempts.to_string(),
        )?;
        if !(1..=MAX_COMMIT_ATTEMPTS).contains(&commit_attempts) {
            return Err(ConfigError::InvalidEnvVar(
                "CART_COMMIT_ATTEMPTS".to_string(),
                format!("must be between 1 and {MAX_COMMIT_ATTEMPTS}"),
            ));
        }

        let max_lines =
            parse_env_or_default::<usize>("CART_MAX_LINES", &defaults.max_lines.to_string())?;
        if max_lines == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CART_MAX_LINES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            invalid_line_policy,
            commit_attempts,
            max_lines,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Decode and validate the identifier cipher key pair.
///
/// # Errors
///
/// Returns `ConfigError::InvalidKeyMaterial` if either key is malformed or
/// the pair does not match, and `ConfigError::InsecureSecret` if the secret
/// scalar is an obvious placeholder (e.g., all zero bytes).
pub fn load_key_pair(public: &str, secret: &SecretString) -> Result<KeyPair, ConfigError> {
    let secret_bytes = STANDARD
        .decode(secret.expose_secret().trim())
        .map_err(|_| KeyError::InvalidEncoding { which: "secret" })?;
    validate_key_entropy(&secret_bytes, SECRET_KEY_VAR)?;

    Ok(KeyPair::from_base64(public, secret.expose_secret())?)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a sample rate in `0.0..=1.0`.
fn parse_rate(key: &str, default: &str) -> Result<f32, ConfigError> {
    let rate = parse_env_or_default::<f32>(key, default)?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}

/// Calculate Shannon entropy in bits per byte.
fn shannon_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<u8, usize> = HashMap::new();
    for b in bytes {
        *freq.entry(*b).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Key length will never exceed f64 precision
    let len = bytes.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Byte count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject key material that is clearly not random (zero-filled, repeated bytes).
fn validate_key_entropy(bytes: &[u8], var_name: &str) -> Result<(), ConfigError> {
    let entropy = shannon_entropy(bytes);
    if entropy < MIN_ENTROPY_BITS_PER_BYTE {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/byte, need >= {MIN_ENTROPY_BITS_PER_BYTE:.1}). Generate keys with `cartseal keys generate`."
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy(&[]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_byte() {
        // All same byte = 0 entropy
        assert!((shannon_entropy(&[0u8; 32]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_bytes() {
        let entropy = shannon_entropy(&[1, 2]);
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_load_key_pair_valid() {
        let keys = KeyPair::generate();
        let loaded = load_key_pair(
            &keys.public_base64(),
            &SecretString::from(keys.secret_base64()),
        );
        assert!(loaded.is_ok());
    }

    #[test]
    fn test_load_key_pair_zero_secret_is_insecure() {
        let zero = STANDARD.encode([0u8; 32]);
        let result = load_key_pair(&zero, &SecretString::from(zero.clone()));
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_load_key_pair_wrong_length() {
        let keys = KeyPair::generate();
        let short = STANDARD.encode([1u8; 16]);
        let result = load_key_pair(&short, &SecretString::from(keys.secret_base64()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidKeyMaterial(KeyError::InvalidLength { .. }))
        ));
    }

    #[test]
    fn test_load_key_pair_mismatch() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let result = load_key_pair(&a.public_base64(), &SecretString::from(b.secret_base64()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidKeyMaterial(KeyError::Mismatch))
        ));
    }

    #[test]
    fn test_load_key_pair_bad_base64() {
        let keys = KeyPair::generate();
        let result = load_key_pair(&keys.public_base64(), &SecretString::from("%%%".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidKeyMaterial(KeyError::InvalidEncoding { which: "secret" }))
        ));
    }

    #[test]
    fn test_invalid_line_policy_parse() {
        assert_eq!("drop".parse::<InvalidLinePolicy>(), Ok(InvalidLinePolicy::Drop));
        assert_eq!(
            " Reject ".parse::<InvalidLinePolicy>(),
            Ok(InvalidLinePolicy::Reject)
        );
        assert!("sum".parse::<InvalidLinePolicy>().is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_cart_settings_defaults() {
        let settings = CartSettings::default();
        assert_eq!(settings.invalid_line_policy, InvalidLinePolicy::Drop);
        assert_eq!(settings.commit_attempts, 3);
        assert_eq!(settings.max_lines, 100);
    }
}
