//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_URL` - Base URL of the cart API (e.g., <https://shop.example.com/api/>)
//!
//! ## Optional
//! - `CART_STORAGE_DIR` - Directory for device-local storage (default: .cartsync)
//! - `CART_STORAGE_KEY` - Storage key holding the anonymous cart (default: cart)
//! - `CART_CSRF_TOKEN` - Anti-forgery token sent on mutating requests
//! - `CART_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `CART_MIGRATION_POLICY` - `clear-always` (default) or `retain-on-failure`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::reconciler::MigrationPolicy;

/// Default storage key for the anonymous cart.
pub const DEFAULT_STORAGE_KEY: &str = "cart";

const DEFAULT_STORAGE_DIR: &str = ".cartsync";
const DEFAULT_TIMEOUT_SECS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct CartClientConfig {
    /// Remote cart API connection settings
    pub api: CartApiConfig,
    /// Directory backing device-local storage
    pub storage_dir: PathBuf,
    /// Key under which the anonymous cart is stored
    pub storage_key: String,
    /// What to do with the local cart when migration fails
    pub migration_policy: MigrationPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote cart API configuration.
///
/// Implements `Debug` manually to redact the anti-forgery token.
#[derive(Clone)]
pub struct CartApiConfig {
    /// Base URL; `cart` and `auth/token` are resolved against it
    pub base_url: Url,
    /// Anti-forgery token sent as `X-CSRF-Token`
    pub csrf_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CartApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "csrf_token",
                &self.csrf_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CartApiConfig {
    /// Configuration with defaults for everything but the base URL.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            csrf_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl CartClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_env::<Url>("CART_API_URL", &get_required_env("CART_API_URL")?)?;
        let timeout_secs = parse_env::<u64>(
            "CART_REQUEST_TIMEOUT_SECS",
            &get_env_or_default("CART_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        )?;
        let migration_policy = parse_env::<MigrationPolicy>(
            "CART_MIGRATION_POLICY",
            &get_env_or_default("CART_MIGRATION_POLICY", "clear-always"),
        )?;

        Ok(Self {
            api: CartApiConfig {
                base_url: with_trailing_slash(base_url),
                csrf_token: get_optional_env("CART_CSRF_TOKEN").map(SecretString::from),
                timeout: Duration::from_secs(timeout_secs),
            },
            storage_dir: PathBuf::from(get_env_or_default("CART_STORAGE_DIR", DEFAULT_STORAGE_DIR)),
            storage_key: get_env_or_default("CART_STORAGE_KEY", DEFAULT_STORAGE_KEY),
            migration_policy,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a raw value, naming the variable in the error.
fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
