//! Cart sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CART_DATABASE_URL` - `PostgreSQL` connection string for remote cart documents
//!   (falls back to `DATABASE_URL`; without either, remote carts are kept in memory)
//! - `CART_GUEST_STORE_DIR` - Directory for the device-local guest cart (default: .cart)
//! - `CART_GUEST_KEY` - Guest cart slot key (default: cart)
//! - `CART_DOCUMENT_CACHE_CAPACITY` - Cached remote documents (default: 10000)
//! - `CART_DOCUMENT_CACHE_TTL_SECS` - Cache lifetime in seconds (default: 300)
//! - `CART_LOG_JSON` - Emit JSON logs (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::persistence::DEFAULT_GUEST_KEY;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart sync configuration.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct CartSyncConfig {
    /// `PostgreSQL` connection URL for remote cart documents (contains password)
    pub database_url: Option<SecretString>,
    /// Directory holding the guest cart file
    pub guest_store_dir: PathBuf,
    /// Key of the guest cart slot
    pub guest_key: String,
    /// Maximum number of cached remote documents
    pub document_cache_capacity: u64,
    /// How long a cached remote document stays valid
    pub document_cache_ttl: Duration,
    /// Emit logs as JSON
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for CartSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSyncConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("guest_store_dir", &self.guest_store_dir)
            .field("guest_key", &self.guest_key)
            .field("document_cache_capacity", &self.document_cache_capacity)
            .field("document_cache_ttl", &self.document_cache_ttl)
            .field("log_json", &self.log_json)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl Default for CartSyncConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            guest_store_dir: PathBuf::from(".cart"),
            guest_key: DEFAULT_GUEST_KEY.to_string(),
            document_cache_capacity: 10_000,
            document_cache_ttl: Duration::from_secs(300),
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl CartSyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = lookup("CART_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .map(SecretString::from);
        let guest_store_dir = lookup("CART_GUEST_STORE_DIR")
            .map_or(defaults.guest_store_dir, PathBuf::from);
        let guest_key = lookup("CART_GUEST_KEY").unwrap_or(defaults.guest_key);
        if guest_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "CART_GUEST_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let document_cache_capacity = parse_or(
            &lookup,
            "CART_DOCUMENT_CACHE_CAPACITY",
            defaults.document_cache_capacity,
        )?;
        let document_cache_ttl = Duration::from_secs(parse_or(
            &lookup,
            "CART_DOCUMENT_CACHE_TTL_SECS",
            defaults.document_cache_ttl.as_secs(),
        )?);
        let log_json = parse_or(&lookup, "CART_LOG_JSON", defaults.log_json)?;

        Ok(Self {
            database_url,
            guest_store_dir,
            guest_key,
            document_cache_capacity,
            document_cache_ttl,
            log_json,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }

    /// The database URL, or an error naming the variable to set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no database is configured.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CART_DATABASE_URL".to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse an optional variable, falling back to a default when unset.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
