//! Crate-level error type for setup paths.
//!
//! Cart operations themselves never fail from the caller's point of view:
//! store failures are logged and the in-memory cart stays authoritative.
//! `CartSyncError` covers the fallible wiring around the engine (loading
//! configuration, connecting to the document database, running migrations).

use thiserror::Error;

use cart_sync_core::UserId;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors raised while assembling or administering the cart engine.
#[derive(Debug, Error)]
pub enum CartSyncError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Database connection failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A guest cart could not be merged because the user's stored cart could
    /// not be read or written. The guest cart is left in place.
    #[error("Guest cart not merged into {0}: stored cart unavailable")]
    MergeDeferred(UserId),

    /// The spawned cart service has exited.
    #[error("Cart service stopped")]
    ServiceStopped,
}

/// Result type alias for `CartSyncError`.
pub type Result<T> = std::result::Result<T, CartSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CartSyncError::from(ConfigError::MissingEnvVar("CART_DATABASE_URL".to_string()));
        assert_eq!(
            err.to_string(),
            "Config error: Missing environment variable: CART_DATABASE_URL"
        );

        let err = CartSyncError::MergeDeferred(UserId::new("u1"));
        assert_eq!(
            err.to_string(),
            "Guest cart not merged into u1: stored cart unavailable"
        );

        let err = CartSyncError::from(StoreError::Unavailable("offline".to_string()));
        assert_eq!(err.to_string(), "Store error: store unavailable: offline");
    }
}
