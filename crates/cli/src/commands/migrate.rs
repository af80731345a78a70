//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! cart-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CART_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! `crates/cart/migrations/`

use cart_sync::{CartSyncConfig, db};

/// Run cart document migrations.
///
/// # Errors
///
/// Returns an error if no database is configured, the connection fails, or a
/// migration fails.
pub async fn run(config: &CartSyncConfig) -> cart_sync::Result<()> {
    let database_url = config.require_database_url()?;

    tracing::info!("Connecting to cart database...");
    let pool = db::create_pool(database_url).await?;

    tracing::info!("Running cart migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Cart migrations complete!");
    Ok(())
}
