//! `PostgreSQL` document store.
//!
//! # Table: `cart_documents`
//!
//! - `user_id` - `TEXT` primary key
//! - `document` - `JSONB` holding `{ "items": [...] }`
//! - `updated_at` - last write time
//!
//! Created by `crates/cart/migrations/`, run via:
//! ```bash
//! cargo run -p cart-sync-cli -- migrate
//! ```

use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use cart_sync_core::{CartDocument, UserId};

use super::{DocumentStore, Result, StoreError};

/// [`DocumentStore`] backed by the `cart_documents` table.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get(&self, user_id: &UserId) -> Result<Option<CartDocument>> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT document FROM cart_documents WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|value| {
            serde_json::from_value(value).map_err(|e| {
                StoreError::Malformed(format!("invalid cart document for {user_id}: {e}"))
            })
        })
        .transpose()
    }

    #[instrument(skip(self, document), fields(user_id = %user_id, items = document.items.len()))]
    async fn put(&self, user_id: &UserId, document: &CartDocument) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO cart_documents (user_id, document, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (user_id)
            DO UPDATE SET document = EXCLUDED.document, updated_at = now()
            ",
        )
        .bind(user_id)
        .bind(Json(document))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
