//! Cart storage backends.
//!
//! Two kinds of storage back the cart:
//!
//! - A [`DocumentStore`] holds one `{ items }` document per authenticated
//!   user. Reads and writes are asynchronous.
//! - A [`LocalStore`] is a synchronous, device-scoped key-value slot holding
//!   the guest cart as raw JSON under a fixed key.
//!
//! # Backends
//!
//! - [`MemoryDocumentStore`] / [`MemoryLocalStore`] - In-process, with outage simulation
//! - [`FileLocalStore`] - One JSON file per key in a local directory
//! - [`PgDocumentStore`] - `PostgreSQL` `cart_documents` table (JSONB)
//! - [`CachedDocumentStore`] - `moka` read-through cache over any document store

mod cached;
mod file;
mod memory;
mod postgres;

use std::future::Future;

use thiserror::Error;

use cart_sync_core::{CartDocument, UserId};

pub use cached::CachedDocumentStore;
pub use file::FileLocalStore;
pub use memory::{MemoryDocumentStore, MemoryLocalStore};
pub use postgres::PgDocumentStore;

/// Errors returned by cart storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded as a cart.
    #[error("malformed cart data: {0}")]
    Malformed(String),

    /// The key cannot be used as a storage slot.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cart data could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this error means the stored data is unreadable rather than
    /// the store being unreachable.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Remote per-user cart document storage.
///
/// Implementations must make the last completed `put` for a user visible to
/// the next `get` for the same user. A missing document is `Ok(None)`, and
/// a document that exists but cannot be decoded is [`StoreError::Malformed`].
pub trait DocumentStore: Send + Sync + 'static {
    /// Read the cart document for a user.
    fn get(&self, user_id: &UserId) -> impl Future<Output = Result<Option<CartDocument>>> + Send;

    /// Overwrite the cart document for a user.
    fn put(
        &self,
        user_id: &UserId,
        document: &CartDocument,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Device-local synchronous key-value storage for the guest cart.
///
/// Values are raw strings; decoding is left to the caller so corrupt data can
/// be treated as an empty cart instead of an error.
pub trait LocalStore: Send + Sync + 'static {
    /// Read the value stored under a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value under a key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be cleared.
    fn remove(&self, key: &str) -> Result<()>;
}
