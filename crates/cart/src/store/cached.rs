//! Read-through cache over a document store.
//!
//! Documents are cached with `moka` for a bounded time. Writes go to the
//! underlying store first and then replace the cached copy, so a read after a
//! completed write always sees that write.

use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use cart_sync_core::{CartDocument, UserId};

use super::{DocumentStore, Result};

/// [`DocumentStore`] wrapper caching documents by user id.
pub struct CachedDocumentStore<S> {
    inner: S,
    cache: Cache<UserId, CartDocument>,
}

impl<S: DocumentStore> CachedDocumentStore<S> {
    /// Wrap a store with a cache of `capacity` documents living at most `ttl`.
    #[must_use]
    pub fn new(inner: S, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop the cached document for a user.
    pub async fn invalidate(&self, user_id: &UserId) {
        self.cache.invalidate(user_id).await;
    }
}

impl<S: DocumentStore> DocumentStore for CachedDocumentStore<S> {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get(&self, user_id: &UserId) -> Result<Option<CartDocument>> {
        if let Some(document) = self.cache.get(user_id).await {
            debug!("Cache hit for cart document");
            return Ok(Some(document));
        }

        let document = self.inner.get(user_id).await?;
        if let Some(document) = &document {
            self.cache.insert(user_id.clone(), document.clone()).await;
        }
        Ok(document)
    }

    #[instrument(skip(self, document), fields(user_id = %user_id))]
    async fn put(&self, user_id: &UserId, document: &CartDocument) -> Result<()> {
        if let Err(e) = self.inner.put(user_id, document).await {
            // The store may or may not have applied the write.
            self.cache.invalidate(user_id).await;
            return Err(e);
        }
        self.cache.insert(user_id.clone(), document.clone()).await;
        Ok(())
    }
}
