//! Persistence adapter: moves cart lines between the engine and storage.
//!
//! The storage target follows the identity that owns the cart:
//!
//! - Guest carts are a JSON array of lines in the local store under a fixed
//!   key. Reads and writes are synchronous.
//! - Authenticated carts are `{ items }` documents in the remote document
//!   store. Routine writes go through the per-user [`SaveQueue`].
//!
//! Missing or undecodable data always reads as an empty cart. Store failures
//! are logged here and never returned to cart callers, with one exception:
//! [`PersistenceAdapter::load_remote`] reports an unreachable store so that
//! reconciliation can avoid overwriting a document it never read.

use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use cart_sync_core::{CartDocument, CartLine, Identity, UserId};

use crate::reducer::checked_totals;
use crate::save_queue::SaveQueue;
use crate::store::{DocumentStore, LocalStore, StoreError};

/// Default local store key for the guest cart.
pub const DEFAULT_GUEST_KEY: &str = "cart";

/// Reads and writes cart lines for a given identity.
pub struct PersistenceAdapter<D, L> {
    documents: Arc<D>,
    local: L,
    guest_key: String,
    queue: SaveQueue<D>,
}

impl<D: DocumentStore, L: LocalStore> PersistenceAdapter<D, L> {
    /// Create an adapter over a remote document store and a local store.
    #[must_use]
    pub fn new(documents: D, local: L, guest_key: impl Into<String>) -> Self {
        let documents = Arc::new(documents);
        let queue = SaveQueue::new(Arc::clone(&documents));
        Self {
            documents,
            local,
            guest_key: guest_key.into(),
            queue,
        }
    }

    /// The remote document store.
    #[must_use]
    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// The local guest store.
    #[must_use]
    pub const fn local(&self) -> &L {
        &self.local
    }

    /// Key of the guest cart slot.
    #[must_use]
    pub fn guest_key(&self) -> &str {
        &self.guest_key
    }

    // =========================================================================
    // Guest cart
    // =========================================================================

    /// Read the guest cart. Missing, corrupt, unreadable, or out-of-range
    /// data is an empty cart.
    #[must_use]
    pub fn load_guest(&self) -> Vec<CartLine> {
        let raw = match self.local.get(&self.guest_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!(error = %e, key = %self.guest_key, "Failed to read guest cart");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<CartLine>>(&raw) {
            Ok(items) if checked_totals(&items).is_some() => items,
            Ok(items) => {
                warn!(key = %self.guest_key, items = items.len(), "Discarding out-of-range guest cart");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, key = %self.guest_key, "Discarding malformed guest cart");
                Vec::new()
            }
        }
    }

    /// Overwrite the guest cart.
    pub fn save_guest(&self, items: &[CartLine]) {
        let raw = match serde_json::to_string(items) {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Failed to encode guest cart");
                return;
            }
        };

        match self.local.put(&self.guest_key, &raw) {
            Ok(()) => debug!(items = items.len(), "Persisted guest cart"),
            Err(e) => error!(error = %e, key = %self.guest_key, "Failed to write guest cart"),
        }
    }

    /// Remove the guest cart slot entirely.
    pub fn clear_guest(&self) {
        if let Err(e) = self.local.remove(&self.guest_key) {
            error!(error = %e, key = %self.guest_key, "Failed to clear guest cart");
        }
    }

    // =========================================================================
    // Remote cart
    // =========================================================================

    /// Read a user's remote cart.
    ///
    /// A missing, malformed, or out-of-range document is an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the document store could not be read.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn load_remote(&self, user_id: &UserId) -> Result<Vec<CartLine>, StoreError> {
        match self.documents.get(user_id).await {
            Ok(Some(document)) if checked_totals(&document.items).is_some() => {
                Ok(document.into_items())
            }
            Ok(Some(document)) => {
                warn!(items = document.items.len(), "Discarding out-of-range remote cart");
                Ok(Vec::new())
            }
            Ok(None) => Ok(Vec::new()),
            Err(e) if e.is_malformed() => {
                warn!(error = %e, "Discarding malformed remote cart");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Write a user's remote cart immediately, bypassing the save queue.
    ///
    /// Callers must [`flush`](Self::flush) the user's queue first so an
    /// older queued snapshot cannot land after this write.
    ///
    /// # Errors
    ///
    /// Returns an error if the document store rejected the write.
    #[instrument(skip(self, items), fields(user_id = %user_id, items = items.len()))]
    pub async fn write_remote(&self, user_id: &UserId, items: &[CartLine]) -> Result<(), StoreError> {
        self.documents
            .put(user_id, &CartDocument::new(items.to_vec()))
            .await
    }

    /// Queue a snapshot of a user's remote cart.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue_remote(&mut self, user_id: &UserId, items: &[CartLine]) {
        self.queue.submit(user_id, CartDocument::new(items.to_vec()));
    }

    /// Wait for queued writes for a user to be attempted.
    pub async fn flush(&self, user_id: &UserId) {
        self.queue.flush(user_id).await;
    }

    /// Wait for every queued write to be attempted.
    pub async fn flush_all(&self) {
        self.queue.flush_all().await;
    }

    /// Flush a user's queued writes, then shut their queue down.
    pub async fn retire_remote(&mut self, user_id: &UserId) {
        self.queue.retire(user_id).await;
    }

    /// Number of users with a live save queue.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.queue.queue_count()
    }

    // =========================================================================
    // Write policy
    // =========================================================================

    /// Persist the full cart to the store belonging to `target`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn save(&mut self, target: &Identity, items: &[CartLine]) {
        match target {
            Identity::Guest => self.save_guest(items),
            Identity::Authenticated(user_id) => self.enqueue_remote(user_id, items),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use cart_sync_core::{CartLineId, ProductId};

    use super::*;
    use crate::store::{MemoryDocumentStore, MemoryLocalStore};

    fn line(id: &str, quantity: i64) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            product_id: ProductId::new("p"),
            category: "c".to_string(),
            name: "n".to_string(),
            image: "i".to_string(),
            price: Decimal::new(10, 0),
            quantity,
            size: "M".to_string(),
            color: "red".to_string(),
        }
    }

    fn adapter() -> (
        PersistenceAdapter<MemoryDocumentStore, MemoryLocalStore>,
        MemoryDocumentStore,
        MemoryLocalStore,
    ) {
        let documents = MemoryDocumentStore::new();
        let local = MemoryLocalStore::new();
        let adapter =
            PersistenceAdapter::new(documents.clone(), local.clone(), DEFAULT_GUEST_KEY);
        (adapter, documents, local)
    }

    #[test]
    fn test_guest_roundtrip() {
        let (adapter, _, _) = adapter();
        adapter.save_guest(&[line("a", 1), line("b", 2)]);
        assert_eq!(adapter.load_guest(), vec![line("a", 1), line("b", 2)]);
    }

    #[test]
    fn test_missing_guest_cart_is_empty() {
        let (adapter, _, _) = adapter();
        assert!(adapter.load_guest().is_empty());
    }

    #[test]
    fn test_corrupt_guest_cart_is_empty() {
        let (adapter, _, local) = adapter();
        local.put(DEFAULT_GUEST_KEY, "{not json").unwrap();
        assert!(adapter.load_guest().is_empty());

        local.put(DEFAULT_GUEST_KEY, r#"{"items": []}"#).unwrap();
        assert!(adapter.load_guest().is_empty());
    }

    #[test]
    fn test_unreadable_guest_store_is_empty() {
        let (adapter, _, local) = adapter();
        adapter.save_guest(&[line("a", 1)]);
        local.set_offline(true);
        assert!(adapter.load_guest().is_empty());
        // Writes to an unusable store are swallowed.
        adapter.save_guest(&[line("b", 1)]);
        adapter.clear_guest();
    }

    #[test]
    fn test_clear_guest_removes_slot() {
        let (adapter, _, local) = adapter();
        adapter.save_guest(&[line("a", 1)]);
        adapter.clear_guest();
        assert!(local.get(DEFAULT_GUEST_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_absent_remote_cart_is_empty() {
        let (adapter, _, _) = adapter();
        assert!(adapter.load_remote(&UserId::new("u1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_remote_cart_is_empty() {
        let (adapter, documents, _) = adapter();
        let user = UserId::new("u1");
        documents.insert_raw(&user, json!({ "items": [{ "id": 7 }] })).await;
        assert!(adapter.load_remote(&user).await.unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_guest_cart_is_empty() {
        let (adapter, _, _) = adapter();
        adapter.save_guest(&[line("a", i64::MAX), line("b", 1)]);
        assert!(adapter.load_guest().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_remote_cart_is_empty() {
        let (adapter, documents, _) = adapter();
        let user = UserId::new("u1");
        let mut expensive = line("a", 2);
        expensive.price = Decimal::MAX;
        documents
            .put(&user, &CartDocument::new(vec![expensive]))
            .await
            .unwrap();

        assert!(adapter.load_remote(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retire_remote_flushes_and_drops_queue() {
        let (mut adapter, documents, _) = adapter();
        let user = UserId::new("u1");

        adapter.enqueue_remote(&user, &[line("a", 3)]);
        assert_eq!(adapter.queue_count(), 1);

        adapter.retire_remote(&user).await;
        assert_eq!(adapter.queue_count(), 0);
        assert_eq!(
            documents.get(&user).await.unwrap(),
            Some(CartDocument::new(vec![line("a", 3)]))
        );
    }

    #[tokio::test]
    async fn test_unreachable_remote_cart_is_error() {
        let (adapter, documents, _) = adapter();
        documents.set_offline(true);
        assert!(adapter.load_remote(&UserId::new("u1")).await.is_err());
    }

    #[tokio::test]
    async fn test_save_routes_by_identity() {
        let (mut adapter, documents, local) = adapter();
        let user = UserId::new("u1");

        adapter.save(&Identity::Guest, &[line("g", 1)]);
        adapter.save(&Identity::Authenticated(user.clone()), &[line("r", 2)]);
        adapter.flush(&user).await;

        assert!(local.get(DEFAULT_GUEST_KEY).unwrap().is_some());
        assert_eq!(adapter.load_guest(), vec![line("g", 1)]);
        assert_eq!(
            documents.get(&user).await.unwrap(),
            Some(CartDocument::new(vec![line("r", 2)]))
        );
    }
}
