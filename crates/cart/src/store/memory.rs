//! In-process cart stores.
//!
//! Both stores are cheaply cloneable handles over shared state, so a test can
//! keep one clone for inspection while the engine owns another. Either store
//! can be switched offline to exercise the failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use cart_sync_core::{CartDocument, UserId};

use super::{DocumentStore, LocalStore, Result, StoreError};

// =============================================================================
// MemoryDocumentStore
// =============================================================================

/// In-memory [`DocumentStore`].
///
/// Documents are kept as JSON values so malformed documents can be planted
/// with [`MemoryDocumentStore::insert_raw`].
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryDocumentInner>,
}

#[derive(Default)]
struct MemoryDocumentInner {
    documents: RwLock<HashMap<UserId, serde_json::Value>>,
    offline: AtomicBool,
    read_only: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Simulate a store that serves reads but rejects writes with
    /// [`StoreError::Unavailable`].
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Store an arbitrary JSON value as a user's document.
    pub async fn insert_raw(&self, user_id: &UserId, value: serde_json::Value) {
        self.inner
            .documents
            .write()
            .await
            .insert(user_id.clone(), value);
    }

    /// Whether a document exists for a user.
    pub async fn contains(&self, user_id: &UserId) -> bool {
        self.inner.documents.read().await.contains_key(user_id)
    }

    /// Number of successful `put` calls since creation.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory document store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<CartDocument>> {
        self.check_online()?;

        let documents = self.inner.documents.read().await;
        documents
            .get(user_id)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|e| StoreError::Malformed(e.to_string()))
            })
            .transpose()
    }

    async fn put(&self, user_id: &UserId, document: &CartDocument) -> Result<()> {
        self.check_online()?;
        if self.inner.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory document store is read-only".to_string(),
            ));
        }

        let value = serde_json::to_value(document)?;
        self.inner
            .documents
            .write()
            .await
            .insert(user_id.clone(), value);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// MemoryLocalStore
// =============================================================================

/// In-memory [`LocalStore`].
#[derive(Clone, Default)]
pub struct MemoryLocalStore {
    inner: Arc<MemoryLocalInner>,
}

#[derive(Default)]
struct MemoryLocalInner {
    slots: Mutex<HashMap<String, String>>,
    offline: AtomicBool,
}

impl MemoryLocalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unusable device store.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn slots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory local store is offline".to_string(),
            ));
        }
        self.inner
            .slots
            .lock()
            .map_err(|_| StoreError::Unavailable("local store lock poisoned".to_string()))
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.slots()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots()?.remove(key);
        Ok(())
    }
}
