//! Integration tests for cart sync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cart-sync-integration-tests
//! ```
//!
//! The scenarios run entirely in-process: remote carts live in a
//! [`MemoryDocumentStore`] and guest carts in a [`MemoryLocalStore`] or a
//! [`FileLocalStore`] under a temporary directory. No database is needed.
//!
//! # Test Categories
//!
//! - `sign_in_flow` - Guest cart merged into the account cart, sign-out, repeats
//! - `spawned_service` - The service task driven by identity notifications
//! - `device_storage` - Guest carts stored as files, outages and corrupt data

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use rust_decimal::Decimal;

use cart_sync::{
    CartHandle, CartService, MemoryDocumentStore, MemoryLocalStore, PersistenceAdapter, Snapshot,
};
use cart_sync_core::{CartLine, CartLineId, ProductId};

/// Guest slot key used by every scenario.
pub const GUEST_KEY: &str = "cart";

/// Build a cart line with a whole-unit price.
#[must_use]
pub fn line(id: &str, price: i64, quantity: i64) -> CartLine {
    CartLine {
        id: CartLineId::new(id),
        product_id: ProductId::new(id),
        category: "apparel".to_string(),
        name: format!("Product {id}"),
        image: format!("/images/{id}.png"),
        price: Decimal::from(price),
        quantity,
        size: "M".to_string(),
        color: "black".to_string(),
    }
}

/// Ids of `items`, in order.
#[must_use]
pub fn ids(items: &[CartLine]) -> Vec<&str> {
    items.iter().map(|l| l.id.as_str()).collect()
}

/// In-memory stores shared with a service under test.
///
/// Both stores are handles onto shared state, so the test keeps observing
/// (and breaking) them after the service takes its copies.
#[derive(Clone, Default)]
pub struct Backends {
    pub documents: MemoryDocumentStore,
    pub local: MemoryLocalStore,
}

impl Backends {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A persistence adapter over these stores.
    #[must_use]
    pub fn adapter(&self) -> PersistenceAdapter<MemoryDocumentStore, MemoryLocalStore> {
        PersistenceAdapter::new(self.documents.clone(), self.local.clone(), GUEST_KEY)
    }

    /// A fresh service over these stores.
    #[must_use]
    pub fn service(&self) -> CartService<MemoryDocumentStore, MemoryLocalStore> {
        CartService::new(self.adapter())
    }
}

/// Poll a spawned service until `done` holds for its snapshot.
///
/// # Panics
///
/// Panics if the service stops or the condition does not hold within five
/// seconds.
pub async fn wait_for(handle: &CartHandle, done: impl Fn(&Snapshot) -> bool) -> Snapshot {
    let poll = async {
        loop {
            match handle.snapshot().await {
                Ok(snapshot) if done(&snapshot) => return snapshot,
                Ok(_) => tokio::time::sleep(Duration::from_millis(5)).await,
                Err(e) => panic!("cart service stopped: {e}"),
            }
        }
    };

    match tokio::time::timeout(Duration::from_secs(5), poll).await {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("timed out waiting for cart service"),
    }
}
