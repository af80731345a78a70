//! Cart Sync - Shopping cart synchronization engine.
//!
//! Keeps a shopper's cart as an immediately consistent in-memory structure,
//! persists it to storage chosen by who owns it, and merges a guest cart into
//! the account cart at sign-in.
//!
//! # Architecture
//!
//! - [`reducer`] - Pure transitions over [`CartAction`]s; totals are always derived
//! - [`store`] - Remote document and device-local storage backends
//! - [`save_queue`] - Ordered, coalescing per-user writes to the document store
//! - [`persistence`] - Chooses the store for an identity; bad data reads as empty
//! - [`reconcile`] - Guest-into-account merge on sign-in
//! - [`identity`] - Watch-based identity notifications
//! - [`service`] - [`CartService`] state machine and its spawned [`CartHandle`]
//!
//! # Example
//!
//! ```rust,no_run
//! use cart_sync::{
//!     CartAction, CartService, IdentityResolver, MemoryDocumentStore, MemoryLocalStore,
//!     PersistenceAdapter,
//! };
//! use cart_sync_core::Identity;
//!
//! # async fn demo() -> cart_sync::Result<()> {
//! let adapter = PersistenceAdapter::new(MemoryDocumentStore::new(), MemoryLocalStore::new(), "cart");
//! let resolver = IdentityResolver::resolved(Identity::Guest);
//! let (cart, _task) = CartService::new(adapter).spawn(resolver.subscribe());
//!
//! let state = cart.apply(CartAction::ClearCart).await?;
//! assert!(state.is_empty());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod persistence;
pub mod reconcile;
pub mod reducer;
pub mod save_queue;
pub mod service;
pub mod store;
pub mod telemetry;

pub use config::{CartSyncConfig, ConfigError};
pub use error::{CartSyncError, Result};
pub use identity::{IdentityResolver, IdentitySubscription};
pub use persistence::{DEFAULT_GUEST_KEY, PersistenceAdapter};
pub use reconcile::{ReconcileOutcome, Reconciliation, merge_carts};
pub use reducer::{CartAction, CartState, reduce};
pub use service::{CartHandle, CartService, Phase, Snapshot};
pub use store::{
    CachedDocumentStore, DocumentStore, FileLocalStore, LocalStore, MemoryDocumentStore,
    MemoryLocalStore, PgDocumentStore, StoreError,
};
