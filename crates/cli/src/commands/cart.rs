//! Stored cart commands.
//!
//! # Usage
//!
//! ```bash
//! cart-cli cart show --user u1
//! cart-cli cart clear --user u1
//! cart-cli cart merge --user u1
//! ```
//!
//! # Environment Variables
//!
//! - `CART_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CART_GUEST_STORE_DIR` / `CART_GUEST_KEY` - Guest cart location used by `merge`

use std::fmt::Write as _;

use cart_sync::reconcile::{self, ReconcileOutcome};
use cart_sync::{
    CachedDocumentStore, CartState, CartSyncConfig, CartSyncError, DocumentStore, FileLocalStore,
    LocalStore, PersistenceAdapter, PgDocumentStore, db,
};
use cart_sync_core::{CartDocument, Identity, UserId};

type RemoteStore = CachedDocumentStore<PgDocumentStore>;

async fn open_store(config: &CartSyncConfig) -> cart_sync::Result<RemoteStore> {
    let pool = db::create_pool(config.require_database_url()?).await?;
    Ok(CachedDocumentStore::new(
        PgDocumentStore::new(pool),
        config.document_cache_capacity,
        config.document_cache_ttl,
    ))
}

async fn open_adapter(
    config: &CartSyncConfig,
) -> cart_sync::Result<PersistenceAdapter<RemoteStore, FileLocalStore>> {
    let store = open_store(config).await?;
    let local = FileLocalStore::new(&config.guest_store_dir);
    Ok(PersistenceAdapter::new(
        store,
        local,
        config.guest_key.clone(),
    ))
}

/// Print a user's stored cart.
///
/// # Errors
///
/// Returns an error if the database is not configured or cannot be read.
pub async fn show(config: &CartSyncConfig, user_id: &UserId) -> cart_sync::Result<()> {
    let adapter = open_adapter(config).await?;
    let state = CartState::from_items(adapter.load_remote(user_id).await?);

    #[allow(clippy::print_stdout)]
    {
        print!("{}", render_cart(user_id, &state));
    }
    Ok(())
}

/// Overwrite a user's stored cart with an empty one.
///
/// # Errors
///
/// Returns an error if the database is not configured or the write fails.
pub async fn clear(config: &CartSyncConfig, user_id: &UserId) -> cart_sync::Result<()> {
    let store = open_store(config).await?;
    store.put(user_id, &CartDocument::default()).await?;
    tracing::info!(user_id = %user_id, "Cleared stored cart");
    Ok(())
}

/// Merge this device's guest cart into a user's stored cart.
///
/// # Errors
///
/// Returns an error if the database is not configured, or if the stored cart
/// could not be read or written. The guest cart is kept in that case.
pub async fn merge(config: &CartSyncConfig, user_id: &UserId) -> cart_sync::Result<()> {
    let mut adapter = open_adapter(config).await?;
    let state = merge_guest(&mut adapter, user_id).await?;

    #[allow(clippy::print_stdout)]
    {
        print!("{}", render_cart(user_id, &state));
    }
    Ok(())
}

async fn merge_guest<D, L>(
    adapter: &mut PersistenceAdapter<D, L>,
    user_id: &UserId,
) -> cart_sync::Result<CartState>
where
    D: DocumentStore,
    L: LocalStore,
{
    let identity = Identity::Authenticated(user_id.clone());
    let reconciled = reconcile::reconcile(adapter, &identity).await;

    match reconciled.outcome {
        ReconcileOutcome::Merged { guest_lines } => {
            tracing::info!(user_id = %user_id, guest_lines, "Guest cart merged");
            Ok(CartState::from_items(reconciled.items))
        }
        ReconcileOutcome::Deferred | ReconcileOutcome::GuestLoaded => {
            Err(CartSyncError::MergeDeferred(user_id.clone()))
        }
    }
}

/// Render a cart as a plain-text table.
fn render_cart(user_id: &UserId, state: &CartState) -> String {
    let mut out = format!("Cart for {user_id}\n");

    if state.is_empty() {
        out.push_str("  (empty)\n");
    }
    for line in state.items() {
        let _ = writeln!(
            out,
            "  {:<24} {:<24} {:>4} x {:>10} = {:>10}",
            line.id,
            line.name,
            line.quantity,
            line.price,
            line.line_total()
        );
    }
    let _ = writeln!(
        out,
        "Items: {}  Total: {}",
        state.item_count(),
        state.total()
    );
    out
}
