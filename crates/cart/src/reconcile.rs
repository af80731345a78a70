//! Guest cart reconciliation on identity change.
//!
//! When a user signs in, the cart they built as a guest is folded into the
//! cart stored for their account: remote lines come first, guest lines with a
//! known id add their quantity to the remote line (whose price and display
//! data are kept), and new guest lines are appended. The merged cart is
//! written back to the account and only then is the guest slot cleared, which
//! makes a repeated sign-in notification a no-op.
//!
//! Signing out (or starting without a user) loads the guest cart as it is.
//! The account's remote cart is left untouched.

use tracing::{error, info, instrument, warn};

use cart_sync_core::{CartLine, Identity, UserId};

use crate::persistence::PersistenceAdapter;
use crate::reducer::absorb_line;
use crate::store::{DocumentStore, LocalStore};

/// What reconciliation did for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Guest identity: the guest cart was loaded unchanged.
    GuestLoaded,
    /// The guest cart was merged into the remote cart.
    Merged {
        /// Number of guest lines folded in.
        guest_lines: usize,
    },
    /// The remote cart could not be read, or the merged cart could not be
    /// written. The cart holds the guest lines, which stay in the guest slot
    /// and remain the write target until a later attempt merges them. The
    /// remote document is left as it was.
    Deferred,
}

/// Result of reconciling an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Lines the cart should now hold.
    pub items: Vec<CartLine>,
    /// Store that subsequent writes must target. Normally the reconciled
    /// identity, but the guest slot while a merge is deferred.
    pub persist_to: Identity,
    /// What happened.
    pub outcome: ReconcileOutcome,
}

/// Merge a guest cart into a remote cart.
///
/// Starts from `remote` and folds each guest line in with the same rule as
/// adding an item: quantities add up, the existing line's other fields win.
#[must_use]
pub fn merge_carts(remote: Vec<CartLine>, guest: Vec<CartLine>) -> Vec<CartLine> {
    let mut merged = remote;
    for line in guest {
        absorb_line(&mut merged, line);
    }
    merged
}

/// Load or merge the cart for `identity`.
pub async fn reconcile<D, L>(
    adapter: &mut PersistenceAdapter<D, L>,
    identity: &Identity,
) -> Reconciliation
where
    D: DocumentStore,
    L: LocalStore,
{
    match identity {
        Identity::Guest => {
            let items = adapter.load_guest();
            info!(items = items.len(), "Loaded guest cart");
            Reconciliation {
                items,
                persist_to: Identity::Guest,
                outcome: ReconcileOutcome::GuestLoaded,
            }
        }
        Identity::Authenticated(user_id) => merge_guest_into(adapter, user_id).await,
    }
}

#[instrument(skip(adapter), fields(user_id = %user_id))]
async fn merge_guest_into<D, L>(
    adapter: &mut PersistenceAdapter<D, L>,
    user_id: &UserId,
) -> Reconciliation
where
    D: DocumentStore,
    L: LocalStore,
{
    // Queued snapshots must land before the remote cart is read.
    adapter.flush(user_id).await;

    let guest = adapter.load_guest();
    let remote = match adapter.load_remote(user_id).await {
        Ok(remote) => remote,
        Err(e) => {
            error!(error = %e, guest_lines = guest.len(), "Remote cart unavailable, deferring merge");
            return deferred(guest);
        }
    };

    let guest_lines = guest.len();
    if guest_lines == 0 {
        // Nothing to merge; drop whatever (possibly corrupt) data the slot held.
        adapter.clear_guest();
        info!(items = remote.len(), "Loaded remote cart");
        return Reconciliation {
            items: remote,
            persist_to: Identity::Authenticated(user_id.clone()),
            outcome: ReconcileOutcome::Merged { guest_lines: 0 },
        };
    }

    let merged = merge_carts(remote, guest.clone());
    if let Err(e) = adapter.write_remote(user_id, &merged).await {
        // The guest slot is the only copy of these lines until the write lands.
        warn!(error = %e, guest_lines, "Failed to write merged cart, deferring merge");
        return deferred(guest);
    }
    adapter.clear_guest();

    info!(items = merged.len(), guest_lines, "Merged guest cart into remote cart");
    Reconciliation {
        items: merged,
        persist_to: Identity::Authenticated(user_id.clone()),
        outcome: ReconcileOutcome::Merged { guest_lines },
    }
}

fn deferred(guest: Vec<CartLine>) -> Reconciliation {
    Reconciliation {
        items: guest,
        persist_to: Identity::Guest,
        outcome: ReconcileOutcome::Deferred,
    }
}
