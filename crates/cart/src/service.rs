//! Cart service: the single owner of a client's cart.
//!
//! [`CartService`] holds the current [`CartState`], applies actions through
//! the reducer, notifies observers, and reloads the cart whenever the owning
//! identity changes.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --begin_loading--> Loading --handle_identity--> Ready
//!                                     ^                           |
//!                                     +------ identity change ----+
//! ```
//!
//! Actions are accepted in every phase, but only persisted in `Ready`. A
//! cart mutated before the first load is replaced by the loaded cart.
//!
//! The service can be driven directly through `&mut self`, or moved into a
//! task with [`CartService::spawn`] and driven through a [`CartHandle`].

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use cart_sync_core::Identity;

use crate::error::{CartSyncError, Result};
use crate::identity::IdentitySubscription;
use crate::persistence::PersistenceAdapter;
use crate::reconcile::{self, ReconcileOutcome, Reconciliation};
use crate::reducer::{CartAction, CartState, reduce};
use crate::store::{DocumentStore, LocalStore};

/// Lifecycle phase of the cart service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created, not yet listening for an identity.
    Uninitialized,
    /// Waiting for an identity or loading its cart.
    Loading,
    /// Cart loaded; every mutation is persisted.
    Ready,
}

/// Owner of the in-memory cart and its persistence.
pub struct CartService<D, L> {
    adapter: PersistenceAdapter<D, L>,
    state: CartState,
    phase: Phase,
    identity: Option<Identity>,
    persist_to: Identity,
    last_outcome: Option<ReconcileOutcome>,
    observers: watch::Sender<CartState>,
}

impl<D: DocumentStore, L: LocalStore> CartService<D, L> {
    /// Create a service with an empty cart.
    #[must_use]
    pub fn new(adapter: PersistenceAdapter<D, L>) -> Self {
        let (observers, _) = watch::channel(CartState::empty());
        Self {
            adapter,
            state: CartState::empty(),
            phase: Phase::Uninitialized,
            identity: None,
            persist_to: Identity::Guest,
            last_outcome: None,
            observers,
        }
    }

    /// Current cart.
    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Identity whose cart is loaded, once one has been handled.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Store that mutations are written to.
    #[must_use]
    pub const fn persist_target(&self) -> &Identity {
        &self.persist_to
    }

    /// Outcome of the most recent identity load.
    #[must_use]
    pub const fn last_outcome(&self) -> Option<ReconcileOutcome> {
        self.last_outcome
    }

    /// The persistence adapter.
    #[must_use]
    pub const fn adapter(&self) -> &PersistenceAdapter<D, L> {
        &self.adapter
    }

    /// Observe cart changes. The receiver starts at the current cart.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.observers.subscribe()
    }

    /// Apply an action and return the new cart.
    ///
    /// In `Ready` the full cart is persisted to the current target. Storage
    /// failures are logged, never returned.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn apply(&mut self, action: CartAction) -> CartState {
        let name = action.name();
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);

        if self.phase == Phase::Ready {
            self.adapter.save(&self.persist_to, self.state.items());
        } else {
            debug!(action = name, phase = ?self.phase, "Cart changed before load, not persisting");
        }

        self.publish();
        self.state.clone()
    }

    /// Mark the service as waiting for an identity.
    pub fn begin_loading(&mut self) {
        self.phase = Phase::Loading;
    }

    /// Load (or merge) the cart for a newly reported identity.
    ///
    /// Replaces the in-memory cart with the reconciled one and enters `Ready`.
    /// Signing out does not write the signed-in cart anywhere; the remote
    /// cart simply stays as last persisted.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn handle_identity(&mut self, identity: Identity) -> &CartState {
        self.phase = Phase::Loading;

        let superseded = match &self.identity {
            Some(Identity::Authenticated(previous)) if identity.user_id() != Some(previous) => {
                Some(previous.clone())
            }
            _ => None,
        };
        if let Some(previous) = superseded {
            self.adapter.retire_remote(&previous).await;
        }

        let reconciled = reconcile::reconcile(&mut self.adapter, &identity).await;
        self.identity = Some(identity);
        self.install(reconciled);
        &self.state
    }

    /// Retry a merge that was deferred for the signed-in user.
    ///
    /// Returns whether the merge went through. A retry that is deferred
    /// again leaves the cart untouched. The spawned service calls this after
    /// every applied action, so a deferred guest cart is merged as soon as
    /// the document store recovers.
    pub async fn retry_deferred(&mut self) -> bool {
        if self.phase != Phase::Ready || self.last_outcome != Some(ReconcileOutcome::Deferred) {
            return false;
        }
        let Some(identity @ Identity::Authenticated(_)) = self.identity.clone() else {
            return false;
        };

        debug!(identity = %identity, "Retrying deferred cart merge");
        let reconciled = reconcile::reconcile(&mut self.adapter, &identity).await;
        if reconciled.outcome == ReconcileOutcome::Deferred {
            return false;
        }
        self.install(reconciled);
        true
    }

    fn install(&mut self, reconciled: Reconciliation) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, CartAction::SetCart(reconciled.items));
        self.persist_to = reconciled.persist_to;
        self.last_outcome = Some(reconciled.outcome);
        self.phase = Phase::Ready;

        info!(
            items = self.state.items().len(),
            item_count = self.state.item_count(),
            outcome = ?reconciled.outcome,
            "Cart ready"
        );
        self.publish();
    }

    /// Wait for all queued remote writes to be attempted.
    pub async fn flush(&self) {
        self.adapter.flush_all().await;
    }

    fn publish(&self) {
        self.observers.send_replace(self.state.clone());
    }

    /// Drive the service from identity notifications and handle commands.
    ///
    /// Every notification and command is handled to completion before the
    /// next is taken. Returns when every [`CartHandle`] has been dropped,
    /// after flushing queued writes.
    pub async fn run(
        mut self,
        mut identities: IdentitySubscription,
        mut commands: mpsc::Receiver<Command>,
    ) {
        self.begin_loading();
        let mut identities_open = true;

        loop {
            tokio::select! {
                identity = identities.next(), if identities_open => match identity {
                    Some(identity) => {
                        self.handle_identity(identity).await;
                    }
                    None => {
                        debug!("Identity resolver dropped");
                        identities_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }

        self.flush().await;
        debug!("Cart service stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Apply(action, reply) => {
                let state = self.apply(action);
                let _ = reply.send(state);
                self.retry_deferred().await;
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(Snapshot {
                    state: self.state.clone(),
                    phase: self.phase,
                    identity: self.identity.clone(),
                });
            }
            Command::Flush(reply) => {
                self.flush().await;
                let _ = reply.send(());
            }
        }
    }

    /// Move the service into a task driven by `identities`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(self, identities: IdentitySubscription) -> (CartHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let observer = self.subscribe();
        let task = tokio::spawn(self.run(identities, rx));
        (CartHandle { tx, observer }, task)
    }
}

const COMMAND_BUFFER: usize = 64;

/// Request sent to a spawned service.
#[derive(Debug)]
pub enum Command {
    /// Apply an action and reply with the new cart.
    Apply(CartAction, oneshot::Sender<CartState>),
    /// Reply with the current cart, phase, and identity.
    Snapshot(oneshot::Sender<Snapshot>),
    /// Reply once queued writes have been attempted.
    Flush(oneshot::Sender<()>),
}

/// Point-in-time view of a spawned service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current cart.
    pub state: CartState,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Identity whose cart is loaded.
    pub identity: Option<Identity>,
}

/// Cloneable handle to a spawned [`CartService`].
#[derive(Clone)]
pub struct CartHandle {
    tx: mpsc::Sender<Command>,
    observer: watch::Receiver<CartState>,
}

impl CartHandle {
    /// Apply an action and return the resulting cart.
    ///
    /// # Errors
    ///
    /// Returns `CartSyncError::ServiceStopped` if the service task has exited.
    pub async fn apply(&self, action: CartAction) -> Result<CartState> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Apply(action, reply)).await?;
        response.await.map_err(|_| CartSyncError::ServiceStopped)
    }

    /// Current cart, phase, and identity.
    ///
    /// # Errors
    ///
    /// Returns `CartSyncError::ServiceStopped` if the service task has exited.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        response.await.map_err(|_| CartSyncError::ServiceStopped)
    }

    /// Wait until queued remote writes have been attempted.
    ///
    /// # Errors
    ///
    /// Returns `CartSyncError::ServiceStopped` if the service task has exited.
    pub async fn flush(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Flush(reply)).await?;
        response.await.map_err(|_| CartSyncError::ServiceStopped)
    }

    /// Observe cart changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.observer.clone()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CartSyncError::ServiceStopped)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use cart_sync_core::{CartDocument, CartLine, CartLineId, ProductId, UserId};

    use super::*;
    use crate::identity::IdentityResolver;
    use crate::persistence::DEFAULT_GUEST_KEY;
    use crate::store::{MemoryDocumentStore, MemoryLocalStore};

    type TestService = CartService<MemoryDocumentStore, MemoryLocalStore>;

    fn line(id: &str, price: i64, quantity: i64) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            product_id: ProductId::new(format!("product-{id}")),
            category: "c".to_string(),
            name: format!("Item {id}"),
            image: format!("/img/{id}.png"),
            price: Decimal::new(price, 0),
            quantity,
            size: "M".to_string(),
            color: "red".to_string(),
        }
    }

    fn service() -> (TestService, MemoryDocumentStore, MemoryLocalStore) {
        let documents = MemoryDocumentStore::new();
        let local = MemoryLocalStore::new();
        let adapter =
            PersistenceAdapter::new(documents.clone(), local.clone(), DEFAULT_GUEST_KEY);
        (CartService::new(adapter), documents, local)
    }

    #[tokio::test]
    async fn test_nothing_persisted_before_ready() {
        let (mut service, _, local) = service();
        assert_eq!(service.phase(), Phase::Uninitialized);

        service.apply(CartAction::AddItem(line("a", 10, 1)));
        service.begin_loading();
        service.apply(CartAction::AddItem(line("b", 10, 1)));

        assert_eq!(service.state().items().len(), 2);
        assert!(local.get(DEFAULT_GUEST_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_supersedes_unpersisted_changes() {
        let (mut service, _, _) = service();
        service.adapter().save_guest(&[line("g", 3, 1)]);

        service.apply(CartAction::AddItem(line("transient", 10, 1)));
        service.handle_identity(Identity::Guest).await;

        assert_eq!(service.phase(), Phase::Ready);
        assert_eq!(service.state().items(), &[line("g", 3, 1)]);
    }

    #[tokio::test]
    async fn test_guest_mutations_are_persisted_when_ready() {
        let (mut service, _, _) = service();
        service.handle_identity(Identity::Guest).await;

        service.apply(CartAction::AddItem(line("a", 10, 2)));
        assert_eq!(service.adapter().load_guest(), vec![line("a", 10, 2)]);

        service.apply(CartAction::ClearCart);
        assert!(service.adapter().load_guest().is_empty());
    }

    #[tokio::test]
    async fn test_authenticated_mutations_reach_remote() {
        let (mut service, documents, _) = service();
        let user = UserId::new("u1");
        service
            .handle_identity(Identity::Authenticated(user.clone()))
            .await;

        service.apply(CartAction::AddItem(line("a", 10, 2)));
        service.apply(CartAction::UpdateQuantity {
            id: CartLineId::new("a"),
            quantity: 5,
        });
        service.flush().await;

        assert_eq!(
            documents.get(&user).await.unwrap(),
            Some(CartDocument::new(vec![line("a", 10, 5)]))
        );
    }

    #[tokio::test]
    async fn test_observers_see_every_change() {
        let (mut service, _, _) = service();
        let mut rx = service.subscribe();

        service.handle_identity(Identity::Guest).await;
        service.apply(CartAction::AddItem(line("a", 10, 2)));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().item_count(), 2);
    }

    #[tokio::test]
    async fn test_deferred_merge_keeps_writing_to_guest() {
        let (mut service, documents, _) = service();
        let user = UserId::new("u1");
        service.handle_identity(Identity::Guest).await;
        service.apply(CartAction::AddItem(line("a", 10, 1)));

        documents.set_offline(true);
        service
            .handle_identity(Identity::Authenticated(user.clone()))
            .await;
        assert_eq!(service.last_outcome(), Some(ReconcileOutcome::Deferred));
        assert_eq!(service.persist_target(), &Identity::Guest);

        service.apply(CartAction::AddItem(line("b", 5, 1)));
        assert_eq!(service.adapter().load_guest().len(), 2);

        documents.set_offline(false);
        assert!(!documents.contains(&user).await);

        assert!(service.retry_deferred().await);
        assert_eq!(
            service.last_outcome(),
            Some(ReconcileOutcome::Merged { guest_lines: 2 })
        );
        assert_eq!(service.persist_target(), &Identity::Authenticated(user.clone()));
        assert!(documents.contains(&user).await);
        assert!(!service.retry_deferred().await);
    }

    #[tokio::test]
    async fn test_failed_retry_keeps_cart() {
        let (mut service, documents, local) = service();
        service.handle_identity(Identity::Guest).await;
        service.apply(CartAction::AddItem(line("a", 10, 1)));

        documents.set_offline(true);
        service
            .handle_identity(Identity::Authenticated(UserId::new("u1")))
            .await;
        local.set_offline(true);
        service.apply(CartAction::AddItem(line("b", 5, 1)));

        assert!(!service.retry_deferred().await);
        assert_eq!(service.state().items().len(), 2);
        assert_eq!(service.last_outcome(), Some(ReconcileOutcome::Deferred));
    }

    #[tokio::test]
    async fn test_retry_without_deferral_is_noop() {
        let (mut service, _, _) = service();
        assert!(!service.retry_deferred().await);

        service.handle_identity(Identity::Guest).await;
        assert!(!service.retry_deferred().await);
    }

    #[tokio::test]
    async fn test_identity_change_retires_previous_save_queue() {
        let (mut service, documents, _) = service();
        let alice = UserId::new("alice");
        service
            .handle_identity(Identity::Authenticated(alice.clone()))
            .await;
        service.apply(CartAction::AddItem(line("a", 10, 1)));
        assert_eq!(service.adapter().queue_count(), 1);

        service.handle_identity(Identity::Guest).await;
        assert_eq!(service.adapter().queue_count(), 0);
        assert_eq!(
            documents.get(&alice).await.unwrap(),
            Some(CartDocument::new(vec![line("a", 10, 1)]))
        );
    }

    #[tokio::test]
    async fn test_same_user_keeps_save_queue() {
        let (mut service, _, _) = service();
        let user = Identity::Authenticated(UserId::new("u1"));
        service.handle_identity(user.clone()).await;
        service.apply(CartAction::AddItem(line("a", 10, 1)));

        service.handle_identity(user).await;
        assert_eq!(service.adapter().queue_count(), 1);
    }

    #[tokio::test]
    async fn test_extreme_stored_guest_cart_loads_as_empty() {
        let (mut service, _, local) = service();
        let raw = serde_json::to_string(&[line("a", 1, i64::MAX), line("b", 1, 1)]).unwrap();
        local.put(DEFAULT_GUEST_KEY, &raw).unwrap();

        let state = service.handle_identity(Identity::Guest).await;
        assert!(state.is_empty());
        assert_eq!(service.phase(), Phase::Ready);
    }

    async fn wait_until(handle: &CartHandle, done: impl Fn(&Snapshot) -> bool) -> Snapshot {
        let mut rx = handle.subscribe();
        loop {
            let snapshot = handle.snapshot().await.unwrap();
            if done(&snapshot) {
                return snapshot;
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_spawned_service_follows_identity() {
        let (service, documents, _) = service();
        let resolver = IdentityResolver::resolved(Identity::Guest);
        let (handle, task) = service.spawn(resolver.subscribe());

        wait_until(&handle, |s| s.phase == Phase::Ready).await;
        handle
            .apply(CartAction::AddItem(line("a", 10, 2)))
            .await
            .unwrap();

        let user = UserId::new("u1");
        let signed_in = Identity::Authenticated(user.clone());
        resolver.sign_in(user.clone());

        let snapshot = wait_until(&handle, |s| s.identity.as_ref() == Some(&signed_in)).await;
        assert_eq!(snapshot.phase, Phase::Ready);
        assert_eq!(snapshot.state.item_count(), 2);

        handle.flush().await.unwrap();
        assert_eq!(
            documents.get(&user).await.unwrap(),
            Some(CartDocument::new(vec![line("a", 10, 2)]))
        );

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_errors_after_service_stops() {
        let (service, _, _) = service();
        let resolver = IdentityResolver::resolved(Identity::Guest);
        let (handle, task) = service.spawn(resolver.subscribe());
        task.abort();
        let _ = task.await;

        let result = handle.apply(CartAction::ClearCart).await;
        assert!(matches!(result, Err(CartSyncError::ServiceStopped)));
    }
}
