//! Ordered, coalescing write queue for remote cart documents.
//!
//! Every authenticated user gets a dedicated queue drained by one task, so
//! writes for the same user are applied strictly in submission order. When
//! several snapshots are waiting, only the newest is written: every snapshot
//! is a full overwrite, so the skipped ones would be replaced immediately
//! anyway.
//!
//! Store failures are logged and dropped. The in-memory cart stays
//! authoritative and the next mutation submits a fresh full snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, error, info_span};

use cart_sync_core::{CartDocument, UserId};

use crate::store::DocumentStore;

enum SaveMessage {
    Write(CartDocument),
    Flush(oneshot::Sender<()>),
}

/// Per-user ordered write queues over a shared document store.
pub struct SaveQueue<D> {
    store: Arc<D>,
    queues: HashMap<UserId, mpsc::UnboundedSender<SaveMessage>>,
}

impl<D: DocumentStore> SaveQueue<D> {
    /// Create a queue set writing to `store`.
    #[must_use]
    pub fn new(store: Arc<D>) -> Self {
        Self {
            store,
            queues: HashMap::new(),
        }
    }

    /// Queue a full snapshot of a user's cart. Returns immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&mut self, user_id: &UserId, document: CartDocument) {
        let message = SaveMessage::Write(document);
        if let Err(mpsc::error::SendError(message)) = self.sender(user_id).send(message) {
            // Worker is gone (runtime shutting down or task aborted); start a new one.
            self.queues.remove(user_id);
            if self.sender(user_id).send(message).is_err() {
                error!(user_id = %user_id, "Cart save queue unavailable, dropping write");
            }
        }
    }

    /// Wait until every write submitted for `user_id` before this call has
    /// been attempted.
    pub async fn flush(&self, user_id: &UserId) {
        let Some(sender) = self.queues.get(user_id) else {
            return;
        };

        let (ack, done) = oneshot::channel();
        if sender.send(SaveMessage::Flush(ack)).is_ok() {
            // An error here means the worker exited; nothing is pending.
            let _ = done.await;
        }
    }

    /// Flush every user's queue.
    pub async fn flush_all(&self) {
        for user_id in self.queues.keys() {
            self.flush(user_id).await;
        }
    }

    /// Flush a user's queue and shut its worker down.
    ///
    /// Used once the user no longer owns the cart. A later [`submit`](Self::submit)
    /// for the same user starts a fresh worker; the old one has nothing left
    /// to write, so ordering is preserved.
    pub async fn retire(&mut self, user_id: &UserId) {
        self.flush(user_id).await;
        if self.queues.remove(user_id).is_some() {
            debug!(user_id = %user_id, "Retired cart save queue");
        }
    }

    /// Number of users with a live queue.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    fn sender(&mut self, user_id: &UserId) -> &mpsc::UnboundedSender<SaveMessage> {
        let store = &self.store;
        self.queues.entry(user_id.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let span = info_span!("cart_save_queue", user_id = %user_id);
            tokio::spawn(run_worker(Arc::clone(store), user_id.clone(), rx).instrument(span));
            tx
        })
    }
}

async fn run_worker<D: DocumentStore>(
    store: Arc<D>,
    user_id: UserId,
    mut rx: mpsc::UnboundedReceiver<SaveMessage>,
) {
    while let Some(message) = rx.recv().await {
        let mut latest = None;
        let mut acks = Vec::new();
        collect(message, &mut latest, &mut acks);

        while let Ok(message) = rx.try_recv() {
            collect(message, &mut latest, &mut acks);
        }

        if let Some(document) = latest {
            match store.put(&user_id, &document).await {
                Ok(()) => debug!(items = document.items.len(), "Persisted cart document"),
                Err(e) => error!(error = %e, "Failed to persist cart document"),
            }
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }
    debug!("Cart save queue closed");
}

fn collect(
    message: SaveMessage,
    latest: &mut Option<CartDocument>,
    acks: &mut Vec<oneshot::Sender<()>>,
) {
    match message {
        SaveMessage::Write(document) => *latest = Some(document),
        SaveMessage::Flush(ack) => acks.push(ack),
    }
}
