//! Identity resolver: publishes who owns the cart.
//!
//! The resolver starts either unresolved (sign-in state still being
//! determined) or with a known identity. Subscribers receive the current
//! identity as soon as one is resolved, then every subsequent change.
//! Publishing the same identity twice notifies subscribers twice; the cart
//! engine treats repeated notifications idempotently.

use std::sync::Arc;

use tokio::sync::watch;

use cart_sync_core::{Identity, UserId};

/// Publisher side of identity notifications.
///
/// Cheaply cloneable; every clone publishes to the same subscribers.
#[derive(Clone)]
pub struct IdentityResolver {
    tx: Arc<watch::Sender<Option<Identity>>>,
}

impl IdentityResolver {
    /// A resolver whose identity is not known yet.
    #[must_use]
    pub fn unresolved() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// A resolver with an already known identity.
    #[must_use]
    pub fn resolved(identity: Identity) -> Self {
        let (tx, _) = watch::channel(Some(identity));
        Self { tx: Arc::new(tx) }
    }

    /// Publish an identity.
    pub fn publish(&self, identity: Identity) {
        self.tx.send_replace(Some(identity));
    }

    /// Publish a signed-in user.
    pub fn sign_in(&self, user_id: UserId) {
        self.publish(Identity::Authenticated(user_id));
    }

    /// Publish the guest identity.
    pub fn sign_out(&self) {
        self.publish(Identity::Guest);
    }

    /// The current identity, if resolved.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    /// Subscribe to identity notifications.
    #[must_use]
    pub fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription {
            rx: self.tx.subscribe(),
            primed: false,
        }
    }
}

/// Receiving side of identity notifications.
pub struct IdentitySubscription {
    rx: watch::Receiver<Option<Identity>>,
    primed: bool,
}

impl IdentitySubscription {
    /// Wait for the next identity.
    ///
    /// The first call returns the current identity immediately if it is
    /// resolved. Returns `None` once every resolver has been dropped.
    /// Changes published faster than they are consumed collapse to the latest.
    pub async fn next(&mut self) -> Option<Identity> {
        if !self.primed {
            self.primed = true;
            if let Some(identity) = self.rx.borrow_and_update().clone() {
                return Some(identity);
            }
        }

        loop {
            self.rx.changed().await.ok()?;
            if let Some(identity) = self.rx.borrow_and_update().clone() {
                return Some(identity);
            }
        }
    }
}
