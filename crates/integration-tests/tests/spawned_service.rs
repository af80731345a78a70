//! Integration tests for the spawned cart service.
//!
//! The service task follows an `IdentityResolver` and is driven through a
//! `CartHandle`, the way an application embeds it.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use cart_sync::{CartAction, CartSyncError, DocumentStore, IdentityResolver, Phase};
use cart_sync_core::{CartLineId, Identity, UserId};
use cart_sync_integration_tests::{Backends, ids, line, wait_for};

#[tokio::test]
async fn test_unresolved_identity_keeps_service_loading() {
    let backends = Backends::new();
    let resolver = IdentityResolver::unresolved();
    let (cart, _task) = backends.service().spawn(resolver.subscribe());

    let snapshot = wait_for(&cart, |s| s.phase == Phase::Loading).await;
    assert!(snapshot.identity.is_none());

    // Changes before the cart is loaded stay in memory only
    let state = cart.apply(CartAction::AddItem(line("A", 10, 1))).await.unwrap();
    assert_eq!(state.item_count(), 1);
    assert_eq!(backends.documents.write_count(), 0);

    resolver.sign_out();
    let snapshot = wait_for(&cart, |s| s.phase == Phase::Ready).await;
    assert!(snapshot.state.is_empty());
    assert_eq!(snapshot.identity, Some(Identity::Guest));
}

#[tokio::test]
async fn test_sign_in_through_resolver_merges_guest_cart() {
    let backends = Backends::new();
    let user = UserId::new("u1");
    backends
        .adapter()
        .write_remote(&user, &[line("B", 5, 1)])
        .await
        .unwrap();

    let resolver = IdentityResolver::resolved(Identity::Guest);
    let (cart, task) = backends.service().spawn(resolver.subscribe());
    wait_for(&cart, |s| s.phase == Phase::Ready).await;

    cart.apply(CartAction::AddItem(line("A", 10, 2))).await.unwrap();

    let signed_in = Identity::Authenticated(user.clone());
    resolver.sign_in(user.clone());
    let snapshot = wait_for(&cart, |s| s.identity.as_ref() == Some(&signed_in)).await;

    assert_eq!(ids(snapshot.state.items()), ["B", "A"]);
    assert_eq!(snapshot.state.total(), Decimal::from(25));
    assert_eq!(snapshot.state.item_count(), 3);

    cart.apply(CartAction::RemoveItem(CartLineId::new("B")))
        .await
        .unwrap();
    cart.flush().await.unwrap();

    let stored = backends.documents.get(&user).await.unwrap().unwrap();
    assert_eq!(ids(&stored.items), ["A"]);

    drop(cart);
    task.await.unwrap();
}

#[tokio::test]
async fn test_deferred_merge_retried_after_next_action() {
    let backends = Backends::new();
    let user = UserId::new("u1");
    let resolver = IdentityResolver::resolved(Identity::Guest);
    let (cart, _task) = backends.service().spawn(resolver.subscribe());
    wait_for(&cart, |s| s.phase == Phase::Ready).await;
    cart.apply(CartAction::AddItem(line("A", 10, 2))).await.unwrap();

    backends.documents.set_offline(true);
    let signed_in = Identity::Authenticated(user.clone());
    resolver.sign_in(user.clone());
    wait_for(&cart, |s| s.identity.as_ref() == Some(&signed_in)).await;
    assert!(backends.documents.get(&user).await.is_err());

    backends.documents.set_offline(false);
    cart.apply(CartAction::AddItem(line("B", 5, 1))).await.unwrap();
    cart.flush().await.unwrap();

    let stored = backends.documents.get(&user).await.unwrap().unwrap();
    assert_eq!(ids(&stored.items), ["A", "B"]);
    let snapshot = cart.snapshot().await.unwrap();
    assert_eq!(snapshot.state.item_count(), 3);
}

#[tokio::test]
async fn test_observers_see_every_change() {
    let backends = Backends::new();
    let resolver = IdentityResolver::resolved(Identity::Guest);
    let (cart, _task) = backends.service().spawn(resolver.subscribe());
    wait_for(&cart, |s| s.phase == Phase::Ready).await;

    let mut observer = cart.subscribe();
    cart.apply(CartAction::AddItem(line("A", 10, 3))).await.unwrap();

    observer.changed().await.unwrap();
    let seen = observer.borrow_and_update().clone();
    assert_eq!(seen.item_count(), 3);
    assert_eq!(seen.total(), Decimal::from(30));
}

#[tokio::test]
async fn test_handle_reports_stopped_service() {
    let backends = Backends::new();
    let resolver = IdentityResolver::resolved(Identity::Guest);
    let (cart, task) = backends.service().spawn(resolver.subscribe());

    task.abort();
    let _ = task.await;

    let err = cart.snapshot().await.unwrap_err();
    assert!(matches!(err, CartSyncError::ServiceStopped));
}
