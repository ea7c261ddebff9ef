//! Unit tests for instance locking.

use std::sync::Arc;
use std::time::Duration;

use courier_config::ConcurrencyMode;
use rstest::{fixture, rstest};
use tokio::sync::oneshot;

use super::*;
use crate::instance::{InstanceContext, SingletonInstanceProvider};

#[fixture]
fn context() -> Arc<InstanceContext> {
    Arc::new(InstanceContext::new(
        None,
        Arc::new(SingletonInstanceProvider::new(())),
    ))
}

fn queue(facet: &ConcurrencyInstanceContextFacet, kind: WaiterKind) -> WaiterTicket {
    match facet.try_acquire_or_enqueue(kind).expect("facet usable") {
        Acquire::Queued(ticket) => ticket,
        Acquire::Granted => panic!("lock should already be held"),
    }
}

async fn wait_for_waiters(facet: &ConcurrencyInstanceContextFacet, expected: (usize, usize)) {
    while facet.waiting().expect("facet usable") != expected {
        tokio::task::yield_now().await;
    }
}

#[rstest]
fn call_outs_drain_before_new_messages_in_fifo_order() {
    let facet = ConcurrencyInstanceContextFacet::new();
    assert!(matches!(
        facet.try_acquire_or_enqueue(WaiterKind::NewMessage),
        Ok(Acquire::Granted)
    ));
    let mut tickets = vec![
        queue(&facet, WaiterKind::NewMessage),
        queue(&facet, WaiterKind::NewMessage),
        queue(&facet, WaiterKind::CallOut),
        queue(&facet, WaiterKind::NewMessage),
        queue(&facet, WaiterKind::CallOut),
    ];
    let ids: Vec<u64> = tickets.iter().map(WaiterTicket::id).collect();
    assert_eq!(facet.waiting().expect("facet usable"), (2, 3));

    let mut handed = Vec::new();
    while let Some(id) = facet.release().expect("facet usable") {
        handed.push(id);
        assert!(facet.is_locked().expect("facet usable"));
    }

    let expected: Vec<u64> = [2, 4, 0, 1, 3]
        .into_iter()
        .filter_map(|index| ids.get(index).copied())
        .collect();
    assert_eq!(handed, expected);
    assert!(tickets.iter_mut().all(WaiterTicket::try_granted));
    assert!(!facet.is_locked().expect("facet usable"));
}

#[rstest]
fn release_skips_waiters_that_gave_up() {
    let facet = ConcurrencyInstanceContextFacet::new();
    assert!(matches!(
        facet.try_acquire_or_enqueue(WaiterKind::NewMessage),
        Ok(Acquire::Granted)
    ));
    drop(queue(&facet, WaiterKind::NewMessage));
    let mut live = queue(&facet, WaiterKind::NewMessage);

    assert_eq!(facet.release().expect("facet usable"), Some(live.id()));
    assert!(live.try_granted());
    assert_eq!(facet.release().expect("facet usable"), None);
}

#[rstest]
fn abandoned_waiter_leaves_the_queue() {
    let facet = ConcurrencyInstanceContextFacet::new();
    assert!(matches!(
        facet.try_acquire_or_enqueue(WaiterKind::NewMessage),
        Ok(Acquire::Granted)
    ));
    let ticket = queue(&facet, WaiterKind::CallOut);

    assert!(facet.abandon(ticket.id()).expect("facet usable"));
    assert!(!facet.abandon(ticket.id()).expect("facet usable"));
    assert_eq!(facet.waiting().expect("facet usable"), (0, 0));
}

#[rstest]
#[should_panic(expected = "resumed twice")]
fn resuming_a_waiter_twice_panics() {
    let (mut waiter, _ticket) = Waiter::new(7, WaiterKind::NewMessage);
    assert!(waiter.resume());
    waiter.resume();
}

#[rstest]
fn resuming_a_dropped_ticket_reports_failure() {
    let (mut waiter, ticket) = Waiter::new(3, WaiterKind::CallOut);
    drop(ticket);
    assert!(!waiter.resume());
}

#[rstest]
fn blocking_lock_is_taken_and_released_on_drop(context: Arc<InstanceContext>) {
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Single, None);

    let lock = behavior
        .lock_instance_blocking(&context)
        .expect("uncontended lock");

    assert!(lock.is_held());
    assert!(context.facet().is_locked().expect("facet usable"));
    drop(lock);
    assert!(!context.facet().is_locked().expect("facet usable"));
}

#[rstest]
#[tokio::test]
async fn multiple_mode_never_locks(context: Arc<InstanceContext>) {
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Multiple, None);

    let first = behavior.lock_instance(&context).await.expect("lock");
    let second = behavior.lock_instance(&context).await.expect("lock");

    assert!(!first.is_held());
    assert!(!second.is_held());
    assert!(!context.facet().is_locked().expect("facet usable"));
}

#[rstest]
#[tokio::test]
async fn waiting_call_gets_the_lock_on_release(context: Arc<InstanceContext>) {
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Single, None);
    let first = behavior.lock_instance(&context).await.expect("lock");
    let queued = Arc::clone(&context);
    let waiting = tokio::spawn(async move { behavior.lock_instance(&queued).await });
    wait_for_waiters(context.facet(), (0, 1)).await;

    first.release().expect("release");

    let second = waiting.await.expect("task completes").expect("lock");
    assert!(second.is_held());
    assert!(!first.is_held());
    assert!(context.facet().is_locked().expect("facet usable"));
}

#[rstest]
#[tokio::test]
async fn lock_wait_times_out_and_leaves_the_queue(context: Arc<InstanceContext>) {
    let limit = Duration::from_millis(20);
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Single, Some(limit));
    let _held = behavior.lock_instance(&context).await.expect("lock");

    let error = behavior
        .lock_instance(&context)
        .await
        .expect_err("second caller times out");

    assert!(matches!(error, DispatchError::InstanceLockTimeout { waited } if waited == limit));
    assert_eq!(context.facet().waiting().expect("facet usable"), (0, 0));
}

#[rstest]
#[tokio::test]
async fn reentrant_call_out_releases_the_lock(context: Arc<InstanceContext>) {
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Reentrant, None);
    let lock = behavior.lock_instance(&context).await.expect("lock");

    let reentered = lock
        .call_out(async {
            let inner = behavior.lock_instance(&context).await.expect("lock is free");
            inner.is_held()
        })
        .await
        .expect("call-out completes");

    assert!(reentered);
    assert!(lock.is_held());
    assert!(context.facet().is_locked().expect("facet usable"));
}

#[rstest]
#[tokio::test]
async fn single_call_out_keeps_the_lock(context: Arc<InstanceContext>) {
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Single, None);
    let lock = behavior.lock_instance(&context).await.expect("lock");

    let locked_during_call_out = lock
        .call_out(async { context.facet().is_locked().expect("facet usable") })
        .await
        .expect("call-out completes");

    assert!(locked_during_call_out);
    assert!(lock.is_held());
}

#[rstest]
#[tokio::test]
async fn returning_call_out_jumps_the_new_message_queue(context: Arc<InstanceContext>) {
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Reentrant, None);
    let lock = behavior.lock_instance(&context).await.expect("lock");
    let (finish, finished) = oneshot::channel::<()>();
    let call_out = {
        let lock = Arc::clone(&lock);
        tokio::spawn(async move {
            lock.call_out(async move {
                let _ = finished.await;
            })
            .await
        })
    };
    while context.facet().is_locked().expect("facet usable") {
        tokio::task::yield_now().await;
    }

    // Another call takes the lock while the call-out is away, and a new
    // message queues behind it.
    assert!(matches!(
        context.facet().try_acquire_or_enqueue(WaiterKind::NewMessage),
        Ok(Acquire::Granted)
    ));
    let newcomer = queue(context.facet(), WaiterKind::NewMessage);
    finish.send(()).expect("call-out is waiting");
    wait_for_waiters(context.facet(), (1, 1)).await;

    let handed = context.facet().release().expect("release");

    assert_ne!(handed, Some(newcomer.id()));
    call_out
        .await
        .expect("task completes")
        .expect("call-out completes");
    assert!(lock.is_held());
    assert_eq!(context.facet().waiting().expect("facet usable"), (0, 1));
    drop(newcomer);
}

#[rstest]
#[tokio::test]
async fn dropped_waiter_passes_a_handed_over_lock_on(context: Arc<InstanceContext>) {
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Single, None);
    let first = behavior.lock_instance(&context).await.expect("lock");
    let mut abandoned = Box::pin(behavior.lock_instance(&context));
    assert!(futures::poll!(&mut abandoned).is_pending());

    first.release().expect("release");
    assert!(context.facet().is_locked().expect("facet usable"));
    drop(abandoned);

    assert!(!context.facet().is_locked().expect("facet usable"));
    let next = tokio::time::timeout(Duration::from_secs(1), behavior.lock_instance(&context))
        .await
        .expect("lock is free again")
        .expect("lock");
    assert!(next.is_held());
}

#[rstest]
#[tokio::test]
async fn dropped_waiter_leaves_the_queue_before_hand_off(context: Arc<InstanceContext>) {
    let behavior = ConcurrencyBehavior::new(ConcurrencyMode::Single, None);
    let first = behavior.lock_instance(&context).await.expect("lock");
    let mut abandoned = Box::pin(behavior.lock_instance(&context));
    assert!(futures::poll!(&mut abandoned).is_pending());
    assert_eq!(context.facet().waiting().expect("facet usable"), (0, 1));

    drop(abandoned);

    assert_eq!(context.facet().waiting().expect("facet usable"), (0, 0));
    assert!(first.is_held());
    first.release().expect("release");
    assert!(!context.facet().is_locked().expect("facet usable"));
}
