//! In-process change notification channel.
//!
//! # Invariants
//! - `publish` never delivers a change to listeners of the origin context.
//! - A listener whose `Subscription` was dropped receives nothing further.
//! - A listener holds at most one pending change per key; a newer value
//!   replaces the queued one and moves to the back, so the backlog of a
//!   context that rarely drains is bounded by the number of keys.

use crate::store::{ContextId, StoreChange};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type PendingQueue = Arc<Mutex<VecDeque<StoreChange>>>;

#[derive(Default)]
struct HubState {
    next_listener_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

struct Listener {
    context: ContextId,
    pending: PendingQueue,
}

impl Listener {
    fn enqueue(&self, change: &StoreChange) {
        let mut pending = lock(&self.pending);
        pending.retain(|queued| queued.key != change.key);
        pending.push_back(change.clone());
    }
}

/// Fan-out of store changes to subscribed execution contexts.
#[derive(Clone, Default)]
pub struct ChangeHub {
    state: Arc<Mutex<HubState>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one listener owned by `context`.
    pub fn subscribe(&self, context: ContextId) -> Subscription {
        let pending = PendingQueue::default();
        let mut state = lock(&self.state);
        let listener_id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(
            listener_id,
            Listener {
                context,
                pending: Arc::clone(&pending),
            },
        );

        Subscription {
            listener_id,
            context,
            pending,
            hub: Arc::downgrade(&self.state),
        }
    }

    /// Delivers `change` to every listener not owned by `origin`.
    ///
    /// Returns the number of listeners reached.
    pub fn publish(&self, origin: ContextId, change: &StoreChange) -> usize {
        self.deliver(|listener| listener.context != origin, change)
    }

    /// Delivers `change` to every listener regardless of owner.
    ///
    /// Used by stores that detect foreign writes themselves and fan them
    /// out to the local context only.
    pub fn broadcast(&self, change: &StoreChange) -> usize {
        self.deliver(|_| true, change)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    fn deliver<F>(&self, accept: F, change: &StoreChange) -> usize
    where
        F: Fn(&Listener) -> bool,
    {
        let state = lock(&self.state);
        let mut delivered = 0;
        for listener in state.listeners.values().filter(|listener| accept(*listener)) {
            listener.enqueue(change);
            delivered += 1;
        }
        delivered
    }
}

/// Scoped registration on a `ChangeHub`.
///
/// Dropping the subscription is the unsubscribe operation.
pub struct Subscription {
    listener_id: u64,
    context: ContextId,
    pending: PendingQueue,
    hub: Weak<Mutex<HubState>>,
}

impl Subscription {
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    /// Returns the oldest pending change without blocking.
    pub fn try_next(&self) -> Option<StoreChange> {
        lock(&self.pending).pop_front()
    }

    /// Returns all pending changes, oldest first.
    pub fn drain(&self) -> Vec<StoreChange> {
        lock(&self.pending).drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.hub.upgrade() {
            lock(&state).listeners.remove(&self.listener_id);
        }
    }
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    // Bookkeeping stays consistent even if a holder panicked.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
