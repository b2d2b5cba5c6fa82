//! Change notifications
//!
//! The engine does not recompute anything reactively. Consumers that need to
//! refresh (UI panels, map layers) subscribe to an entity and are told which
//! trait changed in which stratum. Listeners run synchronously after the write
//! has been applied and its storage lock released, so a listener may read the
//! entity freely.

use crate::view::PathSegment;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A write that changed an entity's strata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitChanged {
    /// Id of the entity that owns the storage
    pub entity_id: String,
    /// Stratum that was written
    pub stratum: String,
    /// Path from the owner to the nested view that was written (empty for the owner)
    pub path: Vec<PathSegment>,
    /// Trait written, `None` when a whole stratum was replaced or removed
    pub trait_id: Option<String>,
}

/// Callback invoked for every change
pub type Listener = Arc<dyn Fn(&TraitChanged) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listeners registered on one entity
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
}

impl ListenerSet {
    pub(crate) fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn notify(&self, change: &TraitChanged) {
        // Snapshot so a listener may subscribe or unsubscribe without deadlocking.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(change);
        }
    }
}
