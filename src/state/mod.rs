//! # Item States
//!
//! The materialized, typed representations of nodes and properties, plus the
//! per-node child table and reference view.
//!
//! States are shared as `Arc`s. Identity (one instance per id per session)
//! is the Identity Cache's job; the states themselves only carry data, a
//! checked status, and weak handles to lifecycle listeners.

pub mod status;
pub mod node;
pub mod property;
pub mod child_entries;
pub mod references;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::model::ItemId;

pub use status::Status;
pub use node::{NodeState, Placement};
pub use property::PropertyState;
pub use child_entries::{ChildNodeEntries, ChildNodeEntry};
pub use references::{NodeReferences, References};

/// Either kind of item state.
#[derive(Debug, Clone)]
pub enum ItemState {
    Node(Arc<NodeState>),
    Property(Arc<PropertyState>),
}

impl ItemState {
    pub fn id(&self) -> ItemId {
        match self {
            ItemState::Node(n) => ItemId::Node(n.id().clone()),
            ItemState::Property(p) => ItemId::Property(p.id()),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            ItemState::Node(n) => n.status(),
            ItemState::Property(p) => p.status(),
        }
    }

    /// Whether both handles point at the same allocation.
    pub fn same_instance(&self, other: &ItemState) -> bool {
        match (self, other) {
            (ItemState::Node(a), ItemState::Node(b)) => Arc::ptr_eq(a, b),
            (ItemState::Property(a), ItemState::Property(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_node(&self) -> Option<&Arc<NodeState>> {
        match self {
            ItemState::Node(n) => Some(n),
            ItemState::Property(_) => None,
        }
    }

    pub fn as_property(&self) -> Option<&Arc<PropertyState>> {
        match self {
            ItemState::Property(p) => Some(p),
            ItemState::Node(_) => None,
        }
    }

    pub(crate) fn add_listener(&self, listener: Weak<dyn ItemStateListener>) {
        match self {
            ItemState::Node(n) => n.add_listener(listener),
            ItemState::Property(p) => p.add_listener(listener),
        }
    }
}

impl From<Arc<NodeState>> for ItemState {
    fn from(v: Arc<NodeState>) -> Self { ItemState::Node(v) }
}

impl From<Arc<PropertyState>> for ItemState {
    fn from(v: Arc<PropertyState>) -> Self { ItemState::Property(v) }
}

/// Observer of item state lifecycle changes.
pub trait ItemStateListener: Send + Sync {
    /// Called after `state` moved from `previous` to its current status.
    fn status_changed(&self, state: &ItemState, previous: Status);
}

/// Weak listener list shared by node and property states.
#[derive(Default)]
pub(crate) struct Listeners {
    inner: Mutex<Vec<Weak<dyn ItemStateListener>>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Weak<dyn ItemStateListener>) {
        self.inner.lock().push(listener);
    }

    /// Notify every live listener. Dead handles are pruned; callbacks run
    /// outside the lock.
    pub(crate) fn notify(&self, state: &ItemState, previous: Status) {
        let live: Vec<Arc<dyn ItemStateListener>> = {
            let mut listeners = self.inner.lock();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.status_changed(state, previous);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().iter().filter(|l| l.strong_count() > 0).count()
    }
}
