//! Identity cache: at most one live item state per id per session.
//!
//! The factory only talks to the cache through `created`, which is an atomic
//! insert-if-absent. When two resolutions of the same id race, the first to
//! register wins and every later builder gets the winner back.

use std::sync::Arc;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use parking_lot::RwLock;
use tracing::debug;

use crate::model::{ItemId, NodeId, PropertyId};
use crate::state::{ItemState, ItemStateListener, NodeState, PropertyState, Status};

/// Session-scoped identity map of item states.
///
/// Implementations listen to the states they hold so they can drop entries
/// that become `Removed` or `Stale`.
pub trait ItemStateCache: ItemStateListener {
    /// Publish a freshly built state unless a valid (`Existing` or
    /// `Modified`) state with the same id is already registered. Returns the
    /// registered instance, which is `state` itself only if this call won.
    fn created(&self, state: ItemState) -> ItemState;

    fn node(&self, id: &NodeId) -> Option<Arc<NodeState>>;

    fn property(&self, id: &PropertyId) -> Option<Arc<PropertyState>>;

    /// Drop the entry for `id`. Returns the evicted state.
    fn evict(&self, id: &ItemId) -> Option<ItemState>;
}

/// In-memory `ItemStateCache` behind a single `RwLock`.
#[derive(Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<ItemId, ItemState>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Forget every state (e.g. on session close).
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn get(&self, id: &ItemId) -> Option<ItemState> {
        self.entries.read().get(id).cloned()
    }
}

impl ItemStateCache for SessionCache {
    fn created(&self, state: ItemState) -> ItemState {
        let id = state.id();
        let mut entries = self.entries.write();
        match entries.entry(id) {
            Entry::Occupied(mut slot) => {
                if !slot.get().status().is_valid() {
                    slot.insert(state.clone());
                    state
                } else {
                    slot.get().clone()
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(state.clone());
                state
            }
        }
    }

    fn node(&self, id: &NodeId) -> Option<Arc<NodeState>> {
        match self.entries.read().get(&ItemId::Node(id.clone())) {
            Some(ItemState::Node(n)) => Some(n.clone()),
            _ => None,
        }
    }

    fn property(&self, id: &PropertyId) -> Option<Arc<PropertyState>> {
        match self.entries.read().get(&ItemId::Property(id.clone())) {
            Some(ItemState::Property(p)) => Some(p.clone()),
            _ => None,
        }
    }

    fn evict(&self, id: &ItemId) -> Option<ItemState> {
        let evicted = self.entries.write().remove(id);
        if evicted.is_some() {
            debug!(item = %id, "evicted item state");
        }
        evicted
    }
}

impl ItemStateListener for SessionCache {
    fn status_changed(&self, state: &ItemState, _previous: Status) {
        if !matches!(state.status(), Status::Removed | Status::Stale) {
            return;
        }
        let id = state.id();
        let mut entries = self.entries.write();
        // Only drop the entry if it still holds this very instance.
        if entries.get(&id).is_some_and(|held| held.same_instance(state)) {
            entries.remove(&id);
            debug!(item = %id, status = %state.status(), "evicted item state");
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FactoryConfig, SessionInfo};
    use crate::factory::ItemStateFactory;
    use crate::model::NodeDescriptor;
    use crate::nodetype::NodeTypeRegistry;
    use crate::service::MemoryService;
    use crate::state::Placement;

    fn root_desc() -> NodeDescriptor {
        NodeDescriptor::new(NodeId::root(), "", "rep:root")
    }

    /// A factory publishing into a throwaway cache, so states can be built
    /// without touching the cache under test.
    fn builder() -> ItemStateFactory {
        ItemStateFactory::new(
            Arc::new(MemoryService::new()),
            Arc::new(NodeTypeRegistry::with_builtins()),
            Arc::new(SessionCache::new()),
            SessionInfo::default(),
            FactoryConfig::default(),
        )
    }

    fn fresh_root() -> Arc<NodeState> {
        builder().build_node_state(root_desc(), Placement::Root).unwrap()
    }

    #[test]
    fn test_first_registration_wins() {
        let cache = SessionCache::new();
        let first = fresh_root();
        let second = fresh_root();
        assert!(!Arc::ptr_eq(&first, &second));

        let won = cache.created(ItemState::Node(first.clone()));
        let lost = cache.created(ItemState::Node(second));

        assert!(Arc::ptr_eq(won.as_node().unwrap(), &first));
        assert!(Arc::ptr_eq(lost.as_node().unwrap(), &first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_entry_is_replaced() {
        let cache = SessionCache::new();
        let old = fresh_root();
        cache.created(ItemState::Node(old.clone()));
        old.transition(Status::Stale).unwrap();

        let new = fresh_root();
        let won = cache.created(ItemState::Node(new.clone()));
        assert!(Arc::ptr_eq(won.as_node().unwrap(), &new));
    }

    #[test]
    fn test_evict() {
        let cache = SessionCache::new();
        let root = fresh_root();
        cache.created(ItemState::Node(root));

        let id = ItemId::Node(NodeId::root());
        assert!(cache.evict(&id).is_some());
        assert!(cache.evict(&id).is_none());
        assert!(cache.node(&NodeId::root()).is_none());
    }

    #[test]
    fn test_listener_ignores_other_instances() {
        let cache = SessionCache::new();
        let held = fresh_root();
        cache.created(ItemState::Node(held.clone()));

        // Another instance with the same id going stale must not evict the
        // held one.
        let other = fresh_root();
        other.transition(Status::Stale).unwrap();
        cache.status_changed(&ItemState::Node(other), Status::Existing);

        assert!(Arc::ptr_eq(&cache.node(&NodeId::root()).unwrap(), &held));
    }
}
