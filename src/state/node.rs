//! Materialized node state.

use std::fmt;
use std::sync::{Arc, Weak};

use hashbrown::HashSet;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::model::{Name, NodeDescriptor, NodeId};
use crate::nodetype::NodeDefinition;
use crate::{Error, Result};
use super::{ChildNodeEntries, ItemState, ItemStateListener, Listeners, NodeReferences, Status};

/// Where a node sits in the hierarchy. The root is its own variant rather
/// than a child with a missing parent.
#[derive(Clone)]
pub enum Placement {
    Root,
    Child(Arc<NodeState>),
}

impl Placement {
    pub fn is_root(&self) -> bool {
        matches!(self, Placement::Root)
    }

    pub fn parent(&self) -> Option<&Arc<NodeState>> {
        match self {
            Placement::Root => None,
            Placement::Child(parent) => Some(parent),
        }
    }
}

impl fmt::Debug for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Root => write!(f, "Root"),
            Placement::Child(parent) => write!(f, "Child({})", parent.id()),
        }
    }
}

/// A node, as materialized from a `NodeDescriptor`.
pub struct NodeState {
    id: NodeId,
    name: Name,
    index: u32,
    unique_id: Option<String>,
    placement: Placement,
    primary_type: Name,
    definition: Arc<NodeDefinition>,
    status: RwLock<Status>,
    mixins: RwLock<SmallVec<[Name; 2]>>,
    property_names: RwLock<HashSet<Name>>,
    references: NodeReferences,
    child_entries: RwLock<Option<Arc<ChildNodeEntries>>>,
    listeners: Listeners,
}

impl NodeState {
    /// A node in `Existing` status with no mixins and no property names yet.
    pub(crate) fn new(
        desc: &NodeDescriptor,
        unique_id: Option<String>,
        placement: Placement,
        definition: Arc<NodeDefinition>,
        references: NodeReferences,
    ) -> Self {
        Self {
            id: desc.id.clone(),
            name: desc.name.clone(),
            index: desc.index,
            unique_id,
            placement,
            primary_type: desc.primary_type.clone(),
            definition,
            status: RwLock::new(Status::Existing),
            mixins: RwLock::new(SmallVec::new()),
            property_names: RwLock::new(HashSet::new()),
            references,
            child_entries: RwLock::new(None),
            listeners: Listeners::default(),
        }
    }

    /// Second construction phase, before the state is published.
    pub(crate) fn init(&self, mixins: impl IntoIterator<Item = Name>, property_names: HashSet<Name>) {
        *self.mixins.write() = mixins.into_iter().collect();
        *self.property_names.write() = property_names;
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Same-name-sibling index within the parent.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Stable unique id; present only for nodes addressed by unique id.
    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn parent(&self) -> Option<&Arc<NodeState>> {
        self.placement.parent()
    }

    pub fn is_root(&self) -> bool {
        self.placement.is_root()
    }

    pub fn primary_type(&self) -> &Name {
        &self.primary_type
    }

    pub fn mixins(&self) -> Vec<Name> {
        self.mixins.read().to_vec()
    }

    /// Primary type followed by the mixins: the input of an effective-type
    /// computation.
    pub fn node_type_names(&self) -> Vec<Name> {
        let mixins = self.mixins.read();
        let mut names = Vec::with_capacity(mixins.len() + 1);
        names.push(self.primary_type.clone());
        names.extend(mixins.iter().cloned());
        names
    }

    pub fn definition(&self) -> &Arc<NodeDefinition> {
        &self.definition
    }

    pub fn status(&self) -> Status {
        *self.status.read()
    }

    /// Property names, sorted.
    pub fn property_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.property_names.read().iter().cloned().collect();
        names.sort();
        names
    }

    pub fn has_property(&self, name: &Name) -> bool {
        self.property_names.read().contains(name)
    }

    pub fn references(&self) -> &NodeReferences {
        &self.references
    }

    /// The child table, if it has been fetched.
    pub fn child_entries(&self) -> Option<Arc<ChildNodeEntries>> {
        self.child_entries.read().clone()
    }

    /// Install a freshly fetched child table unless one is already present.
    /// Returns whichever table is installed afterwards.
    pub fn install_child_entries(&self, entries: ChildNodeEntries) -> Arc<ChildNodeEntries> {
        let mut slot = self.child_entries.write();
        slot.get_or_insert_with(|| Arc::new(entries)).clone()
    }

    /// Drop the cached child table so the next access re-fetches it.
    pub fn invalidate_child_entries(&self) {
        *self.child_entries.write() = None;
    }

    pub fn add_listener(&self, listener: Weak<dyn ItemStateListener>) {
        self.listeners.add(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Move to `to` and notify listeners.
    pub fn transition(self: &Arc<Self>, to: Status) -> Result<()> {
        let from = {
            let mut status = self.status.write();
            let from = *status;
            if !from.can_transition_to(to) {
                return Err(Error::InvalidTransition { from, to });
            }
            *status = to;
            from
        };
        self.listeners.notify(&ItemState::Node(self.clone()), from);
        Ok(())
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("primary_type", &self.primary_type)
            .field("placement", &self.placement)
            .field("status", &self.status())
            .finish()
    }
}
