//! Ordered child listing of one parent node.
//!
//! Built once per fetch by appending entries in the order the service
//! returned them. Same-name siblings are legal and told apart by their
//! index; nothing is re-sorted.

use std::fmt;
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::model::{ChildDescriptor, Name, NodeId};
use super::NodeState;

/// One child: name, optional unique id, sibling index, and a weak handle to
/// the materialized state once someone resolved it.
pub struct ChildNodeEntry {
    name: Name,
    unique_id: Option<String>,
    index: u32,
    id: NodeId,
    state: RwLock<Weak<NodeState>>,
}

impl ChildNodeEntry {
    fn new(parent: &NodeId, name: Name, unique_id: Option<String>, index: u32) -> Self {
        let id = match &unique_id {
            Some(uid) => NodeId::from_unique_id(uid.as_str()),
            None => parent.child(name.clone(), index),
        };
        Self { name, unique_id, index, id, state: RwLock::new(Weak::new()) }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Id under which the child is fetched from the service.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The materialized child, if it is still alive.
    pub fn cached_state(&self) -> Option<Arc<NodeState>> {
        self.state.read().upgrade()
    }

    /// Remember the materialized child.
    pub fn attach(&self, state: &Arc<NodeState>) {
        *self.state.write() = Arc::downgrade(state);
    }
}

impl fmt::Debug for ChildNodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildNodeEntry")
            .field("name", &self.name)
            .field("unique_id", &self.unique_id)
            .field("index", &self.index)
            .field("resolved", &self.cached_state().is_some())
            .finish()
    }
}

/// The child table of one parent.
pub struct ChildNodeEntries {
    parent: NodeId,
    entries: Vec<ChildNodeEntry>,
    /// name → positions in `entries`, in listing order
    by_name: HashMap<Name, SmallVec<[usize; 2]>>,
    by_unique_id: HashMap<String, usize>,
}

impl ChildNodeEntries {
    pub fn new(parent: NodeId) -> Self {
        Self {
            parent,
            entries: Vec::new(),
            by_name: HashMap::new(),
            by_unique_id: HashMap::new(),
        }
    }

    /// Consume a listing in one pass, preserving its order.
    pub fn from_listing(parent: NodeId, listing: impl IntoIterator<Item = ChildDescriptor>) -> Self {
        let mut entries = Self::new(parent);
        for child in listing {
            entries.add(child.name, child.unique_id, child.index);
        }
        entries
    }

    /// Append an entry at the end.
    pub(crate) fn add(&mut self, name: Name, unique_id: Option<String>, index: u32) {
        let pos = self.entries.len();
        if let Some(uid) = &unique_id {
            self.by_unique_id.insert(uid.clone(), pos);
        }
        self.by_name.entry(name.clone()).or_default().push(pos);
        self.entries.push(ChildNodeEntry::new(&self.parent, name, unique_id, index));
    }

    pub fn parent(&self) -> &NodeId {
        &self.parent
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in listing order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChildNodeEntry> {
        self.entries.iter()
    }

    /// The entry for (`name`, `index`).
    pub fn get(&self, name: &Name, index: u32) -> Option<&ChildNodeEntry> {
        self.by_name
            .get(name)?
            .iter()
            .map(|&pos| &self.entries[pos])
            .find(|e| e.index == index)
    }

    /// All same-name siblings called `name`, in listing order.
    pub fn by_name<'a>(&'a self, name: &Name) -> impl Iterator<Item = &'a ChildNodeEntry> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flat_map(move |positions| positions.iter().map(move |&pos| &self.entries[pos]))
    }

    pub fn by_unique_id(&self, unique_id: &str) -> Option<&ChildNodeEntry> {
        self.by_unique_id.get(unique_id).map(|&pos| &self.entries[pos])
    }

    /// The entry a node id denotes: by unique id for unique-id-addressed
    /// ids, otherwise by exact id and then by the last path element.
    pub fn find(&self, id: &NodeId) -> Option<&ChildNodeEntry> {
        if id.is_unique_id_addressed() {
            return id.unique_id().and_then(|uid| self.by_unique_id(uid));
        }
        if let Some(entry) = self.entries.iter().find(|e| e.id == *id) {
            return Some(entry);
        }
        let element = id.path()?.name_element()?;
        self.get(&element.name, element.index)
    }
}

impl<'a> IntoIterator for &'a ChildNodeEntries {
    type Item = &'a ChildNodeEntry;
    type IntoIter = std::slice::Iter<'a, ChildNodeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Debug for ChildNodeEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildNodeEntries")
            .field("parent", &self.parent)
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn listing(items: &[(&str, Option<&str>, u32)]) -> Vec<ChildDescriptor> {
        items
            .iter()
            .map(|(n, uid, i)| ChildDescriptor::new(*n, uid.map(str::to_owned), *i))
            .collect()
    }

    #[test]
    fn test_same_name_siblings_keep_order() {
        let entries = ChildNodeEntries::from_listing(
            NodeId::root(),
            listing(&[("a", None, 1), ("b", None, 1), ("a", None, 2)]),
        );
        let shape: Vec<_> = entries.iter().map(|e| (e.name().as_str(), e.index())).collect();
        assert_eq!(shape, vec![("a", 1), ("b", 1), ("a", 2)]);

        let siblings: Vec<u32> = entries.by_name(&"a".into()).map(|e| e.index()).collect();
        assert_eq!(siblings, vec![1, 2]);
        assert_eq!(entries.get(&"a".into(), 2).unwrap().id().to_string(), "/a[2]");
        assert!(entries.get(&"b".into(), 2).is_none());
    }

    #[test]
    fn test_find_by_unique_id_and_path() {
        let entries = ChildNodeEntries::from_listing(
            NodeId::root(),
            listing(&[("doc", Some("u-1"), 1), ("img", None, 1)]),
        );
        let by_uid = entries.find(&NodeId::from_unique_id("u-1")).unwrap();
        assert_eq!(by_uid.name().as_str(), "doc");

        let by_path = entries.find(&NodeId::root().child("img", 1)).unwrap();
        assert_eq!(by_path.unique_id(), None);

        assert!(entries.find(&NodeId::from_unique_id("u-2")).is_none());
    }

    #[test]
    fn test_entry_holds_weak_state() {
        let entries = ChildNodeEntries::from_listing(NodeId::root(), listing(&[("a", None, 1)]));
        let entry = entries.iter().next().unwrap();
        assert!(entry.cached_state().is_none());
    }

    proptest! {
        #[test]
        fn prop_listing_order_preserved(names in proptest::collection::vec("[abc]", 0..20)) {
            let mut counts = std::collections::HashMap::new();
            let items: Vec<ChildDescriptor> = names
                .iter()
                .map(|n| {
                    let c = counts.entry(n.clone()).or_insert(0u32);
                    *c += 1;
                    ChildDescriptor::new(n.as_str(), None, *c)
                })
                .collect();
            let entries = ChildNodeEntries::from_listing(NodeId::root(), items.clone());
            prop_assert_eq!(entries.len(), items.len());
            for (entry, item) in entries.iter().zip(items.iter()) {
                prop_assert_eq!(entry.name(), &item.name);
                prop_assert_eq!(entry.index(), item.index);
            }
        }
    }
}
