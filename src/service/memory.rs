//! In-memory descriptor source.
//!
//! This is the reference implementation of `DescriptorSource`.
//! It keeps a repository tree in HashMaps protected by RwLock and hands out
//! cloned descriptors.
//!
//! ## Limitations
//!
//! - **No workspaces or access control**: the `SessionInfo` is ignored.
//! - **No sibling reindexing**: removing a same-name sibling leaves the
//!   indexes (and path ids) of later siblings unchanged.
//! - **Writes are not transactional**: each builder call is applied
//!   immediately.
//!
//! Use this source for:
//! - Testing the factory, reference view, and cache without a transport
//! - Embedding repository snapshots loaded from JSON
//! - Fault injection (`set_available(false)`) and fetch counting

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::SessionInfo;
use crate::model::*;
use crate::nodetype::registry::names::{JCR_MIXIN_TYPES, JCR_PRIMARY_TYPE, JCR_UUID, MIX_REFERENCEABLE, REP_ROOT};
use super::{ChildInfos, DescriptorSource, SourceError, SourceResult};

// ============================================================================
// Snapshot format
// ============================================================================

/// Serializable content of a `MemoryService`.
///
/// `nodes` lists every non-root node after its parent; child listings are
/// rebuilt in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub root: NodeDescriptor,
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

// ============================================================================
// MemoryService
// ============================================================================

/// In-memory repository service.
#[derive(Clone)]
pub struct MemoryService {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    root_id: NodeId,
    nodes: RwLock<HashMap<NodeId, NodeDescriptor>>,
    properties: RwLock<HashMap<PropertyId, PropertyDescriptor>>,
    /// node id → child listing in insertion order
    children: RwLock<HashMap<NodeId, Vec<ChildDescriptor>>>,
    available: AtomicBool,
    node_fetches: AtomicU64,
    property_fetches: AtomicU64,
    child_listings: AtomicU64,
}

impl MemoryService {
    /// A repository holding only a `rep:root` root node at `/`.
    pub fn new() -> Self {
        Self::with_root_type(REP_ROOT)
    }

    /// A repository whose root node has the given primary type.
    pub fn with_root_type(primary_type: impl Into<Name>) -> Self {
        let root = NodeDescriptor::new(NodeId::root(), "", primary_type);
        let service = Self::from_root(root);
        let root_id = service.root_id();
        let primary = service.inner.nodes.read()[&root_id].primary_type.clone();
        service.store_property(&root_id, JCR_PRIMARY_TYPE, PropertyType::Name, vec![Value::Name(primary)], false);
        service
    }

    fn from_root(root: NodeDescriptor) -> Self {
        let root_id = root.id.clone();
        let mut nodes = HashMap::new();
        let mut children = HashMap::new();
        children.insert(root_id.clone(), Vec::new());
        nodes.insert(root_id.clone(), root);
        Self {
            inner: Arc::new(MemoryInner {
                root_id,
                nodes: RwLock::new(nodes),
                properties: RwLock::new(HashMap::new()),
                children: RwLock::new(children),
                available: AtomicBool::new(true),
                node_fetches: AtomicU64::new(0),
                property_fetches: AtomicU64::new(0),
                child_listings: AtomicU64::new(0),
            }),
        }
    }

    /// Rebuild a repository from a snapshot.
    pub fn from_snapshot(snapshot: RepositorySnapshot) -> SourceResult<Self> {
        if snapshot.root.parent_id.is_some() {
            return Err(SourceError::Malformed("snapshot root has a parent".into()));
        }
        let service = Self::from_root(snapshot.root);
        {
            let mut nodes = service.inner.nodes.write();
            let mut children = service.inner.children.write();
            for node in snapshot.nodes {
                let parent = node.parent_id.clone().ok_or_else(|| {
                    SourceError::Malformed(format!("node {} has no parent", node.id))
                })?;
                let listing = children.get_mut(&parent).ok_or_else(|| {
                    SourceError::Malformed(format!("parent {parent} of {} not declared before it", node.id))
                })?;
                let unique_id = if node.id.is_unique_id_addressed() {
                    node.id.unique_id().map(str::to_owned)
                } else {
                    None
                };
                listing.push(ChildDescriptor::new(node.name.clone(), unique_id, node.index));
                children.insert(node.id.clone(), Vec::new());
                nodes.insert(node.id.clone(), node);
            }
        }
        {
            let mut props = service.inner.properties.write();
            for prop in snapshot.properties {
                props.insert(prop.id.clone(), prop);
            }
        }
        Ok(service)
    }

    /// Parse a JSON `RepositorySnapshot`.
    pub fn from_json(json: &str) -> SourceResult<Self> {
        let snapshot: RepositorySnapshot = serde_json::from_str(json)
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    /// Export the current content.
    pub fn snapshot(&self) -> RepositorySnapshot {
        let nodes = self.inner.nodes.read();
        let children = self.inner.children.read();
        let mut ordered = Vec::new();
        // Breadth-first from the root so parents precede their children.
        let mut queue = vec![self.inner.root_id.clone()];
        while let Some(id) = queue.pop() {
            for child in children.get(&id).into_iter().flatten() {
                let child_id = child_id(&id, child);
                if let Some(desc) = nodes.get(&child_id) {
                    ordered.push(desc.clone());
                    queue.insert(0, child_id);
                }
            }
        }
        RepositorySnapshot {
            root: nodes[&self.inner.root_id].clone(),
            nodes: ordered,
            properties: self.inner.properties.read().values().cloned().collect(),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.inner.root_id.clone()
    }

    // ========================================================================
    // Builder operations
    // ========================================================================

    /// Add a path-addressed child node. Returns its id.
    pub fn add_node(
        &self,
        parent: &NodeId,
        name: impl Into<Name>,
        primary_type: impl Into<Name>,
    ) -> SourceResult<NodeId> {
        self.add_node_with_id(parent, name.into(), primary_type.into(), None)
    }

    /// Add a `mix:referenceable` child node addressed by `unique_id`.
    pub fn add_referenceable_node(
        &self,
        parent: &NodeId,
        name: impl Into<Name>,
        primary_type: impl Into<Name>,
        unique_id: &str,
    ) -> SourceResult<NodeId> {
        let id = self.add_node_with_id(parent, name.into(), primary_type.into(), Some(unique_id))?;
        self.add_mixin(&id, MIX_REFERENCEABLE)?;
        self.store_property(&id, JCR_UUID, PropertyType::String, vec![Value::from(unique_id)], false);
        Ok(id)
    }

    fn add_node_with_id(
        &self,
        parent: &NodeId,
        name: Name,
        primary_type: Name,
        unique_id: Option<&str>,
    ) -> SourceResult<NodeId> {
        let id = {
            let mut nodes = self.inner.nodes.write();
            let mut children = self.inner.children.write();
            if !nodes.contains_key(parent) {
                return Err(SourceError::NotFound(format!("parent node {parent}")));
            }
            let index = children
                .get(parent)
                .map_or(0, |listing| listing.iter().filter(|c| c.name == name).count()) as u32
                + 1;
            let child = ChildDescriptor::new(name.clone(), unique_id.map(str::to_owned), index);
            let id = child_id(parent, &child);
            if nodes.contains_key(&id) {
                return Err(SourceError::Malformed(format!("node {id} already exists")));
            }
            children.entry(parent.clone()).or_default().push(child);
            children.insert(id.clone(), Vec::new());

            let mut desc = NodeDescriptor::new(id.clone(), name, primary_type.clone());
            desc.index = index;
            desc.parent_id = Some(parent.clone());
            nodes.insert(id.clone(), desc);
            id
        };
        self.store_property(&id, JCR_PRIMARY_TYPE, PropertyType::Name, vec![Value::Name(primary_type)], false);
        Ok(id)
    }

    /// Add a mixin type to a node (and update `jcr:mixinTypes`).
    pub fn add_mixin(&self, id: &NodeId, mixin: impl Into<Name>) -> SourceResult<()> {
        let mixins = {
            let mut nodes = self.inner.nodes.write();
            let node = nodes.get_mut(id).ok_or_else(|| SourceError::NotFound(format!("node {id}")))?;
            let mixin = mixin.into();
            if !node.mixins.contains(&mixin) {
                node.mixins.push(mixin);
            }
            node.mixins.clone()
        };
        let values = mixins.into_iter().map(Value::Name).collect();
        self.store_property(id, JCR_MIXIN_TYPES, PropertyType::Name, values, true);
        Ok(())
    }

    /// Set a single-valued property.
    pub fn set_property(&self, node: &NodeId, name: impl Into<Name>, value: impl Into<Value>) -> SourceResult<PropertyId> {
        let value = value.into();
        let ty = value.property_type();
        self.set_property_values(node, name, ty, vec![value], false)
    }

    /// Set a property with explicit type and cardinality. Reference values
    /// are registered with their target nodes; the targets must exist.
    pub fn set_property_values(
        &self,
        node: &NodeId,
        name: impl Into<Name>,
        property_type: PropertyType,
        values: Vec<Value>,
        multi_valued: bool,
    ) -> SourceResult<PropertyId> {
        if !self.inner.nodes.read().contains_key(node) {
            return Err(SourceError::NotFound(format!("node {node}")));
        }
        if let Some(bad) = values.iter().find(|v| v.property_type() != property_type) {
            return Err(SourceError::Malformed(format!(
                "value {bad} is not of type {property_type}"
            )));
        }
        let targets: Vec<NodeId> = values
            .iter()
            .filter_map(Value::as_reference)
            .map(NodeId::from_unique_id)
            .collect();
        {
            let nodes = self.inner.nodes.read();
            if let Some(missing) = targets.iter().find(|t| !nodes.contains_key(*t)) {
                return Err(SourceError::NotFound(format!("reference target {missing}")));
            }
        }
        Ok(self.store_property(node, name, property_type, values, multi_valued))
    }

    /// Store a property descriptor verbatim, without any validation. Lets
    /// tests feed the factory inconsistent data.
    pub fn put_raw_property(&self, desc: PropertyDescriptor) -> SourceResult<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes
            .get_mut(&desc.id.parent)
            .ok_or_else(|| SourceError::NotFound(format!("node {}", desc.id.parent)))?;
        if !node.property_ids.contains(&desc.id) {
            node.property_ids.push(desc.id.clone());
        }
        drop(nodes);
        self.inner.properties.write().insert(desc.id.clone(), desc);
        Ok(())
    }

    fn store_property(
        &self,
        node: &NodeId,
        name: impl Into<Name>,
        property_type: PropertyType,
        values: Vec<Value>,
        multi_valued: bool,
    ) -> PropertyId {
        let id = node.property(name);
        let previous = self.inner.properties.write().insert(
            id.clone(),
            PropertyDescriptor { id: id.clone(), property_type, multi_valued, values: values.clone() },
        );

        let mut nodes = self.inner.nodes.write();
        if let Some(desc) = nodes.get_mut(node) {
            if !desc.property_ids.contains(&id) {
                desc.property_ids.push(id.clone());
            }
        }
        // Drop back-references of the replaced value set, then add one entry
        // per reference value (duplicates included).
        if let Some(prev) = previous {
            for uid in prev.values.iter().filter_map(Value::as_reference) {
                if let Some(target) = nodes.get_mut(&NodeId::from_unique_id(uid)) {
                    target.references.retain(|r| *r != id);
                }
            }
        }
        for uid in values.iter().filter_map(Value::as_reference) {
            if let Some(target) = nodes.get_mut(&NodeId::from_unique_id(uid)) {
                target.references.push(id.clone());
            }
        }
        id
    }

    /// Remove a node, its properties, and its whole subtree. References held
    /// by the removed properties are dropped from their targets.
    pub fn remove_node(&self, id: &NodeId) -> SourceResult<()> {
        if *id == self.inner.root_id {
            return Err(SourceError::Malformed("cannot remove the root node".into()));
        }
        let parent = self
            .inner
            .nodes
            .read()
            .get(id)
            .and_then(|n| n.parent_id.clone())
            .ok_or_else(|| SourceError::NotFound(format!("node {id}")))?;

        let mut nodes = self.inner.nodes.write();
        let mut children = self.inner.children.write();
        let mut props = self.inner.properties.write();

        if let Some(listing) = children.get_mut(&parent) {
            listing.retain(|c| child_id(&parent, c) != *id);
        }
        let mut pending = vec![id.clone()];
        while let Some(next) = pending.pop() {
            if let Some(listing) = children.remove(&next) {
                pending.extend(listing.iter().map(|c| child_id(&next, c)));
            }
            let Some(desc) = nodes.remove(&next) else { continue };
            for pid in &desc.property_ids {
                let Some(prop) = props.remove(pid) else { continue };
                for uid in prop.values.iter().filter_map(Value::as_reference) {
                    if let Some(target) = nodes.get_mut(&NodeId::from_unique_id(uid)) {
                        target.references.retain(|r| r != pid);
                    }
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Fault injection and counters
    // ========================================================================

    /// Make every subsequent call fail with `SourceError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Number of `node_descriptor` calls attempted so far.
    pub fn node_fetches(&self) -> u64 {
        self.inner.node_fetches.load(Ordering::SeqCst)
    }

    pub fn property_fetches(&self) -> u64 {
        self.inner.property_fetches.load(Ordering::SeqCst)
    }

    pub fn child_listings(&self) -> u64 {
        self.inner.child_listings.load(Ordering::SeqCst)
    }

    pub fn node_count(&self) -> usize {
        self.inner.nodes.read().len()
    }

    fn check_available(&self) -> SourceResult<()> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SourceError::Unavailable("memory service switched off".into()))
        }
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryService")
            .field("node_count", &self.node_count())
            .field("available", &self.inner.available.load(Ordering::SeqCst))
            .finish()
    }
}

/// Id of a listed child: its unique id if it has one, otherwise a path below
/// the parent.
fn child_id(parent: &NodeId, child: &ChildDescriptor) -> NodeId {
    match &child.unique_id {
        Some(uid) => NodeId::from_unique_id(uid.as_str()),
        None => parent.child(child.name.clone(), child.index),
    }
}

// ============================================================================
// DescriptorSource impl
// ============================================================================

#[async_trait]
impl DescriptorSource for MemoryService {
    async fn root_id(&self, _session: &SessionInfo) -> SourceResult<NodeId> {
        self.check_available()?;
        Ok(self.inner.root_id.clone())
    }

    async fn node_descriptor(&self, _session: &SessionInfo, id: &NodeId) -> SourceResult<NodeDescriptor> {
        self.inner.node_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.inner
            .nodes
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("node {id}")))
    }

    async fn property_descriptor(
        &self,
        _session: &SessionInfo,
        id: &PropertyId,
    ) -> SourceResult<PropertyDescriptor> {
        self.inner.property_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.inner
            .properties
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("property {id}")))
    }

    async fn list_children(&self, _session: &SessionInfo, id: &NodeId) -> SourceResult<ChildInfos> {
        self.inner.child_listings.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let listing = self
            .inner
            .children
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("node {id}")))?;
        Ok(Box::new(listing.into_iter()))
    }
}

// ============================================================================
// Tests
// ============================================================================
