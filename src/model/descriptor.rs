//! Server-supplied snapshots of nodes, properties, and child listings.
//!
//! Descriptors are plain data: they are produced by a `DescriptorSource` and
//! consumed once by the factory. Nothing here talks to the service.

use serde::{Deserialize, Serialize};
use super::{Name, NodeId, PropertyId, PropertyType, Value};
use super::path::DEFAULT_INDEX;

/// Snapshot of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Canonical id of the node as reported by the service.
    pub id: NodeId,
    pub name: Name,
    /// Same-name-sibling index within the parent (1-based).
    #[serde(default = "default_index")]
    pub index: u32,
    pub primary_type: Name,
    #[serde(default)]
    pub mixins: Vec<Name>,
    /// `None` only for the root node.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub property_ids: Vec<PropertyId>,
    /// Reference properties pointing at this node. May contain duplicates
    /// when a multi-valued property references the node more than once.
    #[serde(default)]
    pub references: Vec<PropertyId>,
}

fn default_index() -> u32 {
    DEFAULT_INDEX
}

impl NodeDescriptor {
    pub fn new(id: NodeId, name: impl Into<Name>, primary_type: impl Into<Name>) -> Self {
        Self {
            id,
            name: name.into(),
            index: DEFAULT_INDEX,
            primary_type: primary_type.into(),
            mixins: Vec::new(),
            parent_id: None,
            property_ids: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Snapshot of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub id: PropertyId,
    pub property_type: PropertyType,
    pub multi_valued: bool,
    pub values: Vec<Value>,
}

impl PropertyDescriptor {
    pub fn name(&self) -> &Name {
        &self.id.name
    }
}

/// One entry of a child listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDescriptor {
    pub name: Name,
    pub unique_id: Option<String>,
    pub index: u32,
}

impl ChildDescriptor {
    pub fn new(name: impl Into<Name>, unique_id: Option<String>, index: u32) -> Self {
        Self { name: name.into(), unique_id, index }
    }
}

/// Either kind of item descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Descriptor {
    Node(NodeDescriptor),
    Property(PropertyDescriptor),
}
