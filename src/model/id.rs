//! Item identifiers.
//!
//! A node is addressed either by a stable, repository-assigned unique id, by
//! an absolute path, or by a path relative to a node with a unique id. A
//! property is addressed by its parent node id plus its name.

use std::fmt;

use serde::{Deserialize, Serialize};
use super::{Name, Path};

/// Opaque node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    unique_id: Option<String>,
    path: Option<Path>,
}

impl NodeId {
    /// A node addressed purely by its unique id.
    pub fn from_unique_id(unique_id: impl Into<String>) -> Self {
        Self { unique_id: Some(unique_id.into()), path: None }
    }

    /// A node addressed by an absolute path.
    pub fn from_path(path: Path) -> Self {
        Self { unique_id: None, path: Some(path) }
    }

    /// A node addressed by `path` relative to the node with `unique_id`.
    pub fn relative_to(unique_id: impl Into<String>, path: Path) -> Self {
        Self { unique_id: Some(unique_id.into()), path: Some(path) }
    }

    /// The root node `/`.
    pub fn root() -> Self {
        Self::from_path(Path::root())
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    /// True when the id carries no path component, i.e. it names the node by
    /// its stable unique id alone.
    pub fn is_unique_id_addressed(&self) -> bool {
        self.path.is_none() && self.unique_id.is_some()
    }

    /// The id of the `index`-th child called `name` below this node.
    pub fn child(&self, name: impl Into<Name>, index: u32) -> NodeId {
        let path = match &self.path {
            Some(p) => p.child(name, index),
            None => Path::relative().child(name, index),
        };
        Self { unique_id: self.unique_id.clone(), path: Some(path) }
    }

    /// The id of the property `name` on this node.
    pub fn property(&self, name: impl Into<Name>) -> PropertyId {
        PropertyId::new(self.clone(), name)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uid) = &self.unique_id {
            write!(f, "[{uid}]")?;
        }
        match &self.path {
            // `[uid]/a/b` for a path relative to the unique id.
            Some(path) if self.unique_id.is_some() && !path.is_absolute() && !path.elements().is_empty() => {
                write!(f, "/{path}")
            }
            Some(path) => write!(f, "{path}"),
            None => Ok(()),
        }
    }
}

/// Property identifier: parent node plus property name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId {
    pub parent: NodeId,
    pub name: Name,
}

impl PropertyId {
    pub fn new(parent: NodeId, name: impl Into<Name>) -> Self {
        Self { parent, name: name.into() }
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent.path() {
            Some(p) if p.is_root() => write!(f, "{}{}", self.parent, self.name),
            _ => write!(f, "{}/{}", self.parent, self.name),
        }
    }
}

/// Either kind of item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemId {
    Node(NodeId),
    Property(PropertyId),
}

impl ItemId {
    pub fn is_node(&self) -> bool {
        matches!(self, ItemId::Node(_))
    }
}

impl From<NodeId> for ItemId {
    fn from(v: NodeId) -> Self { ItemId::Node(v) }
}

impl From<PropertyId> for ItemId {
    fn from(v: PropertyId) -> Self { ItemId::Property(v) }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Node(id) => write!(f, "{id}"),
            ItemId::Property(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_id_addressing() {
        let id = NodeId::from_unique_id("a1");
        assert!(id.is_unique_id_addressed());
        assert_eq!(id.to_string(), "[a1]");

        let child = id.child("doc", 1);
        assert!(!child.is_unique_id_addressed());
        assert_eq!(child.unique_id(), Some("a1"));
        assert_eq!(child.to_string(), "[a1]/doc");
        assert_eq!(child.child("page", 2).to_string(), "[a1]/doc/page[2]");
    }

    #[test]
    fn test_display_separators_agree() {
        let anchor = NodeId::from_unique_id("a1");
        assert_eq!(anchor.property("title").to_string(), "[a1]/title");
        assert_eq!(anchor.child("doc", 1).property("title").to_string(), "[a1]/doc/title");
    }

    #[test]
    fn test_path_addressing() {
        let id = NodeId::root().child("content", 1).child("page", 2);
        assert!(!id.is_unique_id_addressed());
        assert_eq!(id.to_string(), "/content/page[2]");
        assert_eq!(id.property("title").to_string(), "/content/page[2]/title");
        assert_eq!(NodeId::root().property("x").to_string(), "/x");
    }

    #[test]
    fn test_item_id_from() {
        let node: ItemId = NodeId::root().into();
        assert!(node.is_node());
        let prop: ItemId = NodeId::root().property("p").into();
        assert!(!prop.is_node());
    }
}
