//! # Definition Resolver
//!
//! The contract between the item-state factory and the node-type system.
//! The factory never interprets node types itself: it asks a
//! `DefinitionResolver` for the effective type of a parent and for the
//! definition that applies to a child node or property.
//!
//! ## Implementations
//!
//! | Resolver | Module | Description |
//! |----------|--------|-------------|
//! | `NodeTypeRegistry` | `registry` | In-memory registry with built-in types |

pub mod definition;
pub mod effective;
pub mod registry;

use std::sync::Arc;

use crate::model::{Name, PropertyType};

pub use definition::{NodeDefinition, PropertyDefinition, NodeTypeDef};
pub use effective::EffectiveType;
pub use registry::NodeTypeRegistry;

/// Failure to supply a definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("node type conflict: {0}")]
    Conflict(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("no such node type: {0}")]
    NoSuchNodeType(Name),
}

/// Node-type lookups needed while materializing item states.
pub trait DefinitionResolver: Send + Sync {
    /// The fixed definition of the root node.
    fn root_definition(&self) -> Arc<NodeDefinition>;

    /// Merge the given primary/mixin type names (and their supertypes).
    fn effective_type(&self, type_names: &[Name]) -> Result<EffectiveType, DefinitionError>;

    /// Definition for a child node `name` of primary type `primary_type`
    /// below a parent with effective type `parent`.
    ///
    /// Default: expand `primary_type` through `effective_type` and match its
    /// supertype closure against the parent's child definitions.
    fn applicable_node_definition(
        &self,
        parent: &EffectiveType,
        name: &Name,
        primary_type: &Name,
    ) -> Result<Arc<NodeDefinition>, DefinitionError> {
        let child = self.effective_type(std::slice::from_ref(primary_type))?;
        parent.applicable_child_node_definition(name, &child)
    }

    /// Definition for a property `name` with the given value shape.
    fn applicable_property_definition(
        &self,
        parent: &EffectiveType,
        name: &Name,
        value_type: PropertyType,
        multi_valued: bool,
    ) -> Result<Arc<PropertyDefinition>, DefinitionError> {
        parent.applicable_property_definition(name, value_type, multi_valued)
    }
}
