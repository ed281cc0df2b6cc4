//! Effective node type: the merged definitions of a primary type, its mixins,
//! and all their supertypes.

use std::sync::Arc;

use crate::model::{Name, PropertyType};
use super::{DefinitionError, NodeDefinition, NodeTypeDef, PropertyDefinition};

/// Merged capability set of a node.
#[derive(Debug, Clone, Default)]
pub struct EffectiveType {
    /// Every type merged in, supertypes included, in merge order.
    names: Vec<Name>,
    child_defs: Vec<Arc<NodeDefinition>>,
    property_defs: Vec<Arc<PropertyDefinition>>,
}

impl EffectiveType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one node type into the set. Merging the same type twice is a
    /// no-op. Two different types declaring the same named child node, or
    /// the same named property with an indistinguishable type/cardinality,
    /// is a conflict.
    pub fn merge(&mut self, ty: &NodeTypeDef) -> Result<(), DefinitionError> {
        if self.includes(&ty.name) {
            return Ok(());
        }

        for def in &ty.child_node_defs {
            if let Some(name) = &def.name {
                let clash = self.child_defs.iter().find(|d| {
                    d.name.as_ref() == Some(name) && d.declaring_type != def.declaring_type
                });
                if let Some(existing) = clash {
                    return Err(DefinitionError::Conflict(format!(
                        "child node '{name}' is declared by both {} and {}",
                        existing.declaring_type, def.declaring_type
                    )));
                }
            }
        }

        for def in &ty.property_defs {
            if let Some(name) = &def.name {
                let clash = self.property_defs.iter().find(|d| {
                    d.name.as_ref() == Some(name)
                        && d.declaring_type != def.declaring_type
                        && d.multiple == def.multiple
                        && (d.required_type == def.required_type
                            || d.required_type == PropertyType::Undefined
                            || def.required_type == PropertyType::Undefined)
                });
                if let Some(existing) = clash {
                    return Err(DefinitionError::Conflict(format!(
                        "property '{name}' is ambiguously declared by both {} and {}",
                        existing.declaring_type, def.declaring_type
                    )));
                }
            }
        }

        self.names.push(ty.name.clone());
        self.child_defs.extend(ty.child_node_defs.iter().cloned().map(Arc::new));
        self.property_defs.extend(ty.property_defs.iter().cloned().map(Arc::new));
        Ok(())
    }

    /// Whether `node_type` is part of this effective type (directly or as a
    /// supertype).
    pub fn includes(&self, node_type: &Name) -> bool {
        self.names.iter().any(|n| n == node_type)
    }

    pub fn type_names(&self) -> &[Name] {
        &self.names
    }

    pub fn child_node_definitions(&self) -> &[Arc<NodeDefinition>] {
        &self.child_defs
    }

    pub fn property_definitions(&self) -> &[Arc<PropertyDefinition>] {
        &self.property_defs
    }

    /// Pick the definition for a child called `name` whose primary type
    /// expands to `child_type`. Named definitions win over residual ones.
    pub fn applicable_child_node_definition(
        &self,
        name: &Name,
        child_type: &EffectiveType,
    ) -> Result<Arc<NodeDefinition>, DefinitionError> {
        let satisfied = |d: &&Arc<NodeDefinition>| {
            d.required_primary_types.iter().all(|r| child_type.includes(r))
        };
        self.child_defs
            .iter()
            .filter(|d| d.name.as_ref() == Some(name))
            .find(satisfied)
            .or_else(|| self.child_defs.iter().filter(|d| d.is_residual()).find(satisfied))
            .cloned()
            .ok_or_else(|| {
                DefinitionError::ConstraintViolation(format!(
                    "no matching child node definition found for '{name}'"
                ))
            })
    }

    /// Pick the definition for a property called `name` holding values of
    /// `value_type`. Named definitions win over residual ones.
    pub fn applicable_property_definition(
        &self,
        name: &Name,
        value_type: PropertyType,
        multi_valued: bool,
    ) -> Result<Arc<PropertyDefinition>, DefinitionError> {
        let fits = |d: &&Arc<PropertyDefinition>| d.accepts(value_type, multi_valued);
        self.property_defs
            .iter()
            .filter(|d| d.name.as_ref() == Some(name))
            .find(fits)
            .or_else(|| self.property_defs.iter().filter(|d| d.is_residual()).find(fits))
            .cloned()
            .ok_or_else(|| {
                DefinitionError::ConstraintViolation(format!(
                    "no matching property definition found for '{name}' ({value_type}, multiple: {multi_valued})"
                ))
            })
    }
}
