//! Node types and the item definitions they declare.

use serde::{Deserialize, Serialize};

use crate::model::{Name, PropertyType};

/// Rule a child node must satisfy. `name == None` marks a residual (`*`)
/// definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub declaring_type: Name,
    pub name: Option<Name>,
    pub required_primary_types: Vec<Name>,
    pub default_primary_type: Option<Name>,
    pub allows_same_name_siblings: bool,
    pub mandatory: bool,
    pub auto_created: bool,
    pub protected: bool,
}

impl NodeDefinition {
    pub fn named(name: impl Into<Name>) -> Self {
        Self::with_name(Some(name.into()))
    }

    pub fn residual() -> Self {
        Self::with_name(None)
    }

    fn with_name(name: Option<Name>) -> Self {
        Self {
            declaring_type: Name::from(""),
            name,
            required_primary_types: Vec::new(),
            default_primary_type: None,
            allows_same_name_siblings: false,
            mandatory: false,
            auto_created: false,
            protected: false,
        }
    }

    pub fn requires(mut self, node_type: impl Into<Name>) -> Self {
        self.required_primary_types.push(node_type.into());
        self
    }

    pub fn default_type(mut self, node_type: impl Into<Name>) -> Self {
        self.default_primary_type = Some(node_type.into());
        self
    }

    pub fn same_name_siblings(mut self, allowed: bool) -> Self {
        self.allows_same_name_siblings = allowed;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn declared_by(mut self, node_type: impl Into<Name>) -> Self {
        self.declaring_type = node_type.into();
        self
    }

    pub fn is_residual(&self) -> bool {
        self.name.is_none()
    }
}

/// Rule a property must satisfy. `required_type == Undefined` accepts any
/// value type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub declaring_type: Name,
    pub name: Option<Name>,
    pub required_type: PropertyType,
    pub multiple: bool,
    pub mandatory: bool,
    pub auto_created: bool,
    pub protected: bool,
}

impl PropertyDefinition {
    pub fn named(name: impl Into<Name>, required_type: PropertyType) -> Self {
        Self::with_name(Some(name.into()), required_type)
    }

    pub fn residual(required_type: PropertyType) -> Self {
        Self::with_name(None, required_type)
    }

    fn with_name(name: Option<Name>, required_type: PropertyType) -> Self {
        Self {
            declaring_type: Name::from(""),
            name,
            required_type,
            multiple: false,
            mandatory: false,
            auto_created: false,
            protected: false,
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn auto_created(mut self) -> Self {
        self.auto_created = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn is_residual(&self) -> bool {
        self.name.is_none()
    }

    /// Whether a value of `value_type` with the given cardinality fits.
    pub fn accepts(&self, value_type: PropertyType, multi_valued: bool) -> bool {
        self.multiple == multi_valued
            && (self.required_type == PropertyType::Undefined || self.required_type == value_type)
    }
}

/// A node type: supertypes plus the child-node and property definitions it
/// declares itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeDef {
    pub name: Name,
    #[serde(default)]
    pub supertypes: Vec<Name>,
    #[serde(default)]
    pub mixin: bool,
    #[serde(default)]
    pub child_node_defs: Vec<NodeDefinition>,
    #[serde(default)]
    pub property_defs: Vec<PropertyDefinition>,
}

impl NodeTypeDef {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            mixin: false,
            child_node_defs: Vec::new(),
            property_defs: Vec::new(),
        }
    }

    pub fn mixin(mut self) -> Self {
        self.mixin = true;
        self
    }

    pub fn supertype(mut self, name: impl Into<Name>) -> Self {
        self.supertypes.push(name.into());
        self
    }

    /// Declare a child node definition; the declaring type is set to `self`.
    pub fn child_node(mut self, def: NodeDefinition) -> Self {
        self.child_node_defs.push(def.declared_by(self.name.clone()));
        self
    }

    /// Declare a property definition; the declaring type is set to `self`.
    pub fn property(mut self, mut def: PropertyDefinition) -> Self {
        def.declaring_type = self.name.clone();
        self.property_defs.push(def);
        self
    }
}
