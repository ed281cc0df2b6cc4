//! In-memory node-type registry.
//!
//! This is the reference implementation of `DefinitionResolver`. It holds
//! node type definitions in a map behind an `RwLock` and computes effective
//! types on demand (no effective-type cache).

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use crate::model::{Name, PropertyType};
use super::{DefinitionError, DefinitionResolver, EffectiveType, NodeDefinition, NodeTypeDef, PropertyDefinition};

/// Names of the built-in node types.
pub mod names {
    pub const NT_BASE: &str = "nt:base";
    pub const NT_UNSTRUCTURED: &str = "nt:unstructured";
    pub const NT_HIERARCHY_NODE: &str = "nt:hierarchyNode";
    pub const NT_FOLDER: &str = "nt:folder";
    pub const NT_FILE: &str = "nt:file";
    pub const MIX_REFERENCEABLE: &str = "mix:referenceable";
    pub const REP_ROOT: &str = "rep:root";

    pub const JCR_PRIMARY_TYPE: &str = "jcr:primaryType";
    pub const JCR_MIXIN_TYPES: &str = "jcr:mixinTypes";
    pub const JCR_UUID: &str = "jcr:uuid";
    pub const JCR_CREATED: &str = "jcr:created";
    pub const JCR_CONTENT: &str = "jcr:content";
}

use names::*;

pub struct NodeTypeRegistry {
    types: RwLock<HashMap<Name, Arc<NodeTypeDef>>>,
    root: Arc<NodeDefinition>,
}

impl NodeTypeRegistry {
    /// An empty registry with the given root definition.
    pub fn new(root: NodeDefinition) -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
            root: Arc::new(root),
        }
    }

    /// A registry preloaded with `nt:base`, `nt:unstructured`,
    /// `nt:hierarchyNode`, `nt:folder`, `nt:file`, `mix:referenceable` and
    /// `rep:root`.
    pub fn with_builtins() -> Self {
        let root = NodeDefinition::residual()
            .requires(NT_BASE)
            .default_type(REP_ROOT)
            .declared_by(REP_ROOT);
        let registry = Self::new(root);

        registry.register(
            NodeTypeDef::new(NT_BASE)
                .property(PropertyDefinition::named(JCR_PRIMARY_TYPE, PropertyType::Name)
                    .mandatory().auto_created().protected())
                .property(PropertyDefinition::named(JCR_MIXIN_TYPES, PropertyType::Name)
                    .multiple().protected()),
        );
        registry.register(
            NodeTypeDef::new(NT_UNSTRUCTURED)
                .supertype(NT_BASE)
                .child_node(NodeDefinition::residual()
                    .requires(NT_BASE)
                    .default_type(NT_UNSTRUCTURED)
                    .same_name_siblings(true))
                .property(PropertyDefinition::residual(PropertyType::Undefined))
                .property(PropertyDefinition::residual(PropertyType::Undefined).multiple()),
        );
        registry.register(
            NodeTypeDef::new(NT_HIERARCHY_NODE)
                .supertype(NT_BASE)
                .property(PropertyDefinition::named(JCR_CREATED, PropertyType::Date)
                    .auto_created().protected()),
        );
        registry.register(
            NodeTypeDef::new(NT_FOLDER)
                .supertype(NT_HIERARCHY_NODE)
                .child_node(NodeDefinition::residual().requires(NT_HIERARCHY_NODE)),
        );
        registry.register(
            NodeTypeDef::new(NT_FILE)
                .supertype(NT_HIERARCHY_NODE)
                .child_node(NodeDefinition::named(JCR_CONTENT).requires(NT_BASE).mandatory()),
        );
        registry.register(
            NodeTypeDef::new(MIX_REFERENCEABLE)
                .mixin()
                .property(PropertyDefinition::named(JCR_UUID, PropertyType::String)
                    .mandatory().auto_created().protected()),
        );
        registry.register(NodeTypeDef::new(REP_ROOT).supertype(NT_UNSTRUCTURED));
        registry
    }

    /// Register (or replace) a node type.
    pub fn register(&self, def: NodeTypeDef) {
        self.types.write().insert(def.name.clone(), Arc::new(def));
    }

    pub fn get(&self, name: &Name) -> Option<Arc<NodeTypeDef>> {
        self.types.read().get(name).cloned()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.types.read().contains_key(name)
    }

    /// Names of all registered types.
    pub fn type_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// `name` followed by its supertypes, depth-first, each type once.
    fn closure(&self, name: &Name, seen: &mut HashSet<Name>, out: &mut Vec<Arc<NodeTypeDef>>) -> Result<(), DefinitionError> {
        if !seen.insert(name.clone()) {
            return Ok(());
        }
        let def = self.get(name).ok_or_else(|| DefinitionError::NoSuchNodeType(name.clone()))?;
        out.push(def.clone());
        for sup in &def.supertypes {
            self.closure(sup, seen, out)?;
        }
        Ok(())
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl DefinitionResolver for NodeTypeRegistry {
    fn root_definition(&self) -> Arc<NodeDefinition> {
        self.root.clone()
    }

    fn effective_type(&self, type_names: &[Name]) -> Result<EffectiveType, DefinitionError> {
        let mut seen = HashSet::new();
        let mut defs = Vec::new();
        for name in type_names {
            self.closure(name, &mut seen, &mut defs)?;
        }

        let mut ent = EffectiveType::new();
        for def in &defs {
            ent.merge(def)?;
        }
        Ok(ent)
    }
}

impl std::fmt::Debug for NodeTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTypeRegistry")
            .field("type_count", &self.types.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_type_includes_supertypes() {
        let reg = NodeTypeRegistry::with_builtins();
        let ent = reg.effective_type(&[Name::from(NT_FOLDER)]).unwrap();
        assert!(ent.includes(&NT_FOLDER.into()));
        assert!(ent.includes(&NT_HIERARCHY_NODE.into()));
        assert!(ent.includes(&NT_BASE.into()));
        assert!(!ent.includes(&NT_UNSTRUCTURED.into()));
    }

    #[test]
    fn test_unknown_type() {
        let reg = NodeTypeRegistry::with_builtins();
        let err = reg.effective_type(&[Name::from("app:missing")]).unwrap_err();
        assert_eq!(err, DefinitionError::NoSuchNodeType("app:missing".into()));
    }

    #[test]
    fn test_mixin_adds_named_property() {
        let reg = NodeTypeRegistry::with_builtins();
        let ent = reg
            .effective_type(&[NT_UNSTRUCTURED.into(), MIX_REFERENCEABLE.into()])
            .unwrap();
        let def = reg
            .applicable_property_definition(&ent, &JCR_UUID.into(), PropertyType::String, false)
            .unwrap();
        assert_eq!(def.declaring_type, Name::from(MIX_REFERENCEABLE));
    }

    #[test]
    fn test_folder_rejects_unstructured_child() {
        let reg = NodeTypeRegistry::with_builtins();
        let ent = reg.effective_type(&[NT_FOLDER.into()]).unwrap();
        let err = reg
            .applicable_node_definition(&ent, &"x".into(), &NT_UNSTRUCTURED.into())
            .unwrap_err();
        assert!(matches!(err, DefinitionError::ConstraintViolation(_)));

        let ok = reg
            .applicable_node_definition(&ent, &"sub".into(), &NT_FOLDER.into())
            .unwrap();
        assert!(ok.is_residual());
    }

    #[test]
    fn test_root_definition() {
        let reg = NodeTypeRegistry::with_builtins();
        let root = reg.root_definition();
        assert_eq!(root.declaring_type, Name::from(REP_ROOT));
        assert_eq!(root.default_primary_type, Some(Name::from(REP_ROOT)));
    }
}
