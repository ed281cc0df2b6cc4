//! # itemstate-rs: Client-side Item State Materialization
//!
//! Turns repository descriptors (nodes, properties, child listings,
//! back-references) fetched from a remote content-repository service into
//! in-memory item states, with one shared instance per item per session.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `DescriptorSource` is the contract between the factory and the service
//! 2. **Plain descriptors**: `NodeDescriptor`, `PropertyDescriptor`, `ChildDescriptor` cross the boundary
//! 3. **Identity through the cache**: states are published by atomic insert-if-absent
//! 4. **Lazy and uncached back-references**: every reference query asks the service
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use itemstate::{MemoryService, Name, Value, Workspace};
//!
//! # async fn example() -> itemstate::Result<()> {
//! let service = MemoryService::new();
//! let root_id = service.root_id();
//! let docs = service.add_node(&root_id, "docs", "nt:unstructured")?;
//! service.set_property(&docs, "title", Value::from("Handbook"))?;
//!
//! let workspace = Workspace::open_memory(service);
//! let node = workspace.node(&docs).await?;
//! let title = workspace.property(&docs.property("title")).await?;
//!
//! assert_eq!(node.name(), &Name::from("docs"));
//! assert_eq!(title.value(), Some(Value::from("Handbook")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Descriptor Sources
//!
//! | Source | Description |
//! |--------|-------------|
//! | `MemoryService` | In-memory repository for testing/embedding |
//! | custom | Anything implementing `DescriptorSource` (RPC, HTTP, ...) |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod nodetype;
pub mod service;
pub mod state;
pub mod cache;
pub mod factory;
pub mod config;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

// ============================================================================
// Re-exports: Model (the descriptors)
// ============================================================================

pub use model::{
    Name, Path, NodeId, PropertyId, ItemId, Value, PropertyType,
    NodeDescriptor, PropertyDescriptor, ChildDescriptor, Descriptor,
};

// ============================================================================
// Re-exports: Node types
// ============================================================================

pub use nodetype::{
    DefinitionError, DefinitionResolver, EffectiveType,
    NodeDefinition, PropertyDefinition, NodeTypeDef, NodeTypeRegistry,
};

// ============================================================================
// Re-exports: Service, state, cache, factory
// ============================================================================

pub use service::{DescriptorSource, SourceError, MemoryService};
pub use state::{
    ItemState, ItemStateListener, NodeState, PropertyState, Placement, Status,
    ChildNodeEntries, ChildNodeEntry, NodeReferences, References,
};
pub use cache::{ItemStateCache, SessionCache};
pub use factory::{ItemStateFactory, ItemStateManager};
pub use config::{FactoryConfig, ReferenceFailurePolicy, SessionInfo};

// ============================================================================
// Top-level Workspace handle
// ============================================================================

/// The primary entry point. A `Workspace` is one session's view of a
/// repository: a descriptor source, a node type resolver, and the identity
/// cache every state of the session is published to.
pub struct Workspace {
    factory: ItemStateFactory,
    cache: Arc<SessionCache>,
    root_id: RwLock<Option<NodeId>>,
}

impl Workspace {
    /// Open a workspace over an arbitrary source and resolver.
    pub fn open(
        source: Arc<dyn DescriptorSource>,
        resolver: Arc<dyn DefinitionResolver>,
        session: SessionInfo,
        config: FactoryConfig,
    ) -> Self {
        info!(user = %session.user_id, workspace = %session.workspace, "opening workspace");
        let cache = Arc::new(SessionCache::new());
        let factory = ItemStateFactory::new(source, resolver, cache.clone(), session, config);
        Self { factory, cache, root_id: RwLock::new(None) }
    }

    /// In-memory workspace with the built-in node types and default settings.
    pub fn open_memory(service: MemoryService) -> Self {
        Self::open(
            Arc::new(service),
            Arc::new(NodeTypeRegistry::with_builtins()),
            SessionInfo::default(),
            FactoryConfig::default(),
        )
    }

    /// The root node state.
    pub async fn root(&self) -> Result<Arc<NodeState>> {
        let known = self.root_id.read().clone();
        if let Some(root) = known.and_then(|id| self.cache.node(&id)) {
            return Ok(root);
        }
        let root = self.factory.create_root_state().await?;
        *self.root_id.write() = Some(root.id().clone());
        Ok(root)
    }

    pub async fn node(&self, id: &NodeId) -> Result<Arc<NodeState>> {
        self.node_state(id).await
    }

    pub async fn property(&self, id: &PropertyId) -> Result<Arc<PropertyState>> {
        self.property_state(id).await
    }

    /// Resolve whichever item `id` denotes, asking the service only once.
    pub async fn item(&self, id: &ItemId) -> Result<ItemState> {
        if let Some(state) = self.cache.get(id) {
            return Ok(state);
        }
        self.factory.resolve_item_state(id, self).await
    }

    /// Child table of `node`, fetched on first access.
    pub async fn children(&self, node: &Arc<NodeState>) -> Result<Arc<ChildNodeEntries>> {
        self.child_entries(node).await
    }

    /// Resolve the child of `node` called `name` with sibling index `index`.
    pub async fn child(&self, node: &Arc<NodeState>, name: &Name, index: u32) -> Result<Arc<NodeState>> {
        let entries = self.child_entries(node).await?;
        let entry = entries
            .get(name, index)
            .ok_or_else(|| Error::NotFound(format!("{}[{index}] under {}", name, node.id())))?;
        if let Some(state) = entry.cached_state().filter(|s| s.status().is_valid()) {
            return Ok(state);
        }
        if let Some(state) = self.cache.node(entry.id()) {
            entry.attach(&state);
            return Ok(state);
        }
        self.factory.resolve_child_node_state(entry.id(), node).await
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn factory(&self) -> &ItemStateFactory {
        &self.factory
    }
}

#[async_trait]
impl ItemStateManager for Workspace {
    async fn node_state(&self, id: &NodeId) -> Result<Arc<NodeState>> {
        if let Some(state) = self.cache.node(id) {
            return Ok(state);
        }
        self.factory.resolve_node_state(id, self).await
    }

    async fn property_state(&self, id: &PropertyId) -> Result<Arc<PropertyState>> {
        if let Some(state) = self.cache.property(id) {
            return Ok(state);
        }
        let parent = self.node_state(&id.parent).await?;
        self.factory.resolve_property_state(id, &parent).await
    }

    async fn child_entries(&self, node: &Arc<NodeState>) -> Result<Arc<ChildNodeEntries>> {
        if let Some(entries) = node.child_entries() {
            return Ok(entries);
        }
        let fresh = self.factory.fetch_child_entries(node).await?;
        Ok(node.install_child_entries(fresh))
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("factory", &self.factory)
            .field("cache", &self.cache)
            .finish()
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}: {source}")]
    DefinitionMismatch {
        message: &'static str,
        #[source]
        source: DefinitionError,
    },

    #[error("{context}: {source}")]
    ServiceFailure {
        context: String,
        #[source]
        source: SourceError,
    },

    #[error("Malformed descriptor: {0}")]
    Malformed(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of an `Error`, for callers that branch on the
/// category rather than the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The item does not exist (any more).
    NotFound,
    /// The item exists but no definition of its parent's type admits it.
    DefinitionMismatch,
    /// The service failed or answered with garbage.
    ServiceFailure,
    /// The caller asked for something the API does not allow.
    Usage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::DefinitionMismatch { .. } => ErrorKind::DefinitionMismatch,
            Error::ServiceFailure { .. } | Error::Malformed(_) => ErrorKind::ServiceFailure,
            Error::InvalidTransition { .. } | Error::Config(_) => ErrorKind::Usage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, Error>;
