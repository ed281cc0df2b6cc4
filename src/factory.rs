//! # Item State Factory
//!
//! Turns descriptors into published item states:
//!
//! 1. fetch the descriptor from the `DescriptorSource`
//! 2. resolve the applicable definition through the `DefinitionResolver`
//! 3. build and initialize the state
//! 4. register it with the `ItemStateCache`
//!
//! Step 4 is the only point where concurrent resolutions of the same id
//! meet. Fetches never run under a lock; if another caller published the
//! same id first, the freshly built state is dropped and the published one
//! is returned instead.
//!
//! Parent states are never resolved here directly: `resolve_node_state`
//! goes through the caller's `ItemStateManager`, so a child already known
//! to its parent's child table comes back as the same instance.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use hashbrown::HashSet;
use tracing::debug;

use crate::cache::ItemStateCache;
use crate::config::{FactoryConfig, SessionInfo};
use crate::model::*;
use crate::nodetype::{DefinitionError, DefinitionResolver};
use crate::service::{DescriptorSource, SourceError, SourceResult};
use crate::state::*;
use crate::{Error, Result};

const NODE_DEFINITION_FAILED: &str = "internal error: failed to retrieve node definition";
const PROPERTY_DEFINITION_FAILED: &str = "internal error: failed to build property state";
const ROOT_STATE_FAILED: &str = "internal error while building root state";

// ============================================================================
// ItemStateManager
// ============================================================================

/// Caller-visible access to item states. The factory uses it to reach
/// parents (and their child tables) without re-entering itself.
#[async_trait]
pub trait ItemStateManager: Send + Sync {
    async fn node_state(&self, id: &NodeId) -> Result<Arc<NodeState>>;

    async fn property_state(&self, id: &PropertyId) -> Result<Arc<PropertyState>>;

    /// The child table of `node`, fetching it on first access.
    async fn child_entries(&self, node: &Arc<NodeState>) -> Result<Arc<ChildNodeEntries>>;

    async fn item_state(&self, id: &ItemId) -> Result<ItemState> {
        match id {
            ItemId::Node(id) => self.node_state(id).await.map(ItemState::Node),
            ItemId::Property(id) => self.property_state(id).await.map(ItemState::Property),
        }
    }
}

// ============================================================================
// ItemStateFactory
// ============================================================================

pub struct ItemStateFactory {
    source: Arc<dyn DescriptorSource>,
    resolver: Arc<dyn DefinitionResolver>,
    cache: Arc<dyn ItemStateCache>,
    listener: Weak<dyn ItemStateListener>,
    session: Arc<SessionInfo>,
    config: FactoryConfig,
}

impl ItemStateFactory {
    pub fn new<C: ItemStateCache + 'static>(
        source: Arc<dyn DescriptorSource>,
        resolver: Arc<dyn DefinitionResolver>,
        cache: Arc<C>,
        session: SessionInfo,
        config: FactoryConfig,
    ) -> Self {
        let listener: Arc<dyn ItemStateListener> = cache.clone();
        Self {
            source,
            resolver,
            listener: Arc::downgrade(&listener),
            cache,
            session: Arc::new(session),
            config,
        }
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Build the root state. Every service failure, including a missing
    /// root, is reported as a `ServiceFailure`.
    pub async fn create_root_state(&self) -> Result<Arc<NodeState>> {
        let desc = self.fetch_root_descriptor().await.map_err(|source| Error::ServiceFailure {
            context: ROOT_STATE_FAILED.into(),
            source,
        })?;
        self.build_node_state(desc, Placement::Root)
    }

    async fn fetch_root_descriptor(&self) -> SourceResult<NodeDescriptor> {
        let root_id = self.source.root_id(&self.session).await?;
        self.source.node_descriptor(&self.session, &root_id).await
    }

    /// Resolve any node. A node with a parent is looked up in the parent's
    /// child table (parent and table both obtained through `manager`); a
    /// node without one is the root.
    pub async fn resolve_node_state(
        &self,
        id: &NodeId,
        manager: &dyn ItemStateManager,
    ) -> Result<Arc<NodeState>> {
        let desc = self.source.node_descriptor(&self.session, id).await?;
        self.resolve_from_descriptor(id, desc, manager).await
    }

    async fn resolve_from_descriptor(
        &self,
        id: &NodeId,
        desc: NodeDescriptor,
        manager: &dyn ItemStateManager,
    ) -> Result<Arc<NodeState>> {
        let Some(parent_id) = desc.parent_id.clone() else {
            return self.build_node_state(desc, Placement::Root);
        };

        let parent = manager.node_state(&parent_id).await?;
        let mut entries = manager.child_entries(&parent).await?;
        if entries.find(id).or_else(|| entries.find(&desc.id)).is_none() {
            // The node was added after the parent's table was loaded.
            debug!(node = %desc.id, parent = %parent_id, "child missing from loaded table, refetching");
            parent.invalidate_child_entries();
            entries = manager.child_entries(&parent).await?;
        }

        let cached = entries
            .find(id)
            .or_else(|| entries.find(&desc.id))
            .and_then(ChildNodeEntry::cached_state);
        if let Some(existing) = cached.filter(|s| s.status().is_valid()) {
            return Ok(existing);
        }
        self.build_node_state(desc, Placement::Child(parent))
    }

    /// Resolve a node whose parent the caller already holds.
    pub async fn resolve_child_node_state(
        &self,
        id: &NodeId,
        parent: &Arc<NodeState>,
    ) -> Result<Arc<NodeState>> {
        let desc = self.source.node_descriptor(&self.session, id).await?;
        self.build_node_state(desc, Placement::Child(parent.clone()))
    }

    /// Build, initialize and publish a node state from its descriptor.
    pub fn build_node_state(&self, desc: NodeDescriptor, placement: Placement) -> Result<Arc<NodeState>> {
        let definition = match &placement {
            Placement::Root => self.resolver.root_definition(),
            Placement::Child(parent) => self
                .resolver
                .effective_type(&parent.node_type_names())
                .and_then(|ent| {
                    self.resolver.applicable_node_definition(&ent, &desc.name, &desc.primary_type)
                })
                .map_err(|e| definition_mismatch(NODE_DEFINITION_FAILED, &desc.id, e))?,
        };

        let unique_id = match desc.id.path() {
            None => desc.id.unique_id().map(str::to_owned),
            Some(_) => None,
        };

        let references = NodeReferences::new(
            desc.id.clone(),
            unique_id.clone(),
            self.source.clone(),
            self.session.clone(),
            self.config.reference_failure_policy,
        );
        let state = Arc::new(NodeState::new(&desc, unique_id, placement, definition, references));

        let property_names: HashSet<Name> = desc.property_ids.iter().map(|p| p.name.clone()).collect();
        state.init(desc.mixins, property_names);

        let published = match self.publish(ItemState::Node(state.clone())) {
            ItemState::Node(winner) => winner,
            ItemState::Property(_) => state,
        };

        if let Some(parent) = published.parent() {
            if let Some(entry) = parent.child_entries().as_deref().and_then(|e| e.find(published.id())) {
                entry.attach(&published);
            }
        }
        debug!(node = %published.id(), primary_type = %published.primary_type(), "materialized node state");
        Ok(published)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub async fn resolve_property_state(
        &self,
        id: &PropertyId,
        parent: &Arc<NodeState>,
    ) -> Result<Arc<PropertyState>> {
        let desc = self.source.property_descriptor(&self.session, id).await?;
        self.build_property_state(desc, parent)
    }

    /// Build, initialize and publish a property state from its descriptor.
    pub fn build_property_state(
        &self,
        desc: PropertyDescriptor,
        parent: &Arc<NodeState>,
    ) -> Result<Arc<PropertyState>> {
        let definition = self
            .resolver
            .effective_type(&parent.node_type_names())
            .and_then(|ent| {
                self.resolver.applicable_property_definition(
                    &ent,
                    desc.name(),
                    desc.property_type,
                    desc.multi_valued,
                )
            })
            .map_err(|e| definition_mismatch(PROPERTY_DEFINITION_FAILED, &desc.id, e))?;

        let state = Arc::new(PropertyState::new(desc.id.name.clone(), parent.clone(), definition));
        state.init(desc.property_type, desc.multi_valued, desc.values)?;

        let published = match self.publish(ItemState::Property(state.clone())) {
            ItemState::Property(winner) => winner,
            ItemState::Node(_) => state,
        };
        debug!(property = %published.id(), property_type = %published.property_type(), "materialized property state");
        Ok(published)
    }

    // ========================================================================
    // Generic items and child listings
    // ========================================================================

    /// Resolve whichever item `id` denotes.
    pub async fn resolve_item_state(
        &self,
        id: &ItemId,
        manager: &dyn ItemStateManager,
    ) -> Result<ItemState> {
        match (id, self.source.item_descriptor(&self.session, id).await?) {
            (ItemId::Node(node_id), Descriptor::Node(desc)) => {
                self.resolve_from_descriptor(node_id, desc, manager).await.map(ItemState::Node)
            }
            (_, Descriptor::Property(desc)) => {
                let parent = manager.node_state(&desc.id.parent).await?;
                self.build_property_state(desc, &parent).map(ItemState::Property)
            }
            (ItemId::Property(prop_id), Descriptor::Node(desc)) => Err(Error::Malformed(format!(
                "asked for property {prop_id}, got node {}",
                desc.id
            ))),
        }
    }

    /// Fetch the child listing of `node` into a fresh table, in service order.
    pub async fn fetch_child_entries(&self, node: &NodeState) -> Result<ChildNodeEntries> {
        let listing = self.source.list_children(&self.session, node.id()).await?;
        Ok(ChildNodeEntries::from_listing(node.id().clone(), listing))
    }

    // ========================================================================
    // Publication
    // ========================================================================

    /// Register `state` with the cache. The cache is attached as a listener
    /// first so it observes every transition of the published instance.
    fn publish(&self, state: ItemState) -> ItemState {
        state.add_listener(self.listener.clone());
        let published = self.cache.created(state.clone());
        if !published.same_instance(&state) {
            debug!(item = %state.id(), "state already published by a concurrent resolution, discarding duplicate");
        }
        published
    }
}

fn definition_mismatch(message: &'static str, item: &impl std::fmt::Display, source: DefinitionError) -> Error {
    debug!(item = %item, error = %source, "{message}");
    Error::DefinitionMismatch { message, source }
}

impl From<SourceError> for Error {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::NotFound(msg) => Error::NotFound(msg),
            other => Error::ServiceFailure { context: "descriptor fetch failed".into(), source: other },
        }
    }
}

impl std::fmt::Debug for ItemStateFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStateFactory")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish()
    }
}
