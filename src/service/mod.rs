//! # Descriptor Source Trait
//!
//! This is THE contract between the item-state factory and a repository
//! service. The factory only ever asks for descriptors; how the service
//! retrieves them (embedded engine, RPC, HTTP) is invisible here and must not
//! change factory behavior.
//!
//! ## Implementations
//!
//! | Source | Module | Description |
//! |--------|--------|-------------|
//! | `MemoryService` | `memory` | In-memory repository for testing/embedding |

pub mod memory;

use async_trait::async_trait;

use crate::config::SessionInfo;
use crate::model::*;

pub use memory::{MemoryService, RepositorySnapshot};

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by a descriptor source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The identifier does not resolve (any more).
    #[error("item not found: {0}")]
    NotFound(String),

    /// The service could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete in time.
    #[error("service call timed out: {0}")]
    Timeout(String),

    /// The service answered with something that cannot be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// A child listing: finite, in server order, consumed once.
pub type ChildInfos = Box<dyn Iterator<Item = ChildDescriptor> + Send>;

// ============================================================================
// DescriptorSource Trait
// ============================================================================

/// Session-bound descriptor fetches.
///
/// Every call is potentially blocking I/O. Implementations own any retry
/// and timeout policy; a timeout must surface as `SourceError::Timeout`.
#[async_trait]
pub trait DescriptorSource: Send + Sync + 'static {
    /// Id of the workspace root node.
    async fn root_id(&self, session: &SessionInfo) -> SourceResult<NodeId>;

    /// Snapshot of the node addressed by `id`.
    async fn node_descriptor(&self, session: &SessionInfo, id: &NodeId) -> SourceResult<NodeDescriptor>;

    /// Snapshot of the property addressed by `id`.
    async fn property_descriptor(
        &self,
        session: &SessionInfo,
        id: &PropertyId,
    ) -> SourceResult<PropertyDescriptor>;

    /// Children of the node addressed by `id`, in server order.
    async fn list_children(&self, session: &SessionInfo, id: &NodeId) -> SourceResult<ChildInfos>;

    /// Fetch whichever descriptor `id` denotes.
    ///
    /// Default dispatches to `node_descriptor` / `property_descriptor`.
    async fn item_descriptor(&self, session: &SessionInfo, id: &ItemId) -> SourceResult<Descriptor> {
        match id {
            ItemId::Node(id) => self.node_descriptor(session, id).await.map(Descriptor::Node),
            ItemId::Property(id) => self.property_descriptor(session, id).await.map(Descriptor::Property),
        }
    }
}
