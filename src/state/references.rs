//! Reference view: which reference properties point at a node.
//!
//! Nothing is cached. Every query re-fetches the node's descriptor, except
//! for nodes without a unique id, which cannot be referenced at all and are
//! answered without touching the service.
//!
//! `is_empty` and `references` never fail: when the service cannot answer
//! they log and fall back according to the configured
//! `ReferenceFailurePolicy`. Callers that must distinguish "none" from
//! "unknown" use `try_is_empty` / `try_references`.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashSet;
use hashbrown::hash_set::IntoIter;
use tracing::{debug, error};

use crate::config::{ReferenceFailurePolicy, SessionInfo};
use crate::model::{NodeId, PropertyId};
use crate::service::DescriptorSource;
use crate::Result;

/// Reference view of one node.
pub struct NodeReferences {
    node_id: NodeId,
    unique_id: Option<String>,
    source: Arc<dyn DescriptorSource>,
    session: Arc<SessionInfo>,
    policy: ReferenceFailurePolicy,
}

impl NodeReferences {
    pub(crate) fn new(
        node_id: NodeId,
        unique_id: Option<String>,
        source: Arc<dyn DescriptorSource>,
        session: Arc<SessionInfo>,
        policy: ReferenceFailurePolicy,
    ) -> Self {
        Self { node_id, unique_id, source, session, policy }
    }

    /// Only nodes with a stable unique id can be referenced.
    pub fn is_referenceable(&self) -> bool {
        self.unique_id.is_some()
    }

    /// Whether nothing references the node.
    pub async fn is_empty(&self) -> bool {
        match self.try_is_empty().await {
            Ok(empty) => empty,
            Err(e) => {
                let empty = self.policy == ReferenceFailurePolicy::FailOpen;
                error!(node = %self.node_id, error = %e, empty, "reference lookup failed");
                empty
            }
        }
    }

    /// Snapshot of the referencing property ids. Duplicates in the service's
    /// answer (a multi-valued property pointing here twice) collapse into one
    /// id. Empty when the lookup fails.
    pub async fn references(&self) -> References {
        match self.try_references().await {
            Ok(ids) => References::new(ids),
            Err(e) => {
                error!(node = %self.node_id, error = %e, "reference lookup failed, reporting none");
                References::empty()
            }
        }
    }

    /// Like `is_empty`, but surfaces service failures.
    pub async fn try_is_empty(&self) -> Result<bool> {
        if !self.is_referenceable() {
            debug!(node = %self.node_id, "not referenceable, skipping reference lookup");
            return Ok(true);
        }
        let desc = self.source.node_descriptor(&self.session, &self.node_id).await?;
        Ok(desc.references.is_empty())
    }

    /// Like `references`, but surfaces service failures.
    pub async fn try_references(&self) -> Result<HashSet<PropertyId>> {
        if !self.is_referenceable() {
            debug!(node = %self.node_id, "not referenceable, skipping reference lookup");
            return Ok(HashSet::new());
        }
        let desc = self.source.node_descriptor(&self.session, &self.node_id).await?;
        Ok(desc.references.into_iter().collect())
    }
}

impl fmt::Debug for NodeReferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeReferences")
            .field("node_id", &self.node_id)
            .field("referenceable", &self.is_referenceable())
            .field("policy", &self.policy)
            .finish()
    }
}

/// One-shot iterator over referencing property ids.
pub struct References {
    inner: IntoIter<PropertyId>,
}

impl References {
    fn new(ids: HashSet<PropertyId>) -> Self {
        Self { inner: ids.into_iter() }
    }

    pub fn empty() -> Self {
        Self::new(HashSet::new())
    }
}

impl Iterator for References {
    type Item = PropertyId;

    fn next(&mut self) -> Option<PropertyId> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for References {}
