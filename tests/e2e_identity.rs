//! End-to-end tests for state identity and lifecycle.
//!
//! Within one workspace an item is materialized at most once while it is
//! live; every lookup path (by id, through the parent's child table, as a
//! generic item) hands out the same instance.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use itemstate::service::{ChildInfos, SourceResult};
use itemstate::{
    DescriptorSource, ErrorKind, FactoryConfig, ItemId, ItemStateCache, MemoryService,
    NodeDescriptor, NodeId, NodeTypeRegistry, PropertyDescriptor, PropertyId, SessionInfo, Status,
    Value, Workspace,
};
use pretty_assertions::assert_eq;
use tokio::sync::Barrier;

fn setup() -> (MemoryService, Workspace, NodeId) {
    let service = MemoryService::new();
    let docs = service.add_node(&service.root_id(), "docs", "nt:unstructured").unwrap();
    service.set_property(&docs, "title", Value::from("Handbook")).unwrap();
    let workspace = Workspace::open_memory(service.clone());
    (service, workspace, docs)
}

// ============================================================================
// 1. Sequential identity
// ============================================================================

#[tokio::test]
async fn test_second_lookup_hits_cache() {
    let (service, workspace, docs) = setup();
    let first = workspace.node(&docs).await.unwrap();
    let fetches = service.node_fetches();
    let second = workspace.node(&docs).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(service.node_fetches(), fetches);
}

#[tokio::test]
async fn test_every_lookup_path_agrees() {
    let (_service, workspace, docs) = setup();
    let root = workspace.root().await.unwrap();
    let via_child = workspace.child(&root, &"docs".into(), 1).await.unwrap();
    let via_id = workspace.node(&docs).await.unwrap();
    let via_item = workspace.item(&ItemId::from(docs.clone())).await.unwrap();

    assert!(Arc::ptr_eq(&via_child, &via_id));
    assert!(Arc::ptr_eq(via_item.as_node().unwrap(), &via_id));
}

#[tokio::test]
async fn test_cache_holds_one_entry_per_item() {
    let (_service, workspace, docs) = setup();
    workspace.node(&docs).await.unwrap();
    workspace.node(&docs).await.unwrap();
    workspace.property(&docs.property("title")).await.unwrap();
    workspace.property(&docs.property("title")).await.unwrap();

    // root, docs, docs/title
    assert_eq!(workspace.cache().len(), 3);
    assert!(workspace.cache().node(&docs).is_some());
    assert!(workspace.cache().property(&PropertyId::new(docs, "title")).is_some());
}

// ============================================================================
// 2. Lifecycle and eviction
// ============================================================================

#[tokio::test]
async fn test_cache_listens_to_published_states() {
    let (_service, workspace, docs) = setup();
    let node = workspace.node(&docs).await.unwrap();
    assert_eq!(node.listener_count(), 1);
}

#[tokio::test]
async fn test_removed_state_is_evicted() {
    let (_service, workspace, docs) = setup();
    let node = workspace.node(&docs).await.unwrap();
    node.transition(Status::Removed).unwrap();

    assert!(workspace.cache().node(&docs).is_none());
    assert_eq!(node.status(), Status::Removed);
}

#[tokio::test]
async fn test_stale_state_is_replaced_on_next_lookup() {
    let (_service, workspace, docs) = setup();
    let old = workspace.node(&docs).await.unwrap();
    old.transition(Status::Stale).unwrap();

    let fresh = workspace.node(&docs).await.unwrap();
    assert!(!Arc::ptr_eq(&old, &fresh));
    assert_eq!(fresh.status(), Status::Existing);
    assert!(Arc::ptr_eq(&workspace.node(&docs).await.unwrap(), &fresh));
}

#[tokio::test]
async fn test_stale_state_cannot_be_revived() {
    let (_service, workspace, docs) = setup();
    let old = workspace.node(&docs).await.unwrap();
    old.transition(Status::Stale).unwrap();
    let fresh = workspace.node(&docs).await.unwrap();

    let err = old.transition(Status::Existing).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(old.status(), Status::Stale);

    // The replacement keeps the only live slot for the item.
    assert!(Arc::ptr_eq(&workspace.cache().node(&docs).unwrap(), &fresh));
    assert!(Arc::ptr_eq(&workspace.node(&docs).await.unwrap(), &fresh));
    old.transition(Status::Removed).unwrap();
    assert!(Arc::ptr_eq(&workspace.cache().node(&docs).unwrap(), &fresh));
}

#[tokio::test]
async fn test_modified_state_stays_cached() {
    let (_service, workspace, docs) = setup();
    let title = workspace.property(&docs.property("title")).await.unwrap();
    title.transition(Status::Modified).unwrap();

    let again = workspace.property(&docs.property("title")).await.unwrap();
    assert!(Arc::ptr_eq(&title, &again));
    assert_eq!(again.status(), Status::Modified);
}

#[tokio::test]
async fn test_cleared_cache_materializes_again() {
    let (_service, workspace, docs) = setup();
    let first = workspace.node(&docs).await.unwrap();
    workspace.cache().clear();
    assert!(workspace.cache().is_empty());

    // The root is rebuilt too, with a fresh child table.
    let second = workspace.node(&docs).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(first.parent().unwrap(), second.parent().unwrap()));
    assert!(Arc::ptr_eq(&workspace.node(&docs).await.unwrap(), &second));
}

// ============================================================================
// 3. Concurrent resolution
// ============================================================================

/// Delegates to a MemoryService, holding the first two `node_descriptor`
/// calls for `gated` at a barrier so both resolutions are in flight before
/// either can publish.
struct GatedSource {
    inner: MemoryService,
    gated: NodeId,
    barrier: Barrier,
    passed: AtomicUsize,
}

#[async_trait]
impl DescriptorSource for GatedSource {
    async fn root_id(&self, session: &SessionInfo) -> SourceResult<NodeId> {
        DescriptorSource::root_id(&self.inner, session).await
    }

    async fn node_descriptor(&self, session: &SessionInfo, id: &NodeId) -> SourceResult<NodeDescriptor> {
        let desc = self.inner.node_descriptor(session, id).await;
        if *id == self.gated && self.passed.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        desc
    }

    async fn property_descriptor(
        &self,
        session: &SessionInfo,
        id: &PropertyId,
    ) -> SourceResult<PropertyDescriptor> {
        self.inner.property_descriptor(session, id).await
    }

    async fn list_children(&self, session: &SessionInfo, id: &NodeId) -> SourceResult<ChildInfos> {
        self.inner.list_children(session, id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_resolution_yields_one_instance() {
    let service = MemoryService::new();
    let docs = service.add_node(&service.root_id(), "docs", "nt:unstructured").unwrap();
    let source = GatedSource {
        inner: service,
        gated: docs.clone(),
        barrier: Barrier::new(2),
        passed: AtomicUsize::new(0),
    };
    let workspace = Arc::new(Workspace::open(
        Arc::new(source),
        Arc::new(NodeTypeRegistry::with_builtins()),
        SessionInfo::default(),
        FactoryConfig::default(),
    ));

    let a = tokio::spawn({
        let workspace = workspace.clone();
        let docs = docs.clone();
        async move { workspace.node(&docs).await.unwrap() }
    });
    let b = tokio::spawn({
        let workspace = workspace.clone();
        let docs = docs.clone();
        async move { workspace.node(&docs).await.unwrap() }
    });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&workspace.cache().node(&docs).unwrap(), &a));
    // root + docs
    assert_eq!(workspace.cache().len(), 2);
}
