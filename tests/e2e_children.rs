//! End-to-end tests for child entry tables.

use std::sync::Arc;

use itemstate::{MemoryService, Name, NodeId, Workspace};
use pretty_assertions::assert_eq;

fn setup() -> (MemoryService, Workspace, NodeId) {
    let service = MemoryService::new();
    let root = service.root_id();
    let parent = service.add_node(&root, "parent", "nt:unstructured").unwrap();
    service.add_node(&parent, "a", "nt:unstructured").unwrap();
    service.add_node(&parent, "b", "nt:unstructured").unwrap();
    service.add_node(&parent, "a", "nt:unstructured").unwrap();
    let workspace = Workspace::open_memory(service.clone());
    (service, workspace, parent)
}

// ============================================================================
// 1. Listing order
// ============================================================================

#[tokio::test]
async fn test_entries_follow_service_order() {
    let (_service, workspace, parent) = setup();
    let node = workspace.node(&parent).await.unwrap();
    let entries = workspace.children(&node).await.unwrap();

    let shape: Vec<(String, u32)> = entries
        .iter()
        .map(|e| (e.name().to_string(), e.index()))
        .collect();
    assert_eq!(
        shape,
        vec![("a".to_string(), 1), ("b".to_string(), 1), ("a".to_string(), 2)]
    );
    assert_eq!(entries.parent(), &parent);
}

#[tokio::test]
async fn test_empty_listing() {
    let (service, workspace, parent) = setup();
    let leaf = service.add_node(&parent, "leaf", "nt:unstructured").unwrap();
    let node = workspace.node(&leaf).await.unwrap();
    let entries = workspace.children(&node).await.unwrap();
    assert!(entries.is_empty());
}

// ============================================================================
// 2. Table reuse
// ============================================================================

#[tokio::test]
async fn test_table_fetched_once() {
    let (service, workspace, parent) = setup();
    let node = workspace.node(&parent).await.unwrap();
    let before = service.child_listings();

    let first = workspace.children(&node).await.unwrap();
    let second = workspace.children(&node).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    // The parent's table may already have been loaded while resolving
    // `parent` itself; either way at most one more listing is fetched.
    assert!(service.child_listings() <= before + 1);
}

#[tokio::test]
async fn test_invalidated_table_is_refetched() {
    let (service, workspace, parent) = setup();
    let node = workspace.node(&parent).await.unwrap();
    let first = workspace.children(&node).await.unwrap();

    service.add_node(&parent, "c", "nt:unstructured").unwrap();
    node.invalidate_child_entries();
    let second = workspace.children(&node).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 4);
}

#[tokio::test]
async fn test_child_added_after_listing_resolves() {
    let (service, workspace, parent) = setup();
    let node = workspace.node(&parent).await.unwrap();
    let stale_table = workspace.children(&node).await.unwrap();
    assert_eq!(stale_table.len(), 3);

    let late = service.add_node(&parent, "late", "nt:unstructured").unwrap();
    let state = workspace.node(&late).await.unwrap();
    assert_eq!(state.name(), &Name::from("late"));
    assert!(Arc::ptr_eq(state.parent().unwrap(), &node));

    // The parent's table was reloaded and now tracks the new child.
    let entries = workspace.children(&node).await.unwrap();
    assert_eq!(entries.len(), 4);
    let entry = entries.get(&Name::from("late"), 1).unwrap();
    assert!(Arc::ptr_eq(&entry.cached_state().unwrap(), &state));
    assert!(Arc::ptr_eq(&workspace.node(&late).await.unwrap(), &state));
}

// ============================================================================
// 3. Entries and resolved states
// ============================================================================

#[tokio::test]
async fn test_resolved_child_is_attached_to_entry() {
    let (_service, workspace, parent) = setup();
    let node = workspace.node(&parent).await.unwrap();
    let a2 = workspace.child(&node, &Name::from("a"), 2).await.unwrap();

    let entries = workspace.children(&node).await.unwrap();
    let entry = entries.get(&Name::from("a"), 2).unwrap();
    assert!(Arc::ptr_eq(&entry.cached_state().unwrap(), &a2));
    assert!(entries.get(&Name::from("a"), 1).unwrap().cached_state().is_none());
}

#[tokio::test]
async fn test_child_by_entry_and_by_id_agree() {
    let (_service, workspace, parent) = setup();
    let node = workspace.node(&parent).await.unwrap();

    let via_entry = workspace.child(&node, &Name::from("b"), 1).await.unwrap();
    let via_id = workspace.node(&parent.child("b", 1)).await.unwrap();
    assert!(Arc::ptr_eq(&via_entry, &via_id));
}

#[tokio::test]
async fn test_missing_child_entry() {
    let (_service, workspace, parent) = setup();
    let node = workspace.node(&parent).await.unwrap();
    let err = workspace.child(&node, &Name::from("b"), 2).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_referenceable_child_found_by_unique_id() {
    let (service, workspace, parent) = setup();
    let id = service
        .add_referenceable_node(&parent, "doc", "nt:unstructured", "u-7")
        .unwrap();
    let node = workspace.node(&parent).await.unwrap();
    let entries = workspace.children(&node).await.unwrap();

    let entry = entries.by_unique_id("u-7").unwrap();
    assert_eq!(entry.id(), &id);
    assert_eq!(entry.name(), &Name::from("doc"));

    let doc = workspace.node(&id).await.unwrap();
    assert!(Arc::ptr_eq(&entry.cached_state().unwrap(), &doc));
}
