//! Resource binding resolution.
//!
//! # Responsibilities
//! - Ensure a collection-marked node's backing collections exist
//! - Apply index specs on first creation of the document collection
//! - Always ensure the companion edge collection
//! - Optionally ensure the companion changelog collection with its
//!   `documentId` index
//!
//! # Design Decisions
//! - Idempotent: re-resolving an existing resource only fills in missing
//!   sibling collections, never recreates anything
//! - Any index failure fails the whole resolve (fail-fast at startup)
//! - Naming is centralized here so hooks and resolver can never disagree
//!   about the changelog collection's name

use std::sync::Arc;

use crate::storage::interface::{
    CollectionKind, CollectionRef, IndexSpec, StorageError, StorageNamespace,
};

/// The resolved storage handles for one collection-marked node.
#[derive(Clone, Debug)]
pub struct ResourceBinding {
    pub docs: CollectionRef,
    pub edges: CollectionRef,
    pub changelog: Option<CollectionRef>,
}

/// Companion edge collection name for a resource.
pub fn edge_collection_name(name: &str) -> String {
    format!("{name}_edge")
}

/// Companion changelog collection name for a resource.
pub fn changelog_collection_name(name: &str) -> String {
    format!("{name}_changelogs")
}

fn changelog_document_id_index() -> IndexSpec {
    IndexSpec::on(["documentId"]).named("idx_changelogs_documentId")
}

/// Ensure the backing collections for `name` and return handles to them.
pub async fn resolve(
    namespace: &Arc<dyn StorageNamespace>,
    name: &str,
    indexes: &[IndexSpec],
    with_changelog: bool,
) -> Result<ResourceBinding, StorageError> {
    if !namespace.collection_exists(name).await? {
        tracing::info!(
            collection = %name,
            namespace = %namespace.name(),
            "Collection not found, creating"
        );
        namespace
            .create_collection(name, CollectionKind::Document)
            .await?;

        for spec in indexes {
            namespace.ensure_index(name, spec).await.map_err(|err| {
                tracing::error!(
                    collection = %name,
                    namespace = %namespace.name(),
                    index = spec.name.as_deref().unwrap_or("unnamed"),
                    error = %err,
                    "Index creation failed"
                );
                err
            })?;
        }
        if !indexes.is_empty() {
            tracing::info!(
                collection = %name,
                namespace = %namespace.name(),
                count = indexes.len(),
                "All indexes created"
            );
        }
    }

    let edge_name = edge_collection_name(name);
    if !namespace.collection_exists(&edge_name).await? {
        tracing::info!(
            collection = %edge_name,
            namespace = %namespace.name(),
            "Edge collection not found, creating"
        );
        namespace
            .create_collection(&edge_name, CollectionKind::Edge)
            .await?;
    }

    let changelog = if with_changelog {
        let changelog_name = changelog_collection_name(name);
        if !namespace.collection_exists(&changelog_name).await? {
            tracing::info!(
                collection = %changelog_name,
                namespace = %namespace.name(),
                "Changelog collection not found, creating"
            );
            namespace
                .create_collection(&changelog_name, CollectionKind::Document)
                .await?;
            namespace
                .ensure_index(&changelog_name, &changelog_document_id_index())
                .await?;
        }
        Some(CollectionRef::new(namespace.clone(), changelog_name))
    } else {
        None
    };

    Ok(ResourceBinding {
        docs: CollectionRef::new(namespace.clone(), name),
        edges: CollectionRef::new(namespace.clone(), edge_name),
        changelog,
    })
}
