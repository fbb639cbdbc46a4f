//! Storage interface consumed by the compiler and the request pipeline.
//!
//! # Responsibilities
//! - Namespace (per-tenant database) provisioning
//! - Collection existence checks, creation, index management
//! - Minimal document operations for handlers and hooks
//!
//! # Design Decisions
//! - Trait objects at the seam: the compiler never names a concrete backend
//! - All operations are async; provisioning may suspend on the backing store
//! - Errors are strongly typed and carry collection context

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// An index to apply to a collection on first creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Optional index name; unnamed indexes are identified by their fields.
    #[serde(default)]
    pub name: Option<String>,

    /// Fields covered by the index, in order.
    pub fields: Vec<String>,

    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Build an index over the given fields.
    pub fn on<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: None,
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True when two specs describe the same index.
    pub fn same_index(&self, other: &IndexSpec) -> bool {
        if let (Some(a), Some(b)) = (&self.name, &other.name) {
            return a == b;
        }
        self.fields == other.fields && self.unique == other.unique
    }
}

/// Collection type, mirroring the document/edge split of the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Document,
    Edge,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Document => "document",
            CollectionKind::Edge => "edge",
        }
    }
}

/// Errors surfaced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Namespace looked up before being provisioned.
    #[error("namespace '{0}' does not exist")]
    NamespaceMissing(String),

    /// Operation against a collection that was never created.
    #[error("collection '{0}' does not exist")]
    CollectionMissing(String),

    /// Collection exists but with a different kind.
    #[error("collection '{collection}' already exists with a different kind")]
    KindMismatch { collection: String },

    /// Index creation failed; fatal to the resolve operation.
    #[error("index '{index}' on collection '{collection}' failed: {reason}")]
    Index {
        collection: String,
        index: String,
        reason: String,
    },

    /// A unique index rejected a document.
    #[error("unique constraint violated on '{collection}' (fields {fields:?})")]
    UniqueViolation {
        collection: String,
        fields: Vec<String>,
    },

    /// Anything the backend reports that has no dedicated variant.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Top-level store: a set of isolated per-tenant namespaces.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn namespace_exists(&self, name: &str) -> Result<bool, StorageError>;

    async fn create_namespace(&self, name: &str) -> Result<(), StorageError>;

    /// Handle to an existing namespace.
    fn namespace(&self, name: &str) -> Result<Arc<dyn StorageNamespace>, StorageError>;
}

/// A tenant-scoped namespace holding collections.
#[async_trait]
pub trait StorageNamespace: Send + Sync {
    fn name(&self) -> &str;

    async fn collection_exists(&self, name: &str) -> Result<bool, StorageError>;

    async fn create_collection(&self, name: &str, kind: CollectionKind)
        -> Result<(), StorageError>;

    /// Idempotent: an index equal to an existing one is a no-op.
    async fn ensure_index(&self, collection: &str, spec: &IndexSpec) -> Result<(), StorageError>;

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, StorageError>;

    /// Insert a document, assigning `_key` when absent. Returns the stored
    /// document.
    async fn insert(&self, collection: &str, doc: Value) -> Result<Value, StorageError>;

    async fn fetch(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace an existing document wholesale. Returns false when absent.
    async fn replace(&self, collection: &str, key: &str, doc: Value)
        -> Result<bool, StorageError>;

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, StorageError>;

    async fn list(&self, collection: &str, limit: usize) -> Result<Vec<Value>, StorageError>;
}

/// A named collection within a namespace; the handle handed to handlers.
#[derive(Clone)]
pub struct CollectionRef {
    namespace: Arc<dyn StorageNamespace>,
    name: String,
}

impl CollectionRef {
    pub fn new(namespace: Arc<dyn StorageNamespace>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert(&self, doc: Value) -> Result<Value, StorageError> {
        self.namespace.insert(&self.name, doc).await
    }

    pub async fn fetch(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.namespace.fetch(&self.name, key).await
    }

    pub async fn replace(&self, key: &str, doc: Value) -> Result<bool, StorageError> {
        self.namespace.replace(&self.name, key, doc).await
    }

    pub async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.namespace.remove(&self.name, key).await
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<Value>, StorageError> {
        self.namespace.list(&self.name, limit).await
    }
}

impl std::fmt::Debug for CollectionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRef")
            .field("namespace", &self.namespace.name())
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_spec_identity() {
        let a = IndexSpec::on(["sku"]).unique();
        let b = IndexSpec::on(["sku"]).unique();
        let c = IndexSpec::on(["sku"]);
        assert!(a.same_index(&b));
        assert!(!a.same_index(&c));

        let named_a = IndexSpec::on(["x"]).named("idx_1");
        let named_b = IndexSpec::on(["y"]).named("idx_1");
        assert!(named_a.same_index(&named_b));
    }

    #[test]
    fn test_index_spec_deserializes_with_defaults() {
        let spec: IndexSpec = serde_json::from_value(serde_json::json!({
            "fields": ["sku"],
            "unique": true
        }))
        .unwrap();
        assert_eq!(spec.fields, vec!["sku"]);
        assert!(spec.unique);
        assert!(spec.name.is_none());
    }
}
