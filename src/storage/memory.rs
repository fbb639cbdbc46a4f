//! In-memory document store.
//!
//! Backs the demo binary and the test suite. Concurrent-startup safe: all
//! existence checks and creations go through DashMap entries, so two tenants
//! provisioning at once cannot race each other into duplicates.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::storage::interface::{
    CollectionKind, DocumentStore, IndexSpec, StorageError, StorageNamespace,
};

/// Top-level in-memory store: tenant name → namespace.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: DashMap<String, Arc<MemoryNamespace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn namespace_exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.namespaces.contains_key(name))
    }

    async fn create_namespace(&self, name: &str) -> Result<(), StorageError> {
        self.namespaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryNamespace::new(name)));
        Ok(())
    }

    fn namespace(&self, name: &str) -> Result<Arc<dyn StorageNamespace>, StorageError> {
        self.namespaces
            .get(name)
            .map(|entry| entry.value().clone() as Arc<dyn StorageNamespace>)
            .ok_or_else(|| StorageError::NamespaceMissing(name.to_string()))
    }
}

/// One tenant's collections.
pub struct MemoryNamespace {
    name: String,
    collections: DashMap<String, Arc<MemoryCollection>>,
}

impl MemoryNamespace {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collections: DashMap::new(),
        }
    }

    fn collection(&self, name: &str) -> Result<Arc<MemoryCollection>, StorageError> {
        self.collections
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::CollectionMissing(name.to_string()))
    }
}

struct MemoryCollection {
    kind: CollectionKind,
    docs: DashMap<String, Value>,
    indexes: Mutex<Vec<IndexSpec>>,
    sequence: AtomicU64,
}

impl MemoryCollection {
    fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            docs: DashMap::new(),
            indexes: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(1),
        }
    }

    fn next_key(&self) -> String {
        self.sequence.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Scan unique indexes for a conflicting document.
    fn check_unique(&self, name: &str, doc: &Value, skip_key: Option<&str>) -> Result<(), StorageError> {
        let indexes = self.indexes.lock().expect("index list lock");
        for index in indexes.iter().filter(|i| i.unique) {
            let candidate: Vec<&Value> = index
                .fields
                .iter()
                .map(|field| doc.get(field).unwrap_or(&Value::Null))
                .collect();
            if candidate.iter().all(|v| v.is_null()) {
                continue;
            }
            for entry in self.docs.iter() {
                if skip_key == Some(entry.key().as_str()) {
                    continue;
                }
                let existing: Vec<&Value> = index
                    .fields
                    .iter()
                    .map(|field| entry.value().get(field).unwrap_or(&Value::Null))
                    .collect();
                if existing == candidate {
                    return Err(StorageError::UniqueViolation {
                        collection: name.to_string(),
                        fields: index.fields.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageNamespace for MemoryNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.collections.contains_key(name))
    }

    async fn create_collection(
        &self,
        name: &str,
        kind: CollectionKind,
    ) -> Result<(), StorageError> {
        let entry = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(kind)));
        if entry.value().kind != kind {
            return Err(StorageError::KindMismatch {
                collection: name.to_string(),
            });
        }
        Ok(())
    }

    async fn ensure_index(&self, collection: &str, spec: &IndexSpec) -> Result<(), StorageError> {
        let coll = self.collection(collection)?;
        let mut indexes = coll.indexes.lock().expect("index list lock");
        if indexes.iter().any(|existing| existing.same_index(spec)) {
            return Ok(());
        }
        if spec.fields.is_empty() {
            return Err(StorageError::Index {
                collection: collection.to_string(),
                index: spec.name.clone().unwrap_or_else(|| "unnamed".to_string()),
                reason: "index must cover at least one field".to_string(),
            });
        }
        indexes.push(spec.clone());
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, StorageError> {
        let coll = self.collection(collection)?;
        let indexes = coll.indexes.lock().expect("index list lock");
        Ok(indexes.clone())
    }

    async fn insert(&self, collection: &str, mut doc: Value) -> Result<Value, StorageError> {
        let coll = self.collection(collection)?;
        let obj = doc
            .as_object_mut()
            .ok_or_else(|| StorageError::Backend("document must be a JSON object".to_string()))?;

        let key = match obj.get("_key").and_then(Value::as_str) {
            Some(key) => key.to_string(),
            None => {
                let key = coll.next_key();
                obj.insert("_key".to_string(), Value::String(key.clone()));
                key
            }
        };
        if coll.docs.contains_key(&key) {
            return Err(StorageError::Backend(format!(
                "document '{key}' already exists in '{collection}'"
            )));
        }
        coll.check_unique(collection, &doc, None)?;
        coll.docs.insert(key, doc.clone());
        Ok(doc)
    }

    async fn fetch(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let coll = self.collection(collection)?;
        Ok(coll.docs.get(key).map(|entry| entry.value().clone()))
    }

    async fn replace(
        &self,
        collection: &str,
        key: &str,
        doc: Value,
    ) -> Result<bool, StorageError> {
        let coll = self.collection(collection)?;
        if !coll.docs.contains_key(key) {
            return Ok(false);
        }
        coll.check_unique(collection, &doc, Some(key))?;
        coll.docs.insert(key.to_string(), doc);
        Ok(true)
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        let coll = self.collection(collection)?;
        Ok(coll.docs.remove(key).is_some())
    }

    async fn list(&self, collection: &str, limit: usize) -> Result<Vec<Value>, StorageError> {
        let coll = self.collection(collection)?;
        Ok(coll
            .docs
            .iter()
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
