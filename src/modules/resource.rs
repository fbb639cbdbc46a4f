//! Generic CRUD resource factory.
//!
//! # Responsibilities
//! - Produce a collection-marked definition node with standard CRUD routes
//! - Stamp bookkeeping fields (`createdAt`, `updatedAt`, `_version`)
//! - Wire the changelog hooks onto the update route when enabled
//!
//! # Design Decisions
//! - Route keys double as path segments, so the operations mount at
//!   `/{tenant}/{name}/create`, `/{name}/read`, `/{name}/readById/{id}`, …
//!   Bulk reads go through `POST /{name}/query`, bulk deletes through
//!   `DELETE /{name}/bulk`; both filter by exact field match over the list
//!   primitive rather than a query language
//! - Handlers reach storage only through the injected collection bindings;
//!   the factory never names a backend
//! - Each operation can be enabled individually; per-route hook overrides go
//!   through the returned node like any other tree

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::compiler::{CollectionSpec, DefinitionNode, LifecycleStage, RouteDefinition};
use crate::hooks::changelog::{CaptureOldState, LogChanges};
use crate::pipeline::{HookError, Reply, RequestContext, RouteHandler};
use crate::storage::IndexSpec;

/// The CRUD operations the factory can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRoute {
    Create,
    Read,
    ReadBulk,
    ReadById,
    UpdateById,
    DeleteById,
    DeleteBulk,
}

const ALL_ROUTES: [ResourceRoute; 7] = [
    ResourceRoute::Create,
    ResourceRoute::Read,
    ResourceRoute::ReadBulk,
    ResourceRoute::ReadById,
    ResourceRoute::UpdateById,
    ResourceRoute::DeleteById,
    ResourceRoute::DeleteBulk,
];

/// Ceiling on documents a bulk operation will scan in one request.
const BULK_SCAN_CEILING: usize = 1000;

/// Options controlling what the factory generates.
pub struct ResourceOptions {
    indexes: Vec<IndexSpec>,
    enable: Vec<ResourceRoute>,
    changelog: bool,
    schema: Option<Value>,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            indexes: Vec::new(),
            enable: ALL_ROUTES.to_vec(),
            changelog: false,
            schema: None,
        }
    }
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an index on first creation of the backing collection.
    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes.push(spec);
        self
    }

    /// Generate only the given operations.
    pub fn enable(mut self, routes: impl IntoIterator<Item = ResourceRoute>) -> Self {
        self.enable = routes.into_iter().collect();
        self
    }

    /// Back the resource with a changelog collection and attach the
    /// change-logging hooks to the update route.
    pub fn with_changelog(mut self) -> Self {
        self.changelog = true;
        self
    }

    /// Attach a request schema to the create and update routes
    /// (pass-through config, deep-merged downward).
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Build the collection-marked node for one resource.
///
/// Mount the returned node under the key `name` so the collection name
/// derived from the path prefix matches the backing collection.
pub fn resource_routes(name: &str, options: ResourceOptions) -> DefinitionNode {
    let mut spec = CollectionSpec::new();
    for index in options.indexes {
        spec = spec.index(index);
    }
    if options.changelog {
        spec = spec.with_changelog();
    }

    let mut node = DefinitionNode::new().collection(spec);
    let name = name.to_string();

    for route in &options.enable {
        match route {
            ResourceRoute::Create => {
                let mut definition = RouteDefinition::post(Arc::new(CreateResource));
                if let Some(schema) = &options.schema {
                    definition = definition.schema(json!({ "body": schema }));
                }
                node = node.route("create", definition);
            }
            ResourceRoute::Read => {
                node = node.route("read", RouteDefinition::get(Arc::new(ReadResource)));
            }
            ResourceRoute::ReadBulk => {
                node = node.route("query", RouteDefinition::post(Arc::new(ReadResourceBulk)));
            }
            ResourceRoute::ReadById => {
                node = node.route(
                    "readById",
                    RouteDefinition::get(Arc::new(ReadResourceById)).path("/{id}"),
                );
            }
            ResourceRoute::UpdateById => {
                let mut definition =
                    RouteDefinition::patch(Arc::new(UpdateResourceById)).path("/{id}");
                if let Some(schema) = &options.schema {
                    definition = definition.schema(json!({ "body": schema }));
                }
                if options.changelog {
                    definition = definition
                        .hook(
                            LifecycleStage::PreHandler,
                            "captureOldState",
                            Arc::new(CaptureOldState),
                        )
                        .hook(LifecycleStage::OnResponse, "logChanges", Arc::new(LogChanges));
                }
                node = node.route("updateById", definition);
            }
            ResourceRoute::DeleteById => {
                node = node.route(
                    "deleteById",
                    RouteDefinition::delete(Arc::new(DeleteResourceById)).path("/{id}"),
                );
            }
            ResourceRoute::DeleteBulk => {
                node = node.route("bulk", RouteDefinition::delete(Arc::new(DeleteResourceBulk)));
            }
        }
    }

    tracing::debug!(resource = %name, routes = options.enable.len(), "Resource routes generated");
    node
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn body_object(ctx: &RequestContext) -> Result<Map<String, Value>, HookError> {
    match &ctx.body {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(HookError::BadRequest("expected a JSON object".to_string())),
        None => Err(HookError::BadRequest("missing request body".to_string())),
    }
}

fn id_param(ctx: &RequestContext) -> Result<String, HookError> {
    ctx.param("id")
        .map(str::to_string)
        .ok_or_else(|| HookError::BadRequest("missing 'id' path parameter".to_string()))
}

struct CreateResource;

#[async_trait]
impl RouteHandler for CreateResource {
    fn name(&self) -> &str {
        "createResourceHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        let mut doc = body_object(ctx)?;
        let now = now_millis();
        doc.insert("createdAt".to_string(), json!(now));
        doc.insert("updatedAt".to_string(), json!(now));
        doc.insert("_version".to_string(), json!(1));

        let bindings = ctx.require_bindings()?;
        let stored = bindings.docs.insert(Value::Object(doc)).await?;
        Ok(Reply::created(stored))
    }
}

struct ReadResource;

#[async_trait]
impl RouteHandler for ReadResource {
    fn name(&self) -> &str {
        "readResourceHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        let limit = ctx
            .query
            .get("limit")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(50);

        let bindings = ctx.require_bindings()?;
        let results = bindings.docs.list(limit).await?;
        Ok(Reply::ok(json!({
            "data": results,
            "pagination": { "count": results.len() },
        })))
    }
}

/// `true` when every filter field matches the document exactly.
fn matches_filter(doc: &Value, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(field, expected)| doc.get(field) == Some(expected))
}

struct ReadResourceBulk;

#[async_trait]
impl RouteHandler for ReadResourceBulk {
    fn name(&self) -> &str {
        "readResourceByPostHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        let (filter, limit) = match &ctx.body {
            Some(Value::Object(map)) => {
                let filter = match map.get("filter") {
                    Some(Value::Object(fields)) => fields.clone(),
                    Some(_) => {
                        return Err(HookError::BadRequest(
                            "'filter' must be an object".to_string(),
                        ))
                    }
                    None => Map::new(),
                };
                let limit = map
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(50)
                    .min(BULK_SCAN_CEILING as u64) as usize;
                (filter, limit)
            }
            Some(_) => {
                return Err(HookError::BadRequest("expected a JSON object".to_string()))
            }
            None => (Map::new(), 50),
        };

        let bindings = ctx.require_bindings()?;
        let results: Vec<Value> = bindings
            .docs
            .list(BULK_SCAN_CEILING)
            .await?
            .into_iter()
            .filter(|doc| matches_filter(doc, &filter))
            .take(limit)
            .collect();
        Ok(Reply::ok(json!({
            "data": results,
            "pagination": { "count": results.len() },
        })))
    }
}

struct DeleteResourceBulk;

#[async_trait]
impl RouteHandler for DeleteResourceBulk {
    fn name(&self) -> &str {
        "deleteResourceBulkHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        // Query params select the documents; values parse as JSON where
        // possible so `?price=5` matches a numeric field.
        let filter: Map<String, Value> = ctx
            .query
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "limit" | "sort" | "cursor" | "fields"))
            .map(|(key, raw)| {
                let value = serde_json::from_str::<Value>(raw)
                    .unwrap_or_else(|_| Value::String(raw.clone()));
                (key.clone(), value)
            })
            .collect();

        let bindings = ctx.require_bindings()?;
        let candidates = bindings.docs.list(BULK_SCAN_CEILING).await?;
        let mut deleted = 0u64;
        for doc in candidates {
            if !matches_filter(&doc, &filter) {
                continue;
            }
            let Some(key) = doc.get("_key").and_then(Value::as_str) else {
                continue;
            };
            if bindings.docs.remove(key).await? {
                deleted += 1;
            }
        }
        Ok(Reply::ok(json!({ "deletedCount": deleted })))
    }
}

struct ReadResourceById;

#[async_trait]
impl RouteHandler for ReadResourceById {
    fn name(&self) -> &str {
        "readResourceByIdHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        let id = id_param(ctx)?;
        let bindings = ctx.require_bindings()?;
        match bindings.docs.fetch(&id).await? {
            Some(doc) => Ok(Reply::ok(doc)),
            None => Ok(Reply::not_found("Not Found")),
        }
    }
}

struct UpdateResourceById;

#[async_trait]
impl RouteHandler for UpdateResourceById {
    fn name(&self) -> &str {
        "updateResourceByIdHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        let id = id_param(ctx)?;
        let patch = body_object(ctx)?;

        let bindings = ctx.require_bindings()?;
        let Some(existing) = bindings.docs.fetch(&id).await? else {
            return Ok(Reply::not_found("Not Found"));
        };

        let mut doc = match existing {
            Value::Object(map) => map,
            other => {
                return Err(HookError::Internal(format!(
                    "stored document is not an object: {other}"
                )))
            }
        };
        let version = doc.get("_version").and_then(Value::as_u64).unwrap_or(0);
        for (key, value) in patch {
            doc.insert(key, value);
        }
        doc.insert("updatedAt".to_string(), json!(now_millis()));
        doc.insert("_version".to_string(), json!(version + 1));

        let updated = Value::Object(doc);
        bindings.docs.replace(&id, updated.clone()).await?;
        Ok(Reply::ok(updated))
    }
}

struct DeleteResourceById;

#[async_trait]
impl RouteHandler for DeleteResourceById {
    fn name(&self) -> &str {
        "deleteResourceByIdHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        let id = id_param(ctx)?;
        let bindings = ctx.require_bindings()?;
        if bindings.docs.remove(&id).await? {
            Ok(Reply::no_content())
        } else {
            Ok(Reply::not_found("Not Found"))
        }
    }
}
