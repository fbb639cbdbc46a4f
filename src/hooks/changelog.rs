//! Change logging for collection-backed routes.
//!
//! Two cooperating hooks: `CaptureOldState` runs at `preHandler` and stashes
//! the document as it was before the handler mutates it; `LogChanges` runs at
//! `onResponse`, diffs the stashed state against the reply payload, and writes
//! an entry to the resource's changelog collection.
//!
//! Bookkeeping fields (`_key`, `createdAt`, `updatedAt`) are excluded from
//! the diff so that a timestamp touch alone never produces an entry.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::pipeline::{HookError, HookFlow, RequestContext, RequestHook};

const OLD_STATE_KEY: &str = "changelog.oldState";

const IGNORED_FIELDS: [&str; 3] = ["_key", "createdAt", "updatedAt"];

/// Field-by-field shallow diff of two JSON objects.
///
/// Each changed field maps to `{ "from": old, "to": new }`; fields in
/// [`IGNORED_FIELDS`] never appear. Non-object inputs yield an empty diff.
pub fn generate_diff(old: &Value, new: &Value) -> Map<String, Value> {
    let mut diff = Map::new();
    let (Some(old_obj), Some(new_obj)) = (old.as_object(), new.as_object()) else {
        return diff;
    };

    let mut keys: Vec<&String> = old_obj.keys().chain(new_obj.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        if IGNORED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let old_value = old_obj.get(key).unwrap_or(&Value::Null);
        let new_value = new_obj.get(key).unwrap_or(&Value::Null);
        if old_value != new_value {
            diff.insert(key.clone(), json!({ "from": old_value, "to": new_value }));
        }
    }
    diff
}

/// `preHandler` hook: fetch the document before the handler replaces it.
pub struct CaptureOldState;

#[async_trait]
impl RequestHook for CaptureOldState {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        let Some(id) = ctx.param("id").map(str::to_string) else {
            return Ok(HookFlow::Continue);
        };

        let bindings = ctx.require_bindings()?;
        if let Some(old) = bindings.docs.fetch(&id).await? {
            ctx.put_state(OLD_STATE_KEY, old);
        }
        Ok(HookFlow::Continue)
    }
}

/// `onResponse` hook: diff old vs. new state and persist the entry.
pub struct LogChanges;

#[async_trait]
impl RequestHook for LogChanges {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        let Some(old) = ctx.state(OLD_STATE_KEY).cloned() else {
            return Ok(HookFlow::Continue);
        };
        let Some(reply) = ctx.reply.as_ref() else {
            return Ok(HookFlow::Continue);
        };
        if reply.status.as_u16() >= 300 {
            return Ok(HookFlow::Continue);
        }

        let diff = generate_diff(&old, &reply.body);
        if diff.is_empty() {
            return Ok(HookFlow::Continue);
        }

        let Some(changelog) = ctx
            .bindings
            .as_ref()
            .and_then(|bindings| bindings.changelog.clone())
        else {
            // Resource was declared without change logging; nothing to write.
            return Ok(HookFlow::Continue);
        };

        let document_id = reply.body.get("_key").cloned().unwrap_or(Value::Null);
        let changed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let entry = json!({
            "documentId": document_id,
            "diff": diff,
            "length": diff.len(),
            "changedAt": changed_at,
        });

        if let Err(err) = changelog.insert(entry).await {
            // A changelog failure must not fail the request itself.
            tracing::error!(
                request_id = %ctx.request_id,
                collection = %changelog.name(),
                error = %err,
                "Failed to write changelog entry"
            );
        }
        Ok(HookFlow::Continue)
    }
}
