//! Per-request audit logging.
//!
//! Two cooperating hooks attached at the tenant level: `CapturePayload` runs
//! at `onSend` and stashes the outgoing payload, `AuditLogger` runs at
//! `onResponse` and writes one entry per request to the tenant's audit
//! collection. Sensitive fields are redacted and oversized values truncated
//! before anything is persisted.
//!
//! Audit-log management routes disable `auditLogger` for their own subtree,
//! otherwise every read of the log would append to it.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::pipeline::{HookError, HookFlow, RequestContext, RequestHook};

/// Collection audit entries are written to, one per tenant namespace.
pub const AUDIT_COLLECTION: &str = "auditLogs";

const PAYLOAD_KEY: &str = "audit.payload";

const SENSITIVE_KEYWORDS: [&str; 5] = ["password", "token", "secret", "apikey", "authorization"];

const MAX_STRING_LENGTH: usize = 512;
const MAX_ARRAY_ITEMS: usize = 50;

/// Replace the value of any top-level key containing a sensitive keyword
/// with `"[REDACTED]"`. Non-objects pass through unchanged.
pub fn redact_sensitive_fields(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return value.clone();
    };
    let mut out = Map::new();
    for (key, field) in map {
        let lowered = key.to_lowercase();
        if SENSITIVE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            out.insert(key.clone(), json!("[REDACTED]"));
        } else {
            out.insert(key.clone(), field.clone());
        }
    }
    Value::Object(out)
}

/// Shallow clone with long strings cut down and arrays capped, so one large
/// payload cannot bloat the audit collection.
pub fn clone_and_truncate(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.chars().take(MAX_STRING_LENGTH).collect()),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(MAX_ARRAY_ITEMS)
                .map(clone_and_truncate)
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, field) in map {
                let trimmed = match field {
                    Value::String(s) => Value::String(s.chars().take(MAX_STRING_LENGTH).collect()),
                    other => other.clone(),
                };
                out.insert(key.clone(), trimmed);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn sanitized(value: &Value) -> Value {
    redact_sensitive_fields(&clone_and_truncate(value))
}

fn map_to_value(map: &HashMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `onSend` hook: stash the outgoing payload for the audit writer.
pub struct CapturePayload;

#[async_trait]
impl RequestHook for CapturePayload {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        if let Some(reply) = ctx.reply.as_ref() {
            let payload = reply.body.clone();
            ctx.put_state(PAYLOAD_KEY, payload);
        }
        Ok(HookFlow::Continue)
    }
}

/// `onResponse` hook: write one audit entry describing the finished request.
pub struct AuditLogger;

#[async_trait]
impl RequestHook for AuditLogger {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        let Some(namespace) = ctx.namespace.clone() else {
            // Routes outside a tenant are not audited.
            return Ok(HookFlow::Continue);
        };

        let status = ctx.reply.as_ref().map(|reply| reply.status.as_u16());
        let response_body = ctx.state(PAYLOAD_KEY).cloned().unwrap_or(Value::Null);

        let entry = json!({
            "timestamp": now_millis(),
            "requestId": ctx.request_id,
            "tenantName": ctx.param("tenantName"),
            "method": ctx.method.as_str(),
            "path": ctx.path,
            "statusCode": status,
            "query": sanitized(&map_to_value(&ctx.query)),
            "params": sanitized(&map_to_value(&ctx.params)),
            "requestBody": ctx.body.as_ref().map(sanitized).unwrap_or(Value::Null),
            "responseBody": sanitized(&response_body),
        });

        if let Err(err) = namespace.insert(AUDIT_COLLECTION, entry).await {
            // An audit failure must never fail the request it describes.
            tracing::error!(
                request_id = %ctx.request_id,
                collection = AUDIT_COLLECTION,
                error = %err,
                "Failed to write audit entry"
            );
        }
        Ok(HookFlow::Continue)
    }
}
