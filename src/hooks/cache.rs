//! Response caching hooks.
//!
//! # Responsibilities
//! - Serve cached replies for GET requests at the `onRequest` stage
//! - Store successful replies at the `onSend` stage
//! - Evict entries after a TTL or a configurable number of hits
//!
//! # Design Decisions
//! - Cache keyed by the full request path, so two tenants never share entries
//! - Tunables (TTL, max hits) come from [`DynamicSettings`] on every lookup,
//!   so an admin change takes effect without a restart
//! - The two hooks communicate through the `cache.eligible` state key; the
//!   onSend side never caches a reply the onRequest side did not clear

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::Method;
use serde_json::Value;

use crate::config::settings::{keys, DynamicSettings};
use crate::pipeline::{HookError, HookFlow, Reply, RequestContext, RequestHook};

const ELIGIBLE_STATE_KEY: &str = "cache.eligible";

struct CacheEntry {
    reply: Reply,
    stored_at: Instant,
    hits: u32,
}

/// Shared in-process response cache.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    settings: Arc<DynamicSettings>,
}

impl ResponseCache {
    pub fn new(settings: Arc<DynamicSettings>) -> Self {
        Self {
            entries: DashMap::new(),
            settings,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Cached paths with hit counts, for the admin surface.
    pub fn snapshot(&self) -> Vec<(String, u32)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().hits))
            .collect()
    }

    async fn ttl(&self) -> Duration {
        Duration::from_secs(self.settings.get_u64(keys::CACHE_TTL_SECONDS, 120).await)
    }

    async fn max_hits(&self) -> u32 {
        self.settings.get_u64(keys::CACHE_MAX_HITS, 5).await as u32
    }
}

/// `onRequest` hook: serve from cache or mark the request cacheable.
pub struct CacheOnRequest {
    cache: Arc<ResponseCache>,
}

impl CacheOnRequest {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl RequestHook for CacheOnRequest {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        if ctx.method != Method::GET {
            tracing::debug!(request_id = %ctx.request_id, path = %ctx.path, "Cache bypass");
            return Ok(HookFlow::Continue);
        }

        let ttl = self.cache.ttl().await;
        let max_hits = self.cache.max_hits().await;
        let key = ctx.path.clone();

        if let Some(mut entry) = self.cache.entries.get_mut(&key) {
            if entry.stored_at.elapsed() >= ttl {
                drop(entry);
                self.cache.entries.remove(&key);
            } else if entry.hits >= max_hits {
                drop(entry);
                self.cache.entries.remove(&key);
                tracing::debug!(request_id = %ctx.request_id, path = %key, "Cache entry expired by hits");
                ctx.add_header("X-Cache", "EXPIRED-HITS");
                ctx.put_state(ELIGIBLE_STATE_KEY, Value::Bool(true));
                return Ok(HookFlow::Continue);
            } else {
                entry.hits += 1;
                let hits = entry.hits;
                let reply = entry
                    .reply
                    .clone()
                    .with_header("X-Cache", "HIT")
                    .with_header("X-Cache-Hits", hits.to_string());
                tracing::debug!(request_id = %ctx.request_id, path = %key, hits, "Cache hit");
                return Ok(HookFlow::Respond(reply));
            }
        }

        tracing::debug!(request_id = %ctx.request_id, path = %key, "Cache miss");
        ctx.add_header("X-Cache", "MISS");
        ctx.put_state(ELIGIBLE_STATE_KEY, Value::Bool(true));
        Ok(HookFlow::Continue)
    }
}

/// `onSend` hook: store the reply produced for a cacheable request.
pub struct CacheOnSend {
    cache: Arc<ResponseCache>,
}

impl CacheOnSend {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl RequestHook for CacheOnSend {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        if ctx.state(ELIGIBLE_STATE_KEY) != Some(&Value::Bool(true)) {
            return Ok(HookFlow::Continue);
        }

        let Some(reply) = ctx.reply.as_ref() else {
            return Ok(HookFlow::Continue);
        };
        if reply.status.as_u16() >= 300 {
            return Ok(HookFlow::Continue);
        }

        self.cache.entries.insert(
            ctx.path.clone(),
            CacheEntry {
                reply: reply.clone(),
                stored_at: Instant::now(),
                hits: 0,
            },
        );
        tracing::debug!(request_id = %ctx.request_id, path = %ctx.path, "Cache written");
        Ok(HookFlow::Continue)
    }
}
