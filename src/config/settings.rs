//! Dynamic runtime settings.
//!
//! # Responsibilities
//! - Serve frequently-read tunables (cache TTL, max hits) without hitting
//!   the settings source on every request
//! - Refresh a snapshot after an explicit TTL
//! - Support explicit invalidation when settings are updated
//!
//! # Design Decisions
//! - Explicitly owned and injected into the hooks that need it; never
//!   ambient module state
//! - On source failure the last known snapshot is served (stale beats down)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Where dynamic settings come from.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn fetch_all(&self) -> Result<HashMap<String, String>, String>;
}

/// A fixed in-memory source; the demo deployment and tests use this.
pub struct StaticSource {
    values: Mutex<HashMap<String, String>>,
}

impl StaticSource {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self {
            values: Mutex::new(values),
        }
    }

    /// Replace values in the source. Callers should invalidate the consuming
    /// [`DynamicSettings`] afterwards.
    pub fn update(&self, updates: HashMap<String, String>) {
        let mut values = self.values.lock().expect("settings source lock");
        values.extend(updates);
    }
}

#[async_trait]
impl SettingsSource for StaticSource {
    async fn fetch_all(&self) -> Result<HashMap<String, String>, String> {
        Ok(self.values.lock().expect("settings source lock").clone())
    }
}

struct Snapshot {
    values: HashMap<String, String>,
    fetched_at: Option<Instant>,
}

/// TTL-cached snapshot over a [`SettingsSource`].
pub struct DynamicSettings {
    source: Box<dyn SettingsSource>,
    ttl: Duration,
    snapshot: Mutex<Snapshot>,
}

impl DynamicSettings {
    pub fn new(source: Box<dyn SettingsSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: Mutex::new(Snapshot {
                values: HashMap::new(),
                fetched_at: None,
            }),
        }
    }

    /// Read one setting, refreshing the snapshot if it has expired.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.refresh_if_stale().await;
        let snapshot = self.snapshot.lock().expect("settings snapshot lock");
        snapshot.values.get(key).cloned()
    }

    /// Read a setting and parse it, falling back when absent or malformed.
    pub async fn get_u64(&self, key: &str, default: u64) -> u64 {
        match self.get(key).await {
            Some(raw) => raw.parse().unwrap_or(default),
            None => default,
        }
    }

    /// All current settings (refreshing first); for the admin surface.
    pub async fn all(&self) -> HashMap<String, String> {
        self.refresh_if_stale().await;
        let snapshot = self.snapshot.lock().expect("settings snapshot lock");
        snapshot.values.clone()
    }

    /// Drop the snapshot; the next read fetches from the source.
    pub fn invalidate(&self) {
        let mut snapshot = self.snapshot.lock().expect("settings snapshot lock");
        snapshot.fetched_at = None;
    }

    async fn refresh_if_stale(&self) {
        {
            let snapshot = self.snapshot.lock().expect("settings snapshot lock");
            if let Some(fetched_at) = snapshot.fetched_at {
                if fetched_at.elapsed() < self.ttl {
                    return;
                }
            }
        }

        match self.source.fetch_all().await {
            Ok(values) => {
                let mut snapshot = self.snapshot.lock().expect("settings snapshot lock");
                snapshot.values = values;
                snapshot.fetched_at = Some(Instant::now());
            }
            Err(err) => {
                // Serve the stale snapshot rather than failing reads.
                tracing::warn!(error = %err, "Dynamic settings fetch failed, serving stale values");
            }
        }
    }
}

/// Setting keys used by the response cache hooks.
pub mod keys {
    pub const CACHE_TTL_SECONDS: &str = "CACHE_TTL_SECONDS";
    pub const CACHE_MAX_HITS: &str = "CACHE_MAX_HITS";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl SettingsSource for CountingSource {
        async fn fetch_all(&self) -> Result<HashMap<String, String>, String> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(HashMap::from([("N".to_string(), n.to_string())]))
        }
    }

    #[tokio::test]
    async fn test_snapshot_reused_within_ttl() {
        let settings = DynamicSettings::new(
            Box::new(CountingSource {
                fetches: AtomicUsize::new(0),
            }),
            Duration::from_secs(60),
        );
        assert_eq!(settings.get("N").await.as_deref(), Some("1"));
        assert_eq!(settings.get("N").await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let settings = DynamicSettings::new(
            Box::new(CountingSource {
                fetches: AtomicUsize::new(0),
            }),
            Duration::from_secs(60),
        );
        assert_eq!(settings.get("N").await.as_deref(), Some("1"));
        settings.invalidate();
        assert_eq!(settings.get("N").await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_get_u64_falls_back() {
        let settings = DynamicSettings::new(
            Box::new(StaticSource::new(HashMap::from([(
                "GOOD".to_string(),
                "7".to_string(),
            )]))),
            Duration::from_secs(60),
        );
        assert_eq!(settings.get_u64("GOOD", 1).await, 7);
        assert_eq!(settings.get_u64("MISSING", 42).await, 42);
    }
}
