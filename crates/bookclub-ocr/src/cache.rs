//! TTL key-value stores used as a passive cache in front of metadata lookups.
//!
//! Entries are written once and never mutated; a second `put` for the same key
//! simply overwrites. Expiry is the only eviction: there is no size bound.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{OcrError, Result};

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;
}

// ─── MemoryCache ──────────────────────────────────────────────────────────────

struct MemoryEntry {
    value: Value,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if Instant::now() < entry.expires_at => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| Instant::now() >= entry.expires_at)
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }
}

// ─── DiskCache ────────────────────────────────────────────────────────────────

pub struct DiskCache {
    dir: PathBuf,
}

fn cache_key_to_path(dir: &Path, key: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let hash = hasher.finish();
    dir.join(format!("{hash:016x}.json"))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    key: String,
    stored_at_ms: u64,
    ttl_ms: u64,
    value: Value,
}

impl DiskEntry {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) >= self.ttl_ms
    }
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| OcrError::Cache(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn invalidate(&self, key: &str) -> Result<()> {
        let path = cache_key_to_path(&self.dir, key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OcrError::Cache(e.to_string())),
        }
    }
}

#[async_trait]
impl CacheStore for DiskCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = cache_key_to_path(&self.dir, key);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OcrError::Cache(e.to_string())),
        };
        let entry: DiskEntry =
            serde_json::from_slice(&data).map_err(|e| OcrError::Cache(e.to_string()))?;
        // Hash collision: a different key owns this file.
        if entry.key != key {
            return Ok(None);
        }
        if entry.is_expired(now_millis()) {
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let path = cache_key_to_path(&self.dir, key);
        let entry = DiskEntry {
            key: key.to_string(),
            stored_at_ms: now_millis(),
            ttl_ms: ttl.as_millis() as u64,
            value,
        };
        let data = serde_json::to_vec(&entry).map_err(|e| OcrError::Cache(e.to_string()))?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| OcrError::Cache(e.to_string()))
    }
}
