use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::util::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Orgs,
    Repos,
    PullRequests,
    Issues,
    Events,
}

impl CacheKind {
    pub fn file_name(self) -> &'static str {
        match self {
            CacheKind::Orgs => "orgs.json",
            CacheKind::Repos => "repos.json",
            CacheKind::PullRequests => "prs.json",
            CacheKind::Issues => "issues.json",
            CacheKind::Events => "events.json",
        }
    }

    fn metric_name(self) -> &'static str {
        match self {
            CacheKind::Orgs => "orgs",
            CacheKind::Repos => "repos",
            CacheKind::PullRequests => "pr",
            CacheKind::Issues => "issues",
            CacheKind::Events => "events",
        }
    }
}

/// One persisted keyed map. Readers share the map; writers are exclusive.
/// Saving is serialized by a lock owned by this kind alone, so persisting one
/// kind never blocks mutation of another.
#[derive(Debug)]
pub struct CacheFile<V> {
    kind: CacheKind,
    path: PathBuf,
    entries: RwLock<HashMap<String, V>>,
    save_lock: Mutex<()>,
}

impl<V> CacheFile<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Load from `dir`. A missing or unreadable file yields an empty cache;
    /// the next save rewrites it.
    pub fn load(dir: &Path, kind: CacheKind) -> Self {
        let path = dir.join(kind.file_name());
        let entries = read_entries(&path, kind);
        debug!(kind = ?kind, count = entries.len(), "Cache loaded");
        Self {
            kind,
            path,
            entries: RwLock::new(entries),
            save_lock: Mutex::new(()),
        }
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn put(&self, key: impl Into<String>, value: V) {
        self.entries.write().await.insert(key.into(), value);
    }

    pub async fn delete(&self, key: &str) -> Option<V> {
        self.entries.write().await.remove(key)
    }

    /// Mutate an entry in place under the write lock.
    pub async fn update<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.entries.write().await.get_mut(key).map(f)
    }

    /// Run `f` against the whole map under the read lock.
    pub async fn read<R>(&self, f: impl FnOnce(&HashMap<String, V>) -> R) -> R {
        f(&*self.entries.read().await)
    }

    /// Run `f` against the whole map under the write lock.
    pub async fn write<R>(&self, f: impl FnOnce(&mut HashMap<String, V>) -> R) -> R {
        f(&mut *self.entries.write().await)
    }

    pub async fn retain(&self, mut keep: impl FnMut(&str, &V) -> bool) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, v| keep(k.as_str(), v));
        before - entries.len()
    }

    pub async fn snapshot(&self) -> HashMap<String, V> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Write the current map to disk as pretty JSON, via a temp file renamed
    /// into place.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let content = {
            let entries = self.entries.read().await;
            serde_json::to_string_pretty(&*entries)
                .with_context(|| format!("Failed to serialize {:?} cache", self.kind))?
        };

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create cache directory: {}", dir.display())
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace cache file: {}", self.path.display()))?;

        debug!(kind = ?self.kind, "Cache saved");
        Ok(())
    }

    /// Drop every entry and remove the file.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        self.entries.write().await.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove cache file: {}", self.path.display())
            })?;
            debug!(kind = ?self.kind, "Cache invalidated");
        }
        Ok(())
    }
}

fn read_entries<V: DeserializeOwned>(path: &Path, kind: CacheKind) -> HashMap<String, V> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No readable cache file");
            metrics::record(&format!("data.load{}cache.readerror", kind.metric_name()));
            return HashMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse cache file");
            metrics::record(&format!("data.load{}cache.unmarshallerror", kind.metric_name()));
            HashMap::new()
        }
    }
}
