//! Bounded, time-limited cache of loaded indices in front of an `IndexStore`.

use crate::traits::IndexStore;
use crate::{DocumentId, StoreError, VectorIndex};
use async_trait::async_trait;
use moka::future::Cache;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct IndexCacheConfig {
    pub max_capacity: u64,
    pub ttl: Duration,
}

impl Default for IndexCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 16,
            ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// A load only stays cached if no `save` for the same id started while it
/// was reading, so a finished save is never shadowed by an older index.
pub struct CachedIndexStore<S> {
    inner: S,
    cache: Cache<DocumentId, Arc<VectorIndex>>,
    generations: Mutex<HashMap<DocumentId, u64>>,
    stats: Arc<CacheStats>,
}

impl<S: IndexStore> CachedIndexStore<S> {
    pub fn new(inner: S, config: IndexCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();

        Self {
            inner,
            cache,
            generations: Mutex::new(HashMap::new()),
            stats: Arc::new(CacheStats::default()),
        }
    }

    fn generation(&self, document_id: &DocumentId) -> u64 {
        let generations = self.generations.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        generations.get(document_id).copied().unwrap_or(0)
    }

    fn bump_generation(&self, document_id: &DocumentId) {
        let mut generations =
            self.generations.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *generations.entry(document_id.clone()).or_insert(0) += 1;
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: IndexStore> IndexStore for CachedIndexStore<S> {
    async fn save(&self, document_id: &DocumentId, index: &VectorIndex) -> Result<(), StoreError> {
        self.bump_generation(document_id);
        let result = self.inner.save(document_id, index).await;
        self.cache.invalidate(document_id).await;
        result
    }

    async fn load(&self, document_id: &DocumentId) -> Result<Arc<VectorIndex>, StoreError> {
        if let Some(index) = self.cache.get(document_id).await {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!(document_id = %document_id, "index cache hit");
            return Ok(index);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.generation(document_id);
        let index = self.inner.load(document_id).await?;
        if self.generation(document_id) != generation {
            debug!(document_id = %document_id, "index replaced during load, not caching");
            return Ok(index);
        }

        self.cache.insert(document_id.clone(), Arc::clone(&index)).await;
        // A save may have started between the check and the insert.
        if self.generation(document_id) != generation {
            self.cache.invalidate(document_id).await;
        }
        Ok(index)
    }

    async fn list(&self) -> Result<BTreeSet<DocumentId>, StoreError> {
        self.inner.list().await
    }
}
