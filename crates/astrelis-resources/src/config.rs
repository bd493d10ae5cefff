//! Asset manager configuration.

use crate::pool::WorkerPool;

/// Configuration for an [`AssetManager`](crate::manager::AssetManager).
///
/// # Example
///
/// ```ignore
/// let config = AssetManagerConfig::default()
///     .with_max_cache_memory_mb(256)
///     .with_async_worker_count(4);
/// let mut manager = AssetManager::new(config);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AssetManagerConfig {
    /// Memory budget for loaded assets, in megabytes.
    pub max_cache_memory_mb: usize,

    /// Loader threads. 0 picks one less than the number of cores.
    pub async_worker_count: usize,

    /// Usage ratio above which `update` starts evicting.
    pub lru_eviction_threshold: f32,

    /// Watch search paths and reload changed files.
    pub enable_hot_reload: bool,

    /// Most queued loads handed to the workers per `update`.
    pub max_dispatch_per_update: usize,

    /// Most undrained events kept; older ones are dropped. Zero means unbounded.
    pub max_buffered_events: usize,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            max_cache_memory_mb: 512,
            async_worker_count: 2,
            lru_eviction_threshold: 0.8,
            enable_hot_reload: false,
            max_dispatch_per_update: 16,
            max_buffered_events: 4096,
        }
    }
}

impl AssetManagerConfig {
    /// Set the memory budget.
    pub fn with_max_cache_memory_mb(mut self, mb: usize) -> Self {
        self.max_cache_memory_mb = mb;
        self
    }

    /// Set the number of loader threads.
    pub fn with_async_worker_count(mut self, count: usize) -> Self {
        self.async_worker_count = count;
        self
    }

    /// Set the eviction threshold.
    pub fn with_lru_eviction_threshold(mut self, threshold: f32) -> Self {
        self.lru_eviction_threshold = threshold;
        self
    }

    /// Enable or disable hot reload.
    pub fn with_hot_reload(mut self, enabled: bool) -> Self {
        self.enable_hot_reload = enabled;
        self
    }

    /// Set how many queued loads each `update` may dispatch.
    pub fn with_max_dispatch_per_update(mut self, count: usize) -> Self {
        self.max_dispatch_per_update = count;
        self
    }

    /// Set how many undrained events are kept. Zero means unbounded.
    pub fn with_max_buffered_events(mut self, count: usize) -> Self {
        self.max_buffered_events = count;
        self
    }

    /// The number of loader threads to start.
    pub fn worker_count(&self) -> usize {
        match self.async_worker_count {
            0 => WorkerPool::default_thread_count(),
            n => n,
        }
    }

    /// The eviction threshold clamped to `(0, 1]`.
    pub fn eviction_threshold(&self) -> f32 {
        let threshold = self.lru_eviction_threshold;
        if threshold > 0.0 && threshold <= 1.0 {
            return threshold;
        }

        let clamped = if threshold > 1.0 { 1.0 } else { 0.8 };
        tracing::warn!(
            "lru_eviction_threshold {} is outside (0, 1], using {}",
            threshold,
            clamped
        );
        clamped
    }

    /// Dispatch limit per `update`, at least 1.
    pub fn dispatch_limit(&self) -> usize {
        self.max_dispatch_per_update.max(1)
    }
}
