//! The asset manager: the public face of the resource system.

use std::any::{Any, TypeId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use astrelis_core::collections::{HashMap, HashSet};
use astrelis_core::profiling::{profile_function, profile_scope};
use parking_lot::{Mutex, RwLock};

use crate::Asset;
use crate::config::AssetManagerConfig;
use crate::error::{AssetError, AssetResult};
use crate::event::{AssetEvent, AssetEventBuffer};
use crate::factory::{AssetFactory, FactoryRegistry, LoadContext, catch_load_panic, factory_fn};
use crate::handle::{Handle, StrongHandle};
use crate::id::UntypedAssetId;
use crate::io::SearchPaths;
use crate::lru::LruCacheManager;
use crate::pool::WorkerPool;
use crate::queue::{LoadJob, LoadQueue, LoadResult, LoadedAsset, ResultQueue};
use crate::registry::{AssetRegistry, ErasedRegistry};
use crate::state::LoadState;

#[cfg(feature = "hot-reload")]
use crate::hot_reload::AssetWatcher;

/// Invoked once on the owning thread when an async load settles.
///
/// Receives the loaded asset, or the error message of a failed load.
pub type LoadCallback<T> = Box<dyn FnOnce(Handle<T>, Result<Arc<T>, String>) + Send + 'static>;

type ErasedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Build the load job for `T` at `path` with whatever factory is registered now.
fn build_job<T: Asset>(factories: &FactoryRegistry, path: PathBuf) -> LoadJob {
    let factory = factories.get::<T>();
    Box::new(move || {
        let factory = factory.ok_or(AssetError::NoFactory {
            type_name: T::type_name(),
        })?;
        let asset = factory.create_dyn(&LoadContext::new(&path))?;
        let memory_size = asset.memory_size();
        Ok(LoadedAsset {
            asset: Box::new(asset),
            memory_size,
        })
    })
}

#[derive(Clone)]
struct RegistryEntry {
    erased: Arc<dyn ErasedRegistry>,
    /// The same registry as `Arc<AssetRegistry<T>>`.
    typed: Arc<dyn Any + Send + Sync>,
    /// Job builder for the registry's asset type, used by untyped reloads.
    build_job: fn(&FactoryRegistry, PathBuf) -> LoadJob,
}

impl RegistryEntry {
    fn new<T: Asset>(registry: Arc<AssetRegistry<T>>) -> Self {
        Self {
            erased: registry.clone(),
            typed: registry,
            build_job: build_job::<T>,
        }
    }

    fn downcast<T: Asset>(&self) -> Option<Arc<AssetRegistry<T>>> {
        Arc::clone(&self.typed).downcast::<AssetRegistry<T>>().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Coordinates per-type registries, the loader threads and the memory budget.
///
/// One thread owns the manager and calls [`update`](Self::update) once per
/// tick. Loader threads never touch registry state: they publish results
/// that `update` applies, fires callbacks for, and accounts in the LRU
/// tracker. Other threads may read assets concurrently through the
/// [`AssetRegistry`] returned by [`registry`](Self::registry).
///
/// # Example
///
/// ```ignore
/// let mut manager = AssetManager::new(AssetManagerConfig::default());
/// manager.register_factory(TextFactory);
/// manager.add_search_path("assets");
/// manager.initialize()?;
///
/// let handle: Handle<String> = manager.load_async("intro.txt", 0);
/// loop {
///     manager.update();
///     if let Some(text) = manager.get(&handle) {
///         println!("{}", text);
///         break;
///     }
/// }
/// ```
pub struct AssetManager {
    config: AssetManagerConfig,
    eviction_threshold: f32,
    lifecycle: Lifecycle,
    registries: RwLock<HashMap<TypeId, RegistryEntry>>,
    factories: FactoryRegistry,
    search_paths: SearchPaths,
    load_queue: LoadQueue,
    results: Arc<ResultQueue>,
    callbacks: Mutex<HashMap<UntypedAssetId, Vec<ErasedCallback>>>,
    /// Ids whose callbacks are due on the next update without a load.
    ready: Vec<UntypedAssetId>,
    /// Queued or dispatched loads that have not been applied yet.
    in_flight: HashSet<UntypedAssetId>,
    lru: LruCacheManager,
    pool: Option<WorkerPool>,
    events: AssetEventBuffer,
    #[cfg(feature = "hot-reload")]
    watcher: Option<AssetWatcher>,
}

impl AssetManager {
    /// Create a manager. Nothing runs until [`initialize`](Self::initialize).
    pub fn new(config: AssetManagerConfig) -> Self {
        let eviction_threshold = config.eviction_threshold();
        let lru = LruCacheManager::new(config.max_cache_memory_mb);
        let events = AssetEventBuffer::with_limit(config.max_buffered_events);

        Self {
            config,
            eviction_threshold,
            lifecycle: Lifecycle::Created,
            registries: RwLock::new(HashMap::new()),
            factories: FactoryRegistry::new(),
            search_paths: SearchPaths::new(),
            load_queue: LoadQueue::new(),
            results: Arc::new(ResultQueue::new()),
            callbacks: Mutex::new(HashMap::new()),
            ready: Vec::new(),
            in_flight: HashSet::new(),
            lru,
            pool: None,
            events,
            #[cfg(feature = "hot-reload")]
            watcher: None,
        }
    }

    /// Start the loader threads and, if configured, the file watcher.
    ///
    /// Calling this on a running manager does nothing. A manager that has
    /// been shut down cannot be restarted.
    pub fn initialize(&mut self) -> AssetResult<()> {
        match self.lifecycle {
            Lifecycle::Running => return Ok(()),
            Lifecycle::Stopped => return Err(AssetError::PoolStopped),
            Lifecycle::Created => {}
        }

        let workers = self.config.worker_count();
        self.pool = Some(WorkerPool::new(workers)?);
        self.lifecycle = Lifecycle::Running;

        if self.config.enable_hot_reload {
            self.start_watcher();
        }

        tracing::info!(
            "AssetManager initialized: {} loader threads, {} MB budget",
            workers,
            self.config.max_cache_memory_mb
        );
        Ok(())
    }

    #[cfg(feature = "hot-reload")]
    fn start_watcher(&mut self) {
        match AssetWatcher::new() {
            Ok(mut watcher) => {
                for dir in self.search_paths.dirs() {
                    if let Err(e) = watcher.watch_directory(dir) {
                        tracing::warn!("Cannot watch {}: {}", dir.display(), e);
                    }
                }
                self.watcher = Some(watcher);
                tracing::info!("Hot reload enabled");
            }
            Err(e) => tracing::warn!("Failed to start file watcher, hot reload disabled: {}", e),
        }
    }

    #[cfg(not(feature = "hot-reload"))]
    fn start_watcher(&mut self) {
        tracing::warn!("enable_hot_reload is set but the hot-reload feature is not compiled in");
    }

    /// Stop the loader threads and drop every asset, request and callback.
    ///
    /// Pending callbacks never fire. Handles issued before the shutdown are
    /// invalid afterwards. Asynchronous loads are refused from now on.
    pub fn shutdown(&mut self) {
        if self.lifecycle == Lifecycle::Stopped {
            return;
        }
        self.lifecycle = Lifecycle::Stopped;

        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }

        self.load_queue.clear();
        self.results.clear();
        self.callbacks.lock().clear();
        self.ready.clear();
        self.in_flight.clear();

        let freed: usize = self
            .registries
            .write()
            .drain()
            .map(|(_, entry)| entry.erased.clear())
            .sum();

        self.lru.clear();
        self.events.clear();

        #[cfg(feature = "hot-reload")]
        {
            self.watcher = None;
        }

        tracing::info!("AssetManager shut down, released {} assets", freed);
    }

    /// Check whether [`initialize`](Self::initialize) has run and
    /// [`shutdown`](Self::shutdown) has not.
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// The configuration the manager was created with.
    pub fn config(&self) -> &AssetManagerConfig {
        &self.config
    }

    // ==================== Setup ====================

    /// Register the factory used to create assets of `F::Asset`.
    pub fn register_factory<F: AssetFactory>(&mut self, factory: F) {
        tracing::debug!("Registered factory for {}", <F::Asset as Asset>::type_name());
        self.factories.register(factory);
    }

    /// Register a closure as the factory for `T`.
    pub fn register_factory_fn<T, F>(&mut self, f: F)
    where
        T: Asset,
        F: Fn(&LoadContext<'_>) -> AssetResult<T> + Send + Sync + 'static,
    {
        self.register_factory(factory_fn(f));
    }

    /// Append a directory to the search path list.
    pub fn add_search_path(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();

        #[cfg(feature = "hot-reload")]
        if let Some(watcher) = &mut self.watcher
            && let Err(e) = watcher.watch_directory(&dir)
        {
            tracing::warn!("Cannot watch {}: {}", dir.display(), e);
        }

        self.search_paths.add(dir);
    }

    /// Find the first existing file for `path` in the search paths.
    pub fn find_full_path(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        self.search_paths.find_full_path(path)
    }

    /// The registry for `T`, created on first use.
    pub fn registry<T: Asset>(&self) -> Arc<AssetRegistry<T>> {
        if let Some(registry) = self.try_registry::<T>() {
            return registry;
        }

        let mut registries = self.registries.write();
        if let Some(registry) = registries
            .get(&TypeId::of::<T>())
            .and_then(RegistryEntry::downcast::<T>)
        {
            return registry;
        }

        let registry = Arc::new(AssetRegistry::<T>::new());
        registries.insert(TypeId::of::<T>(), RegistryEntry::new(Arc::clone(&registry)));
        tracing::debug!("Created asset registry for {}", T::type_name());
        registry
    }

    fn try_registry<T: Asset>(&self) -> Option<Arc<AssetRegistry<T>>> {
        self.registries
            .read()
            .get(&TypeId::of::<T>())
            .and_then(RegistryEntry::downcast::<T>)
    }

    fn entry(&self, type_id: TypeId) -> Option<RegistryEntry> {
        self.registries.read().get(&type_id).cloned()
    }

    fn entries(&self) -> Vec<(TypeId, Arc<dyn ErasedRegistry>)> {
        self.registries
            .read()
            .iter()
            .map(|(type_id, entry)| (*type_id, Arc::clone(&entry.erased)))
            .collect()
    }

    fn key_for(&self, path: &Path) -> (PathBuf, String) {
        let resolved = self.search_paths.resolve(path);
        let key = resolved.to_string_lossy().into_owned();
        (resolved, key)
    }

    // ==================== Loading ====================

    /// Load `path` on the calling thread.
    ///
    /// Returns the existing handle if the path was loaded before. A failed
    /// load still returns a live handle; check [`is_loaded`](Self::is_loaded)
    /// and [`error_message`](Self::error_message).
    pub fn load_sync<T: Asset>(&mut self, path: impl AsRef<Path>) -> Handle<T> {
        let (resolved, key) = self.key_for(path.as_ref());
        let registry = self.registry::<T>();

        if let Some(handle) = registry.find_by_path(&key) {
            if let Some(size) = registry.memory_size(&handle)
                && registry.is_loaded(&handle)
            {
                self.lru.record_access(handle.untyped(), size);
            }
            return handle;
        }

        let handle = registry.allocate(&key);
        registry.set_loading(&handle);

        let job = build_job::<T>(&self.factories, resolved.clone());
        let outcome = catch_load_panic(&resolved, job);
        self.apply_result(LoadResult {
            id: handle.untyped(),
            path: resolved,
            outcome,
        });

        handle
    }

    /// Return the handle for `path`, loading it synchronously on a miss.
    ///
    /// At most one slot exists per resolved path and type.
    pub fn get_or_load<T: Asset>(&mut self, path: impl AsRef<Path>) -> Handle<T> {
        let (_, key) = self.key_for(path.as_ref());
        match self.registry::<T>().find_by_path(&key) {
            Some(handle) => handle,
            None => self.load_sync(path),
        }
    }

    /// Queue `path` for loading on a loader thread.
    ///
    /// Returns immediately with a handle in [`LoadState::Loading`]. If the
    /// path is already known, its existing handle is returned and nothing
    /// new is queued.
    ///
    /// # Panics
    ///
    /// Panics if the manager has been shut down.
    pub fn load_async<T: Asset>(&mut self, path: impl AsRef<Path>, priority: i32) -> Handle<T> {
        self.queue_load(path.as_ref(), priority, None)
    }

    /// Like [`load_async`](Self::load_async), firing `callback` on the
    /// owning thread once the load settles.
    ///
    /// For a path that is already loaded or failed, the callback fires on
    /// the next [`update`](Self::update).
    ///
    /// # Panics
    ///
    /// Panics if the manager has been shut down.
    pub fn load_async_with<T, F>(&mut self, path: impl AsRef<Path>, priority: i32, callback: F) -> Handle<T>
    where
        T: Asset,
        F: FnOnce(Handle<T>, Result<Arc<T>, String>) + Send + 'static,
    {
        self.queue_load(path.as_ref(), priority, Some(Box::new(callback)))
    }

    fn queue_load<T: Asset>(
        &mut self,
        path: &Path,
        priority: i32,
        callback: Option<LoadCallback<T>>,
    ) -> Handle<T> {
        if self.lifecycle == Lifecycle::Stopped {
            panic!(
                "{} (load_async for '{}')",
                AssetError::PoolStopped,
                path.display()
            );
        }

        let (resolved, key) = self.key_for(path);
        let registry = self.registry::<T>();

        if let Some(existing) = registry.find_by_path(&key) {
            let id = existing.untyped();
            if let Some(callback) = callback {
                self.add_callback(&registry, existing, callback);
                if !self.in_flight.contains(&id) {
                    self.ready.push(id);
                }
            }
            return existing;
        }

        let handle = registry.allocate(&key);
        registry.set_loading(&handle);
        let id = handle.untyped();

        if let Some(callback) = callback {
            self.add_callback(&registry, handle, callback);
        }

        let job = build_job::<T>(&self.factories, resolved.clone());
        self.load_queue.push(id, resolved, priority, job);
        self.in_flight.insert(id);

        tracing::trace!("Queued {} load for '{}' at priority {}", T::type_name(), key, priority);
        handle
    }

    fn add_callback<T: Asset>(
        &self,
        registry: &Arc<AssetRegistry<T>>,
        handle: Handle<T>,
        callback: LoadCallback<T>,
    ) {
        let registry = Arc::clone(registry);
        let erased: ErasedCallback = Box::new(move || {
            let outcome = match registry.get(&handle) {
                Some(asset) => Ok(asset),
                None => Err(registry.error_message(&handle).unwrap_or_else(|| {
                    AssetError::InvalidHandle {
                        reason: format!("{} {} was freed before its load settled", T::type_name(), handle.id()),
                    }
                    .to_string()
                })),
            };
            callback(handle, outcome);
        });

        self.callbacks
            .lock()
            .entry(handle.untyped())
            .or_default()
            .push(erased);
    }

    /// Drop the pending callbacks for `id`.
    ///
    /// The load itself keeps running and still updates the slot. Returns
    /// `false` if no callback was pending.
    pub fn cancel_load(&self, id: impl Into<UntypedAssetId>) -> bool {
        self.callbacks.lock().remove(&id.into()).is_some()
    }

    /// Queue a fresh load of an existing asset without changing its handle.
    ///
    /// A loaded asset keeps serving its current data until the new data
    /// arrives; if the reload fails the current data is kept. Returns
    /// `false` if the handle is stale or a load is already in flight.
    pub fn reload<T: Asset>(&mut self, handle: &Handle<T>, priority: i32) -> bool {
        self.reload_untyped(handle.untyped(), priority)
    }

    fn reload_untyped(&mut self, id: UntypedAssetId, priority: i32) -> bool {
        if self.lifecycle == Lifecycle::Stopped || self.in_flight.contains(&id) {
            return false;
        }
        let Some(entry) = self.entry(id.type_id()) else {
            return false;
        };
        let Some(path) = entry.erased.path_of(id.id()) else {
            return false;
        };
        if !entry.erased.begin_reload(id.id()) {
            return false;
        }

        let path = PathBuf::from(path);
        let job = (entry.build_job)(&self.factories, path.clone());
        tracing::debug!("Reloading '{}'", path.display());
        self.load_queue.push(id, path, priority, job);
        self.in_flight.insert(id);
        true
    }

    // ==================== Per-tick ====================

    /// Advance the manager by one tick.
    ///
    /// Dispatches a bounded batch of queued loads, applies every finished
    /// load, fires callbacks, and evicts least recently used assets if
    /// memory use is above the configured threshold.
    pub fn update(&mut self) {
        profile_function!();

        self.dispatch_pending();

        {
            profile_scope!("apply_results");
            for result in self.results.drain() {
                self.apply_result(result);
            }
        }

        for id in std::mem::take(&mut self.ready) {
            self.fire_callbacks(id);
        }

        #[cfg(feature = "hot-reload")]
        self.poll_hot_reload();

        if self.lru.memory_usage_ratio() > self.eviction_threshold {
            let target =
                (self.lru.max_memory() as f64 * self.eviction_threshold as f64 * 0.9) as usize;
            let freed = self.evict_to_bytes(target);
            tracing::debug!("Memory over threshold, evicted {} bytes", freed);
        }
    }

    fn dispatch_pending(&mut self) {
        let Some(pool) = &self.pool else {
            return;
        };

        for request in self.load_queue.pop_batch(self.config.dispatch_limit()) {
            let results = Arc::clone(&self.results);
            let (id, path, job) = (request.id, request.path, request.job);

            let submitted = pool.submit(Box::new(move || {
                let outcome = catch_load_panic(&path, job);
                results.push(LoadResult { id, path, outcome });
            }));

            if let Err(e) = submitted {
                tracing::error!("Failed to dispatch load: {}", e);
                self.in_flight.remove(&id);
                self.callbacks.lock().remove(&id);
            }
        }
    }

    fn apply_result(&mut self, result: LoadResult) {
        let LoadResult { id, path, outcome } = result;
        self.in_flight.remove(&id);

        let Some(entry) = self.entry(id.type_id()) else {
            return;
        };
        let Some(previous) = entry.erased.load_state_of(id.id()) else {
            tracing::debug!("Dropping load result for freed asset '{}'", path.display());
            self.callbacks.lock().remove(&id);
            return;
        };

        match outcome {
            Ok(LoadedAsset { asset, memory_size }) => {
                if entry.erased.set_loaded_erased(id.id(), asset, memory_size) {
                    self.lru.record_access(id, memory_size);
                    let version = entry.erased.version_of(id.id()).unwrap_or(0);
                    if previous == LoadState::Loaded {
                        tracing::debug!("Reloaded '{}' (v{})", path.display(), version);
                        self.events.push(AssetEvent::Reloaded { id, version });
                    } else {
                        tracing::debug!("Loaded '{}' ({} bytes)", path.display(), memory_size);
                        self.events.push(AssetEvent::Loaded { id, version });
                    }

                    #[cfg(feature = "hot-reload")]
                    if let Some(watcher) = &mut self.watcher {
                        watcher.register_file(&path, id);
                    }
                }
            }
            Err(e) => {
                let error = e.to_string();
                if previous == LoadState::Loaded {
                    tracing::warn!("Reload failed, keeping previous data: {}", error);
                } else {
                    tracing::warn!("{}", error);
                    entry.erased.set_failed_erased(id.id(), error.clone());
                }
                self.events.push(AssetEvent::LoadFailed { id, error });
            }
        }

        self.fire_callbacks(id);
    }

    fn fire_callbacks(&self, id: UntypedAssetId) {
        // Released before running so a slow callback doesn't hold up the table
        let pending = self.callbacks.lock().remove(&id);
        for callback in pending.into_iter().flatten() {
            callback();
        }
    }

    #[cfg(feature = "hot-reload")]
    fn poll_hot_reload(&mut self) {
        let Some(watcher) = &mut self.watcher else {
            return;
        };
        for id in watcher.poll_changes() {
            self.reload_untyped(id, crate::queue::DEFAULT_LOAD_PRIORITY);
        }
    }

    // ==================== Memory ====================

    fn pinned_ids(&self) -> HashSet<UntypedAssetId> {
        self.entries()
            .into_iter()
            .flat_map(|(type_id, registry)| {
                registry
                    .pinned_ids()
                    .into_iter()
                    .map(move |id| UntypedAssetId::new(id, type_id))
            })
            .collect()
    }

    /// Fold reads made directly through a registry into the LRU ranking.
    fn sync_access_times(&self) {
        for (type_id, registry) in self.entries() {
            self.lru.refresh_access(
                registry
                    .access_times()
                    .into_iter()
                    .map(|(id, at)| (UntypedAssetId::new(id, type_id), at)),
            );
        }
    }

    /// The assets [`evict_to_target`](Self::evict_to_target) would free,
    /// oldest first. Referenced and loading assets are never included.
    ///
    /// Reads through [`get`](Self::get) and through a shared
    /// [`registry`](Self::registry) both count as accesses.
    pub fn eviction_candidates(&self, target_mb: usize) -> Vec<UntypedAssetId> {
        self.sync_access_times();
        self.lru.eviction_candidates(target_mb, &self.pinned_ids())
    }

    /// Evict least recently used assets until usage is at most `target_mb`.
    ///
    /// Returns the bytes freed. Referenced and loading assets are skipped,
    /// so the target may not be reached.
    pub fn evict_to_target(&mut self, target_mb: usize) -> usize {
        self.evict_to_bytes(target_mb.saturating_mul(1024 * 1024))
    }

    fn evict_to_bytes(&mut self, target_bytes: usize) -> usize {
        profile_function!();

        self.sync_access_times();
        let candidates = self.lru.candidates_for_bytes(target_bytes, &self.pinned_ids());
        let mut freed = 0;
        for id in candidates {
            if let Some(size) = self.release_slot(id) {
                freed += size;
                self.events.push(AssetEvent::Evicted {
                    id,
                    memory_size: size,
                });
            }
        }
        freed
    }

    /// Free every settled asset that nobody holds a reference to, regardless
    /// of recency. Returns how many were freed.
    pub fn unload_unused(&mut self) -> usize {
        profile_function!();

        let unused: Vec<UntypedAssetId> = self
            .entries()
            .into_iter()
            .flat_map(|(type_id, registry)| {
                registry
                    .unused_ids()
                    .into_iter()
                    .map(move |id| UntypedAssetId::new(id, type_id))
            })
            .collect();

        let mut count = 0;
        for id in unused {
            if self.release_slot(id).is_some() {
                self.events.push(AssetEvent::Unloaded { id });
                count += 1;
            }
        }

        if count > 0 {
            tracing::debug!("Unloaded {} unused assets", count);
        }
        count
    }

    /// Evict one unreferenced, settled slot and forget it everywhere.
    fn release_slot(&mut self, id: UntypedAssetId) -> Option<usize> {
        let entry = self.entry(id.type_id())?;
        #[cfg(feature = "hot-reload")]
        let path = entry.erased.path_of(id.id());

        let size = entry.erased.evict(id.id())?;
        self.forget(id);

        #[cfg(feature = "hot-reload")]
        if let (Some(watcher), Some(path)) = (&mut self.watcher, path) {
            watcher.unregister_file(path, id);
        }

        Some(size)
    }

    fn forget(&mut self, id: UntypedAssetId) {
        self.lru.remove(id);
        self.callbacks.lock().remove(&id);
        self.in_flight.remove(&id);
        self.load_queue.remove(id);
    }

    /// Free `handle` immediately, whatever its state or reference count.
    ///
    /// A load still in flight for it is discarded when it finishes.
    pub fn unload<T: Asset>(&mut self, handle: &Handle<T>) -> bool {
        let Some(registry) = self.try_registry::<T>() else {
            return false;
        };

        #[cfg(feature = "hot-reload")]
        let path = registry.path(handle);

        if !registry.free(handle) {
            return false;
        }

        let id = handle.untyped();
        self.forget(id);
        self.events.push(AssetEvent::Unloaded { id });

        #[cfg(feature = "hot-reload")]
        if let (Some(watcher), Some(path)) = (&mut self.watcher, path) {
            watcher.unregister_file(path, id);
        }

        true
    }

    /// Change the memory budget. Eviction happens on the next update.
    pub fn set_max_memory(&mut self, max_mb: usize) {
        self.config.max_cache_memory_mb = max_mb;
        self.lru.set_max_memory_mb(max_mb);
    }

    /// The LRU tracker.
    pub fn lru(&self) -> &LruCacheManager {
        &self.lru
    }

    // ==================== Reference counting ====================

    /// Take a reference; referenced assets are never evicted.
    pub fn add_ref<T: Asset>(&self, handle: &Handle<T>) -> Option<u32> {
        self.try_registry::<T>()?.add_ref(handle)
    }

    /// Drop a reference taken with [`add_ref`](Self::add_ref).
    pub fn release<T: Asset>(&self, handle: &Handle<T>) -> Option<u32> {
        self.try_registry::<T>()?.release(handle)
    }

    /// Take a reference that is dropped with the returned guard.
    pub fn acquire<T: Asset>(&self, handle: &Handle<T>) -> Option<StrongHandle<T>> {
        self.try_registry::<T>()?.acquire(handle)
    }

    // ==================== Reads ====================

    /// Get the asset if it is loaded. Counts as an access for eviction.
    pub fn get<T: Asset>(&self, handle: &Handle<T>) -> Option<Arc<T>> {
        let registry = self.try_registry::<T>()?;
        let asset = registry.get(handle)?;
        if let Some(size) = registry.memory_size(handle) {
            self.lru.record_access(handle.untyped(), size);
        }
        Some(asset)
    }

    /// Check whether `handle` refers to a live slot.
    pub fn is_valid<T: Asset>(&self, handle: &Handle<T>) -> bool {
        self.try_registry::<T>()
            .is_some_and(|registry| registry.is_valid(handle))
    }

    /// Check whether the asset is loaded and readable.
    pub fn is_loaded<T: Asset>(&self, handle: &Handle<T>) -> bool {
        self.try_registry::<T>()
            .is_some_and(|registry| registry.is_loaded(handle))
    }

    /// The load state, or `None` for stale handles.
    pub fn load_state<T: Asset>(&self, handle: &Handle<T>) -> Option<LoadState> {
        self.try_registry::<T>()?.load_state(handle)
    }

    /// The error message of a failed load.
    pub fn error_message<T: Asset>(&self, handle: &Handle<T>) -> Option<String> {
        self.try_registry::<T>()?.error_message(handle)
    }

    /// Data version, bumped on every load and reload.
    pub fn version<T: Asset>(&self, handle: &Handle<T>) -> Option<u32> {
        self.try_registry::<T>()?.version(handle)
    }

    // ==================== Statistics & events ====================

    /// Bytes attributed to loaded assets.
    pub fn memory_usage(&self) -> usize {
        self.lru.current_memory_usage()
    }

    /// Memory usage divided by the budget.
    pub fn memory_usage_ratio(&self) -> f32 {
        self.lru.memory_usage_ratio()
    }

    /// Loads queued or running that have not been applied yet.
    pub fn pending_loads(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of allocated slots across every type.
    pub fn asset_count(&self) -> usize {
        self.registries
            .read()
            .values()
            .map(|entry| entry.erased.len())
            .sum()
    }

    /// Take every buffered event.
    ///
    /// Call this every tick: once `max_buffered_events` are waiting, the
    /// oldest ones are dropped.
    pub fn drain_events(&mut self) -> Vec<AssetEvent> {
        self.events.drain()
    }

    /// Take the buffered events about `T`, leaving the rest.
    pub fn drain_events_for<T: Asset>(&mut self) -> Vec<AssetEvent> {
        self.events.drain_for::<T>()
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new(AssetManagerConfig::default())
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManager")
            .field("lifecycle", &self.lifecycle)
            .field("assets", &self.asset_count())
            .field("pending_loads", &self.pending_loads())
            .field("memory_usage", &self.memory_usage())
            .finish()
    }
}
