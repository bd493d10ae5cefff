//! Per-type generational slot table.

use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use astrelis_core::collections::HashMap;
use astrelis_core::time::now_millis;
use parking_lot::RwLock;

use crate::Asset;
use crate::handle::{Handle, StrongHandle, release_count};
use crate::id::AssetId;
use crate::slot::AssetSlot;
use crate::state::LoadState;

struct RegistryInner<T> {
    slots: Vec<AssetSlot<T>>,
    /// Vacated indices, reused oldest first.
    free: VecDeque<u32>,
    /// Lookup only; never owns anything. Entries always point at live slots.
    paths: HashMap<String, AssetId>,
    live: usize,
}

impl<T> RegistryInner<T> {
    fn slot(&self, id: AssetId) -> Option<&AssetSlot<T>> {
        let slot = self.slots.get(id.index() as usize)?;
        (slot.is_occupied() && slot.generation() == id.generation()).then_some(slot)
    }

    fn slot_mut(&mut self, id: AssetId) -> Option<&mut AssetSlot<T>> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        (slot.is_occupied() && slot.generation() == id.generation()).then_some(slot)
    }

    /// Vacate a live slot and recycle its index.
    fn release(&mut self, id: AssetId) -> Option<usize> {
        let slot = self.slot_mut(id)?;
        slot.set_state(LoadState::Unloading);
        let path = slot.path().to_owned();
        let released = slot.vacate();

        if self.paths.get(path.as_str()) == Some(&id) {
            self.paths.remove(path.as_str());
        }
        self.free.push_back(id.index());
        self.live -= 1;
        Some(released)
    }
}

/// Storage for every asset of one concrete type.
///
/// Slots are addressed by generational [`Handle`]s: freeing a slot bumps its
/// generation, so handles issued before the free can never reach the slot's
/// next occupant. A path index maps resolved paths to the slot loaded from
/// them, which is what makes loading the same path twice return the same
/// handle.
///
/// All methods take `&self`. Reads share a lock; allocation, free and data
/// updates take it exclusively, so a registry can be read from any thread
/// while its owner mutates it.
pub struct AssetRegistry<T: Asset> {
    inner: RwLock<RegistryInner<T>>,
}

impl<T: Asset> Default for AssetRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Asset> AssetRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                slots: Vec::new(),
                free: VecDeque::new(),
                paths: HashMap::new(),
                live: 0,
            }),
        }
    }

    /// Allocate a slot for `path` and return a handle stamped with the slot's
    /// current generation.
    ///
    /// The slot starts in [`LoadState::NotLoaded`] without data. An empty path
    /// is not entered into the path index.
    ///
    /// # Panics
    ///
    /// Panics if the registry has used up every slot index.
    pub fn allocate(&self, path: &str) -> Handle<T> {
        let now = now_millis();
        let mut inner = self.inner.write();

        let index = match inner.free.pop_front() {
            Some(index) => index,
            None => {
                let index = match u32::try_from(inner.slots.len()) {
                    Ok(index) if index != AssetId::INVALID_INDEX => index,
                    _ => panic!(
                        "{}",
                        crate::AssetError::CapacityExhausted {
                            type_name: T::type_name()
                        }
                    ),
                };
                inner.slots.push(AssetSlot::vacant());
                index
            }
        };

        let slot = &mut inner.slots[index as usize];
        slot.occupy(path, now);
        let id = AssetId::new(index, slot.generation());
        inner.live += 1;

        if !path.is_empty() {
            inner.paths.insert(path.to_owned(), id);
        }

        tracing::trace!("Allocated {} slot {} for '{}'", T::type_name(), id, path);
        Handle::new(id)
    }

    /// Free the slot behind `handle`.
    ///
    /// Every outstanding handle to the slot becomes invalid. Returns `false`
    /// if the handle was already invalid.
    pub fn free(&self, handle: &Handle<T>) -> bool {
        let released = self.inner.write().release(handle.id);
        if released.is_some() {
            tracing::trace!("Freed {} slot {}", T::type_name(), handle.id);
        }
        released.is_some()
    }

    /// Check whether `handle` still refers to a live slot.
    pub fn is_valid(&self, handle: &Handle<T>) -> bool {
        self.inner.read().slot(handle.id).is_some()
    }

    /// Get the asset if it is loaded. Counts as an access.
    pub fn get(&self, handle: &Handle<T>) -> Option<Arc<T>> {
        let inner = self.inner.read();
        let slot = inner.slot(handle.id)?;
        let asset = slot.asset()?;
        slot.touch(now_millis());
        Some(Arc::clone(asset))
    }

    /// Borrow the asset if it is loaded. Counts as an access.
    ///
    /// The registry stays read-locked while `f` runs.
    pub fn with<R>(&self, handle: &Handle<T>, f: impl FnOnce(&T) -> R) -> Option<R> {
        let inner = self.inner.read();
        let slot = inner.slot(handle.id)?;
        let asset = slot.asset()?;
        slot.touch(now_millis());
        Some(f(asset))
    }

    /// Replace the asset data of a valid slot.
    ///
    /// The data becomes visible once the slot is [`LoadState::Loaded`].
    pub fn set(&self, handle: &Handle<T>, asset: T) -> bool {
        let memory_size = asset.memory_size();
        self.store(handle.id, Arc::new(asset), memory_size)
    }

    fn store(&self, id: AssetId, asset: Arc<T>, memory_size: usize) -> bool {
        let mut inner = self.inner.write();
        match inner.slot_mut(id) {
            Some(slot) => {
                slot.store(asset, memory_size);
                true
            }
            None => false,
        }
    }

    /// Move a slot to `state`.
    ///
    /// Illegal transitions are rejected with a warning.
    pub fn set_load_state(&self, handle: &Handle<T>, state: LoadState) -> bool {
        self.transition(handle.id, state)
    }

    fn transition(&self, id: AssetId, state: LoadState) -> bool {
        let mut inner = self.inner.write();
        let Some(slot) = inner.slot_mut(id) else {
            return false;
        };

        let current = slot.load_state();
        if current == state {
            return true;
        }
        if !current.can_transition_to(state) {
            tracing::warn!(
                "Rejected {} slot {} transition: {} -> {}",
                T::type_name(),
                id,
                current,
                state
            );
            return false;
        }
        if state == LoadState::Loaded && !slot.has_data() {
            tracing::warn!(
                "Rejected {} slot {} transition to {}: no asset stored",
                T::type_name(),
                id,
                state
            );
            return false;
        }

        slot.set_state(state);
        true
    }

    /// Mark a slot as loading.
    pub fn set_loading(&self, handle: &Handle<T>) -> bool {
        self.transition(handle.id, LoadState::Loading)
    }

    /// Store `asset` and mark the slot loaded in one step.
    pub fn set_loaded(&self, handle: &Handle<T>, asset: T) -> bool {
        let memory_size = asset.memory_size();
        self.complete(handle.id, Arc::new(asset), memory_size)
    }

    fn complete(&self, id: AssetId, asset: Arc<T>, memory_size: usize) -> bool {
        let mut inner = self.inner.write();
        let Some(slot) = inner.slot_mut(id) else {
            return false;
        };
        if !slot.load_state().can_transition_to(LoadState::Loaded) {
            tracing::warn!(
                "Cannot complete {} slot {} in state {}",
                T::type_name(),
                id,
                slot.load_state()
            );
            return false;
        }

        slot.store(asset, memory_size);
        slot.set_state(LoadState::Loaded);
        true
    }

    /// Mark the slot failed with `message`, dropping any data.
    pub fn set_failed(&self, handle: &Handle<T>, message: impl Into<String>) -> bool {
        self.fail(handle.id, message.into())
    }

    fn fail(&self, id: AssetId, message: String) -> bool {
        let mut inner = self.inner.write();
        let Some(slot) = inner.slot_mut(id) else {
            return false;
        };
        if !slot.load_state().can_transition_to(LoadState::Failed) {
            return false;
        }

        slot.set_state(LoadState::Failed);
        slot.set_error(message);
        true
    }

    /// Get the load state of a slot.
    pub fn load_state(&self, handle: &Handle<T>) -> Option<LoadState> {
        self.inner.read().slot(handle.id).map(|s| s.load_state())
    }

    /// Check if the asset is loaded and readable.
    pub fn is_loaded(&self, handle: &Handle<T>) -> bool {
        self.load_state(handle) == Some(LoadState::Loaded)
    }

    /// The error message of a failed load.
    pub fn error_message(&self, handle: &Handle<T>) -> Option<String> {
        self.inner
            .read()
            .slot(handle.id)
            .and_then(|s| s.error_message().map(str::to_owned))
    }

    /// The path the slot was allocated for.
    pub fn path(&self, handle: &Handle<T>) -> Option<String> {
        self.inner.read().slot(handle.id).map(|s| s.path().to_owned())
    }

    /// Memory footprint of the loaded asset.
    pub fn memory_size(&self, handle: &Handle<T>) -> Option<usize> {
        self.inner.read().slot(handle.id).map(|s| s.memory_size())
    }

    /// Version of the stored data, bumped on every store.
    pub fn version(&self, handle: &Handle<T>) -> Option<u32> {
        self.inner.read().slot(handle.id).map(|s| s.version())
    }

    /// Milliseconds timestamp of the last read.
    pub fn last_access(&self, handle: &Handle<T>) -> Option<u64> {
        self.inner.read().slot(handle.id).map(|s| s.last_access())
    }

    /// Find the live handle allocated for `path`.
    pub fn find_by_path(&self, path: &str) -> Option<Handle<T>> {
        self.inner.read().paths.get(path).copied().map(Handle::new)
    }

    /// Take a reference on the slot. Returns the new count.
    pub fn add_ref(&self, handle: &Handle<T>) -> Option<u32> {
        let inner = self.inner.read();
        let slot = inner.slot(handle.id)?;
        Some(slot.ref_counter().fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Drop a reference on the slot. Returns the new count.
    ///
    /// Reaching zero does not free the slot; it only makes it eligible for
    /// eviction. Releasing a slot with no references is a caller bug; it is
    /// logged and the count stays at zero.
    pub fn release(&self, handle: &Handle<T>) -> Option<u32> {
        let inner = self.inner.read();
        let slot = inner.slot(handle.id)?;
        match release_count(slot.ref_counter()) {
            Some(count) => Some(count),
            None => {
                tracing::warn!(
                    "Unbalanced release of {} slot {} ('{}')",
                    T::type_name(),
                    handle.id,
                    slot.path()
                );
                Some(0)
            }
        }
    }

    /// Current reference count; 0 for invalid handles.
    pub fn ref_count(&self, handle: &Handle<T>) -> u32 {
        self.inner
            .read()
            .slot(handle.id)
            .map(|s| s.ref_count())
            .unwrap_or(0)
    }

    /// Take a reference that is released when the returned handle drops.
    pub fn acquire(&self, handle: &Handle<T>) -> Option<StrongHandle<T>> {
        let inner = self.inner.read();
        let slot = inner.slot(handle.id)?;
        Some(StrongHandle::new(*handle, Arc::clone(slot.ref_counter())))
    }

    /// Snapshot of every allocated handle.
    pub fn all_handles(&self) -> Vec<Handle<T>> {
        let inner = self.inner.read();
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_occupied())
            .map(|(index, slot)| Handle::new(AssetId::new(index as u32, slot.generation())))
            .collect()
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.inner.read().live
    }

    /// Check if no slot is allocated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever created, allocated or free.
    pub fn capacity(&self) -> usize {
        self.inner.read().slots.len()
    }

    /// Sum of the memory footprints of all loaded assets.
    pub fn memory_usage(&self) -> usize {
        self.inner
            .read()
            .slots
            .iter()
            .filter(|slot| slot.is_occupied())
            .map(|slot| slot.memory_size())
            .sum()
    }

    /// Free every allocated slot. Returns how many were freed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let live: Vec<AssetId> = inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_occupied())
            .map(|(index, slot)| AssetId::new(index as u32, slot.generation()))
            .collect();

        live.into_iter().filter(|id| inner.release(*id).is_some()).count()
    }

    fn ids_where(&self, predicate: impl Fn(&AssetSlot<T>) -> bool) -> Vec<AssetId> {
        let inner = self.inner.read();
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_occupied() && predicate(slot))
            .map(|(index, slot)| AssetId::new(index as u32, slot.generation()))
            .collect()
    }
}

/// The operations the manager needs on a registry without knowing its type.
pub trait ErasedRegistry: Send + Sync {
    /// Get the type ID of assets in this registry.
    fn asset_type_id(&self) -> TypeId;

    /// Human-readable asset type name.
    fn asset_type_name(&self) -> &'static str;

    /// Check whether `id` is live.
    fn is_live(&self, id: AssetId) -> bool;

    /// Load state of a live slot.
    fn load_state_of(&self, id: AssetId) -> Option<LoadState>;

    /// Path of a live slot.
    fn path_of(&self, id: AssetId) -> Option<String>;

    /// Memory footprint of a live slot.
    fn memory_size_of(&self, id: AssetId) -> Option<usize>;

    /// Data version of a live slot.
    fn version_of(&self, id: AssetId) -> Option<u32>;

    /// Prepare a slot for a reload.
    ///
    /// Failed slots go back to `Loading`; loaded slots keep serving their
    /// data. Returns `false` if the slot is gone or already loading.
    fn begin_reload(&self, id: AssetId) -> bool;

    /// Store a type-erased asset and mark the slot loaded.
    ///
    /// Returns `false` if the type doesn't match or the slot is gone.
    fn set_loaded_erased(
        &self,
        id: AssetId,
        asset: Box<dyn Any + Send + Sync>,
        memory_size: usize,
    ) -> bool;

    /// Mark a slot failed.
    fn set_failed_erased(&self, id: AssetId, message: String) -> bool;

    /// Free an unreferenced, settled slot. Returns the bytes released.
    fn evict(&self, id: AssetId) -> Option<usize>;

    /// Slots that must not be evicted: referenced or not yet settled.
    fn pinned_ids(&self) -> Vec<AssetId>;

    /// Last read time of every loaded slot.
    fn access_times(&self) -> Vec<(AssetId, u64)>;

    /// Settled slots nobody holds a reference to.
    fn unused_ids(&self) -> Vec<AssetId>;

    /// Sum of the memory footprints of all loaded assets.
    fn memory_usage(&self) -> usize;

    /// Number of allocated slots.
    fn len(&self) -> usize;

    /// Free every slot. Returns how many were freed.
    fn clear(&self) -> usize;
}

impl<T: Asset> ErasedRegistry for AssetRegistry<T> {
    fn asset_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn asset_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn is_live(&self, id: AssetId) -> bool {
        self.inner.read().slot(id).is_some()
    }

    fn load_state_of(&self, id: AssetId) -> Option<LoadState> {
        self.inner.read().slot(id).map(|s| s.load_state())
    }

    fn path_of(&self, id: AssetId) -> Option<String> {
        self.inner.read().slot(id).map(|s| s.path().to_owned())
    }

    fn memory_size_of(&self, id: AssetId) -> Option<usize> {
        self.inner.read().slot(id).map(|s| s.memory_size())
    }

    fn version_of(&self, id: AssetId) -> Option<u32> {
        self.inner.read().slot(id).map(|s| s.version())
    }

    fn begin_reload(&self, id: AssetId) -> bool {
        match self.load_state_of(id) {
            Some(LoadState::Loaded) => true,
            Some(LoadState::Failed) => self.transition(id, LoadState::Loading),
            _ => false,
        }
    }

    fn set_loaded_erased(
        &self,
        id: AssetId,
        asset: Box<dyn Any + Send + Sync>,
        memory_size: usize,
    ) -> bool {
        let Ok(typed) = asset.downcast::<T>() else {
            tracing::error!(
                "Type mismatch storing asset: expected {}, got different type",
                T::type_name()
            );
            return false;
        };

        self.complete(id, Arc::from(typed), memory_size)
    }

    fn set_failed_erased(&self, id: AssetId, message: String) -> bool {
        self.fail(id, message)
    }

    fn evict(&self, id: AssetId) -> Option<usize> {
        let mut inner = self.inner.write();
        let slot = inner.slot(id)?;
        if slot.ref_count() > 0 || !slot.load_state().is_done() {
            return None;
        }

        let memory_size = slot.memory_size();
        inner.release(id)?;
        Some(memory_size)
    }

    fn pinned_ids(&self) -> Vec<AssetId> {
        self.ids_where(|slot| slot.ref_count() > 0 || !slot.load_state().is_done())
    }

    fn access_times(&self) -> Vec<(AssetId, u64)> {
        let inner = self.inner.read();
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_occupied() && slot.load_state().is_loaded())
            .map(|(index, slot)| (AssetId::new(index as u32, slot.generation()), slot.last_access()))
            .collect()
    }

    fn unused_ids(&self) -> Vec<AssetId> {
        self.ids_where(|slot| slot.ref_count() == 0 && slot.load_state().is_done())
    }

    fn memory_usage(&self) -> usize {
        AssetRegistry::memory_usage(self)
    }

    fn len(&self) -> usize {
        AssetRegistry::len(self)
    }

    fn clear(&self) -> usize {
        AssetRegistry::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_load() {
        let registry: AssetRegistry<String> = AssetRegistry::new();

        let handle = registry.allocate("test.txt");
        assert!(registry.is_valid(&handle));
        assert_eq!(registry.load_state(&handle), Some(LoadState::NotLoaded));
        assert!(registry.get(&handle).is_none());

        assert!(registry.set_loading(&handle));
        assert!(registry.set_loaded(&handle, "Loaded!".to_string()));
        assert!(registry.is_loaded(&handle));
        assert_eq!(registry.get(&handle).as_deref().map(String::as_str), Some("Loaded!"));
        assert_eq!(registry.memory_size(&handle), Some(7));
    }

    #[test]
    fn test_set_then_state() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("a.txt");

        assert!(registry.set(&handle, "data".to_string()));
        assert!(registry.get(&handle).is_none());

        assert!(registry.set_load_state(&handle, LoadState::Loaded));
        assert!(registry.get(&handle).is_some());
    }

    #[test]
    fn test_loaded_requires_data() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("a.txt");

        assert!(!registry.set_load_state(&handle, LoadState::Loaded));
        assert_eq!(registry.load_state(&handle), Some(LoadState::NotLoaded));
        assert!(!registry.is_loaded(&handle));

        assert!(registry.set_loading(&handle));
        assert!(!registry.set_load_state(&handle, LoadState::Loaded));
        assert_eq!(registry.load_state(&handle), Some(LoadState::Loading));
    }

    #[test]
    fn test_access_times_follow_reads() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let loaded = registry.allocate("a.txt");
        registry.set_loaded(&loaded, "a".to_string());
        let _pending = registry.allocate("b.txt");

        let before = ErasedRegistry::access_times(&registry);
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].0, loaded.id());

        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.get(&loaded);
        let after = ErasedRegistry::access_times(&registry);
        assert!(after[0].1 > before[0].1);
    }

    #[test]
    fn test_free_invalidates_handle() {
        let registry: AssetRegistry<String> = AssetRegistry::new();

        let handle = registry.allocate("a.txt");
        assert!(registry.free(&handle));
        assert!(!registry.is_valid(&handle));
        assert!(!registry.free(&handle));

        let reused = registry.allocate("b.txt");
        assert_eq!(reused.id().index(), handle.id().index());
        assert_ne!(reused.id().generation(), handle.id().generation());
        assert!(!registry.is_valid(&handle));
        assert!(registry.is_valid(&reused));
    }

    #[test]
    fn test_stale_handle_cannot_mutate() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let stale = registry.allocate("a.txt");
        registry.free(&stale);
        let _fresh = registry.allocate("a.txt");

        assert!(!registry.set(&stale, "nope".to_string()));
        assert!(!registry.set_loading(&stale));
        assert!(registry.add_ref(&stale).is_none());
        assert!(registry.get(&stale).is_none());
    }

    #[test]
    fn test_find_by_path() {
        let registry: AssetRegistry<String> = AssetRegistry::new();

        let handle = registry.allocate("test.txt");
        assert_eq!(registry.find_by_path("test.txt"), Some(handle));
        assert_eq!(registry.find_by_path("other.txt"), None);

        registry.free(&handle);
        assert_eq!(registry.find_by_path("test.txt"), None);
    }

    #[test]
    fn test_free_keeps_newer_path_mapping() {
        let registry: AssetRegistry<String> = AssetRegistry::new();

        let older = registry.allocate("same.txt");
        let newer = registry.allocate("same.txt");
        registry.free(&older);

        assert_eq!(registry.find_by_path("same.txt"), Some(newer));
    }

    #[test]
    fn test_ref_counting() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("test.txt");

        assert_eq!(registry.ref_count(&handle), 0);
        assert_eq!(registry.add_ref(&handle), Some(1));
        assert_eq!(registry.add_ref(&handle), Some(2));
        assert_eq!(registry.release(&handle), Some(1));
        assert_eq!(registry.release(&handle), Some(0));

        // Unbalanced release stays at zero
        assert_eq!(registry.release(&handle), Some(0));
        assert!(registry.is_valid(&handle));
    }

    #[test]
    fn test_strong_handle_survives_free() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("a.txt");
        let strong = registry.acquire(&handle).unwrap();
        assert_eq!(registry.ref_count(&handle), 1);

        registry.free(&handle);
        let next = registry.allocate("b.txt");
        drop(strong);
        assert_eq!(registry.ref_count(&next), 0);
    }

    #[test]
    fn test_all_handles_skips_free_slots() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handles: Vec<_> = (0..5).map(|i| registry.allocate(&format!("{i}.txt"))).collect();
        registry.free(&handles[1]);
        registry.free(&handles[3]);

        let all = registry.all_handles();
        assert_eq!(all, vec![handles[0], handles[2], handles[4]]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.capacity(), 5);
    }

    #[test]
    fn test_free_list_reuses_oldest_index_first() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let a = registry.allocate("a");
        let b = registry.allocate("b");
        registry.free(&a);
        registry.free(&b);

        assert_eq!(registry.allocate("c").id().index(), a.id().index());
        assert_eq!(registry.allocate("d").id().index(), b.id().index());
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("a.txt");
        registry.set_loading(&handle);

        assert!(!registry.set_load_state(&handle, LoadState::Unloading));
        assert_eq!(registry.load_state(&handle), Some(LoadState::Loading));
    }

    #[test]
    fn test_failed_slot_keeps_error() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("a.txt");
        registry.set_loading(&handle);
        assert!(registry.set_failed(&handle, "boom"));

        assert!(registry.is_valid(&handle));
        assert!(!registry.is_loaded(&handle));
        assert_eq!(registry.error_message(&handle).as_deref(), Some("boom"));
    }

    #[test]
    fn test_get_touches_last_access() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("a.txt");
        registry.set_loaded(&handle, "x".to_string());
        let before = registry.last_access(&handle).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.get(&handle);
        assert!(registry.last_access(&handle).unwrap() > before);
    }

    #[test]
    fn test_version_bumps_on_store() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("a.txt");
        registry.set_loaded(&handle, "v1".to_string());
        let v1 = registry.version(&handle).unwrap();
        registry.set_loaded(&handle, "v2".to_string());
        assert!(registry.version(&handle).unwrap() > v1);
    }

    #[test]
    fn test_erased_set_loaded_type_mismatch() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handle = registry.allocate("a.txt");
        registry.set_loading(&handle);

        assert!(!registry.set_loaded_erased(handle.id(), Box::new(5u32), 4));
        assert!(registry.set_loaded_erased(handle.id(), Box::new("ok".to_string()), 2));
        assert!(registry.is_loaded(&handle));
    }

    #[test]
    fn test_evict_respects_refcount_and_state() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let loading = registry.allocate("loading.txt");
        registry.set_loading(&loading);
        let held = registry.allocate("held.txt");
        registry.set_loaded(&held, "held".to_string());
        registry.add_ref(&held);
        let idle = registry.allocate("idle.txt");
        registry.set_loaded(&idle, "idle".to_string());

        assert_eq!(registry.evict(loading.id()), None);
        assert_eq!(registry.evict(held.id()), None);
        assert_eq!(registry.evict(idle.id()), Some(4));
        assert!(!registry.is_valid(&idle));

        let pinned = registry.pinned_ids();
        assert!(pinned.contains(&loading.id()));
        assert!(pinned.contains(&held.id()));
        assert!(registry.unused_ids().is_empty());
    }

    #[test]
    fn test_clear_frees_everything() {
        let registry: AssetRegistry<String> = AssetRegistry::new();
        let handles: Vec<_> = (0..3).map(|i| registry.allocate(&format!("{i}"))).collect();
        assert_eq!(registry.clear(), 3);
        assert!(registry.is_empty());
        assert!(handles.iter().all(|h| !registry.is_valid(h)));
    }

    #[test]
    fn test_concurrent_readers() {
        let registry = Arc::new(AssetRegistry::<String>::new());
        let handle = registry.allocate("shared.txt");
        registry.set_loaded(&handle, "shared".to_string());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert_eq!(registry.get(&handle).unwrap().as_str(), "shared");
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            let h = registry.allocate("churn.txt");
            registry.free(&h);
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
