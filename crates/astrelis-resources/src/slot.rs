//! Storage cell for a single asset.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::state::LoadState;

/// One storage cell of an [`AssetRegistry`](crate::registry::AssetRegistry).
///
/// The slot is the sole owner of the asset data; callers receive shared
/// `Arc` views. Asset data is only observable while the state is
/// [`LoadState::Loaded`].
#[derive(Debug)]
pub struct AssetSlot<T> {
    asset: Option<Arc<T>>,
    path: String,
    generation: u32,
    state: LoadState,
    ref_count: Arc<AtomicU32>,
    last_access: AtomicU64,
    memory_size: usize,
    error: Option<String>,
    version: u32,
    occupied: bool,
}

impl<T> AssetSlot<T> {
    /// A fresh, unoccupied slot at generation 0.
    pub(crate) fn vacant() -> Self {
        Self {
            asset: None,
            path: String::new(),
            generation: 0,
            state: LoadState::NotLoaded,
            ref_count: Arc::new(AtomicU32::new(0)),
            last_access: AtomicU64::new(0),
            memory_size: 0,
            error: None,
            version: 0,
            occupied: false,
        }
    }

    /// Claim the slot for `path`.
    pub(crate) fn occupy(&mut self, path: &str, now: u64) {
        debug_assert!(!self.occupied, "occupying a slot that is in use");
        self.path.clear();
        self.path.push_str(path);
        self.state = LoadState::NotLoaded;
        self.last_access.store(now, Ordering::Relaxed);
        self.occupied = true;
    }

    /// Release the slot: drop the data and bump the generation so every
    /// outstanding handle becomes stale.
    ///
    /// Returns the memory footprint that was released.
    pub(crate) fn vacate(&mut self) -> usize {
        let released = self.memory_size;
        self.asset = None;
        self.path.clear();
        self.generation = self.generation.wrapping_add(1);
        self.state = LoadState::NotLoaded;
        // Strong handles keep the old counter; the next occupant starts clean.
        self.ref_count = Arc::new(AtomicU32::new(0));
        self.last_access.store(0, Ordering::Relaxed);
        self.memory_size = 0;
        self.error = None;
        self.version = 0;
        self.occupied = false;
        released
    }

    /// Store asset data. Readers only see it once the state is `Loaded`.
    pub(crate) fn store(&mut self, asset: Arc<T>, memory_size: usize) {
        self.asset = Some(asset);
        self.memory_size = memory_size;
        self.error = None;
        self.version = self.version.wrapping_add(1);
    }

    /// Move to `state`. Failing or unloading drops the asset data.
    pub(crate) fn set_state(&mut self, state: LoadState) {
        self.state = state;
        if matches!(
            state,
            LoadState::NotLoaded | LoadState::Failed | LoadState::Unloading
        ) {
            self.asset = None;
            self.memory_size = 0;
        }
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }

    /// Record a read at `now`. Timestamps never move backwards.
    pub(crate) fn touch(&self, now: u64) {
        self.last_access.fetch_max(now, Ordering::Relaxed);
    }

    /// Whether data is stored, whatever the state.
    pub(crate) fn has_data(&self) -> bool {
        self.asset.is_some()
    }

    pub(crate) fn ref_counter(&self) -> &Arc<AtomicU32> {
        &self.ref_count
    }

    /// The asset data, present only while loaded.
    pub fn asset(&self) -> Option<&Arc<T>> {
        match self.state {
            LoadState::Loaded => self.asset.as_ref(),
            _ => None,
        }
    }

    /// The resolved path this slot was allocated for.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The current generation of the slot.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The current load state.
    pub fn load_state(&self) -> LoadState {
        self.state
    }

    /// Number of outstanding references.
    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::Acquire)
    }

    /// Milliseconds timestamp of the last read.
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Memory footprint of the stored asset in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// The error message of the last failed load.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Incremented every time new data is stored.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Whether the slot currently belongs to an allocation.
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vacate_bumps_generation_and_clears() {
        let mut slot = AssetSlot::vacant();
        slot.occupy("a.txt", 10);
        slot.store(Arc::new(5u32), 4);
        slot.set_state(LoadState::Loaded);
        assert_eq!(slot.asset().map(|a| **a), Some(5));

        let released = slot.vacate();
        assert_eq!(released, 4);
        assert_eq!(slot.generation(), 1);
        assert!(slot.asset().is_none());
        assert!(slot.path().is_empty());
        assert!(!slot.is_occupied());
    }

    #[test]
    fn test_asset_hidden_unless_loaded() {
        let mut slot = AssetSlot::vacant();
        slot.occupy("a.txt", 0);
        slot.set_state(LoadState::Loading);
        slot.store(Arc::new(1u32), 4);
        assert!(slot.asset().is_none());

        slot.set_state(LoadState::Loaded);
        assert!(slot.asset().is_some());

        slot.set_state(LoadState::Unloading);
        assert!(slot.asset().is_none());
        assert_eq!(slot.memory_size(), 0);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut slot = AssetSlot::<u32>::vacant();
        slot.occupy("a.txt", 50);
        slot.touch(40);
        assert_eq!(slot.last_access(), 50);
        slot.touch(60);
        assert_eq!(slot.last_access(), 60);
    }

    #[test]
    fn test_vacate_detaches_ref_counter() {
        let mut slot = AssetSlot::<u32>::vacant();
        slot.occupy("a.txt", 0);
        let old = Arc::clone(slot.ref_counter());
        old.fetch_add(1, Ordering::Relaxed);
        slot.vacate();
        assert_eq!(slot.ref_count(), 0);
        assert_eq!(old.load(Ordering::Relaxed), 1);
    }
}
