//! Memory accounting and least-recently-used eviction selection.
//!
//! The tracker never frees anything itself. It keeps a running total of the
//! bytes attributed to each asset and, when asked, names the oldest assets
//! whose removal would bring the total under a target. The manager performs
//! the actual frees and reports them back through [`LruCacheManager::remove`].

use astrelis_core::collections::{HashMap, HashSet};
use astrelis_core::time::now_millis;
use parking_lot::Mutex;

use crate::id::UntypedAssetId;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Access record for one tracked asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LruEntry {
    /// The tracked asset.
    pub id: UntypedAssetId,
    /// Bytes attributed to the asset.
    pub memory_size: usize,
    /// Milliseconds timestamp of the last recorded access.
    pub last_access: u64,
    /// Global access sequence, breaks timestamp ties.
    pub seq: u64,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<UntypedAssetId, LruEntry>,
    current: usize,
    max: usize,
    next_seq: u64,
}

impl LruState {
    fn candidates(&self, target: usize, exclude: &HashSet<UntypedAssetId>) -> Vec<UntypedAssetId> {
        if self.current <= target {
            return Vec::new();
        }
        let needed = self.current - target;

        let mut entries: Vec<&LruEntry> = self
            .entries
            .values()
            .filter(|entry| !exclude.contains(&entry.id))
            .collect();
        entries.sort_unstable_by_key(|entry| (entry.last_access, entry.seq));

        let mut freed = 0usize;
        let mut selected = Vec::new();
        for entry in entries {
            if freed >= needed {
                break;
            }
            freed += entry.memory_size;
            selected.push(entry.id);
        }
        selected
    }
}

/// Tracks per-asset memory and access recency against a budget.
///
/// # Example
///
/// ```ignore
/// let lru = LruCacheManager::new(512);
/// lru.record_access(id, 4 * 1024 * 1024);
///
/// if lru.memory_usage_ratio() > 0.8 {
///     for id in lru.eviction_candidates(400, &pinned) {
///         // free the asset, then:
///         lru.remove(id);
///     }
/// }
/// ```
pub struct LruCacheManager {
    inner: Mutex<LruState>,
}

impl LruCacheManager {
    /// Create a tracker with a budget of `max_memory_mb` megabytes.
    pub fn new(max_memory_mb: usize) -> Self {
        Self::with_max_bytes(max_memory_mb.saturating_mul(BYTES_PER_MB))
    }

    /// Create a tracker with a budget in bytes.
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(LruState {
                max: max_bytes,
                ..Default::default()
            }),
        }
    }

    /// Record an access to `id` that currently occupies `memory_size` bytes.
    pub fn record_access(&self, id: UntypedAssetId, memory_size: usize) {
        self.record_access_at(id, memory_size, now_millis());
    }

    /// Record an access at an explicit timestamp.
    ///
    /// An entry's timestamp never moves backwards. Its size is replaced, and
    /// the running total is adjusted by the difference.
    pub fn record_access_at(&self, id: UntypedAssetId, memory_size: usize, timestamp: u64) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let seq = state.next_seq;
        state.next_seq += 1;

        let previous = match state.entries.get_mut(&id) {
            Some(entry) => {
                let previous = entry.memory_size;
                entry.memory_size = memory_size;
                entry.last_access = entry.last_access.max(timestamp);
                entry.seq = seq;
                previous
            }
            None => {
                state.entries.insert(
                    id,
                    LruEntry {
                        id,
                        memory_size,
                        last_access: timestamp,
                        seq,
                    },
                );
                0
            }
        };

        state.current = state.current - previous + memory_size;
    }

    /// Move tracked entries forward to reads recorded elsewhere.
    ///
    /// An entry is only updated when `timestamp` is newer than its own, and
    /// then ranks as the most recent access. Untracked ids are ignored.
    pub fn refresh_access(&self, accesses: impl IntoIterator<Item = (UntypedAssetId, u64)>) {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        for (id, timestamp) in accesses {
            if let Some(entry) = state.entries.get_mut(&id)
                && timestamp > entry.last_access
            {
                entry.last_access = timestamp;
                entry.seq = state.next_seq;
                state.next_seq += 1;
            }
        }
    }

    /// Stop tracking `id`. Returns its last record.
    pub fn remove(&self, id: UntypedAssetId) -> Option<LruEntry> {
        let mut state = self.inner.lock();
        let entry = state.entries.remove(&id)?;
        state.current -= entry.memory_size;
        Some(entry)
    }

    /// The least recently used assets whose removal brings usage to at most
    /// `target_mb` megabytes, oldest first.
    ///
    /// Ids in `exclude` are never returned. If every remaining asset is
    /// excluded the target may be unreachable; the best available set is
    /// returned without error. Returns nothing if usage is already at or
    /// below the target.
    pub fn eviction_candidates(
        &self,
        target_mb: usize,
        exclude: &HashSet<UntypedAssetId>,
    ) -> Vec<UntypedAssetId> {
        self.candidates_for_bytes(target_mb.saturating_mul(BYTES_PER_MB), exclude)
    }

    /// Like [`eviction_candidates`](Self::eviction_candidates) with a byte target.
    pub fn candidates_for_bytes(
        &self,
        target_bytes: usize,
        exclude: &HashSet<UntypedAssetId>,
    ) -> Vec<UntypedAssetId> {
        self.inner.lock().candidates(target_bytes, exclude)
    }

    /// Candidates that bring usage back within the budget.
    pub fn over_budget_evictions(&self, exclude: &HashSet<UntypedAssetId>) -> Vec<UntypedAssetId> {
        let state = self.inner.lock();
        state.candidates(state.max, exclude)
    }

    /// Sum of the sizes of all tracked entries.
    pub fn current_memory_usage(&self) -> usize {
        self.inner.lock().current
    }

    /// Budget in bytes.
    pub fn max_memory(&self) -> usize {
        self.inner.lock().max
    }

    /// Change the budget. Nothing is evicted until candidates are requested.
    pub fn set_max_memory_mb(&self, max_memory_mb: usize) {
        self.inner.lock().max = max_memory_mb.saturating_mul(BYTES_PER_MB);
    }

    /// Usage divided by budget; 0.0 when the budget is 0.
    pub fn memory_usage_ratio(&self) -> f32 {
        let state = self.inner.lock();
        if state.max == 0 {
            0.0
        } else {
            state.current as f32 / state.max as f32
        }
    }

    /// Check if `id` is tracked.
    pub fn contains(&self, id: UntypedAssetId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    /// The record for `id`.
    pub fn entry(&self, id: UntypedAssetId) -> Option<LruEntry> {
        self.inner.lock().entries.get(&id).copied()
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every entry.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.entries.clear();
        state.current = 0;
    }
}

impl std::fmt::Debug for LruCacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("LruCacheManager")
            .field("entries", &state.entries.len())
            .field("current", &state.current)
            .field("max", &state.max)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::AssetId;

    const MB: usize = BYTES_PER_MB;

    fn id(index: u32) -> UntypedAssetId {
        UntypedAssetId::of::<Vec<u8>>(AssetId::new(index, 0))
    }

    fn sum_of_entries(lru: &LruCacheManager) -> usize {
        lru.inner.lock().entries.values().map(|e| e.memory_size).sum()
    }

    #[test]
    fn test_minimal_candidate_set() {
        let lru = LruCacheManager::new(10);
        let (a, b, c) = (id(0), id(1), id(2));
        lru.record_access_at(a, 3 * MB, 100);
        lru.record_access_at(b, 3 * MB, 200);
        lru.record_access_at(c, 3 * MB, 300);

        assert_eq!(lru.current_memory_usage(), 9 * MB);
        assert_eq!(lru.eviction_candidates(7, &HashSet::default()), vec![a]);
    }

    #[test]
    fn test_refresh_access_reorders() {
        let lru = LruCacheManager::new(10);
        let (a, b, c) = (id(0), id(1), id(2));
        lru.record_access_at(a, 3 * MB, 100);
        lru.record_access_at(b, 3 * MB, 200);
        lru.record_access_at(c, 3 * MB, 300);

        // Older and unknown timestamps change nothing
        lru.refresh_access([(b, 150), (id(9), 400)]);
        assert_eq!(lru.entry(b).unwrap().last_access, 200);
        assert!(!lru.contains(id(9)));

        lru.refresh_access([(a, 300)]);
        assert_eq!(lru.entry(a).unwrap().last_access, 300);
        assert_eq!(lru.eviction_candidates(7, &HashSet::default()), vec![b]);
        assert_eq!(lru.eviction_candidates(4, &HashSet::default()), vec![b, c]);
        assert_eq!(sum_of_entries(&lru), lru.current_memory_usage());
    }

    #[test]
    fn test_excluded_ids_are_skipped() {
        let lru = LruCacheManager::new(10);
        let (a, b, c) = (id(0), id(1), id(2));
        lru.record_access_at(a, 3 * MB, 100);
        lru.record_access_at(b, 3 * MB, 200);
        lru.record_access_at(c, 3 * MB, 300);

        let exclude: HashSet<_> = [a].into_iter().collect();
        assert_eq!(lru.eviction_candidates(7, &exclude), vec![b]);
    }

    #[test]
    fn test_no_candidates_under_target() {
        let lru = LruCacheManager::new(10);
        lru.record_access_at(id(0), MB, 1);
        assert!(lru.eviction_candidates(5, &HashSet::default()).is_empty());
    }

    #[test]
    fn test_unreachable_target_returns_best_effort() {
        let lru = LruCacheManager::new(10);
        let (a, b) = (id(0), id(1));
        lru.record_access_at(a, 4 * MB, 1);
        lru.record_access_at(b, 4 * MB, 2);

        let exclude: HashSet<_> = [b].into_iter().collect();
        assert_eq!(lru.eviction_candidates(0, &exclude), vec![a]);
    }

    #[test]
    fn test_candidates_oldest_first() {
        let lru = LruCacheManager::new(10);
        let (a, b, c) = (id(0), id(1), id(2));
        lru.record_access_at(a, MB, 300);
        lru.record_access_at(b, MB, 100);
        lru.record_access_at(c, MB, 200);

        assert_eq!(lru.eviction_candidates(0, &HashSet::default()), vec![b, c, a]);
    }

    #[test]
    fn test_timestamp_ties_break_by_access_order() {
        let lru = LruCacheManager::new(10);
        let (a, b) = (id(0), id(1));
        lru.record_access_at(b, MB, 100);
        lru.record_access_at(a, MB, 100);

        assert_eq!(lru.eviction_candidates(1, &HashSet::default()), vec![b]);
    }

    #[test]
    fn test_reaccess_moves_entry_to_back() {
        let lru = LruCacheManager::new(10);
        let (a, b) = (id(0), id(1));
        lru.record_access_at(a, MB, 100);
        lru.record_access_at(b, MB, 200);
        lru.record_access_at(a, MB, 300);

        assert_eq!(lru.eviction_candidates(1, &HashSet::default()), vec![b]);
    }

    #[test]
    fn test_timestamp_never_moves_backwards() {
        let lru = LruCacheManager::new(10);
        lru.record_access_at(id(0), MB, 500);
        lru.record_access_at(id(0), MB, 100);
        assert_eq!(lru.entry(id(0)).unwrap().last_access, 500);
    }

    #[test]
    fn test_accounting_matches_entries() {
        let lru = LruCacheManager::new(100);
        lru.record_access_at(id(0), 10, 1);
        lru.record_access_at(id(1), 20, 2);
        lru.record_access_at(id(0), 5, 3);
        assert_eq!(lru.current_memory_usage(), 25);
        assert_eq!(lru.current_memory_usage(), sum_of_entries(&lru));

        assert_eq!(lru.remove(id(1)).map(|e| e.memory_size), Some(20));
        assert!(lru.remove(id(1)).is_none());
        assert_eq!(lru.current_memory_usage(), 5);
        assert_eq!(lru.current_memory_usage(), sum_of_entries(&lru));

        lru.clear();
        assert_eq!(lru.current_memory_usage(), 0);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_usage_ratio() {
        let lru = LruCacheManager::new(10);
        lru.record_access_at(id(0), 5 * MB, 1);
        assert!((lru.memory_usage_ratio() - 0.5).abs() < f32::EPSILON);

        lru.set_max_memory_mb(0);
        assert_eq!(lru.memory_usage_ratio(), 0.0);
    }

    #[test]
    fn test_over_budget_evictions() {
        let lru = LruCacheManager::with_max_bytes(100);
        lru.record_access_at(id(0), 60, 1);
        lru.record_access_at(id(1), 60, 2);

        assert_eq!(lru.over_budget_evictions(&HashSet::default()), vec![id(0)]);
    }
}
