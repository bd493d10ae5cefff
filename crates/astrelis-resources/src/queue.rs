//! Pending load requests and completed load results.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::error::AssetResult;
use crate::id::UntypedAssetId;

/// Priority used when the caller does not care.
pub const DEFAULT_LOAD_PRIORITY: i32 = 0;

/// A type-erased asset produced by a loader thread.
pub struct LoadedAsset {
    /// The asset, boxed as its concrete type.
    pub asset: Box<dyn Any + Send + Sync>,
    /// Bytes to attribute to the asset.
    pub memory_size: usize,
}

impl std::fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedAsset")
            .field("memory_size", &self.memory_size)
            .finish_non_exhaustive()
    }
}

/// The work of one load, bound to its factory and path at request time.
pub type LoadJob = Box<dyn FnOnce() -> AssetResult<LoadedAsset> + Send + 'static>;

/// A queued load.
pub struct LoadRequest {
    /// The slot the result goes to.
    pub id: UntypedAssetId,
    /// The resolved path.
    pub path: PathBuf,
    /// Higher runs first.
    pub priority: i32,
    /// Submission order, for FIFO among equal priorities.
    pub seq: u64,
    /// The load itself.
    pub job: LoadJob,
}

impl std::fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRequest")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl PartialEq for LoadRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for LoadRequest {}

impl PartialOrd for LoadRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then earlier submission
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue of pending loads.
#[derive(Default)]
pub struct LoadQueue {
    inner: Mutex<LoadQueueInner>,
}

#[derive(Default)]
struct LoadQueueInner {
    heap: BinaryHeap<LoadRequest>,
    next_seq: u64,
}

impl LoadQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a load.
    pub fn push(&self, id: UntypedAssetId, path: PathBuf, priority: i32, job: LoadJob) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(LoadRequest {
            id,
            path,
            priority,
            seq,
            job,
        });
    }

    /// Take up to `max` requests, highest priority first.
    pub fn pop_batch(&self, max: usize) -> Vec<LoadRequest> {
        let mut inner = self.inner.lock();
        let count = max.min(inner.heap.len());
        (0..count).filter_map(|_| inner.heap.pop()).collect()
    }

    /// Remove the queued request for `id`, if it has not been dispatched yet.
    pub fn remove(&self, id: UntypedAssetId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.heap.len();
        inner.heap.retain(|request| request.id != id);
        inner.heap.len() != before
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued request.
    pub fn clear(&self) {
        self.inner.lock().heap.clear();
    }
}

/// The outcome of a load, written by a loader thread.
#[derive(Debug)]
pub struct LoadResult {
    /// The slot the result belongs to.
    pub id: UntypedAssetId,
    /// The resolved path.
    pub path: PathBuf,
    /// The asset, or the reason it could not be created.
    pub outcome: AssetResult<LoadedAsset>,
}

impl LoadResult {
    /// Check if the load succeeded.
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The error message of a failed load.
    pub fn error(&self) -> Option<String> {
        self.outcome.as_ref().err().map(|e| e.to_string())
    }
}

/// Completed loads waiting for the owning thread.
#[derive(Debug, Default)]
pub struct ResultQueue {
    inner: Mutex<VecDeque<LoadResult>>,
}

impl ResultQueue {
    /// Create an empty result queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a result.
    pub fn push(&self, result: LoadResult) {
        self.inner.lock().push_back(result);
    }

    /// Take every published result, oldest first.
    pub fn drain(&self) -> Vec<LoadResult> {
        self.inner.lock().drain(..).collect()
    }

    /// Number of results waiting.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if no result is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every waiting result.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::AssetId;

    fn id(index: u32) -> UntypedAssetId {
        UntypedAssetId::of::<String>(AssetId::new(index, 0))
    }

    fn noop_job() -> LoadJob {
        Box::new(|| {
            Ok(LoadedAsset {
                asset: Box::new(String::new()),
                memory_size: 0,
            })
        })
    }

    #[test]
    fn test_priority_order() {
        let queue = LoadQueue::new();
        queue.push(id(0), "low".into(), -1, noop_job());
        queue.push(id(1), "high".into(), 10, noop_job());
        queue.push(id(2), "mid".into(), DEFAULT_LOAD_PRIORITY, noop_job());

        let order: Vec<_> = queue.pop_batch(10).into_iter().map(|r| r.id).collect();
        assert_eq!(order, vec![id(1), id(2), id(0)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_among_equal_priority() {
        let queue = LoadQueue::new();
        for i in 0..5 {
            queue.push(id(i), format!("{i}").into(), 3, noop_job());
        }

        let order: Vec<_> = queue.pop_batch(5).into_iter().map(|r| r.id).collect();
        assert_eq!(order, (0..5).map(id).collect::<Vec<_>>());
    }

    #[test]
    fn test_pop_batch_is_bounded() {
        let queue = LoadQueue::new();
        for i in 0..5 {
            queue.push(id(i), "x".into(), 0, noop_job());
        }
        assert_eq!(queue.pop_batch(2).len(), 2);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_remove_pending_request() {
        let queue = LoadQueue::new();
        queue.push(id(0), "a".into(), 0, noop_job());
        queue.push(id(1), "b".into(), 0, noop_job());

        assert!(queue.remove(id(0)));
        assert!(!queue.remove(id(0)));
        assert_eq!(queue.pop_batch(10).into_iter().map(|r| r.id).collect::<Vec<_>>(), vec![id(1)]);
    }

    #[test]
    fn test_result_queue_drains_in_order() {
        let results = ResultQueue::new();
        results.push(LoadResult {
            id: id(0),
            path: "a".into(),
            outcome: Err(crate::AssetError::PoolStopped),
        });
        results.push(LoadResult {
            id: id(1),
            path: "b".into(),
            outcome: (noop_job())(),
        });

        let drained = results.drain();
        assert_eq!(drained.len(), 2);
        assert!(!drained[0].success());
        assert!(drained[0].error().is_some());
        assert!(drained[1].success());
        assert!(results.is_empty());
    }
}
