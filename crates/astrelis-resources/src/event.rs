//! Asset events for change detection.

use std::any::TypeId;
use std::collections::VecDeque;

use crate::Asset;
use crate::handle::Handle;
use crate::id::UntypedAssetId;

/// Events emitted by the asset manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetEvent {
    /// An asset finished its first load.
    Loaded {
        /// The loaded asset.
        id: UntypedAssetId,
        /// The version of the stored data.
        version: u32,
    },

    /// A loaded asset received new data.
    Reloaded {
        /// The reloaded asset.
        id: UntypedAssetId,
        /// The new version of the stored data.
        version: u32,
    },

    /// A load or reload failed.
    LoadFailed {
        /// The asset whose load failed.
        id: UntypedAssetId,
        /// Error message.
        error: String,
    },

    /// An asset was unloaded on request.
    Unloaded {
        /// The id the asset had. It is no longer live.
        id: UntypedAssetId,
    },

    /// An asset was evicted to stay within the memory budget.
    Evicted {
        /// The id the asset had. It is no longer live.
        id: UntypedAssetId,
        /// Bytes released.
        memory_size: usize,
    },
}

impl AssetEvent {
    /// The asset this event relates to.
    pub fn id(&self) -> UntypedAssetId {
        match self {
            AssetEvent::Loaded { id, .. }
            | AssetEvent::Reloaded { id, .. }
            | AssetEvent::LoadFailed { id, .. }
            | AssetEvent::Unloaded { id }
            | AssetEvent::Evicted { id, .. } => *id,
        }
    }

    /// Get the type ID of the asset this event relates to.
    pub fn type_id(&self) -> TypeId {
        self.id().type_id()
    }

    /// The typed handle, if the event is about a `T`.
    pub fn handle<T: Asset>(&self) -> Option<Handle<T>> {
        self.id().typed::<T>()
    }

    /// Check if this is a first-load event.
    pub fn is_loaded(&self) -> bool {
        matches!(self, AssetEvent::Loaded { .. })
    }

    /// Check if this is a reload event.
    pub fn is_reloaded(&self) -> bool {
        matches!(self, AssetEvent::Reloaded { .. })
    }

    /// Check if this is a failure event.
    pub fn is_failed(&self) -> bool {
        matches!(self, AssetEvent::LoadFailed { .. })
    }

    /// Check if the asset is gone (unloaded or evicted).
    pub fn is_removed(&self) -> bool {
        matches!(self, AssetEvent::Unloaded { .. } | AssetEvent::Evicted { .. })
    }
}

/// A buffer of asset events that can be drained each frame.
///
/// With a limit set, the oldest events are dropped once the buffer is full,
/// so an owner that never drains it does not grow memory without bound.
#[derive(Debug, Default)]
pub struct AssetEventBuffer {
    events: VecDeque<AssetEvent>,
    /// Zero means unbounded.
    limit: usize,
    dropped: usize,
}

impl AssetEventBuffer {
    /// Create a new empty, unbounded event buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding at most `limit` events. Zero means unbounded.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Push an event to the buffer, dropping the oldest one if full.
    pub fn push(&mut self, event: AssetEvent) {
        if self.limit > 0 && self.events.len() >= self.limit {
            if self.dropped == 0 {
                tracing::warn!(
                    "Asset event buffer full ({} events), dropping oldest; drain events every update",
                    self.limit
                );
            }
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Take every buffered event.
    pub fn drain(&mut self) -> Vec<AssetEvent> {
        self.dropped = 0;
        self.events.drain(..).collect()
    }

    /// Take the events about `T`, leaving the rest buffered.
    pub fn drain_for<T: Asset>(&mut self) -> Vec<AssetEvent> {
        let type_id = TypeId::of::<T>();
        let (matching, rest): (VecDeque<_>, VecDeque<_>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|event| event.type_id() == type_id);
        self.events = rest;
        Vec::from(matching)
    }

    /// Get an iterator over events without draining.
    pub fn iter(&self) -> impl Iterator<Item = &AssetEvent> {
        self.events.iter()
    }

    /// Check if there are any events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events discarded because the buffer was full since the last full drain.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Clear all events.
    pub fn clear(&mut self) {
        self.events.clear();
        self.dropped = 0;
    }
}
