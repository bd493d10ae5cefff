//! Asset handles - typed references to assets.
//!
//! Handles are lightweight, copyable references to assets stored in an
//! [`AssetRegistry`](crate::registry::AssetRegistry). They use generational
//! ids for O(1) access with use-after-free protection.

use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::Asset;
use crate::id::{AssetId, UntypedAssetId};

/// A typed handle to an asset.
///
/// Handles are the primary way to reference assets. They are:
/// - Lightweight (just an index + generation)
/// - Copyable (no reference counting overhead for copies)
/// - Type-safe (a `Handle<Texture>` cannot be passed where a `Handle<Mesh>` is expected)
///
/// The type parameter exists only at compile time; equality and hashing
/// delegate to the wrapped [`AssetId`].
///
/// # Example
///
/// ```ignore
/// let handle: Handle<Texture> = manager.load_async("sprites/player.png", 0);
///
/// // Later, check if ready
/// if let Some(texture) = manager.get(&handle) {
///     // Use texture...
/// }
/// ```
pub struct Handle<T: Asset> {
    pub(crate) id: AssetId,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T: Asset> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("type", &T::type_name())
            .field("index", &self.id.index())
            .field("generation", &self.id.generation())
            .finish()
    }
}

impl<T: Asset> Handle<T> {
    /// Create a handle from an id.
    pub(crate) fn new(id: AssetId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// A handle that is never valid in any registry.
    pub const fn invalid() -> Self {
        Self {
            id: AssetId::INVALID,
            _marker: PhantomData,
        }
    }

    /// Get the asset id.
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// `true` for [`Handle::invalid`]. A non-sentinel handle may still be stale.
    pub fn is_invalid(&self) -> bool {
        !self.id.is_valid()
    }

    /// Convert to an id tagged with this handle's asset type.
    pub fn untyped(self) -> UntypedAssetId {
        UntypedAssetId::of::<T>(self.id)
    }

    /// Get the type name of the asset.
    pub fn type_name(&self) -> &'static str {
        T::type_name()
    }
}

impl<T: Asset> Default for Handle<T> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T: Asset> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Asset> Copy for Handle<T> {}

impl<T: Asset> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Asset> Eq for Handle<T> {}

impl<T: Asset> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: Asset> From<Handle<T>> for UntypedAssetId {
    fn from(handle: Handle<T>) -> Self {
        handle.untyped()
    }
}

/// Decrement a slot reference count without wrapping below zero.
///
/// Returns the count after the decrement, or `None` if it was already zero.
pub(crate) fn release_count(count: &AtomicU32) -> Option<u32> {
    count
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
        .ok()
        .map(|previous| previous - 1)
}

/// A handle that holds a reference on its slot for as long as it lives.
///
/// Referenced slots are never chosen for eviction and are skipped by
/// `unload_unused`. Obtain one with
/// [`AssetRegistry::acquire`](crate::registry::AssetRegistry::acquire).
///
/// # Example
///
/// ```ignore
/// let strong = manager.acquire(&handle).unwrap();
///
/// // The asset cannot be evicted while `strong` exists
/// drop(strong);
///
/// // Now it may be evicted again
/// ```
pub struct StrongHandle<T: Asset> {
    pub(crate) handle: Handle<T>,
    pub(crate) refcount: Arc<AtomicU32>,
}

impl<T: Asset> StrongHandle<T> {
    /// Create a new strong handle, taking one reference.
    pub(crate) fn new(handle: Handle<T>, refcount: Arc<AtomicU32>) -> Self {
        refcount.fetch_add(1, Ordering::AcqRel);
        Self { handle, refcount }
    }

    /// Get the underlying handle.
    pub fn handle(&self) -> Handle<T> {
        self.handle
    }

    /// Get the asset id.
    pub fn id(&self) -> AssetId {
        self.handle.id
    }

    /// Get the current reference count.
    pub fn ref_count(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }
}

impl<T: Asset> std::fmt::Debug for StrongHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongHandle")
            .field("handle", &self.handle)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

impl<T: Asset> Clone for StrongHandle<T> {
    fn clone(&self) -> Self {
        Self::new(self.handle, Arc::clone(&self.refcount))
    }
}

impl<T: Asset> Drop for StrongHandle<T> {
    fn drop(&mut self) {
        // The counter is detached from the slot once the slot is freed, so a
        // stale strong handle only ever touches its own counter.
        let _ = release_count(&self.refcount);
    }
}

impl<T: Asset> std::ops::Deref for StrongHandle<T> {
    type Target = Handle<T>;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

/// A handle that tracks the version it last saw for change detection.
///
/// Useful for systems that need to react to reloads without draining events.
///
/// # Example
///
/// ```ignore
/// let mut tracked = TrackedHandle::new(handle);
///
/// // In update loop:
/// if let Some(version) = manager.version(&tracked.handle())
///     && tracked.check_changed(version)
/// {
///     rebuild_material();
/// }
/// ```
pub struct TrackedHandle<T: Asset> {
    handle: Handle<T>,
    seen_version: u32,
}

impl<T: Asset> TrackedHandle<T> {
    /// Create a new tracked handle.
    pub fn new(handle: Handle<T>) -> Self {
        Self {
            handle,
            seen_version: 0,
        }
    }

    /// Get the underlying handle.
    pub fn handle(&self) -> Handle<T> {
        self.handle
    }

    /// Get the last seen version.
    pub fn seen_version(&self) -> u32 {
        self.seen_version
    }

    /// Returns `true` if `current_version` is newer than the last seen one,
    /// and remembers it.
    pub fn check_changed(&mut self, current_version: u32) -> bool {
        if current_version > self.seen_version {
            self.seen_version = current_version;
            true
        } else {
            false
        }
    }

    /// Forget the seen version so the next check reports a change.
    pub fn reset(&mut self) {
        self.seen_version = 0;
    }
}

impl<T: Asset> Clone for TrackedHandle<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
            seen_version: self.seen_version,
        }
    }
}

static_assertions::assert_eq_size!(Handle<String>, AssetId);
