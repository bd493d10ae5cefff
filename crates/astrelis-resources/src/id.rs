//! Generational asset identities.

use std::any::TypeId;
use std::fmt;

use crate::Asset;
use crate::handle::Handle;

/// A generation-stamped slot identity.
///
/// An id is live only while the slot at `index` still carries the same
/// `generation`; freeing the slot bumps the generation and invalidates every
/// outstanding id for it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId {
    index: u32,
    generation: u32,
}

impl AssetId {
    /// Index value reserved for the invalid id.
    pub const INVALID_INDEX: u32 = u32::MAX;

    /// The invalid id. Never live in any registry.
    pub const INVALID: AssetId = AssetId {
        index: Self::INVALID_INDEX,
        generation: 0,
    };

    /// Create an id from its parts.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// The slot generation this id was issued for.
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// `false` only for the [`AssetId::INVALID`] sentinel.
    ///
    /// This says nothing about liveness; ask the owning registry for that.
    pub const fn is_valid(&self) -> bool {
        self.index != Self::INVALID_INDEX
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "AssetId({}v{})", self.index, self.generation)
        } else {
            f.write_str("AssetId(INVALID)")
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// An [`AssetId`] tagged with the asset type it belongs to.
///
/// Raw ids of different registries overlap, so everything that tracks assets
/// across types (the LRU tracker, callbacks, events) keys on this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UntypedAssetId {
    id: AssetId,
    type_id: TypeId,
}

impl UntypedAssetId {
    /// Create an untyped id.
    pub fn new(id: AssetId, type_id: TypeId) -> Self {
        Self { id, type_id }
    }

    /// Create an untyped id for asset type `T`.
    pub fn of<T: Asset>(id: AssetId) -> Self {
        Self::new(id, TypeId::of::<T>())
    }

    /// The slot identity.
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// The asset type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Check whether this id belongs to asset type `T`.
    pub fn is<T: Asset>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Try to convert to a typed handle.
    ///
    /// Returns `None` if the type doesn't match.
    pub fn typed<T: Asset>(self) -> Option<Handle<T>> {
        self.is::<T>().then(|| Handle::new(self.id))
    }
}

static_assertions::assert_eq_size!(AssetId, u64);
