//! Asset resource management for Astrelis.
//!
//! Assets live in per-type [`AssetRegistry`] slot tables and are addressed by
//! generational [`Handle`]s that go stale when their slot is freed. The
//! [`AssetManager`] loads files through registered [`AssetFactory`]s, either
//! inline or on loader threads, and keeps total memory within a budget by
//! evicting the least recently used unreferenced assets.
//!
//! # Example
//!
//! ```ignore
//! use astrelis_resources::prelude::*;
//!
//! let mut manager = AssetManager::new(AssetManagerConfig::default());
//! manager.register_factory(TextFactory);
//! manager.add_search_path("assets");
//! manager.initialize()?;
//!
//! let greeting: Handle<String> = manager.load_sync("greeting.txt");
//! if let Some(text) = manager.get(&greeting) {
//!     println!("{}", text);
//! }
//! ```
//!
//! # Features
//!
//! - `profiling` (default): puffin scopes on the per-tick and eviction paths.
//! - `hot-reload`: watch search paths and reload assets whose files change.

pub mod config;
pub mod error;
pub mod event;
pub mod factory;
pub mod handle;
#[cfg(feature = "hot-reload")]
pub mod hot_reload;
pub mod id;
pub mod io;
pub mod lru;
pub mod manager;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod slot;
pub mod state;

pub use config::AssetManagerConfig;
pub use error::{AssetError, AssetResult};
pub use event::{AssetEvent, AssetEventBuffer};
pub use factory::{AssetFactory, BytesFactory, FnFactory, LoadContext, TextFactory, factory_fn};
pub use handle::{Handle, StrongHandle, TrackedHandle};
pub use id::{AssetId, UntypedAssetId};
pub use lru::{LruCacheManager, LruEntry};
pub use manager::{AssetManager, LoadCallback};
pub use queue::DEFAULT_LOAD_PRIORITY;
pub use registry::{AssetRegistry, ErasedRegistry};
pub use state::LoadState;

/// Common imports for working with assets.
pub mod prelude {
    pub use crate::{
        Asset, AssetError, AssetEvent, AssetFactory, AssetManager, AssetManagerConfig,
        AssetResult, BytesFactory, Handle, LoadContext, LoadState, StrongHandle, TextFactory,
        TrackedHandle,
    };
}

/// Trait for types that can be stored as assets.
///
/// # Example
///
/// ```ignore
/// struct Mesh {
///     vertices: Vec<[f32; 3]>,
/// }
///
/// impl Asset for Mesh {
///     fn type_name() -> &'static str {
///         "Mesh"
///     }
///
///     fn memory_size(&self) -> usize {
///         self.vertices.len() * std::mem::size_of::<[f32; 3]>()
///     }
/// }
/// ```
pub trait Asset: Send + Sync + 'static {
    /// Human-readable name of the asset type.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Bytes this asset counts against the memory budget.
    ///
    /// The default only covers the value itself; types owning heap data
    /// should report it.
    fn memory_size(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

impl Asset for String {
    fn memory_size(&self) -> usize {
        self.len()
    }
}

impl Asset for Vec<u8> {
    fn memory_size(&self) -> usize {
        self.len()
    }
}
