//! Asset factories: the boundary where files become assets.

use std::any::{Any, TypeId};
use std::path::Path;
use std::sync::Arc;

use astrelis_core::collections::HashMap;

use crate::Asset;
use crate::error::{AssetError, AssetResult};
use crate::io;

/// Context handed to a factory for a single load.
pub struct LoadContext<'a> {
    path: &'a Path,
}

impl<'a> LoadContext<'a> {
    /// Create a context for the resolved `path`.
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    /// The resolved path being loaded.
    pub fn path(&self) -> &Path {
        self.path
    }

    /// File extension (without the dot), lowercased.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
    }

    /// Read the whole file.
    pub fn read_bytes(&self) -> AssetResult<Vec<u8>> {
        io::read_bytes(self.path)
    }

    /// Read the whole file as UTF-8.
    pub fn read_to_string(&self) -> AssetResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| AssetError::load_failed(self.path, format!("Invalid UTF-8: {}", e)))
    }
}

/// Turns a resolved path into an asset of one type.
///
/// Factories run on loader threads, so they must be `Send + Sync`. A factory
/// that panics is treated as a failed load.
///
/// # Example
///
/// ```ignore
/// struct ShaderFactory;
///
/// impl AssetFactory for ShaderFactory {
///     type Asset = Shader;
///
///     fn create(&self, ctx: &LoadContext<'_>) -> AssetResult<Shader> {
///         Shader::compile(&ctx.read_to_string()?)
///             .map_err(|e| AssetError::load_failed(ctx.path(), e.to_string()))
///     }
/// }
/// ```
pub trait AssetFactory: Send + Sync + 'static {
    /// The asset type this factory produces.
    type Asset: Asset;

    /// Create the asset for `ctx.path()`.
    fn create(&self, ctx: &LoadContext<'_>) -> AssetResult<Self::Asset>;
}

/// Object-safe view of a factory producing `T`.
pub trait DynFactory<T: Asset>: Send + Sync {
    /// Create the asset for `ctx.path()`.
    fn create_dyn(&self, ctx: &LoadContext<'_>) -> AssetResult<T>;
}

impl<F: AssetFactory> DynFactory<F::Asset> for F {
    fn create_dyn(&self, ctx: &LoadContext<'_>) -> AssetResult<F::Asset> {
        self.create(ctx)
    }
}

/// A factory backed by a closure.
pub struct FnFactory<T, F> {
    f: F,
    _marker: std::marker::PhantomData<fn() -> T>,
}

/// Wrap a closure as an [`AssetFactory`].
pub fn factory_fn<T, F>(f: F) -> FnFactory<T, F>
where
    T: Asset,
    F: Fn(&LoadContext<'_>) -> AssetResult<T> + Send + Sync + 'static,
{
    FnFactory {
        f,
        _marker: std::marker::PhantomData,
    }
}

impl<T, F> AssetFactory for FnFactory<T, F>
where
    T: Asset,
    F: Fn(&LoadContext<'_>) -> AssetResult<T> + Send + Sync + 'static,
{
    type Asset = T;

    fn create(&self, ctx: &LoadContext<'_>) -> AssetResult<T> {
        (self.f)(ctx)
    }
}

/// Loads UTF-8 text files as `String`.
pub struct TextFactory;

impl AssetFactory for TextFactory {
    type Asset = String;

    fn create(&self, ctx: &LoadContext<'_>) -> AssetResult<String> {
        ctx.read_to_string()
    }
}

/// Loads any file as raw bytes.
pub struct BytesFactory;

impl AssetFactory for BytesFactory {
    type Asset = Vec<u8>;

    fn create(&self, ctx: &LoadContext<'_>) -> AssetResult<Vec<u8>> {
        ctx.read_bytes()
    }
}

/// One factory per asset type.
///
/// Registering a second factory for a type replaces the first; loads already
/// queued keep the factory they captured.
#[derive(Default)]
pub struct FactoryRegistry {
    /// Each value is an `Arc<dyn DynFactory<T>>` for the keyed `T`.
    factories: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl FactoryRegistry {
    /// Create an empty factory registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for its asset type.
    pub fn register<F: AssetFactory>(&mut self, factory: F) {
        let shared: Arc<dyn DynFactory<F::Asset>> = Arc::new(factory);
        if self
            .factories
            .insert(TypeId::of::<F::Asset>(), Box::new(shared))
            .is_some()
        {
            tracing::debug!("Replaced factory for {}", <F::Asset as Asset>::type_name());
        }
    }

    /// The factory for `T`, if one is registered.
    pub fn get<T: Asset>(&self) -> Option<Arc<dyn DynFactory<T>>> {
        self.factories
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<Arc<dyn DynFactory<T>>>())
            .cloned()
    }

    /// Check whether a factory is registered for `T`.
    pub fn contains<T: Asset>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Run `f`, converting a panic into [`AssetError::LoaderPanicked`].
pub(crate) fn catch_load_panic<T>(path: &Path, f: impl FnOnce() -> AssetResult<T>) -> AssetResult<T> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            tracing::error!("Factory panicked loading '{}': {}", path.display(), message);
            Err(AssetError::LoaderPanicked {
                path: path.to_path_buf(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Number(i64);

    impl Asset for Number {}

    struct NumberFactory;

    impl AssetFactory for NumberFactory {
        type Asset = Number;

        fn create(&self, ctx: &LoadContext<'_>) -> AssetResult<Number> {
            let text = ctx.read_to_string()?;
            text.trim()
                .parse()
                .map(Number)
                .map_err(|e| AssetError::load_failed(ctx.path(), format!("{}", e)))
        }
    }

    #[test]
    fn test_register_and_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("n.num");
        std::fs::write(&path, "42\n").unwrap();

        let mut factories = FactoryRegistry::new();
        factories.register(NumberFactory);
        assert!(factories.contains::<Number>());
        assert!(!factories.contains::<String>());

        let factory = factories.get::<Number>().unwrap();
        let number = factory.create_dyn(&LoadContext::new(&path)).unwrap();
        assert_eq!(number, Number(42));
    }

    #[test]
    fn test_factory_error_is_load_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.num");
        std::fs::write(&path, "forty-two").unwrap();

        let result = NumberFactory.create(&LoadContext::new(&path));
        assert!(matches!(result, Err(AssetError::LoadFailed { .. })));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = TextFactory.create(&LoadContext::new(Path::new("/no/such/file.txt")));
        assert!(matches!(result, Err(AssetError::NotFound { .. })));
    }

    #[test]
    fn test_fn_factory() {
        let mut factories = FactoryRegistry::new();
        factories.register(factory_fn(|ctx| Ok(ctx.extension().unwrap_or_default())));

        let factory = factories.get::<String>().unwrap();
        let ext = factory.create_dyn(&LoadContext::new(Path::new("a/b.PNG"))).unwrap();
        assert_eq!(ext, "png");
    }

    #[test]
    fn test_replacing_factory() {
        let mut factories = FactoryRegistry::new();
        factories.register(factory_fn(|_| Ok("first".to_string())));
        factories.register(factory_fn(|_| Ok("second".to_string())));
        assert_eq!(factories.len(), 1);

        let factory = factories.get::<String>().unwrap();
        assert_eq!(factory.create_dyn(&LoadContext::new(Path::new("x"))).unwrap(), "second");
    }

    #[test]
    fn test_catch_load_panic() {
        let result: AssetResult<()> = catch_load_panic(Path::new("boom.txt"), || panic!("kaboom"));
        match result {
            Err(AssetError::LoaderPanicked { message, .. }) => assert_eq!(message, "kaboom"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
