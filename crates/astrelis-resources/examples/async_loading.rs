//! Async Asset Loading Demo
//!
//! Demonstrates the resource manager end to end:
//! - Loading on worker threads with priorities and callbacks
//! - Reading assets from another thread while loads complete
//! - Keeping memory within budget with LRU eviction
//! - Pinning assets with strong handles
//!
//! Run with `RUST_LOG=debug` to see the manager's own logging, and with
//! `ASTRELIS_PROFILE=1` to serve puffin scopes on port 8585.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use astrelis_resources::prelude::*;

const MB: usize = 1024 * 1024;

/// A fake texture whose size is read from its file.
#[derive(Debug)]
struct Texture {
    name: String,
    bytes: usize,
}

impl Asset for Texture {
    fn type_name() -> &'static str {
        "Texture"
    }

    fn memory_size(&self) -> usize {
        self.bytes
    }
}

struct TextureFactory;

impl AssetFactory for TextureFactory {
    type Asset = Texture;

    fn create(&self, ctx: &LoadContext<'_>) -> AssetResult<Texture> {
        let text = ctx.read_to_string()?;
        let (name, mb) = text
            .trim()
            .split_once(' ')
            .ok_or_else(|| AssetError::load_failed(ctx.path(), "expected '<name> <megabytes>'"))?;
        let mb: usize = mb
            .parse()
            .map_err(|_| AssetError::load_failed(ctx.path(), format!("bad size '{}'", mb)))?;

        // Pretend decoding takes a while
        std::thread::sleep(Duration::from_millis(20));

        Ok(Texture {
            name: name.to_string(),
            bytes: mb * MB,
        })
    }
}

fn main() -> AssetResult<()> {
    astrelis_core::logging::init();
    if std::env::var_os("ASTRELIS_PROFILE").is_some() {
        astrelis_core::profiling::init_profiling(astrelis_core::profiling::DEFAULT_SERVER_ADDR);
    }

    let dir = tempfile::TempDir::new()?;
    for (i, mb) in [4, 8, 2, 6, 10, 3].iter().enumerate() {
        std::fs::write(dir.path().join(format!("tex_{i}.tex")), format!("texture{i} {mb}"))?;
    }
    std::fs::write(dir.path().join("broken.tex"), "no size here")?;

    let config = AssetManagerConfig::default()
        .with_max_cache_memory_mb(24)
        .with_async_worker_count(3)
        .with_lru_eviction_threshold(0.9);

    let mut manager = AssetManager::new(config);
    manager.register_factory(TextureFactory);
    manager.add_search_path(dir.path());
    manager.initialize()?;

    println!("\n═══════════════════════════════════════════════════════");
    println!("  ASYNC LOADING DEMO");
    println!("═══════════════════════════════════════════════════════");
    println!("  Budget: 24 MB, eviction above 90%");
    println!("  Workers: 3");
    println!("═══════════════════════════════════════════════════════\n");

    let completed = Arc::new(AtomicUsize::new(0));
    let mut handles: Vec<Handle<Texture>> = Vec::new();
    for i in 0..6 {
        let completed = Arc::clone(&completed);
        // Later files are more urgent
        let handle = manager.load_async_with(format!("tex_{i}.tex"), i, move |handle: Handle<Texture>, outcome| {
            match outcome {
                Ok(texture) => println!("  ✓ {:?} loaded '{}' ({} MB)", handle.id(), texture.name, texture.bytes / MB),
                Err(e) => println!("  ✗ {:?} failed: {}", handle.id(), e),
            }
            completed.fetch_add(1, Ordering::SeqCst);
        });
        handles.push(handle);
    }
    let broken: Handle<Texture> = manager.load_async("broken.tex", 0);

    // Another thread can read through the shared registry at any time
    let registry = manager.registry::<Texture>();
    let watched = handles[0];
    let reader = std::thread::spawn(move || {
        for _ in 0..200 {
            if let Some(texture) = registry.get(&watched) {
                return Some(texture.name.clone());
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    });

    while manager.pending_loads() > 0 {
        astrelis_core::profiling::new_frame();
        manager.update();
        std::thread::sleep(Duration::from_millis(5));
    }
    manager.update();

    println!("\nCallbacks fired: {}", completed.load(Ordering::SeqCst));
    println!("Reader thread saw: {:?}", reader.join().ok().flatten());
    println!("Broken asset: {:?}", manager.error_message(&broken));

    for event in manager.drain_events() {
        match event {
            AssetEvent::Evicted { id, memory_size } => {
                println!("  Evicted {:?} ({} MB)", id.id(), memory_size / MB)
            }
            AssetEvent::LoadFailed { id, error } => println!("  Failed {:?}: {}", id.id(), error),
            _ => {}
        }
    }

    println!(
        "\nMemory: {:.1} MB ({:.0}% of budget), {} assets",
        manager.memory_usage() as f64 / MB as f64,
        manager.memory_usage_ratio() * 100.0,
        manager.asset_count()
    );

    // A strong handle keeps an asset out of eviction
    if let Some(pinned) = handles.iter().find_map(|h| manager.acquire(h)) {
        println!("\nPinned {:?}, ref count {}", pinned.id(), pinned.ref_count());
        let freed = manager.evict_to_target(0);
        println!("Evicted down to 0 MB target, freed {} MB", freed / MB);
        println!("Pinned asset still loaded: {}", manager.is_loaded(&pinned.handle()));
    }

    manager.shutdown();
    Ok(())
}
