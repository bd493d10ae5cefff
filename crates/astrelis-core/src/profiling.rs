//! Profiling utilities based on the `puffin` crate.
//!
//! With the `profiling` feature disabled the scope macros expand to nothing,
//! so library crates can instrument hot paths unconditionally.

#[cfg(feature = "profiling")]
pub use puffin::{profile_function, profile_scope};

#[cfg(not(feature = "profiling"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __astrelis_profile_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "profiling"))]
pub use crate::__astrelis_profile_noop as profile_function;
#[cfg(not(feature = "profiling"))]
pub use crate::__astrelis_profile_noop as profile_scope;

/// Default address of the puffin HTTP server.
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8585";

#[cfg(feature = "profiling")]
static PROFILING_SERVER: std::sync::OnceLock<puffin_http::Server> = std::sync::OnceLock::new();

/// Enable puffin scopes and start the HTTP server on `addr`.
///
/// Returns `false` if the server could not be started. Calling this more than
/// once keeps the first server alive.
#[cfg(feature = "profiling")]
pub fn init_profiling(addr: &str) -> bool {
    puffin::set_scopes_on(true);

    if PROFILING_SERVER.get().is_some() {
        return true;
    }

    match puffin_http::Server::new(addr) {
        Ok(server) => {
            tracing::info!("Puffin profiler server started on http://{}", addr);
            let _ = PROFILING_SERVER.set(server);
            true
        }
        Err(e) => {
            tracing::error!("Failed to start puffin server: {}", e);
            false
        }
    }
}

/// Profiling is compiled out; always returns `false`.
#[cfg(not(feature = "profiling"))]
pub fn init_profiling(_addr: &str) -> bool {
    false
}

/// Mark the start of a new frame for profiling.
#[inline]
pub fn new_frame() {
    #[cfg(feature = "profiling")]
    puffin::GlobalProfiler::lock().new_frame();
}
