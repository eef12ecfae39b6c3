//! Profiling utilities based on the `puffin` crate.

pub use puffin::{profile_function, profile_scope};

/// Address the puffin HTTP server listens on.
pub const DEFAULT_PROFILER_ADDR: &str = "0.0.0.0:8585";

#[cfg(feature = "profiling")]
static PROFILING_SERVER: std::sync::OnceLock<puffin_http::Server> = std::sync::OnceLock::new();

/// Enable puffin scopes and serve them to `puffin_viewer` on `addr`.
///
/// Returns `false` if the server could not be started; scopes stay enabled
/// either way.
///
/// # Example
/// ```no_run
/// use spritebatch_core::profiling::{init_profiling, DEFAULT_PROFILER_ADDR};
///
/// init_profiling(DEFAULT_PROFILER_ADDR);
/// ```
#[cfg(feature = "profiling")]
pub fn init_profiling(addr: &str) -> bool {
    puffin::set_scopes_on(true);

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

/// Toggle scope collection without starting a server.
pub fn set_enabled(enabled: bool) {
    puffin::set_scopes_on(enabled);
}

/// Mark the start of a new frame.
///
/// Call this once per rendered frame so puffin groups the renderer's scopes.
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}
