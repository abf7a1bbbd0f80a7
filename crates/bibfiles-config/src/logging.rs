//! Logging setup shared by the bibfiles binaries.
//!
//! Filter selection order: `BIBFILES_LOG`, then `RUST_LOG`, then the
//! default level passed by the caller.

/// Initialize tracing with the given default filter.
/// Call this once at application startup.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env("BIBFILES_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
