use tracing_subscriber::EnvFilter;

/// Installs a formatted tracing subscriber filtered by `RUST_LOG`.
///
/// Defaults to `info` when the variable is unset or unparsable. Calling it more
/// than once is harmless; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}
