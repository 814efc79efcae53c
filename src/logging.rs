use tracing_subscriber::{EnvFilter, fmt};

/// Console logging for the CLI. Level comes from `RUST_LOG` (default `info`);
/// output goes to stderr so stdout stays the report.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Debug-level logging captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
