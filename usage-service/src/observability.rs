use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "usage_service=info,usage_stats=info";

/// Filter from a `RUST_LOG`-style directive string, or the default when absent or invalid.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Logs go to stderr; stdout carries the report.
pub fn init_tracing() {
    let rust_log = std::env::var("RUST_LOG").ok();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
