use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber: compact output on stderr.
///
/// `RUST_LOG` overrides `default_level`. Calling this twice is a no-op.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
