/// Initializes the global tracing subscriber. `RUST_LOG` takes precedence over
/// `default_level` (typically the config's `log.level`) when set.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}
