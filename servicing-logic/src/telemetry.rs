use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global tracing subscriber, honoring `RUST_LOG`. Safe to
/// call from every test and binary entry point.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}
