/// Initialize tracing output. Call once from the host shell before using
/// [`crate::CallManager`].
pub fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "consult_core=debug,consult_livekit=info".parse().unwrap()),
            )
            .with_ansi(false)
            .init();
    });
}
