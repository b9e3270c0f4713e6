use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize console tracing.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this twice is
/// harmless; the second registration is ignored.
pub fn init_tracing(default_filter: &str) {
    let console_fmt = tracing_subscriber::fmt::layer().event_format(
        Format::default()
            .compact()
            .with_target(false)
            .without_time(),
    );

    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(console_fmt)
        .try_init();

    if result.is_ok() {
        tracing::debug!(filter = %default_filter, "Tracing initialized");
    }
}
