use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::prelude::*;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "MAILVERIFY_LOG";

/// Filter from [`LOG_ENV`], or `default` when unset or unparsable.
pub fn filter(default: &str) -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::try_new(&directives).unwrap_or_else(|err| {
            eprintln!("Invalid {LOG_ENV} value {directives:?} ({err}), defaulting to {default}");
            EnvFilter::new(default)
        }),
        Err(_) => EnvFilter::new(default),
    }
}

/// Install the global subscriber: compact lines on stderr, RFC 3339 UTC
/// timestamps. A second call is a no-op.
pub fn init(default: &str) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .compact()
        .with_timer(ChronoUtc::rfc_3339())
        .with_filter(filter(default));

    let _ = tracing_subscriber::registry().with(layer).try_init();
}
