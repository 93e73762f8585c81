use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SMMS_LOG";

/// Sends diagnostics to stderr. `SMMS_LOG` takes `RUST_LOG`-style
/// directives; otherwise only warnings are shown unless `verbose` is set.
pub fn init(verbose: bool) {
    let fallback = if verbose { "smms=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
