use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. `RUST_LOG` wins over the verbosity
/// flag when set.
pub fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info,chromiumoxide=warn",
        _ => "debug,chromiumoxide=info",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
