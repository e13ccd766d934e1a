// Logging module - Logging infrastructure
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

/// Pick the filter directive when RUST_LOG is not set.
pub fn default_directive(verbose: bool, silent: bool, level: &str) -> String {
    if silent {
        "off".to_string()
    } else if verbose {
        "qmictl=debug,warn".to_string()
    } else {
        level.to_string()
    }
}

/// Initialize logging system
///
/// Logs go to stderr; stdout is reserved for result objects.
pub fn init_logging(
    verbose: bool,
    silent: bool,
    level: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose, silent, level)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(verbose)
                .with_level(true)
        )
        .try_init()?;

    tracing::debug!("qmictl logging system initialized");
    Ok(())
}
