use std::io::IsTerminal;

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Initialize logging for the CLI.
///
/// Logs go to stderr so stdout only carries the confirmation line. `RUST_LOG`
/// wins when set; otherwise `verbose` picks between `debug` and `warn`.
/// Calling this twice is harmless, the second call is ignored.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(filter)
        .with_target(verbose)
        .without_time()
        .try_init();

    if result.is_ok() {
        debug!("Initialized blockpatch v{} logging", crate::version());
    }
}
