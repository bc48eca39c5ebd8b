pub mod xref_cmd;

pub use xref_cmd::XrefCli;
pub use xref_cmd::XrefCommand;

use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber; `RUST_LOG` wins over the default level.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
