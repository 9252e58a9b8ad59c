//! Diagnostics for the port and the filesystems it installs.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::PortError;

/// Routes `tracing` output to stderr, filtered by `$RUST_LOG`.
///
/// Only errors are shown when `$RUST_LOG` isn't set. Fails if the process
/// already has a global subscriber.
pub fn set_up_logging() -> Result<(), PortError> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_ansi(should_emit_colors())
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .compact();

    let filter_layer = EnvFilter::builder().from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|_| PortError::SubscriberTaken)
}

/// Colors are used only on a terminal, and never when `$NO_COLOR` is set.
fn should_emit_colors() -> bool {
    isatty::stderr_isatty() && std::env::var_os("NO_COLOR").is_none()
}
