//! Logging bootstrap
//!
//! The engine logs through `tracing`. Applications that already install a
//! subscriber see those events in their own pipeline; standalone tools can
//! call [`init_tracing`].

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG` (default `info`).
///
/// ```ignore
/// // RUST_LOG=block_flow=debug shows every step
/// block_flow::logging::init_tracing();
/// ```
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
