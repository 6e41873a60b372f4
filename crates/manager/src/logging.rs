//! Tracing setup for hosts embedding the manager standalone.
//!
//! The agent process usually installs its own subscriber; this helper is
//! for tools and tests that want the manager's structured logs on stderr
//! with `RUST_LOG`-style filtering.

use tracing_subscriber::filter;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Install a global stderr subscriber, honoring `RUST_LOG` and defaulting
/// to `info`.
pub fn init() {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(false)
        .with_filter(env_filter);

    registry().with(fmt_layer).init();
}
