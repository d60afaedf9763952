//! Tracing setup for the binary
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to whoever embeds it.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a console subscriber. `RUST_LOG` wins over the default level.
pub fn init(debug: bool) {
    let default_level = if debug { "pagepilot=debug" } else { "pagepilot=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout is reserved for observations
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();
}
