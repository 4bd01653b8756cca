//! Tracing subscriber setup for the server binary.
//!
//! Installs an `EnvFilter`-driven fmt subscriber once per process. Filtering
//! follows the usual `RUST_LOG` conventions and defaults to `info` when the
//! variable is unset or unparsable.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
