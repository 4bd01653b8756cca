//! Server configuration.
//!
//! [`CliArgs`] is the raw CLI/env surface; [`ServerConfig`] is the validated
//! form the dispatcher runs with. Defaults are production-reasonable and a
//! `.env` file is loaded by the binary before parsing.

use anyhow::Context;
use clap::Parser;
use core::time::Duration;
use herolink_core::frame::DEFAULT_MAX_FRAME_BYTES;
use std::net::SocketAddr;

/// Command-line and environment arguments.
#[derive(Parser, Debug)]
#[command(name = "herolink-server", about = "RPC dispatcher for HeroService")]
pub struct CliArgs {
    /// Address the dispatcher binds to.
    #[arg(long, env = "HEROLINK_ADDR", default_value = "127.0.0.1:50051")]
    pub addr: String,

    /// Maximum size of a single request or response frame, in bytes.
    #[arg(long, env = "HEROLINK_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,

    /// How long to wait for in-flight calls to drain on shutdown, in
    /// milliseconds.
    #[arg(long, env = "HEROLINK_SHUTDOWN_GRACE_MS", default_value_t = 3_000)]
    pub shutdown_grace_ms: u64,
}

/// Validated runtime configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub max_frame_bytes: usize,
    pub shutdown_grace: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> anyhow::Result<Self> {
        let addr: SocketAddr = args
            .addr
            .parse()
            .with_context(|| format!("invalid listen address {:?}", args.addr))?;

        anyhow::ensure!(
            args.max_frame_bytes > 0,
            "max_frame_bytes must be greater than 0"
        );

        Ok(Self {
            addr,
            max_frame_bytes: args.max_frame_bytes,
            shutdown_grace: Duration::from_millis(args.shutdown_grace_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let args = CliArgs::parse_from(["herolink-server"]);
        let config = ServerConfig::try_from(args).unwrap();
        assert_eq!(config.addr.port(), 50051);
        assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn bad_address_is_rejected() {
        let args = CliArgs::parse_from(["herolink-server", "--addr", "not-an-addr"]);
        assert!(ServerConfig::try_from(args).is_err());
    }

    #[test]
    fn zero_frame_limit_is_rejected() {
        let args = CliArgs::parse_from(["herolink-server", "--max-frame-bytes", "0"]);
        assert!(ServerConfig::try_from(args).is_err());
    }
}
