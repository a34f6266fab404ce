//! Command-line arguments and runtime configuration

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Signaling server that pairs anonymous visitors for peer-to-peer calls.
#[derive(Parser, Debug, Clone)]
#[command(name = "roulette-signaling")]
#[command(version)]
pub struct Cli {
    /// Address to bind.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub log_level: String,
}

impl ServerConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            listen: SocketAddr::new(cli.host, cli.port),
            log_level: cli.log_level.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            log_level: "info".to_string(),
        }
    }
}
