//! distlock terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local service, WebSocket first, long-polling as fallback
//! distlock --url http://localhost:8080/distlock/
//!
//! # Force long-polling and refuse lock commands before /connect
//! distlock --transport long-polling --reject-unauthenticated
//! ```
//!
//! Commands: `/connect <name>`, `/close`, `/lock <name>`, `/unlock <name>`,
//! `/mlock <names>`, `/munlock <names>`, `/quit`.

mod env;
mod terminal;

use std::time::Duration;

use clap::Parser;
use distlock_app::{Runtime, RuntimeConfig};
use distlock_client::{
    ClientConfig, UnauthenticatedPolicy,
    transport::{LinkConfig, NetTransport},
};
use distlock_core::{ConnectionConfig, LogLevel, TransportKind};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{env::SystemEnv, terminal::TerminalDriver};

/// Distributed lock client
#[derive(Parser, Debug)]
#[command(name = "distlock")]
#[command(about = "Terminal client for the distlock service")]
#[command(version)]
struct Args {
    /// Base URL of the service
    #[arg(short, long, default_value = "http://localhost:8080/distlock/")]
    url: String,

    /// Transport tried first (websocket, long-polling)
    #[arg(short, long, default_value = "websocket")]
    transport: TransportKind,

    /// Transport tried when the first one cannot be established
    #[arg(long, default_value = "long-polling")]
    fallback_transport: TransportKind,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: LogLevel,

    /// Refuse lock commands before /connect instead of sending them
    #[arg(long)]
    reject_unauthenticated: bool,

    /// Resume attempts after the link drops
    #[arg(long, default_value = "5")]
    max_reconnect_attempts: u32,

    /// Wait between resume attempts, in milliseconds
    #[arg(long, default_value = "1000")]
    reconnect_interval_ms: u64,

    /// How long one long-poll request may stay open, in seconds
    #[arg(long, default_value = "30")]
    poll_timeout: u64,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let link = LinkConfig {
        base_url: args.url,
        poll_timeout: Duration::from_secs(args.poll_timeout),
        ..Default::default()
    };
    let connection = ConnectionConfig {
        primary: args.transport,
        fallback: args.fallback_transport,
        log_level: args.log_level,
        max_reconnect_attempts: args.max_reconnect_attempts,
        reconnect_interval: Duration::from_millis(args.reconnect_interval_ms),
        ..Default::default()
    };
    let client = ClientConfig {
        unauthenticated: if args.reject_unauthenticated {
            UnauthenticatedPolicy::Reject
        } else {
            UnauthenticatedPolicy::Permit
        },
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(connection.log_level.as_str()));

    // stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::info!(url = %link.base_url, primary = %connection.primary, "distlock starting");

    let transport = NetTransport::new(link, &connection)?;
    let driver = TerminalDriver::new(!args.no_color);
    let mut runtime =
        Runtime::new(driver, transport, SystemEnv, RuntimeConfig { connection, client });

    runtime.run().await?;

    Ok(())
}
