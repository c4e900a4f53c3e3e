//! bson-bouncer: a diagnostic TCP relay for BSON peers
//!
//! Every connection gets its own bytes echoed back verbatim, while the same
//! stream is decoded as length-prefixed BSON documents and logged.
//!
//! Features:
//! - Incremental framing that tolerates partial and coalesced reads
//! - Malformed, empty and oversized frames are logged and skipped
//! - One task per connection, optionally limited to one peer at a time
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocols;
mod server;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        port = config.port,
        max_connections = config.max_connections,
        max_frame_size = config.max_frame_size,
        length_mode = ?config.length_mode,
        "Starting bson-bouncer"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let server = Server::bind(&config)?;
        server.run().await
    })?;

    Ok(())
}
