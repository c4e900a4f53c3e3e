//! TCP listener for bounce connections.
//!
//! Binds loopback, accepts connections, and hands each one to the bounce
//! handler on its own task with its own frame decoder.

use crate::config::Config;
use crate::protocols::bounce::{self, ConnectionSettings};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server instance
pub struct Server {
    listener: TcpListener,
    settings: ConnectionSettings,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket on `127.0.0.1:<port>`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: &Config) -> Result<Self, ServerError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
        let listener = create_listener(addr, config.backlog)
            .and_then(TcpListener::from_std)
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Server {
            listener,
            settings: ConnectionSettings {
                idle_timeout: config.idle_timeout(),
                decoder: config.decoder_settings(),
            },
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the process exits.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.local_addr().map_err(ServerError::Listener)?;
        info!(
            address = %addr,
            max_connections = self.connection_limit.available_permits(),
            "listening on port {}",
            addr.port()
        );

        loop {
            // Wait for a connection slot
            let Ok(permit) = self.connection_limit.clone().acquire_owned().await else {
                return Ok(());
            };

            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let settings = self.settings;
                    tokio::spawn(async move {
                        bounce::handle_connection(stream, peer, settings).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    drop(permit);
                    accept_failed(&e).await;
                }
            }
        }
    }
}

/// Log an accept error and pause before the next accept.
async fn accept_failed(e: &io::Error) {
    error!(error = %e, "Failed to accept connection");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// Create a TCP listener with SO_REUSEADDR and an explicit backlog.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

/// Server errors
#[derive(Debug)]
pub enum ServerError {
    /// The listening socket could not be created.
    Bind { addr: SocketAddr, source: io::Error },
    /// The bound listener failed.
    Listener(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind { addr, source } => write!(f, "Failed to bind {addr}: {source}"),
            ServerError::Listener(e) => write!(f, "Listener error: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Listener(e) => Some(e),
        }
    }
}
