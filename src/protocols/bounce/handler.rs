//! Bounce protocol handler for the Tokio runtime.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::decoder::{DecoderSettings, FrameDecoder};
use super::sink::{FrameLog, TracingLog};

/// Bytes read from the peer per iteration.
pub const CHUNK_SIZE: usize = 1024;

/// Per-connection settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionSettings {
    pub idle_timeout: Option<Duration>,
    pub decoder: DecoderSettings,
}

/// Why a relay loop ended without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The peer closed its side.
    PeerClosed,
    /// Nothing arrived within the idle timeout.
    IdleTimeout,
}

/// Echo everything read from `stream` back to it, feeding each chunk to
/// `decoder` after it has been written.
///
/// Returns how the peer went away. Read and write errors are returned as-is;
/// the decoder never affects the outcome.
pub async fn relay<S>(
    stream: &mut S,
    decoder: &mut FrameDecoder,
    log: &mut impl FrameLog,
    idle_timeout: Option<Duration>,
) -> io::Result<Disconnect>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let n = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.read(&mut chunk)).await {
                Ok(result) => result?,
                Err(_) => return Ok(Disconnect::IdleTimeout),
            },
            None => stream.read(&mut chunk).await?,
        };
        if n == 0 {
            return Ok(Disconnect::PeerClosed);
        }

        stream.write_all(&chunk[..n]).await?;
        decoder.feed(&chunk[..n], log);
    }
}

/// Handle one bounce connection from accept to close.
pub async fn handle_connection<S>(mut stream: S, peer: SocketAddr, settings: ConnectionSettings)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(%peer, "connected");

    let mut decoder = FrameDecoder::new(settings.decoder);
    let mut log = TracingLog::new(peer);

    match relay(&mut stream, &mut decoder, &mut log, settings.idle_timeout).await {
        Ok(Disconnect::PeerClosed) => info!(%peer, "disconnected"),
        Ok(Disconnect::IdleTimeout) => info!(%peer, "disconnected (idle timeout)"),
        Err(e) => warn!(%peer, "error ( {e} )"),
    }

    let stats = decoder.stats();
    debug!(
        %peer,
        decoded = stats.decoded,
        empty = stats.empty,
        malformed = stats.malformed,
        oversized = stats.oversized,
        discarded = stats.discarded,
        pending = decoder.buffered(),
        "connection summary"
    );

    if let Err(e) = stream.shutdown().await {
        debug!(%peer, error = %e, "Failed to shut down connection");
    }
}
