//! Frame decoding outcomes and where they are reported.

use std::fmt;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Something the frame decoder observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame's document decoded; `text` is its truncated rendering.
    Decoded { length: usize, text: String },
    /// A frame with no payload.
    Empty,
    /// Bytes are buffered waiting for the rest of a frame.
    Partial {
        buffered: usize,
        needed: Option<usize>,
    },
    /// A complete frame whose document failed to decode.
    Malformed {
        length: usize,
        error: String,
        preview: String,
    },
    /// A length field above the configured maximum; the frame is skipped.
    TooLarge { length: usize, max: usize },
    /// A length field that cannot describe a frame; the buffer is dropped.
    InvalidLength { length: usize, discarded: usize },
}

/// Receiver of frame events.
pub trait FrameLog {
    fn record(&mut self, event: FrameEvent);
}

impl FrameLog for Vec<FrameEvent> {
    fn record(&mut self, event: FrameEvent) {
        self.push(event);
    }
}

/// Writes frame events to the tracing subscriber, tagged with the peer.
pub struct TracingLog {
    peer: SocketAddr,
}

impl TracingLog {
    pub fn new(peer: SocketAddr) -> Self {
        Self { peer }
    }
}

impl FrameLog for TracingLog {
    fn record(&mut self, event: FrameEvent) {
        let peer = self.peer;
        match &event {
            FrameEvent::Decoded { .. } | FrameEvent::Empty => info!(%peer, "{event}"),
            FrameEvent::Partial { .. } => debug!(%peer, "{event}"),
            FrameEvent::Malformed { .. }
            | FrameEvent::TooLarge { .. }
            | FrameEvent::InvalidLength { .. } => warn!(%peer, "{event}"),
        }
    }
}

impl fmt::Display for FrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameEvent::Decoded { length, text } => write!(f, "{length} bytes: {text}"),
            FrameEvent::Empty => write!(f, "empty frame"),
            FrameEvent::Partial {
                buffered,
                needed: Some(needed),
            } => write!(f, "partial frame: {buffered} of {needed} bytes"),
            FrameEvent::Partial {
                buffered,
                needed: None,
            } => write!(f, "partial header: {buffered} bytes"),
            FrameEvent::Malformed {
                length,
                error,
                preview,
            } => write!(f, "{length} bytes: undecodable ({error}) [{preview}]"),
            FrameEvent::TooLarge { length, max } => {
                write!(f, "{length} bytes: frame too large (max {max}), skipping")
            }
            FrameEvent::InvalidLength { length, discarded } => write!(
                f,
                "invalid length field {length}, discarded {discarded} bytes"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_line() {
        let event = FrameEvent::Decoded {
            length: 13,
            text: r#"{ "ab": 1 }"#.to_string(),
        };
        assert_eq!(event.to_string(), r#"13 bytes: { "ab": 1 }"#);
    }

    #[test]
    fn test_diagnostic_lines() {
        assert_eq!(FrameEvent::Empty.to_string(), "empty frame");
        assert_eq!(
            FrameEvent::Partial {
                buffered: 10,
                needed: Some(17)
            }
            .to_string(),
            "partial frame: 10 of 17 bytes"
        );
        assert_eq!(
            FrameEvent::Partial {
                buffered: 3,
                needed: None
            }
            .to_string(),
            "partial header: 3 bytes"
        );
        assert_eq!(
            FrameEvent::Malformed {
                length: 19,
                error: "bad".to_string(),
                preview: "6e 6f".to_string(),
            }
            .to_string(),
            "19 bytes: undecodable (bad) [6e 6f]"
        );
        assert_eq!(
            FrameEvent::TooLarge {
                length: 300,
                max: 64
            }
            .to_string(),
            "300 bytes: frame too large (max 64), skipping"
        );
        assert_eq!(
            FrameEvent::InvalidLength {
                length: 2,
                discarded: 6
            }
            .to_string(),
            "invalid length field 2, discarded 6 bytes"
        );
    }
}
