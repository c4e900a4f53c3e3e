//! Bounce protocol implementation.
//!
//! A diagnostic relay for BSON peers:
//! - Every byte a client sends is written straight back to it
//! - The same bytes are read as length-prefixed BSON documents and logged
//!
//! ## Use Cases
//!
//! 1. **Client debugging**: Point a BSON-speaking client at the relay and see
//!    each document it sends while it receives its own traffic back.
//!
//! 2. **Framing validation**: Malformed, empty and oversized frames are
//!    reported individually, so a client's framing bugs show up in the log
//!    without stalling the stream.
//!
//! ## Protocol Format
//!
//! ```text
//! Frame:  <u32 little-endian length><length bytes of BSON document>
//!
//! Example ({ "ab": 1 }, 13-byte document):
//! Client: 0d 00 00 00 0d 00 00 00 10 61 62 00 01 00 00 00 00
//! Server: 0d 00 00 00 0d 00 00 00 10 61 62 00 01 00 00 00 00
//! Log:    13 bytes: { "ab": 1 }
//! ```
//!
//! With [`LengthMode::Inclusive`] the length field counts itself, which is
//! how raw BSON documents are laid out back to back.

pub mod decoder;
pub mod document;
pub mod handler;
pub mod parser;
pub mod sink;

pub use decoder::DecoderSettings;
pub use handler::{handle_connection, ConnectionSettings};
pub use parser::LengthMode;
