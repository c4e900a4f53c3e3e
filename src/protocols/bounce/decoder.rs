//! Incremental frame decoder.
//!
//! Owns one connection's accumulation buffer. Chunks arrive with arbitrary
//! boundaries; every complete frame is decoded and reported to a
//! [`FrameLog`], and leftover bytes wait for the next chunk.
//!
//! Decoding never fails outward. A frame whose document is malformed is
//! reported and skipped. A frame larger than `max_frame_size` is reported and
//! its bytes are dropped as they arrive, so the buffer never holds more than
//! one bounded frame.

use bytes::{Buf, BytesMut};

use super::document;
use super::parser::{self, Frame, LengthMode, ParseResult};
use super::sink::{FrameEvent, FrameLog};

/// Initial accumulation buffer capacity.
const INITIAL_CAPACITY: usize = 4 * 1024;

/// Bytes of an undecodable payload shown in diagnostics.
const HEX_PREVIEW_BYTES: usize = 16;

/// Per-connection decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderSettings {
    pub length_mode: LengthMode,
    pub max_frame_size: usize,
    pub preview_chars: usize,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            length_mode: LengthMode::Payload,
            max_frame_size: 64 * 1024 * 1024,
            preview_chars: 1000,
        }
    }
}

/// Counters kept for the lifetime of one decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub decoded: u64,
    pub empty: u64,
    pub malformed: u64,
    pub oversized: u64,
    /// Bytes dropped while resynchronizing.
    pub discarded: u64,
}

pub struct FrameDecoder {
    buffer: BytesMut,
    /// Remaining bytes of an oversized frame still to be dropped.
    skip: usize,
    settings: DecoderSettings,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new(settings: DecoderSettings) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            skip: 0,
            settings,
            stats: DecoderStats::default(),
        }
    }

    /// Accept the next chunk of the stream and report every frame it completes.
    pub fn feed(&mut self, chunk: &[u8], log: &mut impl FrameLog) {
        let chunk = self.skip_oversized(chunk);
        self.buffer.extend_from_slice(chunk);

        loop {
            match parser::parse(
                &self.buffer,
                self.settings.length_mode,
                self.settings.max_frame_size,
            ) {
                ParseResult::Complete(frame) => {
                    self.report_frame(&frame, log);
                    self.buffer.advance(frame.consumed);
                }
                ParseResult::Incomplete { needed } => {
                    if !self.buffer.is_empty() {
                        log.record(FrameEvent::Partial {
                            buffered: self.buffer.len(),
                            needed,
                        });
                    }
                    return;
                }
                ParseResult::TooLarge { length, total } => {
                    self.stats.oversized += 1;
                    log.record(FrameEvent::TooLarge {
                        length,
                        max: self.settings.max_frame_size,
                    });

                    let dropped = total.min(self.buffer.len());
                    self.buffer.advance(dropped);
                    self.stats.discarded += dropped as u64;
                    self.skip = total - dropped;
                    if self.skip > 0 {
                        return;
                    }
                }
                ParseResult::InvalidLength(length) => {
                    let discarded = self.buffer.len();
                    self.stats.discarded += discarded as u64;
                    self.buffer.clear();
                    log.record(FrameEvent::InvalidLength { length, discarded });
                    return;
                }
            }
        }
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop the front of `chunk` that still belongs to an oversized frame.
    fn skip_oversized<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        if self.skip == 0 {
            return chunk;
        }
        let n = self.skip.min(chunk.len());
        self.skip -= n;
        self.stats.discarded += n as u64;
        &chunk[n..]
    }

    fn report_frame(&mut self, frame: &Frame, log: &mut impl FrameLog) {
        if frame.is_empty() {
            self.stats.empty += 1;
            log.record(FrameEvent::Empty);
            return;
        }

        let bytes = &self.buffer[frame.document.clone()];
        match document::decode(bytes) {
            Ok(doc) => {
                self.stats.decoded += 1;
                log.record(FrameEvent::Decoded {
                    length: frame.length,
                    text: document::render(&doc, self.settings.preview_chars),
                });
            }
            Err(e) => {
                self.stats.malformed += 1;
                log.record(FrameEvent::Malformed {
                    length: frame.length,
                    error: e.to_string(),
                    preview: document::hex_preview(bytes, HEX_PREVIEW_BYTES),
                });
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DecoderSettings::default())
    }
}
