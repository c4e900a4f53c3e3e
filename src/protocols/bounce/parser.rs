//! Frame header parser.

use std::ops::Range;

/// Size of the little-endian length field.
pub const HEADER_LEN: usize = 4;

/// What the length field counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthMode {
    /// Payload bytes only; the frame is `HEADER_LEN + length` bytes.
    #[default]
    Payload,
    /// The whole frame including the length field, as in a raw BSON
    /// document whose leading int32 is its own size.
    Inclusive,
}

/// A complete frame at the front of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Value of the length field.
    pub length: usize,
    /// Bytes to hand to the document decoder.
    pub document: Range<usize>,
    /// Total bytes the frame occupies.
    pub consumed: usize,
}

impl Frame {
    /// A frame carrying no payload beyond its length field.
    pub fn is_empty(&self) -> bool {
        self.consumed == HEADER_LEN
    }
}

/// Parse result.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    /// A whole frame is available.
    Complete(Frame),
    /// Need more data. `needed` is the full frame size once the header is known.
    Incomplete { needed: Option<usize> },
    /// Length field exceeds the configured maximum; `total` is the declared
    /// frame size in bytes.
    TooLarge { length: usize, total: usize },
    /// Length field cannot describe a frame (inclusive length below 4).
    InvalidLength(usize),
}

/// Parse a frame from the start of `input`.
///
/// Never consumes anything itself; callers advance their buffer by
/// `Frame::consumed`.
pub fn parse(input: &[u8], mode: LengthMode, max_frame_size: usize) -> ParseResult {
    if input.len() < HEADER_LEN {
        return ParseResult::Incomplete { needed: None };
    }

    let mut field = [0u8; HEADER_LEN];
    field.copy_from_slice(&input[..HEADER_LEN]);
    let length = u32::from_le_bytes(field) as usize;

    let (total, document) = match mode {
        LengthMode::Payload => {
            let total = length.saturating_add(HEADER_LEN);
            (total, HEADER_LEN..total)
        }
        LengthMode::Inclusive => {
            if length < HEADER_LEN {
                return ParseResult::InvalidLength(length);
            }
            (length, 0..length)
        }
    };

    if length > max_frame_size {
        return ParseResult::TooLarge { length, total };
    }

    if input.len() < total {
        return ParseResult::Incomplete {
            needed: Some(total),
        };
    }

    ParseResult::Complete(Frame {
        length,
        document,
        consumed: total,
    })
}

/// Encode a length field for `payload_len` payload bytes.
#[cfg(test)]
pub fn length_field(payload_len: usize, mode: LengthMode) -> [u8; HEADER_LEN] {
    let length = match mode {
        LengthMode::Payload => payload_len,
        LengthMode::Inclusive => payload_len + HEADER_LEN,
    };
    (length as u32).to_le_bytes()
}
