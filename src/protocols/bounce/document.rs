//! BSON document decoding and rendering for log output.

use bson::Document;
use std::fmt::Write as _;

/// Error decoding a frame's document bytes.
#[derive(Debug)]
pub enum DecodeError {
    /// Fewer bytes than a document's own length field.
    Truncated(usize),
    /// The document's own length field disagrees with the frame.
    LengthMismatch { declared: i32, frame_len: usize },
    /// The bytes are not a valid BSON document.
    Bson(bson::de::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated(len) => write!(f, "{len} bytes is too short for a document"),
            DecodeError::LengthMismatch {
                declared,
                frame_len,
            } => write!(
                f,
                "document declares {declared} bytes but frame holds {frame_len}"
            ),
            DecodeError::Bson(e) => write!(f, "invalid document: {e}"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Bson(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bson::de::Error> for DecodeError {
    fn from(e: bson::de::Error) -> Self {
        DecodeError::Bson(e)
    }
}

/// Decode exactly one document from `bytes`.
///
/// The document's own length field must cover `bytes` exactly; it is checked
/// before handing the bytes to the BSON reader, which sizes its buffer from
/// that field.
pub fn decode(bytes: &[u8]) -> Result<Document, DecodeError> {
    let declared = match bytes {
        [a, b, c, d, ..] => i32::from_le_bytes([*a, *b, *c, *d]),
        _ => return Err(DecodeError::Truncated(bytes.len())),
    };

    if usize::try_from(declared).ok() != Some(bytes.len()) {
        return Err(DecodeError::LengthMismatch {
            declared,
            frame_len: bytes.len(),
        });
    }

    Ok(Document::from_reader(bytes)?)
}

/// Render a document as text, keeping at most `max_chars` characters.
pub fn render(document: &Document, max_chars: usize) -> String {
    let mut out = Truncated::new(max_chars);
    // Formatting stops with an error once the limit is reached.
    let _ = write!(out, "{document}");
    out.text
}

/// Keeps the first `remaining` characters written to it, then fails.
struct Truncated {
    text: String,
    remaining: usize,
}

impl Truncated {
    fn new(max_chars: usize) -> Self {
        Self {
            text: String::with_capacity(max_chars.min(4096)),
            remaining: max_chars,
        }
    }
}

impl std::fmt::Write for Truncated {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        match s.char_indices().nth(self.remaining) {
            Some((end, _)) => {
                self.text.push_str(&s[..end]);
                self.remaining = 0;
                Err(std::fmt::Error)
            }
            None => {
                self.remaining -= s.chars().count();
                self.text.push_str(s);
                Ok(())
            }
        }
    }
}

/// Space-separated hex of the first `max` bytes, with `..` if truncated.
pub fn hex_preview(bytes: &[u8], max: usize) -> String {
    let mut out = String::with_capacity(max.min(bytes.len()) * 3 + 2);
    for (i, byte) in bytes.iter().take(max).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    if bytes.len() > max {
        out.push_str(" ..");
    }
    out
}
