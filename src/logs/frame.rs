//! Record framing for the engine's multiplexed log stream.
//!
//! Every record starts with an 8 byte header. The first byte names the
//! stream the line came from and the remaining seven bytes are ignored.
//! Records are newline delimited, so the header's size field is never
//! consulted.

/// Size of the header that precedes every log record.
pub const HEADER_LEN: usize = 8;

/// Discriminator the engine uses for stdin frames.
pub const STDIN_DISCRIMINATOR: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

impl StreamOrigin {
    /// Classify a header's first byte.
    ///
    /// Anything other than `2` is treated as stdout, including stdin and
    /// values the engine does not document.
    pub fn from_discriminator(byte: u8) -> Self {
        match byte {
            2 => Self::Stderr,
            _ => Self::Stdout,
        }
    }

    pub fn discriminator(self) -> u8 {
        match self {
            Self::Stdout => 1,
            Self::Stderr => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub origin: StreamOrigin,
    pub payload: String,
}

impl LogFrame {
    /// Materialize a frame from one record (line terminator already removed).
    ///
    /// Returns `None` when the record is not longer than the header.
    pub fn parse(record: &[u8]) -> Option<Self> {
        if record.len() <= HEADER_LEN {
            return None;
        }
        Some(Self {
            origin: StreamOrigin::from_discriminator(record[0]),
            payload: String::from_utf8_lossy(&record[HEADER_LEN..]).into_owned(),
        })
    }
}

/// Build the header written in front of a record.
pub fn frame_header(discriminator: u8) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = discriminator;
    header
}
