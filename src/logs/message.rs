use std::fmt::Write;

use super::frame::{LogFrame, StreamOrigin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

impl AsRef<str> for MessageKind {
    fn as_ref(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

impl From<StreamOrigin> for MessageKind {
    fn from(origin: StreamOrigin) -> Self {
        match origin {
            StreamOrigin::Stdout => Self::Info,
            StreamOrigin::Stderr => Self::Error,
        }
    }
}

/// A single line pushed to a log viewer.
///
/// `content` is already escaped for a JSON string literal, so the envelope
/// is assembled by hand in [`OutboundMessage::to_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub content: String,
}

impl OutboundMessage {
    pub fn error(text: impl AsRef<str>) -> Self {
        Self {
            kind: MessageKind::Error,
            content: sanitize(text.as_ref()),
        }
    }

    pub fn to_json(&self) -> String {
        format!(
            r#"{{"type": "{}", "content": "{}"}}"#,
            self.kind.as_ref(),
            self.content
        )
    }
}

impl From<LogFrame> for OutboundMessage {
    fn from(frame: LogFrame) -> Self {
        Self {
            kind: frame.origin.into(),
            content: sanitize(&frame.payload),
        }
    }
}

/// Escape a log line so it can sit between the quotes of a JSON string.
///
/// Carriage returns and newlines are dropped so every message renders as a
/// single line. Remaining control characters become `\u00XX` escapes.
pub fn sanitize(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            '"' => out.push_str(r#"\""#),
            '\r' | '\n' => {}
            c if c < '\u{20}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
