use std::{io, str::Utf8Error};

/// Errors surfaced while framing or parsing control channel traffic.
#[derive(Debug)]
pub enum Error {
    /// The stream ended (or failed) before a complete frame was read.
    Io(io::Error),
    /// A frame's declared length header was outside the sane bounds.
    BadRequest,
    /// The token header was missing, empty, or not valid UTF-8.
    BadMetadata,
    /// A `data` payload tag did not match any known `MessageKind`.
    UnknownMessageKind(u8),
    /// An `AgentInfo` payload failed to deserialize.
    Json(serde_json::Error),
    Utf8(Utf8Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "control stream io error: {e}"),
            Self::BadRequest => write!(f, "bad request"),
            Self::BadMetadata => write!(f, "bad metadata"),
            Self::UnknownMessageKind(tag) => write!(f, "unknown message kind: {tag}"),
            Self::Json(e) => write!(f, "malformed payload: {e}"),
            Self::Utf8(e) => write!(f, "payload is not valid utf-8: {e}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8(value)
    }
}
