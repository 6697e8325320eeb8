use std::io;

use directory::Error as DirectoryError;

/// The error kinds named in §7, shared by the broker session and the
/// agent loop.
#[derive(Debug)]
pub enum Error {
    /// A control message was received that the recipient does not act on.
    NotSupported,
    /// The session/agent was torn down deliberately (not a failure).
    Canceled,
    /// A listener could not be bound, or `Accept` failed permanently.
    ListenFailed(io::Error),
    /// A frame was malformed.
    BadRequest,
    /// The control channel's token header was missing or empty.
    BadMetadata,
    /// A session queue was closed while something still needed to read
    /// or write through it.
    QueueClosed,
    /// The address allocator exhausted its retry budget.
    PortAllocationFailed,
    /// The directory does not recognize this token.
    TokenNotValid,
    /// `register_addr` failed against the directory.
    RegisterAddrFailed,
    /// Pairing a public connection with a dial-back connection timed out.
    PairingTimedOut,
    /// The directory reported `disconnect=true` for this token.
    Disconnected,
    /// TLS setup failed (bad cert/key material).
    Tls(io::Error),
    Io(io::Error),
    Codec(codec::Error),
    Directory(DirectoryError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSupported => write!(f, "not supported"),
            Self::Canceled => write!(f, "canceled"),
            Self::ListenFailed(e) => write!(f, "listen failed: {e}"),
            Self::BadRequest => write!(f, "bad request"),
            Self::BadMetadata => write!(f, "bad metadata"),
            Self::QueueClosed => write!(f, "message channel closed"),
            Self::PortAllocationFailed => write!(f, "cannot allocate port"),
            Self::TokenNotValid => write!(f, "token not valid"),
            Self::RegisterAddrFailed => write!(f, "cannot register address"),
            Self::PairingTimedOut => write!(f, "pairing timed out waiting for dial-back connection"),
            Self::Disconnected => write!(f, "directory reported disconnect"),
            Self::Tls(e) => write!(f, "tls setup failed: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Codec(e) => write!(f, "{e}"),
            Self::Directory(e) => write!(f, "{e}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<codec::Error> for Error {
    fn from(value: codec::Error) -> Self {
        match value {
            codec::Error::BadMetadata => Self::BadMetadata,
            codec::Error::BadRequest => Self::BadRequest,
            other => Self::Codec(other),
        }
    }
}

impl From<DirectoryError> for Error {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::TokenNotValid => Self::TokenNotValid,
            DirectoryError::RegisterAddrFailed => Self::RegisterAddrFailed,
            other => Self::Directory(other),
        }
    }
}
