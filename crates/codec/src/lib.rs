//! Wire format for the natproxy control channel.
//!
//! The control channel is a single bidirectional stream carrying a
//! length-prefixed token header followed by a sequence of length-framed
//! [`ControlMessage`] records. See [`transport`] for the framing and
//! [`message`] for the record shapes.

pub mod error;
pub mod message;
pub mod transport;

pub use error::Error;
pub use message::{AgentInfo, ControlMessage, MessageKind};
pub use transport::{read_message, read_token_header, write_message, write_token_header};
