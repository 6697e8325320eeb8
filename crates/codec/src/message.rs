use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The four control message types exchanged on the control channel.
///
/// Numeric tags are part of the wire format and MUST stay stable across
/// versions.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum MessageKind {
    Report = 0,
    Connect = 1,
    WanAddr = 2,
    DisConnect = 3,
}

/// Identity the agent reports on connect, once per control channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentInfo {
    pub os: String,
    pub arch: String,
    pub version: String,
}

impl AgentInfo {
    pub fn current(version: &str) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: version.to_string(),
        }
    }
}

/// A tagged `{type, payload}` record.
///
/// `payload` is opaque bytes whose meaning is determined by `kind`: a
/// UTF-8 `host:port` for `Connect`/`WanAddr`, a JSON-encoded `AgentInfo`
/// for `Report`, and empty for `DisConnect`.
#[derive(Debug, Clone)]
pub struct ControlMessage {
    pub kind: MessageKind,
    pub payload: Bytes,
}

impl ControlMessage {
    pub fn report(info: &AgentInfo) -> Result<Self, Error> {
        Ok(Self {
            kind: MessageKind::Report,
            payload: Bytes::from(serde_json::to_vec(info)?),
        })
    }

    pub fn connect(dialback_addr: &str) -> Self {
        Self {
            kind: MessageKind::Connect,
            payload: Bytes::copy_from_slice(dialback_addr.as_bytes()),
        }
    }

    pub fn wan_addr(public_addr: &str) -> Self {
        Self {
            kind: MessageKind::WanAddr,
            payload: Bytes::copy_from_slice(public_addr.as_bytes()),
        }
    }

    pub fn disconnect() -> Self {
        Self {
            kind: MessageKind::DisConnect,
            payload: Bytes::new(),
        }
    }

    /// Decode a `Connect`/`WanAddr` payload as a `host:port` string.
    pub fn addr(&self) -> Result<&str, Error> {
        Ok(std::str::from_utf8(&self.payload)?)
    }

    /// Decode a `Report` payload as `AgentInfo`.
    pub fn agent_info(&self) -> Result<AgentInfo, Error> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_round_trips_agent_info() {
        let info = AgentInfo {
            os: "linux".into(),
            arch: "x86_64".into(),
            version: "1.2.3".into(),
        };

        let msg = ControlMessage::report(&info).unwrap();
        assert_eq!(msg.kind, MessageKind::Report);
        assert_eq!(msg.agent_info().unwrap(), info);
    }

    #[test]
    fn connect_and_wan_addr_carry_the_address_verbatim() {
        let msg = ControlMessage::connect("203.0.113.9:54321");
        assert_eq!(msg.kind, MessageKind::Connect);
        assert_eq!(msg.addr().unwrap(), "203.0.113.9:54321");

        let msg = ControlMessage::wan_addr("203.0.113.9:20001");
        assert_eq!(msg.kind, MessageKind::WanAddr);
        assert_eq!(msg.addr().unwrap(), "203.0.113.9:20001");
    }

    #[test]
    fn disconnect_payload_is_empty() {
        let msg = ControlMessage::disconnect();
        assert_eq!(msg.kind, MessageKind::DisConnect);
        assert!(msg.payload.is_empty());
    }

    #[test]
    fn message_kind_tags_are_stable() {
        assert_eq!(u8::from(MessageKind::Report), 0);
        assert_eq!(u8::from(MessageKind::Connect), 1);
        assert_eq!(u8::from(MessageKind::WanAddr), 2);
        assert_eq!(u8::from(MessageKind::DisConnect), 3);
    }
}
