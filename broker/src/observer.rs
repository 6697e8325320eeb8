use codec::AgentInfo;

/// Lifecycle hook for a broker session, mirroring the core-crate
/// trait / binary-crate impl split the teacher codebase uses for its
/// `Observer`/`ServiceHandler` pair. The default impl just logs; a
/// deployment embedding this crate could swap in metrics or an event
/// bus here without touching `Session` itself.
pub trait SessionObserver: Send + Sync + 'static {
    fn session_started(&self, token: &str, public_addr: &str, dialback_addr: &str) {
        log::info!(
            "session started: token={token}, public_addr={public_addr}, dialback_addr={dialback_addr}"
        );
    }

    fn agent_reported(&self, token: &str, info: &AgentInfo) {
        log::info!(
            "agent report: token={token}, os={}, arch={}, version={}",
            info.os,
            info.arch,
            info.version
        );
    }

    fn paired(&self, token: &str, sequence: u64) {
        log::debug!("paired connection #{sequence}: token={token}");
    }

    fn session_ended(&self, token: &str, reason: &dyn std::fmt::Display) {
        log::info!("session ended: token={token}, reason={reason}");
    }
}

/// The default observer: logs only.
#[derive(Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {}
