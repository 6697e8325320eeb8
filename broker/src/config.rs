use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
#[clap(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

/// TLS material for the control-channel listener. Present iff both
/// `--cert-path` and `--key-path` were given.
#[derive(Debug, Clone)]
pub struct Ssl {
    pub cert_path: String,
    pub key_path: String,
}

/// The broker's configuration (§6.3), taken directly from CLI flags.
#[derive(Parser, Debug, Clone)]
#[command(
    about = "Publicly reachable relay that pairs public connections with agent-originated dial-back connections",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Config {
    /// Control-channel listen address.
    #[arg(long, default_value = "127.0.0.1:10020")]
    pub addr: SocketAddr,

    /// Publicly reachable IPv4 used to advertise dial-back/public addresses.
    #[arg(long, default_value = "127.0.0.1")]
    pub wanip: String,

    /// Per-session queue capacity (`public_conns`, `dialback_conns`,
    /// `outbound_msgs`, `inbound_msgs`).
    #[arg(long, default_value_t = 1024)]
    pub buf: usize,

    /// TLS certificate chain (PEM). Requires `--key-path`.
    #[arg(long)]
    pub cert_path: Option<String>,

    /// TLS private key (PEM). Requires `--cert-path`.
    #[arg(long)]
    pub key_path: Option<String>,

    /// Splice buffer size, in bytes.
    #[arg(long, default_value_t = 32768)]
    pub socket_buffer_size: usize,

    /// Base URL of the directory HTTP API.
    #[arg(long, default_value = "https://tools.jiajunhuang.com")]
    pub directory_url: String,

    /// Log verbosity.
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

impl Config {
    pub fn ssl(&self) -> Option<Ssl> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert_path), Some(key_path)) => Some(Ssl {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        }
    }
}
