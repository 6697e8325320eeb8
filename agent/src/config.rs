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

/// The agent's configuration (§6.5), taken directly from CLI flags.
#[derive(Parser, Debug, Clone)]
#[command(
    about = "Behind-NAT agent that dials back to the broker and exposes a local service through it",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Config {
    /// Local target this agent exposes, `host:port`.
    #[arg(long, default_value = "127.0.0.1:80")]
    pub local: String,

    /// Broker control-channel address, `host:port`.
    #[arg(long, default_value = "127.0.0.1:10020")]
    pub server: String,

    /// Credential identifying this agent to the broker and directory.
    #[arg(long)]
    pub token: String,

    /// Whether to speak TLS to the broker.
    #[arg(long, default_value_t = true)]
    pub tls: bool,

    /// Base URL of the directory HTTP API.
    #[arg(long, default_value = "https://tools.jiajunhuang.com")]
    pub directory_url: String,

    /// Log verbosity.
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}
