use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use codec::{AgentInfo, ControlMessage, MessageKind};
use directory::DirectoryApi;
use ncore::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    task::JoinSet,
};

use crate::config::Config;

/// Tunables for the agent's reconnect/poll cadence (ambient addition,
/// SPEC_FULL §9a — the distilled spec names the cadence but not a
/// configuration surface for it).
#[derive(Debug, Clone, Copy)]
pub struct AgentLoopConfig {
    pub reconnect_backoff: Duration,
    pub disabled_poll_interval: Duration,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(5),
            disabled_poll_interval: Duration::from_secs(300),
        }
    }
}

/// Run the agent forever: a background poller keeps the `disabled` flag
/// current, while the outer loop reconnects to the broker on a fixed
/// backoff until the directory reports `token_not_valid`.
pub async fn run<D>(config: Config, loop_config: AgentLoopConfig, directory: Arc<D>) -> Result<(), Error>
where
    D: DirectoryApi + 'static,
{
    let disabled = Arc::new(AtomicBool::new(false));
    let terminated = Arc::new(AtomicBool::new(false));

    tokio::spawn(poll_disabled_flag(
        directory.clone(),
        config.token.clone(),
        loop_config.disabled_poll_interval,
        disabled.clone(),
        terminated.clone(),
    ));

    loop {
        if terminated.load(Ordering::SeqCst) {
            return Err(Error::TokenNotValid);
        }

        match connect_and_serve(&config, &disabled).await {
            Ok(()) => log::info!("control channel closed cleanly"),
            Err(e) => log::warn!("control channel error: {e}"),
        }

        if terminated.load(Ordering::SeqCst) {
            return Err(Error::TokenNotValid);
        }

        tokio::time::sleep(loop_config.reconnect_backoff).await;
    }
}

async fn poll_disabled_flag<D>(
    directory: Arc<D>,
    token: String,
    interval: Duration,
    disabled: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
) where
    D: DirectoryApi + 'static,
{
    loop {
        tokio::time::sleep(interval).await;

        match directory.check_token(&token).await {
            Ok(status) => disabled.store(status.disconnect, Ordering::SeqCst),
            Err(directory::Error::TokenNotValid) => {
                terminated.store(true, Ordering::SeqCst);
                return;
            }
            Err(e) => log::warn!("disabled-flag poll failed: token={token}, err={e}"),
        }
    }
}

async fn connect_and_serve(config: &Config, disabled: &Arc<AtomicBool>) -> Result<(), Error> {
    let tcp = TcpStream::connect(&config.server).await.map_err(Error::Io)?;
    if let Err(e) = tcp.set_nodelay(true) {
        log::warn!("failed to set TCP_NODELAY: err={e}");
    }

    if config.tls {
        let connector = ncore::tls::connector();
        let server_name = server_name(&config.server)?;
        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(Error::Tls)?;
        serve_control_stream(stream, &config.token, &config.local, disabled).await
    } else {
        serve_control_stream(tcp, &config.token, &config.local, disabled).await
    }
}

fn server_name(
    server: &str,
) -> Result<tokio_rustls::rustls::pki_types::ServerName<'static>, Error> {
    let host = server.rsplit_once(':').map(|(host, _)| host).unwrap_or(server);
    tokio_rustls::rustls::pki_types::ServerName::try_from(host.to_string()).map_err(|_| Error::BadRequest)
}

/// Drive one control-channel session to completion: write the token
/// header, report identity, then serve `CONNECT`/`WAN_ADDR`/`DISCONNECT`
/// until the channel closes or errors.
///
/// Generic over the stream so this can be driven by an in-memory
/// `tokio::io::duplex` pair in tests, without a real TLS/TCP dial.
async fn serve_control_stream<T>(
    mut stream: T,
    token: &str,
    local: &str,
    disabled: &Arc<AtomicBool>,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    codec::write_token_header(&mut stream, token).await?;
    let report = ControlMessage::report(&AgentInfo::current(env!("CARGO_PKG_VERSION")))?;
    codec::write_message(&mut stream, &report).await?;

    let mut splices = JoinSet::new();

    loop {
        let msg = match codec::read_message(&mut stream).await? {
            Some(msg) => msg,
            None => return Ok(()),
        };

        match msg.kind {
            MessageKind::Connect => {
                let addr = msg.addr()?;

                if disabled.load(Ordering::SeqCst) {
                    codec::write_message(&mut stream, &ControlMessage::disconnect()).await?;
                    return Ok(());
                }

                match dial_and_pair(addr, local).await {
                    Ok((dialback, target)) => {
                        splices.spawn(ncore::splice(dialback, target, 32 * 1024));
                    }
                    Err(e) => log::warn!("dial failed: dialback_addr={addr}, local={local}, err={e}"),
                }
            }
            MessageKind::WanAddr => {
                let addr = msg.addr()?;
                log::info!("public address assigned: addr={addr}");
            }
            other => log::warn!("unsupported message kind: kind={other:?}"),
        }
    }
}

async fn dial_and_pair(dialback_addr: &str, local: &str) -> Result<(TcpStream, TcpStream), Error> {
    let (dialback, target) = tokio::try_join!(
        TcpStream::connect(dialback_addr),
        TcpStream::connect(local),
    )
    .map_err(Error::Io)?;

    Ok((dialback, target))
}
