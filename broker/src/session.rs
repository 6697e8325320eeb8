use std::{sync::Arc, time::Duration};

use codec::{ControlMessage, MessageKind};
use directory::DirectoryApi;
use ncore::Error;
use tokio::{
    io::{self, AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinSet,
    time::timeout,
};

use crate::{allocator::resolve_public_addr, observer::SessionObserver};

/// Tunables for a broker session. `queue_capacity` backs all four FIFOs
/// named in §3; `pairing_timeout` and `disconnect_poll_interval` are the
/// ambient additions called out in SPEC_FULL §9/§9a.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub queue_capacity: usize,
    pub socket_buffer_size: usize,
    pub pairing_timeout: Duration,
    pub disconnect_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            socket_buffer_size: 32 * 1024,
            pairing_timeout: Duration::from_secs(30),
            disconnect_poll_interval: Duration::from_secs(30),
        }
    }
}

/// Run one broker session to completion: resolve and bind the session's
/// addresses, fan out the five owned tasks, drive the dispatcher, and
/// unconditionally tear everything down on the way out.
///
/// `control_stream` must already be past the TLS handshake (if any); the
/// token header (§4.2) is read from it before anything else happens.
pub async fn serve<T, D, O>(
    config: SessionConfig,
    wan_ip: Arc<str>,
    directory: Arc<D>,
    observer: Arc<O>,
    mut control_stream: T,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    D: DirectoryApi + 'static,
    O: SessionObserver,
{
    let token: Arc<str> = codec::read_token_header(&mut control_stream)
        .await?
        .into();

    let result = run(&config, &wan_ip, &directory, &observer, control_stream, &token).await;

    observer.session_ended(&token, &DisplayResult(&result));
    result
}

struct DisplayResult<'a>(&'a Result<(), Error>);

impl std::fmt::Display for DisplayResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Ok(()) => write!(f, "ok"),
            Err(e) => write!(f, "{e}"),
        }
    }
}

async fn run<T, D, O>(
    config: &SessionConfig,
    wan_ip: &Arc<str>,
    directory: &Arc<D>,
    observer: &Arc<O>,
    control_stream: T,
    token: &Arc<str>,
) -> Result<(), Error>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    D: DirectoryApi + 'static,
    O: SessionObserver,
{
    let public_addr = resolve_public_addr(token, wan_ip, directory.as_ref()).await?;
    let public_port: u16 = public_addr
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .ok_or(Error::BadRequest)?;

    let public_listener = TcpListener::bind(("0.0.0.0", public_port))
        .await
        .map_err(Error::ListenFailed)?;
    let dialback_listener = TcpListener::bind(("0.0.0.0", 0))
        .await
        .map_err(Error::ListenFailed)?;
    let dialback_port = dialback_listener
        .local_addr()
        .map_err(Error::ListenFailed)?
        .port();
    let dialback_addr = format!("{wan_ip}:{dialback_port}");

    observer.session_started(token, &public_addr, &dialback_addr);

    let (public_tx, mut public_rx) = mpsc::channel::<TcpStream>(config.queue_capacity);
    let (dialback_tx, mut dialback_rx) = mpsc::channel::<TcpStream>(config.queue_capacity);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ControlMessage>(config.queue_capacity);
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<ControlMessage>(config.queue_capacity);
    let (term_tx, mut term_rx) = mpsc::channel::<Error>(4);

    outbound_tx
        .send(ControlMessage::wan_addr(&public_addr))
        .await
        .map_err(|_| Error::QueueClosed)?;

    let (mut control_read, mut control_write) = io::split(control_stream);

    let control_reader = tokio::spawn({
        let inbound_tx = inbound_tx.clone();
        let term_tx = term_tx.clone();
        async move {
            loop {
                match codec::read_message(&mut control_read).await {
                    Ok(Some(msg)) => {
                        if inbound_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = term_tx.try_send(Error::from(e));
                        break;
                    }
                }
            }
        }
    });

    let public_acceptor = tokio::spawn({
        let term_tx = term_tx.clone();
        async move {
            loop {
                match public_listener.accept().await {
                    Ok((stream, _)) => {
                        if public_tx.send(stream).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = term_tx.try_send(Error::ListenFailed(e));
                        break;
                    }
                }
            }
        }
    });

    let dialback_acceptor = tokio::spawn({
        let term_tx = term_tx.clone();
        async move {
            loop {
                match dialback_listener.accept().await {
                    Ok((stream, _)) => {
                        if dialback_tx.send(stream).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = term_tx.try_send(Error::ListenFailed(e));
                        break;
                    }
                }
            }
        }
    });

    let disconnect_poller = tokio::spawn({
        let directory = directory.clone();
        let token = token.clone();
        let term_tx = term_tx.clone();
        let poll_interval = config.disconnect_poll_interval;
        async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                match directory.check_token(&token).await {
                    Ok(status) if status.disconnect => {
                        let _ = term_tx.try_send(Error::Disconnected);
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!("disconnect poll failed: token={token}, err={e}");
                        continue;
                    }
                }
            }
        }
    });

    let pairing_worker = tokio::spawn({
        let outbound_tx = outbound_tx.clone();
        let term_tx = term_tx.clone();
        let observer = observer.clone();
        let token = token.clone();
        let dialback_addr = dialback_addr.clone();
        let buf_size = config.socket_buffer_size;
        let pairing_timeout = config.pairing_timeout;
        async move {
            let mut splices = JoinSet::new();
            let mut sequence: u64 = 0;

            while let Some(public_conn) = public_rx.recv().await {
                if outbound_tx
                    .send(ControlMessage::connect(&dialback_addr))
                    .await
                    .is_err()
                {
                    break;
                }

                match timeout(pairing_timeout, dialback_rx.recv()).await {
                    Ok(Some(dialback_conn)) => {
                        sequence += 1;
                        observer.paired(&token, sequence);
                        splices.spawn(ncore::splice(public_conn, dialback_conn, buf_size));
                    }
                    Ok(None) => {
                        drop(public_conn);
                        break;
                    }
                    Err(_) => {
                        drop(public_conn);
                        let _ = term_tx.try_send(Error::PairingTimedOut);
                        break;
                    }
                }
            }
        }
    });

    drop(outbound_tx);
    drop(term_tx);

    let result = loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if let Err(e) = codec::write_message(&mut control_write, &msg).await {
                            log::warn!("control send failed: token={token}, err={e}");
                        }
                    }
                    None => break Err(Error::QueueClosed),
                }
            }
            inbound = inbound_rx.recv() => {
                match inbound {
                    Some(msg) => match msg.kind {
                        MessageKind::DisConnect => break Ok(()),
                        MessageKind::Report => match msg.agent_info() {
                            Ok(info) => observer.agent_reported(&token, &info),
                            Err(e) => log::warn!("malformed report: token={token}, err={e}"),
                        },
                        other => log::warn!("unsupported message kind: token={token}, kind={other:?}"),
                    },
                    None => break Err(Error::QueueClosed),
                }
            }
            Some(reason) = term_rx.recv() => {
                break Err(reason);
            }
        }
    };

    control_reader.abort();
    public_acceptor.abort();
    dialback_acceptor.abort();
    disconnect_poller.abort();
    pairing_worker.abort();

    // Wait for the aborted tasks to actually unwind so their owned
    // listeners and sockets are released before this function returns
    // (invariant 4: no task outlives the session).
    let _ = tokio::join!(
        control_reader,
        public_acceptor,
        dialback_acceptor,
        disconnect_poller,
        pairing_worker,
    );

    result
}
