use std::sync::Arc;

use directory::DirectoryClient;
use ncore::tls;
use tokio::net::TcpListener;

use crate::{
    config::Config,
    observer::LoggingObserver,
    session::{self, SessionConfig},
};

/// Bring up the control-channel listener and dispatch one [`session::serve`]
/// per accepted connection. Each session is independent: one agent
/// disappearing never affects another's session (E6).
pub async fn run(config: Config) -> anyhow::Result<()> {
    let wan_ip: Arc<str> = config.wanip.clone().into();
    let directory = Arc::new(DirectoryClient::new(config.directory_url.clone()));
    let observer = Arc::new(LoggingObserver);

    let session_config = SessionConfig {
        queue_capacity: config.buf,
        socket_buffer_size: config.socket_buffer_size,
        ..SessionConfig::default()
    };

    let listener = TcpListener::bind(config.addr).await?;
    log::info!("control channel listening: addr={}", config.addr);

    let acceptor = match config.ssl() {
        Some(ssl) => Some(tls::acceptor(&ssl.cert_path, &ssl.key_path)?),
        None => None,
    };

    loop {
        let (socket, peer) = listener.accept().await?;
        if let Err(e) = socket.set_nodelay(true) {
            log::warn!("failed to set TCP_NODELAY: peer={peer}, err={e}");
        }

        let wan_ip = wan_ip.clone();
        let directory = directory.clone();
        let observer = observer.clone();
        let acceptor = acceptor.clone();

        tokio::spawn(async move {
            log::info!("control channel accepted: peer={peer}");

            let result = match acceptor {
                Some(acceptor) => match acceptor.accept(socket).await {
                    Ok(stream) => {
                        session::serve(session_config, wan_ip, directory, observer, stream).await
                    }
                    Err(e) => {
                        log::warn!("tls handshake failed: peer={peer}, err={e}");
                        return;
                    }
                },
                None => session::serve(session_config, wan_ip, directory, observer, socket).await,
            };

            if let Err(e) = result {
                log::warn!("session terminated: peer={peer}, err={e}");
            }
        });
    }
}
