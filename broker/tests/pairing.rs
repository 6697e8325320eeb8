use std::sync::Arc;

use codec::{ControlMessage, MessageKind};
use directory::{CheckTokenResult, DirectoryApi, Error as DirectoryError};
use natproxy_broker::{
    observer::LoggingObserver,
    session::{self, SessionConfig},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

/// A directory stub that always allocates fresh (never sticky, never
/// taken) and never reports `disconnect`.
struct FreshAllocationDirectory;

impl DirectoryApi for FreshAllocationDirectory {
    async fn check_token(&self, _token: &str) -> Result<CheckTokenResult, DirectoryError> {
        Ok(CheckTokenResult::default())
    }

    async fn is_addr_taken(&self, _addr: &str) -> Result<bool, DirectoryError> {
        Ok(false)
    }

    async fn register_addr(&self, _token: &str, _addr: &str) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn report_status(&self, _token: &str, _disconnect: bool) -> Result<(), DirectoryError> {
        Ok(())
    }
}

fn parse_port(addr: &str) -> u16 {
    addr.rsplit_once(':').unwrap().1.parse().unwrap()
}

/// Testable property #1: the i-th public connection is paired with the
/// i-th dial-back connection, in order, regardless of how many public
/// connections arrive before any dial-back connection does.
#[tokio::test]
async fn pairing_is_fifo_across_three_connections() {
    let (mut control, session_side) = tokio::io::duplex(16 * 1024);

    let directory = Arc::new(FreshAllocationDirectory);
    let observer = Arc::new(LoggingObserver);
    let config = SessionConfig::default();

    let serve = tokio::spawn(async move {
        session::serve(config, "127.0.0.1".into(), directory, observer, session_side).await
    });

    codec::write_token_header(&mut control, "pairing-test")
        .await
        .unwrap();

    let wan_addr_msg = codec::read_message(&mut control).await.unwrap().unwrap();
    assert_eq!(wan_addr_msg.kind, MessageKind::WanAddr);
    let public_port = parse_port(wan_addr_msg.addr().unwrap());

    // Connect all three public clients before any dial-back connection
    // exists, to exercise the FIFO guarantee rather than a race.
    let mut public_clients = Vec::new();
    for i in 0..3u8 {
        let mut client = TcpStream::connect(("127.0.0.1", public_port)).await.unwrap();
        client.write_all(format!("public-{i}").as_bytes()).await.unwrap();
        public_clients.push(client);
    }

    for i in 0..3u8 {
        let connect_msg = codec::read_message(&mut control).await.unwrap().unwrap();
        assert_eq!(connect_msg.kind, MessageKind::Connect);
        let dialback_addr = connect_msg.addr().unwrap().to_string();
        let dialback_port = parse_port(&dialback_addr);

        let mut dialback = TcpStream::connect(("127.0.0.1", dialback_port)).await.unwrap();

        let mut received = vec![0u8; format!("public-{i}").len()];
        dialback.read_exact(&mut received).await.unwrap();
        assert_eq!(received, format!("public-{i}").into_bytes());
    }

    codec::write_message(&mut control, &ControlMessage::disconnect())
        .await
        .unwrap();

    serve.await.unwrap().unwrap();
}

/// Testable property #5: once the control channel ends, the session
/// tears down promptly and its public listener stops accepting.
#[tokio::test]
async fn control_disconnect_closes_the_public_listener() {
    let (mut control, session_side) = tokio::io::duplex(16 * 1024);

    let directory = Arc::new(FreshAllocationDirectory);
    let observer = Arc::new(LoggingObserver);
    let config = SessionConfig::default();

    let serve = tokio::spawn(async move {
        session::serve(config, "127.0.0.1".into(), directory, observer, session_side).await
    });

    codec::write_token_header(&mut control, "teardown-test")
        .await
        .unwrap();

    let wan_addr_msg = codec::read_message(&mut control).await.unwrap().unwrap();
    let public_port = parse_port(wan_addr_msg.addr().unwrap());

    codec::write_message(&mut control, &ControlMessage::disconnect())
        .await
        .unwrap();

    serve.await.unwrap().unwrap();

    // The listener task was aborted as part of cleanup; binding the same
    // port again should now succeed since nothing still owns it.
    tokio::net::TcpListener::bind(("0.0.0.0", public_port))
        .await
        .expect("public port should be released after session teardown");
}

/// Testable property #7: a second `REPORT` only updates logged info, it
/// does not disturb pairing or terminate the session.
#[tokio::test]
async fn repeated_report_does_not_affect_session_state() {
    let (mut control, session_side) = tokio::io::duplex(16 * 1024);

    let directory = Arc::new(FreshAllocationDirectory);
    let observer = Arc::new(LoggingObserver);
    let config = SessionConfig::default();

    let serve = tokio::spawn(async move {
        session::serve(config, "127.0.0.1".into(), directory, observer, session_side).await
    });

    codec::write_token_header(&mut control, "report-test")
        .await
        .unwrap();

    let _wan_addr_msg = codec::read_message(&mut control).await.unwrap().unwrap();

    let info = codec::AgentInfo {
        os: "linux".into(),
        arch: "x86_64".into(),
        version: "0.1.0".into(),
    };

    for _ in 0..3 {
        codec::write_message(&mut control, &ControlMessage::report(&info).unwrap())
            .await
            .unwrap();
    }

    codec::write_message(&mut control, &ControlMessage::disconnect())
        .await
        .unwrap();

    serve.await.unwrap().unwrap();
}
