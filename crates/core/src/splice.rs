use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::pool;

/// Bidirectional byte pump between two streams.
///
/// Each direction runs on its own spawned task holding one half of each
/// stream (`tokio::io::split`), each reading into a pooled `buf_size`
/// buffer. As soon as either direction hits EOF or an error, the other
/// task is aborted — dropping its held stream halves releases the
/// underlying sockets promptly. Returns the byte counts moved in each
/// direction up to the point of closure.
pub async fn splice<A, B>(a: A, b: B, buf_size: usize) -> (u64, u64)
where
    A: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    B: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut a_read, mut a_write) = io::split(a);
    let (mut b_read, mut b_write) = io::split(b);

    let a_to_b = Arc::new(AtomicU64::new(0));
    let b_to_a = Arc::new(AtomicU64::new(0));

    let mut forward = {
        let count = a_to_b.clone();
        tokio::spawn(async move { pump(&mut a_read, &mut b_write, buf_size, &count).await })
    };

    let mut reverse = {
        let count = b_to_a.clone();
        tokio::spawn(async move { pump(&mut b_read, &mut a_write, buf_size, &count).await })
    };

    tokio::select! {
        _ = &mut forward => reverse.abort(),
        _ = &mut reverse => forward.abort(),
    }

    let _ = tokio::join!(forward, reverse);

    (a_to_b.load(Ordering::Relaxed), b_to_a.load(Ordering::Relaxed))
}

async fn pump<R, W>(reader: &mut R, writer: &mut W, buf_size: usize, count: &AtomicU64)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = pool::acquire(buf_size);

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };

        if writer.write_all(&buf[..n]).await.is_err() {
            break;
        }

        count.fetch_add(n as u64, Ordering::Relaxed);
    }

    let _ = writer.shutdown().await;
    pool::release(buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    async fn connected_pair() -> (tokio::net::TcpStream, tokio::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        (client, accept.await.unwrap())
    }

    #[tokio::test]
    async fn splice_relays_a_megabyte_both_ways_without_corruption() {
        let (mut client_a, server_a) = connected_pair().await;
        let (mut client_b, server_b) = connected_pair().await;

        tokio::spawn(splice(server_a, server_b, 4096));

        let mut a_to_b = vec![0u8; 1024 * 1024];
        let mut b_to_a = vec![0u8; 1024 * 1024];
        rand::rng().fill_bytes(&mut a_to_b);
        rand::rng().fill_bytes(&mut b_to_a);

        let writer_a = {
            let payload = a_to_b.clone();
            tokio::spawn(async move {
                client_a.write_all(&payload).await.unwrap();
                let mut received = vec![0u8; payload.len()];
                client_a.read_exact(&mut received).await.unwrap();
                (client_a, received)
            })
        };

        let writer_b = {
            let payload = b_to_a.clone();
            tokio::spawn(async move {
                client_b.write_all(&payload).await.unwrap();
                let mut received = vec![0u8; payload.len()];
                client_b.read_exact(&mut received).await.unwrap();
                (client_b, received)
            })
        };

        let (mut client_a, received_at_a) = writer_a.await.unwrap();
        let (_client_b, received_at_b) = writer_b.await.unwrap();

        assert_eq!(received_at_a, b_to_a);
        assert_eq!(received_at_b, a_to_b);

        client_a.shutdown().await.unwrap();
    }
}
