use bytes::{BufMut, BytesMut};
use num_enum::TryFromPrimitive;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::Error,
    message::{ControlMessage, MessageKind},
};

/// Hard ceiling on a single message payload, guarding against a peer
/// declaring an absurd length and exhausting memory before we notice.
const MAX_PAYLOAD_SIZE: u32 = 1 << 20;

/// Hard ceiling on the length-prefixed token header.
const MAX_TOKEN_SIZE: u32 = 4096;

/// Write the length-prefixed UTF-8 token header that opens every control
/// channel. The agent calls this immediately after connecting; the broker
/// calls [`read_token_header`] before accepting any [`ControlMessage`].
pub async fn write_token_header<W: AsyncWrite + Unpin>(
    writer: &mut W,
    token: &str,
) -> Result<(), Error> {
    let bytes = token.as_bytes();
    let mut header = BytesMut::with_capacity(4 + bytes.len());
    header.put_u32(bytes.len() as u32);
    header.put_slice(bytes);
    writer.write_all(&header).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the length-prefixed token header. Returns [`Error::BadMetadata`]
/// if the token is missing, empty, or not valid UTF-8.
pub async fn read_token_header<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, Error> {
    let len = reader.read_u32().await?;
    if len == 0 || len > MAX_TOKEN_SIZE {
        return Err(Error::BadMetadata);
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;

    let token = String::from_utf8(buf).map_err(|e| e.utf8_error())?;
    if token.is_empty() {
        return Err(Error::BadMetadata);
    }

    Ok(token)
}

/// Write one length-framed [`ControlMessage`]: a 1-byte type tag, a
/// 4-byte big-endian length, then the payload.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &ControlMessage,
) -> Result<(), Error> {
    let mut header = BytesMut::with_capacity(5);
    header.put_u8(msg.kind.into());
    header.put_u32(msg.payload.len() as u32);

    writer.write_all(&header).await?;
    writer.write_all(&msg.payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-framed [`ControlMessage`].
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between
/// messages (EOF on the type-tag byte); any other truncation is an
/// [`Error::Io`].
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<ControlMessage>, Error> {
    let kind = match reader.read_u8().await {
        Ok(tag) => tag,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let kind = MessageKind::try_from_primitive(kind).map_err(|_| Error::UnknownMessageKind(kind))?;

    let len = reader.read_u32().await?;
    if len > MAX_PAYLOAD_SIZE {
        return Err(Error::BadRequest);
    }

    let mut payload = BytesMut::zeroed(len as usize);
    reader.read_exact(&mut payload).await?;

    Ok(Some(ControlMessage {
        kind,
        payload: payload.freeze(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn token_header_round_trips() {
        let (mut a, mut b) = duplex(1024);
        write_token_header(&mut a, "tok-123").await.unwrap();
        let token = read_token_header(&mut b).await.unwrap();
        assert_eq!(token, "tok-123");
    }

    #[tokio::test]
    async fn empty_token_is_bad_metadata() {
        let (mut a, mut b) = duplex(1024);
        write_token_header(&mut a, "").await.unwrap();
        assert!(matches!(
            read_token_header(&mut b).await,
            Err(Error::BadMetadata)
        ));
    }

    #[tokio::test]
    async fn message_round_trips_over_a_duplex_stream() {
        let (mut a, mut b) = duplex(4096);
        let sent = ControlMessage::connect("203.0.113.9:40000");
        write_message(&mut a, &sent).await.unwrap();

        let received = read_message(&mut b).await.unwrap().unwrap();
        assert_eq!(received.kind, MessageKind::Connect);
        assert_eq!(received.addr().unwrap(), "203.0.113.9:40000");
    }

    #[tokio::test]
    async fn read_message_returns_none_on_clean_close() {
        let (a, mut b) = duplex(64);
        drop(a);
        assert!(read_message(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&[MessageKind::Connect.into(), 0xff, 0xff, 0xff, 0xff])
            .await
            .unwrap();
        assert!(matches!(read_message(&mut b).await, Err(Error::BadRequest)));
    }
}
