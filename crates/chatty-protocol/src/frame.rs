use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use chatty_types::Status;

use crate::error::{CodecError, Result};

/// Header size in bytes: u16 length + u16 opcode.
pub const FRAME_HEADER: usize = 4;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// One protocol frame. The payload length is validated at construction, so
/// every `Frame` value is encodable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: u16,
    payload: Bytes,
}

impl Frame {
    /// Build a frame, failing with `TooLarge` if the payload does not fit
    /// the u16 length field.
    pub fn new(opcode: u16, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(CodecError::TooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self { opcode, payload })
    }

    pub fn empty(opcode: u16) -> Self {
        Self {
            opcode,
            payload: Bytes::new(),
        }
    }

    /// A bare status reply with no payload.
    pub fn status(status: Status) -> Self {
        Self::empty(status.code())
    }

    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Encode header and payload into one contiguous buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER + self.payload.len());
        buf.put_u16_le(self.payload.len() as u16);
        buf.put_u16_le(self.opcode);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

/// Read one frame. A short read anywhere in the frame surfaces as an I/O
/// error (`UnexpectedEof`), which callers treat as a peer disconnect.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u16_le().await? as usize;
    let opcode = reader.read_u16_le().await?;

    if len == 0 {
        return Ok(Frame::empty(opcode));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Frame {
        opcode,
        payload: Bytes::from(payload),
    })
}

/// Read one frame with an optional deadline. `None` blocks indefinitely.
pub async fn read_frame_within<R>(reader: &mut R, deadline: Option<Duration>) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, read_frame(reader))
            .await
            .map_err(|_| CodecError::Timeout)?,
        None => read_frame(reader).await,
    }
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.encode()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_little_endian() {
        let frame = Frame::new(0x0102, vec![0xAA, 0xBB, 0xCC]).unwrap();
        let encoded = frame.encode();
        assert_eq!(&encoded[..], &[3, 0, 0x02, 0x01, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn empty_payload_has_zero_length() {
        let encoded = Frame::status(Status::Unauthorized).encode();
        assert_eq!(&encoded[..], &[0, 0, 0x91, 0x01]);
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let err = Frame::new(1, vec![0u8; MAX_PAYLOAD + 1]).unwrap_err();
        assert!(matches!(err, CodecError::TooLarge { len: 65536, max: 65535 }));
    }

    #[test]
    fn max_payload_is_accepted() {
        let frame = Frame::new(1, vec![7u8; MAX_PAYLOAD]).unwrap();
        assert_eq!(frame.encode().len(), FRAME_HEADER + MAX_PAYLOAD);
    }

    #[tokio::test]
    async fn frames_survive_a_stream() {
        let (mut client, mut server) = tokio::io::duplex(1 << 17);

        let frames = vec![
            Frame::new(1, b"hello".to_vec()).unwrap(),
            Frame::status(Status::Ok),
            Frame::new(8, vec![9u8; MAX_PAYLOAD]).unwrap(),
        ];
        for frame in &frames {
            write_frame(&mut client, frame).await.unwrap();
        }

        for expected in &frames {
            let got = read_frame(&mut server).await.unwrap();
            assert_eq!(&got, expected);
        }
    }

    #[tokio::test]
    async fn short_read_is_an_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        // Header announces 10 payload bytes but only 3 arrive before close.
        client.write_all(&[10, 0, 1, 0, 1, 2, 3]).await.unwrap();
        drop(client);

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn deadline_expires() {
        let (_client, mut server) = tokio::io::duplex(64);
        let err = read_frame_within(&mut server, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::Timeout));
    }
}
