use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};

/// Cursor over a received payload. Every read is checked against the bytes
/// that remain; reading past the end is an error, never a panic or a short
/// value.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn chunk_u8(&mut self) -> Result<&'a [u8]> {
        let len = self.u8()? as usize;
        self.bytes(len)
    }

    pub fn chunk_u16(&mut self) -> Result<&'a [u8]> {
        let len = self.u16()? as usize;
        self.bytes(len)
    }

    pub fn chunk_u32(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.bytes(len)
    }

    pub fn string_u8(&mut self, field: &'static str) -> Result<String> {
        utf8(self.chunk_u8()?, field)
    }

    pub fn string_u16(&mut self, field: &'static str) -> Result<String> {
        utf8(self.chunk_u16()?, field)
    }

    pub fn string_u32(&mut self, field: &'static str) -> Result<String> {
        utf8(self.chunk_u32()?, field)
    }

    /// Require that every byte has been consumed.
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(CodecError::TrailingBytes { remaining }),
        }
    }
}

fn utf8(raw: &[u8], field: &'static str) -> Result<String> {
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8(field))
}

/// Builder for outgoing payloads. Length prefixes are range-checked: a value
/// that does not fit its prefix fails with `TooLarge` instead of wrapping.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16_le(value);
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32_le(value);
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.put_u64_le(value);
        self
    }

    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn chunk_u8(&mut self, data: &[u8]) -> Result<&mut Self> {
        let len = prefix(data.len(), u8::MAX as usize)?;
        self.buf.put_u8(len as u8);
        Ok(self.raw(data))
    }

    pub fn chunk_u16(&mut self, data: &[u8]) -> Result<&mut Self> {
        let len = prefix(data.len(), u16::MAX as usize)?;
        self.buf.put_u16_le(len as u16);
        Ok(self.raw(data))
    }

    pub fn chunk_u32(&mut self, data: &[u8]) -> Result<&mut Self> {
        let len = prefix(data.len(), u32::MAX as usize)?;
        self.buf.put_u32_le(len as u32);
        Ok(self.raw(data))
    }

    pub fn string_u8(&mut self, value: &str) -> Result<&mut Self> {
        self.chunk_u8(value.as_bytes())
    }

    pub fn string_u16(&mut self, value: &str) -> Result<&mut Self> {
        self.chunk_u16(value.as_bytes())
    }

    pub fn string_u32(&mut self, value: &str) -> Result<&mut Self> {
        self.chunk_u32(value.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

fn prefix(len: usize, max: usize) -> Result<usize> {
    if len > max {
        return Err(CodecError::TooLarge { len, max });
    }
    Ok(len)
}
