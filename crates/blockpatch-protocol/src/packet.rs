use blockpatch_common::{PatchError, Result};
use byteorder::{BigEndian, ByteOrder};
use std::io::{self, Read};

/// Owned output buffer for re-encoded packet fields.
/// All multi-byte values are written in network (big-endian) order.
#[derive(Debug, Default, Clone)]
pub struct PacketBuffer {
    pub buffer: Vec<u8>,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a VarInt to the buffer.
    /// A VarInt is a variable-length integer. It is encoded using 7 bits per byte, with the most
    /// significant bit of each byte set to 1 unless it is the final byte in the encoded
    /// representation.
    pub fn write_varint(&mut self, value: i32) {
        let mut value = value as u32;
        while (value & !0x7F) != 0 {
            self.buffer.push(((value & 0x7F) as u8) | 0x80);
            value >>= 7;
        }
        self.buffer.push((value & 0x7F) as u8);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        let mut bytes = [0u8; 8];
        BigEndian::write_u64(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_bytes_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}

/// Cursor over a borrowed wire buffer. Reads past the end fail with
/// [`PatchError::TruncatedInput`] and leave the cursor where it was.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    pub fn at(buffer: &'a [u8], cursor: usize) -> Self {
        Self {
            buffer,
            cursor: cursor.min(buffer.len()),
        }
    }

    pub fn get_cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.buffer.get(self.cursor).copied()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(PatchError::truncated(needed, self.remaining()));
        }
        Ok(())
    }

    /// Reads a VarInt. At most five bytes are consumed.
    pub fn read_varint(&mut self) -> Result<i32> {
        let mut result: u32 = 0;
        let mut shift = 0;
        let mut cursor = self.cursor;

        loop {
            let byte = match self.buffer.get(cursor) {
                Some(byte) => *byte,
                None => return Err(PatchError::truncated(cursor - self.cursor + 1, self.remaining())),
            };
            cursor += 1;

            result |= ((byte & 0x7F) as u32) << shift;
            shift += 7;

            if (byte & 0x80) == 0 {
                break;
            }

            if shift >= 35 {
                return Err(PatchError::MalformedVarInt);
            }
        }

        self.cursor = cursor;
        Ok(result as i32)
    }

    /// Reads a VarInt that is used as a length or count.
    pub fn read_length(&mut self) -> Result<usize> {
        let start = self.cursor;
        let value = self.read_varint()?;
        if value < 0 {
            self.cursor = start;
            return Err(PatchError::unsupported(format!("negative length {}", value)));
        }
        Ok(value as usize)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        let value = BigEndian::read_u64(&self.buffer[self.cursor..]);
        self.cursor += 8;
        Ok(value)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let bytes = &self.buffer[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    /// Everything that has not been read yet.
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.cursor..]
    }
}

impl Read for PacketReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = buf.len().min(self.remaining());
        buf[..to_read].copy_from_slice(&self.buffer[self.cursor..self.cursor + to_read]);
        self.cursor += to_read;
        Ok(to_read)
    }
}
