//! Length-prefixed binary buffer used for the archive header
//!
//! Layout of a pickle:
//!
//! ```text
//! [u32 LE payload length][payload, 4-byte aligned]
//! ```
//!
//! Integers are written little-endian. Strings are an i32 length followed
//! by the UTF-8 bytes, zero-padded up to the next 4-byte boundary.

use crate::error::{AsarError, CodecError, Result};

const SIZE_I32: usize = 4;
const SIZE_U32: usize = 4;

/// Payload capacity is always a multiple of this
pub const PAYLOAD_UNIT: usize = 64;

/// Size of the length field that precedes every payload
pub const LENGTH_FIELD: usize = SIZE_U32;

fn align(i: usize, alignment: usize) -> usize {
    i + (alignment - (i % alignment)) % alignment
}

/// Append-only writer / read-only container
#[derive(Debug, Clone)]
pub struct Pickle {
    buf: Vec<u8>,
    header_size: usize,
    capacity_after_header: usize,
    write_offset: usize,
}

impl Pickle {
    /// Create an empty pickle ready for writing
    pub fn new() -> Self {
        let mut pickle = Pickle {
            buf: vec![0u8; LENGTH_FIELD],
            header_size: LENGTH_FIELD,
            capacity_after_header: 0,
            write_offset: 0,
        };
        pickle.resize(PAYLOAD_UNIT);
        pickle.set_payload_size(0);
        pickle
    }

    /// Wrap a complete pickle (length field and payload)
    ///
    /// A buffer whose declared payload does not fit, or whose header region
    /// is misaligned, is treated as carrying an empty payload.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        let empty = Pickle {
            buf: Vec::new(),
            header_size: 0,
            capacity_after_header: 0,
            write_offset: 0,
        };
        if buf.len() < LENGTH_FIELD {
            return empty;
        }

        let payload = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        let header_size = match buf.len().checked_sub(payload) {
            Some(size) if size >= LENGTH_FIELD && size % SIZE_U32 == 0 => size,
            _ => return empty,
        };

        Pickle {
            buf,
            header_size,
            capacity_after_header: payload,
            write_offset: payload,
        }
    }

    /// Logical payload length
    pub fn payload_size(&self) -> usize {
        if self.buf.len() < LENGTH_FIELD {
            return 0;
        }
        u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize
    }

    /// Bytes of the pickle up to the end of the logical payload
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.header_size + self.payload_size()]
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        let len = self.header_size + self.payload_size();
        self.buf.truncate(len);
        self.buf
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes(), SIZE_U32);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes(), SIZE_I32);
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len =
            i32::try_from(value.len()).map_err(|_| CodecError::StringTooLong(value.len()))?;
        self.write_i32(len);
        self.write_bytes(value.as_bytes(), value.len());
        Ok(())
    }

    /// Sequential reader over the payload
    pub fn iter(&self) -> PickleIterator<'_> {
        PickleIterator {
            payload: &self.buf,
            payload_offset: self.header_size,
            read_index: 0,
            end_index: self.payload_size(),
        }
    }

    fn write_bytes(&mut self, data: &[u8], length: usize) {
        let data_length = align(length, SIZE_U32);
        let new_size = self.write_offset + data_length;
        if new_size > self.capacity_after_header {
            self.resize(std::cmp::max(self.capacity_after_header * 2, new_size));
        }

        let start = self.header_size + self.write_offset;
        self.buf[start..start + length].copy_from_slice(&data[..length]);
        self.buf[start + length..start + data_length].fill(0);

        self.set_payload_size(new_size);
        self.write_offset = new_size;
    }

    fn set_payload_size(&mut self, size: usize) {
        self.buf[..LENGTH_FIELD].copy_from_slice(&(size as u32).to_le_bytes());
    }

    fn resize(&mut self, new_capacity: usize) {
        let new_capacity = align(new_capacity, PAYLOAD_UNIT);
        self.buf.resize(self.header_size + new_capacity, 0);
        self.capacity_after_header = new_capacity;
    }
}

impl Default for Pickle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over a pickle payload
///
/// Every read is bounded by the logical payload length. Reading past it is
/// the one place a truncated or hostile header is stopped.
#[derive(Debug)]
pub struct PickleIterator<'a> {
    payload: &'a [u8],
    payload_offset: usize,
    read_index: usize,
    end_index: usize,
}

impl<'a> PickleIterator<'a> {
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(SIZE_U32)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(SIZE_I32)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::NegativeLength(len))?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| AsarError::Format(format!("header string is not UTF-8: {}", e)))
    }

    /// Bytes left before the end of the payload
    pub fn remaining(&self) -> usize {
        self.end_index - self.read_index
    }

    fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if length > remaining {
            self.read_index = self.end_index;
            return Err(CodecError::Insufficient {
                requested: length,
                remaining,
            }
            .into());
        }

        let payload: &'a [u8] = self.payload;
        let start = self.payload_offset + self.read_index;
        let bytes = &payload[start..start + length];
        self.advance(length);
        Ok(bytes)
    }

    fn advance(&mut self, size: usize) {
        let aligned = align(size, SIZE_U32);
        if self.remaining() < aligned {
            self.read_index = self.end_index;
        } else {
            self.read_index += aligned;
        }
    }
}
