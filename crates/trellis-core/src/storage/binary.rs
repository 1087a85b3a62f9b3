//! Checked byte cursor and variable-length number encoding.
//!
//! Every read is bounds checked and fails with
//! [`StorageError::BufferUnderflow`] instead of panicking, so callers can
//! convert a truncated record into a corruption report.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes};
use trellis_common::types::Rid;
use trellis_common::utils::error::{Error, Result, StorageError};

/// Maximum encoded size of a 64-bit varint.
const MAX_VARINT_BYTES: usize = 10;

/// Size of a fixed-width RID: `i32` bucket + `i64` position.
pub const RID_SIZE: usize = 12;

/// Maps signed integers onto unsigned ones so small magnitudes stay short.
#[inline]
#[must_use]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
#[must_use]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Returns the number of bytes `put_unsigned_number` writes for `value`.
#[must_use]
pub const fn unsigned_number_size(mut value: u64) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}

/// Writer helpers layered over any [`BufMut`].
pub trait BinaryWriter: BufMut {
    /// Writes an unsigned LEB128 varint.
    fn put_unsigned_number(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.put_u8(value as u8);
    }

    /// Writes a signed varint (zigzag).
    fn put_number(&mut self, value: i64) {
        self.put_unsigned_number(zigzag_encode(value));
    }

    /// Writes a length-prefixed byte string.
    fn put_byte_array(&mut self, bytes: &[u8]) {
        self.put_unsigned_number(bytes.len() as u64);
        self.put_slice(bytes);
    }

    /// Writes a length-prefixed UTF-8 string.
    fn put_string(&mut self, value: &str) {
        self.put_byte_array(value.as_bytes());
    }

    /// Writes a fixed-width RID (big-endian `i32` + `i64`).
    fn put_rid(&mut self, rid: Rid) {
        self.put_i32(rid.bucket_id());
        self.put_i64(rid.position());
    }

    /// Writes a RID as two signed varints.
    fn put_compressed_rid(&mut self, rid: Rid) {
        self.put_number(i64::from(rid.bucket_id()));
        self.put_number(rid.position());
    }
}

impl<B: BufMut + ?Sized> BinaryWriter for B {}

/// Read cursor over an immutable buffer.
///
/// Slices returned by [`get_bytes`](Self::get_bytes) and
/// [`get_slice`](Self::get_slice) share the underlying allocation.
#[derive(Debug, Clone)]
pub struct BinaryReader {
    buffer: Bytes,
    position: usize,
}

impl BinaryReader {
    /// Creates a cursor positioned at the start of `buffer`.
    #[must_use]
    pub fn new(buffer: Bytes) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Returns the current position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if `position` is past the end.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.buffer.len() {
            return Err(self.underflow_at(position, 0));
        }
        self.position = position;
        Ok(())
    }

    /// Returns the total buffer length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Returns the whole underlying buffer.
    #[must_use]
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    fn underflow_at(&self, position: usize, needed: usize) -> Error {
        StorageError::BufferUnderflow {
            position,
            needed,
            length: self.buffer.len(),
        }
        .into()
    }

    fn take(&mut self, needed: usize) -> Result<&[u8]> {
        let end = self
            .position
            .checked_add(needed)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| self.underflow_at(self.position, needed))?;
        let start = self.position;
        self.position = end;
        Ok(&self.buffer[start..end])
    }

    /// Skips `count` bytes.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if fewer bytes remain.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow at the end of the buffer.
    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a big-endian `i16`.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if fewer than 2 bytes remain.
    pub fn get_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    /// Reads a big-endian `i32`.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if fewer than 4 bytes remain.
    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    /// Reads a big-endian `i64`.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if fewer than 8 bytes remain.
    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    /// Reads a big-endian `f32`.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if fewer than 4 bytes remain.
    pub fn get_f32(&mut self) -> Result<f32> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    /// Reads a big-endian `f64`.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if fewer than 8 bytes remain.
    pub fn get_f64(&mut self) -> Result<f64> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    /// Reads an unsigned LEB128 varint.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow on truncation, or corruption if the varint
    /// is longer than 10 bytes.
    pub fn get_unsigned_number(&mut self) -> Result<u64> {
        let mut result = 0u64;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.get_u8()?;
            result |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(Error::corruption(format!(
            "varint longer than {MAX_VARINT_BYTES} bytes at position {}",
            self.position
        )))
    }

    /// Reads a signed (zigzag) varint.
    ///
    /// # Errors
    ///
    /// Same as [`get_unsigned_number`](Self::get_unsigned_number).
    pub fn get_number(&mut self) -> Result<i64> {
        self.get_unsigned_number().map(zigzag_decode)
    }

    /// Reads an unsigned varint that must fit in `usize`.
    ///
    /// # Errors
    ///
    /// Returns corruption if the value does not fit.
    pub fn get_length(&mut self) -> Result<usize> {
        let value = self.get_unsigned_number()?;
        usize::try_from(value).map_err(|_| Error::corruption(format!("length {value} out of range")))
    }

    /// Reads `len` raw bytes without a length prefix.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if fewer bytes remain.
    pub fn get_slice(&mut self, len: usize) -> Result<Bytes> {
        let start = self.position;
        self.take(len)?;
        Ok(self.buffer.slice(start..start + len))
    }

    /// Reads a length-prefixed byte string.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if the prefix announces more bytes than remain.
    pub fn get_bytes(&mut self) -> Result<Bytes> {
        let len = self.get_length()?;
        self.get_slice(len)
    }

    /// Reads a fixed-width RID.
    ///
    /// # Errors
    ///
    /// Returns a buffer underflow if fewer than 12 bytes remain.
    pub fn get_rid(&mut self) -> Result<Rid> {
        let bucket_id = self.get_i32()?;
        let position = self.get_i64()?;
        Ok(Rid::new(bucket_id, position))
    }

    /// Reads a RID written as two signed varints.
    ///
    /// # Errors
    ///
    /// Returns corruption if the bucket id does not fit in `i32`.
    pub fn get_compressed_rid(&mut self) -> Result<Rid> {
        let bucket = self.get_number()?;
        let bucket_id = i32::try_from(bucket)
            .map_err(|_| Error::corruption(format!("bucket id {bucket} out of range")))?;
        let position = self.get_number()?;
        Ok(Rid::new(bucket_id, position))
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns corruption if the bytes are not valid UTF-8.
    pub fn get_string(&mut self) -> Result<String> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::corruption(format!("invalid UTF-8 string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn reader(buf: BytesMut) -> BinaryReader {
        BinaryReader::new(buf.freeze())
    }

    #[test]
    fn test_zigzag() {
        for v in [0i64, 1, -1, 63, -64, i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
    }

    #[test]
    fn test_varint_sizes() {
        let mut buf = BytesMut::new();
        buf.put_unsigned_number(127);
        assert_eq!(buf.len(), 1);
        buf.put_unsigned_number(128);
        assert_eq!(buf.len(), 3);
        assert_eq!(unsigned_number_size(u64::MAX), 10);
        assert_eq!(unsigned_number_size(300), 2);
    }

    #[test]
    fn test_numbers_and_strings() {
        let mut buf = BytesMut::new();
        buf.put_number(-300);
        buf.put_unsigned_number(u64::MAX);
        buf.put_string("héllo");
        buf.put_byte_array(&[]);
        buf.put_i32(-7);
        buf.put_i64(1 << 40);

        let mut r = reader(buf);
        assert_eq!(r.get_number().unwrap(), -300);
        assert_eq!(r.get_unsigned_number().unwrap(), u64::MAX);
        assert_eq!(r.get_string().unwrap(), "héllo");
        assert!(r.get_bytes().unwrap().is_empty());
        assert_eq!(r.get_i32().unwrap(), -7);
        assert_eq!(r.get_i64().unwrap(), 1 << 40);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_rids() {
        let mut buf = BytesMut::new();
        buf.put_rid(Rid::new(3, 1 << 33));
        assert_eq!(buf.len(), RID_SIZE);
        buf.put_compressed_rid(Rid::new(-1, -1));
        assert_eq!(buf.len(), RID_SIZE + 2);

        let mut r = reader(buf);
        assert_eq!(r.get_rid().unwrap(), Rid::new(3, 1 << 33));
        assert_eq!(r.get_compressed_rid().unwrap(), Rid::NULL);
    }

    #[test]
    fn test_underflow_is_reported() {
        let mut buf = BytesMut::new();
        buf.put_unsigned_number(10);
        buf.put_slice(b"abc");

        let mut r = reader(buf);
        let err = r.get_bytes().unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::BufferUnderflow { needed: 10, .. })
        ));
        assert!(r.set_position(100).is_err());
    }

    #[test]
    fn test_overlong_varint_is_corruption() {
        let mut r = BinaryReader::new(Bytes::from(vec![0xffu8; 11]));
        assert!(matches!(
            r.get_unsigned_number(),
            Err(Error::Storage(StorageError::Corruption(_)))
        ));
    }
}
