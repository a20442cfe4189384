//! Bounds-checked primitive decoding over a shared byte buffer.
//!
//! A [`Block`] is a view of a buffer anchored at a start offset. All reads
//! take offsets relative to that start and either return a value or a
//! [`ShellItemError`] describing the overrun; nothing ever reads outside the
//! buffer.

use crate::error::{Result, ShellItemError};
use crate::utils::{decode_ansi, decode_utf16, dos_datetime, find_bytes, format_guid, Timestamp, GUID_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

/// A structure anchored at an offset into an immutable byte buffer.
///
/// Blocks are cheap to copy; every block derived from the same buffer
/// borrows it rather than owning a copy.
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    buf: &'a [u8],
    offset: usize,
    /// Absolute offset of the block this one was reached from.
    parent: Option<usize>,
}

impl<'a> Block<'a> {
    /// Creates a block starting at `offset` with no parent.
    pub fn new(buf: &'a [u8], offset: usize) -> Self {
        Self::with_parent(buf, offset, None)
    }

    /// Creates a block that records the offset of the structure linking to it.
    pub fn with_parent(buf: &'a [u8], offset: usize, parent: Option<usize>) -> Self {
        Self {
            buf,
            offset,
            parent,
        }
    }

    /// Returns a block at `rel_offset` from this one, linked back to it.
    pub fn child(&self, rel_offset: usize) -> Block<'a> {
        Block::with_parent(self.buf, self.absolute_offset(rel_offset), Some(self.offset))
    }

    /// Returns the underlying buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Returns the absolute start offset of this block.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the absolute offset of the parent block, if any.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Converts a relative offset into an absolute buffer offset.
    #[inline]
    pub fn absolute_offset(&self, rel_offset: usize) -> usize {
        self.offset.saturating_add(rel_offset)
    }

    /// Returns the number of bytes between the block start and the buffer end.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    /// Returns `length` bytes at `rel_offset`, or an overrun error.
    pub fn read_bytes(&self, rel_offset: usize, length: usize) -> Result<&'a [u8]> {
        let start = self.absolute_offset(rel_offset);
        let end = start
            .checked_add(length)
            .ok_or_else(|| ShellItemError::overrun(start, length, self.buf.len()))?;

        if end > self.buf.len() {
            return Err(ShellItemError::overrun(start, length, self.buf.len()));
        }

        Ok(&self.buf[start..end])
    }

    /// Reads an unsigned byte.
    pub fn read_u8(&self, rel_offset: usize) -> Result<u8> {
        Ok(self.read_bytes(rel_offset, 1)?[0])
    }

    /// Reads a little-endian WORD.
    pub fn read_u16(&self, rel_offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(rel_offset, 2)?))
    }

    /// Reads a little-endian DWORD.
    pub fn read_u32(&self, rel_offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(rel_offset, 4)?))
    }

    /// Reads a little-endian QWORD.
    pub fn read_u64(&self, rel_offset: usize) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.read_bytes(rel_offset, 8)?))
    }

    /// Reads a little-endian signed 32-bit integer.
    pub fn read_i32(&self, rel_offset: usize) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(rel_offset, 4)?))
    }

    /// Returns the number of bytes before the first NUL at `rel_offset`.
    ///
    /// # Errors
    ///
    /// Returns `UnterminatedString` if no NUL follows before the buffer end.
    pub fn cstring_len(&self, rel_offset: usize) -> Result<usize> {
        let start = self.absolute_offset(rel_offset);
        if start >= self.buf.len() {
            return Err(ShellItemError::overrun(start, 1, self.buf.len()));
        }

        self.buf[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ShellItemError::unterminated(start, self.buf.len()))
    }

    /// Reads an 8-bit string.
    ///
    /// Without a `length` the string runs until the next NUL byte. With a
    /// `length`, exactly that many bytes are read and the value is cut at
    /// the first NUL inside them. The terminator is never part of the value.
    pub fn read_string(&self, rel_offset: usize, length: Option<usize>) -> Result<String> {
        let data = match length {
            Some(length) => {
                let data = self.read_bytes(rel_offset, length)?;
                match data.iter().position(|&b| b == 0) {
                    Some(end) => &data[..end],
                    None => data,
                }
            }
            None => {
                let length = self.cstring_len(rel_offset)?;
                self.read_bytes(rel_offset, length)?
            }
        };

        Ok(decode_ansi(data))
    }

    /// Reads a UTF-16LE string.
    ///
    /// Without a `byte_length` the string is terminated by the first `00 00`
    /// byte pair found scanning byte by byte. That pair may straddle the high
    /// byte of an ASCII-range character and the terminator, so when the byte
    /// two before the match is also zero the span is extended by one byte.
    /// A match within the first two bytes, or no match at all, yields an
    /// empty string. This misreads some sequences (e.g. `41 00 00 20`, "A"
    /// followed by U+2000, reads as empty).
    ///
    /// With a `byte_length` at most that many bytes are used, clipped at the
    /// first `00 00 00` run and at the buffer end. Odd spans are decoded one
    /// byte longer when the buffer allows it. The value always stops at the
    /// first NUL code unit.
    ///
    /// Termination problems never fail the read; a string that cannot be
    /// delimited decodes as empty or clipped.
    pub fn read_utf16_string(&self, rel_offset: usize, byte_length: Option<usize>) -> Result<String> {
        let start = self.absolute_offset(rel_offset);
        let data = self.buf.get(start..).unwrap_or_default();

        let length = match byte_length {
            Some(byte_length) => {
                let clip = find_bytes(data, &[0, 0, 0]).unwrap_or(data.len());
                byte_length.min(clip)
            }
            None => match find_bytes(data, &[0, 0]) {
                Some(end) if end > 2 => {
                    if data[end - 2] == 0 {
                        end + 1
                    } else {
                        end
                    }
                }
                Some(_) => 0,
                None => {
                    trace!(
                        offset = %format!("{:#x}", start),
                        "No UTF-16 terminator before buffer end, reading as empty"
                    );
                    0
                }
            },
        };

        Ok(self.decode_utf16_span(start, length))
    }

    /// Decodes `length` bytes of UTF-16LE at absolute `start`.
    fn decode_utf16_span(&self, start: usize, length: usize) -> String {
        if length == 0 {
            return String::new();
        }

        let available = self.buf.len().saturating_sub(start);
        let mut length = length.min(available);
        if length % 2 != 0 {
            let retry = if length < available { length + 1 } else { length - 1 };
            trace!(
                offset = %format!("{:#x}", start),
                length,
                retry,
                "Odd UTF-16 span, adjusting"
            );
            length = retry;
        }

        decode_utf16(&self.buf[start..start + length])
    }

    /// Reads a DOS date (WORD) followed by a DOS time (WORD).
    ///
    /// Invalid bit patterns decode to [`Timestamp::Unknown`]; only a read
    /// past the buffer end is an error.
    pub fn read_dos_datetime(&self, rel_offset: usize) -> Result<Timestamp> {
        let data = self.read_bytes(rel_offset, 4)?;
        let dosdate = LittleEndian::read_u16(&data[0..2]);
        let dostime = LittleEndian::read_u16(&data[2..4]);
        Ok(dos_datetime(dosdate, dostime))
    }

    /// Reads a 16-byte GUID and formats it as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
    pub fn read_guid(&self, rel_offset: usize) -> Result<String> {
        let mut raw = [0u8; GUID_SIZE];
        raw.copy_from_slice(self.read_bytes(rel_offset, GUID_SIZE)?);
        Ok(format_guid(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        let data = [0xFF, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let block = Block::new(&data, 1);

        assert_eq!(block.read_u8(0).unwrap(), 0x01);
        assert_eq!(block.read_u16(0).unwrap(), 0x0201);
        assert_eq!(block.read_u32(0).unwrap(), 0x04030201);
        assert_eq!(block.read_u64(0).unwrap(), 0x0807060504030201);
        assert_eq!(Block::new(&[0xFE, 0xFF, 0xFF, 0xFF], 0).read_i32(0).unwrap(), -2);
    }

    #[test]
    fn test_overrun() {
        let data = [0u8; 4];
        let block = Block::new(&data, 2);

        assert!(block.read_u16(0).is_ok());
        let err = block.read_u32(0).unwrap_err();
        assert!(matches!(
            err,
            ShellItemError::BufferOverrun { offset: 2, length: 4, buffer_len: 4 }
        ));
        assert!(block.read_u8(2).is_err());
        assert!(block.read_u8(usize::MAX).is_err());
    }

    #[test]
    fn test_offsets_and_parent() {
        let data = [0u8; 16];
        let block = Block::new(&data, 4);
        assert_eq!(block.absolute_offset(3), 7);
        assert_eq!(block.parent(), None);
        assert_eq!(block.remaining(), 12);

        let child = block.child(2);
        assert_eq!(child.offset(), 6);
        assert_eq!(child.parent(), Some(4));
    }

    #[test]
    fn test_read_string_terminated() {
        let data = b"\x01HELLO\0WORLD\0";
        let block = Block::new(data, 1);
        assert_eq!(block.read_string(0, None).unwrap(), "HELLO");
        assert_eq!(block.cstring_len(0).unwrap(), 5);
        assert_eq!(block.read_string(6, None).unwrap(), "WORLD");
    }

    #[test]
    fn test_read_string_fixed_length() {
        let data = b"AB\0CDEF";
        let block = Block::new(data, 0);
        assert_eq!(block.read_string(0, Some(5)).unwrap(), "AB");
        assert_eq!(block.read_string(3, Some(4)).unwrap(), "CDEF");
        assert!(block.read_string(3, Some(5)).is_err());
    }

    #[test]
    fn test_read_string_unterminated() {
        let data = b"ABC";
        let err = Block::new(data, 0).read_string(0, None).unwrap_err();
        assert!(matches!(err, ShellItemError::UnterminatedString { .. }));
        assert!(err.is_overrun());
    }

    #[test]
    fn test_utf16_ascii_terminated() {
        // "AB" + NUL: the first 00 00 pair is the high byte of 'B' plus the
        // low byte of the terminator
        let data = [0x41, 0x00, 0x42, 0x00, 0x00, 0x00];
        assert_eq!(Block::new(&data, 0).read_utf16_string(0, None).unwrap(), "AB");
    }

    #[test]
    fn test_utf16_short_match_is_empty() {
        // a terminator found within the first two bytes yields nothing, even
        // when it is the high byte of a single character
        let data = [0x41, 0x00, 0x00, 0x00];
        assert_eq!(Block::new(&data, 0).read_utf16_string(0, None).unwrap(), "");

        let data = [0x2D, 0x4E, 0x00, 0x00];
        assert_eq!(Block::new(&data, 0).read_utf16_string(0, None).unwrap(), "");
    }

    #[test]
    fn test_utf16_non_ascii() {
        // U+00E9, U+4E2D
        let data = [0xE9, 0x00, 0x2D, 0x4E, 0x00, 0x00];
        assert_eq!(
            Block::new(&data, 0).read_utf16_string(0, None).unwrap(),
            "\u{00E9}\u{4E2D}"
        );

        // U+4E2D then 'A': odd span is widened by one byte
        let data = [0x2D, 0x4E, 0x41, 0x00, 0x00, 0x00];
        assert_eq!(
            Block::new(&data, 0).read_utf16_string(0, None).unwrap(),
            "\u{4E2D}A"
        );
    }

    #[test]
    fn test_utf16_known_misread() {
        // 'A' followed by U+2000: the scan stops inside the first character
        let data = [0x41, 0x00, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(Block::new(&data, 0).read_utf16_string(0, None).unwrap(), "");

        // 'A' 'B' then U+2000: the scan stops inside the third character
        let data = [0x41, 0x00, 0x42, 0x00, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(Block::new(&data, 0).read_utf16_string(0, None).unwrap(), "AB");
    }

    #[test]
    fn test_utf16_empty_and_unterminated() {
        let data = [0x00, 0x00, 0x41];
        assert_eq!(Block::new(&data, 0).read_utf16_string(0, None).unwrap(), "");

        let data = [0x41, 0x00, 0x42, 0x00, 0x43];
        assert_eq!(Block::new(&data, 0).read_utf16_string(0, None).unwrap(), "");

        // past the buffer end
        assert_eq!(Block::new(&data, 0).read_utf16_string(8, None).unwrap(), "");
        assert_eq!(Block::new(&data, 0).read_utf16_string(8, Some(4)).unwrap(), "");
    }

    #[test]
    fn test_utf16_explicit_length() {
        let mut data = Vec::new();
        for c in "Foo.txt".encode_utf16() {
            data.extend_from_slice(&c.to_le_bytes());
        }
        data.extend_from_slice(&[0, 0, 0, 0]);

        let block = Block::new(&data, 0);
        assert_eq!(block.read_utf16_string(0, Some(16)).unwrap(), "Foo.txt");
        assert_eq!(block.read_utf16_string(0, Some(6)).unwrap(), "Foo");
        assert_eq!(block.read_utf16_string(0, Some(0)).unwrap(), "");

        // a declared length past the buffer end is clipped, not an overrun
        assert_eq!(block.read_utf16_string(0, Some(64)).unwrap(), "Foo.txt");
        assert_eq!(block.read_utf16_string(8, Some(64)).unwrap(), "txt");

        // no 00 00 00 run at all: clipped at the buffer end
        let data = [0x41, 0x00, 0x42, 0x00];
        assert_eq!(Block::new(&data, 0).read_utf16_string(0, Some(32)).unwrap(), "AB");
    }

    #[test]
    fn test_dos_datetime() {
        // 2010-01-02 03:04:06
        let date: u16 = (30 << 9) | (1 << 5) | 2;
        let time: u16 = (3 << 11) | (4 << 5) | 3;
        let mut data = Vec::new();
        data.extend_from_slice(&date.to_le_bytes());
        data.extend_from_slice(&time.to_le_bytes());

        let ts = Block::new(&data, 0).read_dos_datetime(0).unwrap();
        assert_eq!(ts.to_string(), "2010-01-02 03:04:06");

        assert!(Block::new(&[0u8; 4], 0).read_dos_datetime(0).unwrap().is_unknown());
        assert!(Block::new(&[0u8; 3], 0).read_dos_datetime(0).is_err());
    }

    #[test]
    fn test_read_guid() {
        let data: Vec<u8> = (1..=16).collect();
        let block = Block::new(&data, 0);
        assert_eq!(block.read_guid(0).unwrap(), "04030201-0605-0807-090a-0b0c0d0e0f10");
        assert!(block.read_guid(1).is_err());
    }
}
