//! Named field declarations over a [`Block`].
//!
//! Record decoders compute their layouts procedurally, since later offsets
//! depend on the lengths of earlier strings and on the extension version.
//! [`Fields`] binds each decoded value to a name, a decoder kind and a
//! relative offset as it goes, so a decoded record can later list its layout
//! or re-read any single field from the buffer.

use crate::block::Block;
use crate::error::Result;
use crate::utils::Timestamp;
use std::fmt;
use tracing::debug;

/// Primitive decoder used for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FieldKind {
    /// Unsigned 8-bit integer.
    Byte,
    /// Little-endian unsigned 16-bit integer.
    Word,
    /// Little-endian unsigned 32-bit integer.
    Dword,
    /// Little-endian unsigned 64-bit integer.
    Qword,
    /// Little-endian signed 32-bit integer.
    Int,
    /// 8-bit string, NUL-terminated or fixed length.
    String,
    /// UTF-16LE string, NUL-terminated or fixed byte length.
    WString,
    /// Packed DOS date and time (4 bytes).
    DosDate,
    /// Mixed-endian GUID (16 bytes).
    Guid,
}

impl FieldKind {
    /// Returns the name of this decoder kind.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Byte => "BYTE",
            FieldKind::Word => "WORD",
            FieldKind::Dword => "DWORD",
            FieldKind::Qword => "QWORD",
            FieldKind::Int => "INT",
            FieldKind::String => "STRING",
            FieldKind::WString => "WSTRING",
            FieldKind::DosDate => "DOSDATE",
            FieldKind::Guid => "GUID",
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FieldValue {
    /// Unsigned byte.
    Byte(u8),
    /// Unsigned WORD.
    Word(u16),
    /// Unsigned DWORD.
    Dword(u32),
    /// Unsigned QWORD.
    Qword(u64),
    /// Signed 32-bit integer.
    Int(i32),
    /// 8-bit string.
    String(String),
    /// UTF-16 string.
    WString(String),
    /// DOS date/time.
    DosDate(Timestamp),
    /// Formatted GUID.
    Guid(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Byte(v) => write!(f, "{:#04x}", v),
            FieldValue::Word(v) => write!(f, "{:#06x}", v),
            FieldValue::Dword(v) => write!(f, "{:#010x}", v),
            FieldValue::Qword(v) => write!(f, "{:#018x}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::String(s) | FieldValue::WString(s) | FieldValue::Guid(s) => f.write_str(s),
            FieldValue::DosDate(ts) => write!(f, "{}", ts),
        }
    }
}

/// A field declaration: decoder kind, relative offset and optional length.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Field {
    /// Field name.
    pub name: &'static str,

    /// Decoder used for this field.
    pub kind: FieldKind,

    /// Offset relative to the start of the record.
    pub offset: usize,

    /// Explicit length for string kinds.
    pub length: Option<usize>,
}

impl Field {
    /// Creates a field declaration.
    pub fn new(name: &'static str, kind: FieldKind, offset: usize, length: Option<usize>) -> Self {
        Self {
            name,
            kind,
            offset,
            length,
        }
    }

    /// Decodes this field from `block`.
    ///
    /// Every call reads the buffer again; nothing is cached.
    pub fn read(&self, block: &Block<'_>) -> Result<FieldValue> {
        Ok(match self.kind {
            FieldKind::Byte => FieldValue::Byte(block.read_u8(self.offset)?),
            FieldKind::Word => FieldValue::Word(block.read_u16(self.offset)?),
            FieldKind::Dword => FieldValue::Dword(block.read_u32(self.offset)?),
            FieldKind::Qword => FieldValue::Qword(block.read_u64(self.offset)?),
            FieldKind::Int => FieldValue::Int(block.read_i32(self.offset)?),
            FieldKind::String => FieldValue::String(block.read_string(self.offset, self.length)?),
            FieldKind::WString => {
                FieldValue::WString(block.read_utf16_string(self.offset, self.length)?)
            }
            FieldKind::DosDate => FieldValue::DosDate(block.read_dos_datetime(self.offset)?),
            FieldKind::Guid => FieldValue::Guid(block.read_guid(self.offset)?),
        })
    }
}

/// The ordered field declarations of one record, bound to its block.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    block: Block<'a>,
    declared: Vec<Field>,
}

impl<'a> Fields<'a> {
    /// Starts an empty declaration list for `block`.
    pub fn new(block: Block<'a>) -> Self {
        Self {
            block,
            declared: Vec::new(),
        }
    }

    /// Returns the block the fields are read from.
    pub fn block(&self) -> &Block<'a> {
        &self.block
    }

    /// Declares a field, decodes it once and records the declaration.
    ///
    /// A field that fails to decode is not recorded.
    pub fn declare(
        &mut self,
        name: &'static str,
        kind: FieldKind,
        offset: usize,
        length: Option<usize>,
    ) -> Result<FieldValue> {
        let field = Field::new(name, kind, offset, length);
        let value = field.read(&self.block)?;
        self.record(field, format_args!("{}", value));
        Ok(value)
    }

    fn record(&mut self, field: Field, value: fmt::Arguments<'_>) {
        debug!(
            kind = field.kind.name(),
            field = field.name,
            offset = %format!("{:#x}", self.block.absolute_offset(field.offset)),
            value = %value,
            "Declared field"
        );
        self.declared.push(field);
    }

    /// Declares a BYTE field.
    pub fn byte(&mut self, name: &'static str, offset: usize) -> Result<u8> {
        let v = self.block.read_u8(offset)?;
        self.record(Field::new(name, FieldKind::Byte, offset, None), format_args!("{:#04x}", v));
        Ok(v)
    }

    /// Declares a WORD field.
    pub fn word(&mut self, name: &'static str, offset: usize) -> Result<u16> {
        let v = self.block.read_u16(offset)?;
        self.record(Field::new(name, FieldKind::Word, offset, None), format_args!("{:#06x}", v));
        Ok(v)
    }

    /// Declares a DWORD field.
    pub fn dword(&mut self, name: &'static str, offset: usize) -> Result<u32> {
        let v = self.block.read_u32(offset)?;
        self.record(Field::new(name, FieldKind::Dword, offset, None), format_args!("{:#010x}", v));
        Ok(v)
    }

    /// Declares a QWORD field.
    pub fn qword(&mut self, name: &'static str, offset: usize) -> Result<u64> {
        let v = self.block.read_u64(offset)?;
        self.record(Field::new(name, FieldKind::Qword, offset, None), format_args!("{:#018x}", v));
        Ok(v)
    }

    /// Declares an 8-bit string field.
    pub fn string(&mut self, name: &'static str, offset: usize, length: Option<usize>) -> Result<String> {
        let s = self.block.read_string(offset, length)?;
        self.record(Field::new(name, FieldKind::String, offset, length), format_args!("{}", s));
        Ok(s)
    }

    /// Declares a NUL-terminated 8-bit string and returns it with the number
    /// of bytes it occupies, terminator included.
    pub fn cstring(&mut self, name: &'static str, offset: usize) -> Result<(String, usize)> {
        let value = self.string(name, offset, None)?;
        let span = self.block.cstring_len(offset)? + 1;
        Ok((value, span))
    }

    /// Declares a UTF-16 string field.
    pub fn wstring(&mut self, name: &'static str, offset: usize, length: Option<usize>) -> Result<String> {
        let s = self.block.read_utf16_string(offset, length)?;
        self.record(Field::new(name, FieldKind::WString, offset, length), format_args!("{}", s));
        Ok(s)
    }

    /// Declares a DOS date/time field.
    pub fn dosdate(&mut self, name: &'static str, offset: usize) -> Result<Timestamp> {
        let v = self.block.read_dos_datetime(offset)?;
        self.record(Field::new(name, FieldKind::DosDate, offset, None), format_args!("{}", v));
        Ok(v)
    }

    /// Declares a GUID field.
    pub fn guid(&mut self, name: &'static str, offset: usize) -> Result<String> {
        let s = self.block.read_guid(offset)?;
        self.record(Field::new(name, FieldKind::Guid, offset, None), format_args!("{}", s));
        Ok(s)
    }

    /// Returns the declaration of `name`, if it was declared.
    ///
    /// Later declarations shadow earlier ones with the same name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.declared.iter().rev().find(|f| f.name == name)
    }

    /// Re-reads the field `name` from the buffer.
    pub fn read(&self, name: &str) -> Option<Result<FieldValue>> {
        self.get(name).map(|field| field.read(&self.block))
    }

    /// Returns all declarations in the order they were made.
    pub fn declared(&self) -> &[Field] {
        &self.declared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_reread() {
        let data = [0x20, 0x00, 0x1F, 0x50, b'A', b'B', 0x00];
        let mut fields = Fields::new(Block::new(&data, 0));

        assert_eq!(fields.word("size", 0x0).unwrap(), 0x20);
        assert_eq!(fields.byte("type", 0x2).unwrap(), 0x1F);
        assert_eq!(fields.cstring("name", 0x4).unwrap(), ("AB".to_string(), 3));

        assert_eq!(fields.declared().len(), 3);
        assert_eq!(fields.get("type").unwrap().kind, FieldKind::Byte);
        assert_eq!(fields.read("size").unwrap().unwrap(), FieldValue::Word(0x20));
        assert_eq!(
            fields.read("name").unwrap().unwrap(),
            FieldValue::String("AB".to_string())
        );
        assert!(fields.read("missing").is_none());
    }

    #[test]
    fn test_failed_declaration_not_recorded() {
        let data = [0x01];
        let mut fields = Fields::new(Block::new(&data, 0));
        assert!(fields.dword("filesize", 0).is_err());
        assert!(fields.declared().is_empty());
    }

    #[test]
    fn test_typed_helpers_record_their_kind() {
        let mut data = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x41, 0x00, 0x42, 0x00, 0x00, 0x00];
        data.extend_from_slice(&[0x21, 0x3A, 0x00, 0x70]);
        let mut fields = Fields::new(Block::new(&data, 0));

        assert_eq!(fields.dword("size", 0).unwrap(), 0xFFFF_FFFF);
        assert_eq!(fields.wstring("name", 4, None).unwrap(), "AB");
        assert_eq!(fields.dosdate("modified", 10).unwrap().to_string(), "2009-01-01 14:00:00");

        let kinds: Vec<_> = fields.declared().iter().map(|f| f.kind).collect();
        assert_eq!(kinds, [FieldKind::Dword, FieldKind::WString, FieldKind::DosDate]);
        assert_eq!(fields.get("name").unwrap().length, None);
        assert_eq!(
            fields.read("name").unwrap().unwrap(),
            FieldValue::WString("AB".to_string())
        );
    }

    #[test]
    fn test_shadowing() {
        let data = [0x01, 0x02];
        let mut fields = Fields::new(Block::new(&data, 0));
        fields.byte("flags", 0).unwrap();
        fields.byte("flags", 1).unwrap();
        assert_eq!(fields.read("flags").unwrap().unwrap(), FieldValue::Byte(0x02));
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Byte(0x1F).to_string(), "0x1f");
        assert_eq!(FieldValue::Word(0x20).to_string(), "0x0020");
        assert_eq!(FieldValue::String("abc".into()).to_string(), "abc");
        assert_eq!(FieldValue::DosDate(Timestamp::Unknown).to_string(), "unknown");
    }
}
