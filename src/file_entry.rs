//! File entry layout and its version-gated extension block.
//!
//! File entries share one layout across the BagMRU item types (0x31, 0x32,
//! 0xB1), the extended unknown type (0x74) and the position-tracking records
//! stored in the Bags `ItemPos*` values; only the offset of the fixed
//! portion differs.
//!
//! ```text
//! Offset      Size  Description
//! off+0x00    4     File size
//! off+0x04    4     Modified time (DOS date + DOS time)
//! off+0x08    2     File attributes
//! off+0x0A    var   Short name (8-bit, NUL-terminated)
//! (align 2)
//!             2     Extension size
//!             2     Extension version
//!   v >= 3    4     Unknown (extension signature)
//!             4     Created time (DOS)
//!             4     Accessed time (DOS)
//!             4     Unknown
//!   v >= 7    8     File reference
//!             8     Unknown
//!             2     Long name size
//!   v >= 8    4     Unknown
//!   v >= 3    var   Long name (UTF-16)
//! ```

use crate::block::Block;
use crate::error::Result;
use crate::field::Fields;
use crate::item_type::{FileAttributes, ShellItemType};
use crate::shell_item::ShellItem;
use crate::utils::{align, Timestamp};

/// Version-gated trailer of a file entry.
///
/// Which members are present depends only on `version`, never on `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtensionBlock {
    /// Declared size of the extension block.
    pub size: u16,

    /// Extension version.
    pub version: u16,

    /// Creation time (version 3 and later).
    pub created: Timestamp,

    /// Last access time (version 3 and later).
    pub accessed: Timestamp,

    /// NTFS file reference (version 7 and later).
    pub file_reference: Option<u64>,

    /// Declared long name size in bytes (version 7 and later).
    pub long_name_size: Option<u16>,

    /// Long (UTF-16) name (version 3 and later).
    pub long_name: Option<String>,
}

impl ExtensionBlock {
    /// Parses the extension block starting at relative offset `off`.
    fn parse(fields: &mut Fields<'_>, mut off: usize) -> Result<Self> {
        let size = fields.word("ext_size", off)?;
        off += 2;
        let version = fields.word("ext_version", off)?;
        off += 2;

        let (created, accessed) = if version >= 0x03 {
            off += 4;
            let created = fields.dosdate("created", off)?;
            off += 4;
            let accessed = fields.dosdate("accessed", off)?;
            off += 4;
            off += 4;
            (created, accessed)
        } else {
            (Timestamp::Unknown, Timestamp::Unknown)
        };

        let (file_reference, long_name_size, long_name) = if version >= 0x07 {
            let file_reference = fields.qword("file_reference", off)?;
            off += 8;
            off += 8;

            let long_name_size = fields.word("long_name_size", off)?;
            off += 2;

            if version >= 0x08 {
                off += 4;
            }

            let long_name = fields.wstring("long_name", off, Some(usize::from(long_name_size)))?;
            (Some(file_reference), Some(long_name_size), Some(long_name))
        } else if version >= 0x03 {
            (None, None, Some(fields.wstring("long_name", off, None)?))
        } else {
            (None, None, None)
        };

        Ok(ExtensionBlock {
            size,
            version,
            created,
            accessed,
            file_reference,
            long_name_size,
            long_name,
        })
    }
}

/// A decoded file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileEntry {
    /// File size in bytes (truncated to 32 bits by the format).
    pub file_size: u32,

    /// Last modification time.
    pub modified: Timestamp,

    /// File attributes.
    pub attributes: FileAttributes,

    /// 8.3 short name.
    pub short_name: String,

    /// Extension block. `None` for fragments.
    pub extension: Option<ExtensionBlock>,
}

impl FileEntry {
    /// Parses a complete file entry whose fixed portion starts at `off`.
    ///
    /// # Errors
    ///
    /// Returns an overrun error if any part, including the extension block,
    /// lies beyond the buffer.
    pub fn parse(fields: &mut Fields<'_>, off: usize) -> Result<Self> {
        let (mut entry, ext_offset) = Self::parse_fixed(fields, off)?;
        entry.extension = Some(ExtensionBlock::parse(fields, ext_offset)?);
        Ok(entry)
    }

    /// Parses only the fixed portion (size, modified time, attributes and
    /// short name), as used for records truncated inside the extension block.
    pub fn parse_fragment(fields: &mut Fields<'_>, off: usize) -> Result<Self> {
        Self::parse_fixed(fields, off).map(|(entry, _)| entry)
    }

    /// Parses the fixed portion and returns the aligned offset that follows it.
    fn parse_fixed(fields: &mut Fields<'_>, mut off: usize) -> Result<(Self, usize)> {
        let file_size = fields.dword("file_size", off)?;
        off += 4;
        let modified = fields.dosdate("modified", off)?;
        off += 4;
        let attributes = FileAttributes::new(fields.word("attributes", off)?);
        off += 2;
        let (short_name, span) = fields.cstring("short_name", off)?;
        off = align(off + span, 2);

        let entry = FileEntry {
            file_size,
            modified,
            attributes,
            short_name,
            extension: None,
        };
        Ok((entry, off))
    }

    /// Returns the long name, if the extension block carries a non-empty one.
    pub fn long_name(&self) -> Option<&str> {
        self.extension
            .as_ref()
            .and_then(|ext| ext.long_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Returns the long name if present, otherwise the short name.
    pub fn name(&self) -> &str {
        self.long_name().unwrap_or(&self.short_name)
    }

    /// Returns the creation time, or unknown when the extension lacks it.
    pub fn created(&self) -> Timestamp {
        self.extension.as_ref().map_or(Timestamp::Unknown, |ext| ext.created)
    }

    /// Returns the last access time, or unknown when the extension lacks it.
    pub fn accessed(&self) -> Timestamp {
        self.extension.as_ref().map_or(Timestamp::Unknown, |ext| ext.accessed)
    }
}

/// A record from a Bags `ItemPos*` value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ItemPosEntry {
    /// Network share, printer and similar entries: a bare name at 0x5.
    Share {
        /// Entry name.
        name: String,
    },

    /// A file entry whose fixed portion starts at 0x4.
    File(FileEntry),
}

impl ItemPosEntry {
    /// Parses the body of a position-tracking record.
    ///
    /// The WORD at 0x2 holds flags whose low byte doubles as the item type.
    pub fn parse(fields: &mut Fields<'_>) -> Result<Self> {
        let flags = fields.word("flags", 0x2)?;

        if (flags & 0xFF) as u8 == ShellItemType::NETWORK_SHARE {
            let name = fields.string("long_name", 0x5, None)?;
            return Ok(ItemPosEntry::Share { name });
        }

        FileEntry::parse(fields, 0x4).map(ItemPosEntry::File)
    }

    /// Returns the display name of the entry.
    pub fn name(&self) -> &str {
        match self {
            ItemPosEntry::Share { name } => name,
            ItemPosEntry::File(entry) => entry.name(),
        }
    }
}

/// Decodes the position-tracking record at `offset` in `buf`.
///
/// # Errors
///
/// Returns an overrun error if any part of the record lies outside `buf`.
pub fn parse_item_pos(buf: &[u8], offset: usize) -> Result<ShellItem<'_>> {
    ShellItem::decode_item_pos(Block::new(buf, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds the fixed portion plus an extension block of `version`.
    fn entry_bytes(short_name: &str, version: u16, long_name: &str) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&1234u32.to_le_bytes());
        data.extend_from_slice(&[0x21, 0x3A, 0x00, 0x70]); // 2009-01-01 14:00:00
        data.extend_from_slice(&FileAttributes::DIRECTORY.to_le_bytes());
        data.extend_from_slice(short_name.as_bytes());
        data.push(0);
        if data.len() % 2 != 0 {
            data.push(0);
        }

        data.extend_from_slice(&0x30u16.to_le_bytes());
        data.extend_from_slice(&version.to_le_bytes());

        let utf16: Vec<u8> = long_name
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|c| c.to_le_bytes())
            .collect();

        if version >= 3 {
            data.extend_from_slice(&[0x04, 0x00, 0xEF, 0xBE]);
            data.extend_from_slice(&[0x21, 0x3A, 0x00, 0x70]);
            data.extend_from_slice(&[0x22, 0x3A, 0x00, 0x70]);
            data.extend_from_slice(&[0x00; 4]);
        }
        if version >= 7 {
            data.extend_from_slice(&0x0001_0000_0000_002Au64.to_le_bytes());
            data.extend_from_slice(&[0x00; 8]);
            data.extend_from_slice(&(utf16.len() as u16).to_le_bytes());
        }
        if version >= 8 {
            data.extend_from_slice(&[0x00; 4]);
        }
        if version >= 3 {
            data.extend_from_slice(&utf16);
        }
        data.extend_from_slice(&[0x00; 2]);
        data
    }

    #[test]
    fn test_version_9_entry() {
        let data = entry_bytes("PROGRA~1", 9, "Program Files");
        let mut fields = Fields::new(Block::new(&data, 0));
        let entry = FileEntry::parse(&mut fields, 0).unwrap();

        assert_eq!(entry.file_size, 1234);
        assert_eq!(entry.modified.to_string(), "2009-01-01 14:00:00");
        assert!(entry.attributes.is_directory());
        assert_eq!(entry.short_name, "PROGRA~1");
        assert_eq!(entry.created().to_string(), "2009-01-01 14:00:00");
        assert_eq!(entry.accessed().to_string(), "2009-01-02 14:00:00");

        let ext = entry.extension.as_ref().unwrap();
        assert_eq!(ext.version, 9);
        assert_eq!(ext.file_reference, Some(0x0001_0000_0000_002A));
        assert_eq!(ext.long_name_size, Some(28));
        assert_eq!(entry.name(), "Program Files");
    }

    #[test]
    fn test_version_3_entry_scans_long_name() {
        let data = entry_bytes("DOCUME~1", 3, "Documents and Settings");
        let mut fields = Fields::new(Block::new(&data, 0));
        let entry = FileEntry::parse(&mut fields, 0).unwrap();

        let ext = entry.extension.as_ref().unwrap();
        assert_eq!(ext.long_name_size, None);
        assert_eq!(ext.file_reference, None);
        assert_eq!(entry.name(), "Documents and Settings");
    }

    #[test]
    fn test_version_2_entry_uses_short_name() {
        let data = entry_bytes("WINDOWS", 2, "");
        let mut fields = Fields::new(Block::new(&data, 0));
        let entry = FileEntry::parse(&mut fields, 0).unwrap();

        assert!(entry.created().is_unknown());
        assert!(entry.accessed().is_unknown());
        assert_eq!(entry.extension.as_ref().unwrap().long_name, None);
        assert_eq!(entry.name(), "WINDOWS");
    }

    #[test]
    fn test_zero_long_name_size() {
        let mut data = entry_bytes("SHORT", 8, "Ignored");
        // long_name_size sits 6 bytes before the name (2 size + 4 unknown)
        let name_offset = data.len() - 2 - 16;
        data[name_offset - 6] = 0;
        data[name_offset - 5] = 0;

        let mut fields = Fields::new(Block::new(&data, 0));
        let entry = FileEntry::parse(&mut fields, 0).unwrap();
        assert_eq!(entry.extension.as_ref().unwrap().long_name.as_deref(), Some(""));
        assert_eq!(entry.name(), "SHORT");
    }

    #[test]
    fn test_truncated_extension_fails_but_fragment_succeeds() {
        let data = entry_bytes("TRUNC", 9, "Truncated name");
        let cut = &data[..0x16];

        let mut fields = Fields::new(Block::new(cut, 0));
        let err = FileEntry::parse(&mut fields, 0).unwrap_err();
        assert!(err.is_overrun());

        let mut fields = Fields::new(Block::new(cut, 0));
        let fragment = FileEntry::parse_fragment(&mut fields, 0).unwrap();
        assert_eq!(fragment.short_name, "TRUNC");
        assert_eq!(fragment.file_size, 1234);
        assert!(fragment.extension.is_none());
        assert_eq!(fragment.long_name(), None);
    }

    #[test]
    fn test_item_pos_share() {
        let mut data = vec![0x10, 0x00, 0xC3, 0x01, 0x00];
        data.extend_from_slice(b"\\\\server\\printer\0");
        let mut fields = Fields::new(Block::new(&data, 0));
        let entry = ItemPosEntry::parse(&mut fields).unwrap();
        assert_eq!(entry.name(), "\\\\server\\printer");

        let item = parse_item_pos(&data, 0).unwrap();
        assert_eq!(item.display_name(), "\\\\server\\printer");
        assert_eq!(item.flags(), Some(0x01C3));
    }

    #[test]
    fn test_item_pos_file() {
        let mut data = vec![0x00, 0x00, 0x31, 0x00];
        data.extend_from_slice(&entry_bytes("NOTES", 9, "Meeting notes.txt"));
        let len = data.len() as u16;
        data[..2].copy_from_slice(&len.to_le_bytes());

        let item = parse_item_pos(&data, 0).unwrap();
        assert_eq!(item.display_name(), "Meeting notes.txt");
        assert_eq!(item.created_time().to_string(), "2009-01-01 14:00:00");
        assert!(!item.is_fragment());

        // no fragment fallback for position-tracking records
        assert!(parse_item_pos(&data[..0x1A], 0).unwrap_err().is_overrun());
    }
}
