//! Shell item records and per-type decoders.
//!
//! A shell item starts with a common header:
//!
//! ```text
//! Offset  Size  Description
//! 0x00    2     Record size (including this field)
//! 0x02    1     Type tag
//! ```
//!
//! The type tag selects one of the layouts decoded below. Every decoded
//! record keeps its field declarations so single fields can be re-read from
//! the buffer later.

use crate::block::Block;
use crate::error::Result;
use crate::field::{Field, FieldValue, Fields};
use crate::file_entry::{FileEntry, ItemPosEntry};
use crate::guid::GuidNames;
use crate::item_type::{KnownFolder, ShellItemType};
use crate::utils::{align, Timestamp};
use std::fmt;
use tracing::{debug, instrument, warn};

/// Display name used when a record carries nothing to name it by.
pub const UNKNOWN_NAME: &str = "??";

/// Record size of the 0x2E entries that carry a GUID.
const UNKNOWN_GUID_SIZE: u16 = 0x20;

/// Unknown entry (0x2E) that carries a GUID when the record is 0x20 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UnknownGuidEntry {
    /// Flags byte at 0x3, read only alongside the GUID.
    pub flags: Option<u8>,
    /// GUID at 0xE, if present.
    pub guid: Option<String>,
    /// Resolved name.
    pub name: String,
}

/// Folder entry (0x1F).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FolderEntry {
    /// Raw known folder id byte at 0x3.
    pub folder_id: u8,
    /// Known folder the id maps to.
    pub known_folder: KnownFolder,
    /// Folder GUID at 0x4.
    pub guid: String,
    /// Resolved name.
    pub name: String,
}

/// Volume entry (0x2F).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VolumeEntry {
    /// Drive name, e.g. `C:\`.
    pub name: String,
}

/// Network volume entry (0x41, 0x42, 0x46, 0x47).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetworkVolumeEntry {
    /// Flags byte at 0x4.
    pub flags: u8,
    /// Volume name, present only when flag 0x2 is set.
    pub name: Option<String>,
    /// Description following the name.
    pub description: Option<String>,
}

impl NetworkVolumeEntry {
    /// Flag indicating the name and description strings are present.
    pub const HAS_NAME: u8 = 0x02;
}

/// Network share entry (0xC3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NetworkShareEntry {
    /// Flags byte at 0x4.
    pub flags: u8,
    /// UNC path.
    pub path: String,
    /// Description following the path.
    pub description: String,
}

/// URI entry (0x61).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UriEntry {
    /// Flags DWORD at 0x3.
    pub flags: u32,
    /// URI text.
    pub uri: String,
}

/// Control panel entry (0x71).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ControlPanelEntry {
    /// Flags byte at 0x3.
    pub flags: u8,
    /// Control panel GUID at 0xD.
    pub guid: String,
    /// Resolved name.
    pub name: String,
}

/// Extended unknown entry (0x74).
///
/// Carries a file entry at 0x4 plus a second short name at 0x18 and a long
/// name 0x4C bytes past it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtendedEntry {
    /// The embedded file entry.
    pub entry: FileEntry,
    /// Short name at 0x18.
    pub short_name: String,
    /// Long (UTF-16) name.
    pub long_name: String,
}

/// Decoded payload of a shell item, one variant per layout.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ShellItemKind {
    /// Tags 0x00, 0x01 and unrecognised tags: base fields only.
    Unknown,
    /// Tag 0x2E.
    UnknownGuid(UnknownGuidEntry),
    /// Tag 0x1F.
    Folder(FolderEntry),
    /// Tag 0x2F.
    Volume(VolumeEntry),
    /// Tags 0x41, 0x42, 0x46, 0x47.
    NetworkVolume(NetworkVolumeEntry),
    /// Tag 0xC3.
    NetworkShare(NetworkShareEntry),
    /// Tag 0x61.
    Uri(UriEntry),
    /// Tag 0x71.
    ControlPanel(ControlPanelEntry),
    /// Tags 0x31, 0x32, 0xB1 with a complete extension block.
    File(FileEntry),
    /// A file entry truncated inside its extension block.
    FileFragment(FileEntry),
    /// Tag 0x74.
    Extended(ExtendedEntry),
    /// Record from a Bags `ItemPos*` value.
    ItemPos(ItemPosEntry),
}

impl ShellItemKind {
    /// Returns the file entry carried by this record, if any.
    pub fn file_entry(&self) -> Option<&FileEntry> {
        match self {
            ShellItemKind::File(entry) | ShellItemKind::FileFragment(entry) => Some(entry),
            ShellItemKind::Extended(ext) => Some(&ext.entry),
            ShellItemKind::ItemPos(ItemPosEntry::File(entry)) => Some(entry),
            _ => None,
        }
    }
}

/// A decoded shell item.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShellItem<'a> {
    offset: usize,
    size: u16,
    type_tag: u8,
    item_type: ShellItemType,
    kind: ShellItemKind,
    #[cfg_attr(feature = "serde", serde(skip))]
    fields: Fields<'a>,
}

impl<'a> ShellItem<'a> {
    /// Decodes the shell item starting at `block`.
    ///
    /// File entries that overrun the buffer are decoded as fragments. Any
    /// other overrun is returned as an error for this record only.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or a non-recoverable body field lies
    /// outside the buffer.
    #[instrument(
        level = "debug",
        skip(block, names),
        fields(offset = %format!("{:#x}", block.offset()))
    )]
    pub fn decode(block: Block<'a>, names: &dyn GuidNames) -> Result<Self> {
        let mut fields = Fields::new(block);
        let size = fields.word("size", 0x0)?;
        let type_tag = fields.byte("type", 0x2)?;
        let item_type = ShellItemType::from_tag(type_tag);

        debug!(
            size = %format!("{:#x}", size),
            item_type = %item_type.name(),
            "Dispatching shell item"
        );

        let kind = match item_type {
            ShellItemType::Unknown0 | ShellItemType::Unknown1 | ShellItemType::Other(_) => {
                ShellItemKind::Unknown
            }
            ShellItemType::UnknownGuid => {
                ShellItemKind::UnknownGuid(decode_unknown_guid(&mut fields, size, names)?)
            }
            ShellItemType::FolderEntry => ShellItemKind::Folder(decode_folder(&mut fields, names)?),
            ShellItemType::Volume => ShellItemKind::Volume(VolumeEntry {
                name: fields.string("name", 0x3, None)?,
            }),
            ShellItemType::NetworkVolume => {
                ShellItemKind::NetworkVolume(decode_network_volume(&mut fields)?)
            }
            ShellItemType::NetworkShare => {
                ShellItemKind::NetworkShare(decode_network_share(&mut fields)?)
            }
            ShellItemType::Uri => ShellItemKind::Uri(UriEntry {
                flags: fields.dword("flags", 0x3)?,
                uri: fields.wstring("uri", 0x7, None)?,
            }),
            ShellItemType::ControlPanel => {
                ShellItemKind::ControlPanel(decode_control_panel(&mut fields, names)?)
            }
            ShellItemType::ExtendedUnknown => ShellItemKind::Extended(decode_extended(&mut fields)?),
            ShellItemType::FileEntry => {
                let mut attempt = fields.clone();
                match decode_file_entry(&mut attempt) {
                    Ok(entry) => {
                        fields = attempt;
                        ShellItemKind::File(entry)
                    }
                    Err(e) if e.is_overrun() => {
                        warn!(
                            offset = %format!("{:#x}", block.offset()),
                            error = %e,
                            "File entry overruns buffer, decoding as fragment"
                        );
                        fields.byte("flags", 0x3)?;
                        ShellItemKind::FileFragment(FileEntry::parse_fragment(&mut fields, 0x4)?)
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        Ok(ShellItem {
            offset: block.offset(),
            size,
            type_tag,
            item_type,
            kind,
            fields,
        })
    }

    /// Decodes a position-tracking record (Bags `ItemPos*` values).
    ///
    /// These share the file entry layout but keep a flags WORD at 0x2 in
    /// place of the type tag, and never fall back to a fragment.
    pub fn decode_item_pos(block: Block<'a>) -> Result<Self> {
        let mut fields = Fields::new(block);
        let size = fields.word("size", 0x0)?;
        let entry = ItemPosEntry::parse(&mut fields)?;
        let type_tag = block.read_u8(0x2)?;

        Ok(ShellItem {
            offset: block.offset(),
            size,
            type_tag,
            item_type: ShellItemType::from_tag(type_tag),
            kind: ShellItemKind::ItemPos(entry),
            fields,
        })
    }

    /// Returns the absolute offset of this record.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the declared record size.
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Returns the raw type tag.
    pub fn type_tag(&self) -> u8 {
        self.type_tag
    }

    /// Returns the kind selected by the type tag.
    pub fn item_type(&self) -> ShellItemType {
        self.item_type
    }

    /// Returns the decoded payload.
    pub fn kind(&self) -> &ShellItemKind {
        &self.kind
    }

    /// Returns true if this record is a truncated file entry.
    pub fn is_fragment(&self) -> bool {
        matches!(self.kind, ShellItemKind::FileFragment(_))
    }

    /// Converts an offset relative to this record into a buffer offset.
    pub fn absolute_offset(&self, rel_offset: usize) -> usize {
        self.fields.block().absolute_offset(rel_offset)
    }

    /// Returns the absolute offset of the list this record was read from.
    pub fn parent(&self) -> Option<usize> {
        self.fields.block().parent()
    }

    /// Returns the name this record displays as.
    pub fn display_name(&self) -> &str {
        match &self.kind {
            ShellItemKind::Unknown => UNKNOWN_NAME,
            ShellItemKind::UnknownGuid(e) => &e.name,
            ShellItemKind::Folder(e) => &e.name,
            ShellItemKind::Volume(e) => &e.name,
            ShellItemKind::NetworkVolume(e) => e.name.as_deref().unwrap_or(""),
            ShellItemKind::NetworkShare(e) => &e.path,
            ShellItemKind::Uri(e) => &e.uri,
            ShellItemKind::ControlPanel(e) => &e.name,
            ShellItemKind::File(e) => e.name(),
            ShellItemKind::FileFragment(e) => &e.short_name,
            ShellItemKind::Extended(e) => &e.long_name,
            ShellItemKind::ItemPos(e) => e.name(),
        }
    }

    /// Returns the modification time, or unknown for kinds without one.
    pub fn modified_time(&self) -> Timestamp {
        self.kind.file_entry().map_or(Timestamp::Unknown, |e| e.modified)
    }

    /// Returns the last access time, or unknown for kinds without one.
    pub fn accessed_time(&self) -> Timestamp {
        self.kind.file_entry().map_or(Timestamp::Unknown, FileEntry::accessed)
    }

    /// Returns the creation time, or unknown for kinds without one.
    pub fn created_time(&self) -> Timestamp {
        self.kind.file_entry().map_or(Timestamp::Unknown, FileEntry::created)
    }

    /// Returns the GUID carried by folder, control panel and 0x2E entries.
    pub fn guid(&self) -> Option<&str> {
        match &self.kind {
            ShellItemKind::Folder(e) => Some(&e.guid),
            ShellItemKind::ControlPanel(e) => Some(&e.guid),
            ShellItemKind::UnknownGuid(e) => e.guid.as_deref(),
            _ => None,
        }
    }

    /// Returns the record flags, widened to 32 bits.
    pub fn flags(&self) -> Option<u32> {
        match &self.kind {
            ShellItemKind::UnknownGuid(e) => e.flags.map(u32::from),
            ShellItemKind::NetworkVolume(e) => Some(e.flags.into()),
            ShellItemKind::NetworkShare(e) => Some(e.flags.into()),
            ShellItemKind::Uri(e) => Some(e.flags),
            ShellItemKind::ControlPanel(e) => Some(e.flags.into()),
            _ => match self.field("flags") {
                Some(Ok(FieldValue::Byte(v))) => Some(v.into()),
                Some(Ok(FieldValue::Word(v))) => Some(v.into()),
                _ => None,
            },
        }
    }

    /// Re-reads the field `name` from the buffer.
    ///
    /// Returns `None` if this record never declared the field.
    pub fn field(&self, name: &str) -> Option<Result<FieldValue>> {
        self.fields.read(name)
    }

    /// Returns the field declarations in layout order.
    pub fn fields(&self) -> &[Field] {
        self.fields.declared()
    }

    /// Serializes the decoded record to a JSON string.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for ShellItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {:#x}: {}.",
            self.item_type.name(),
            self.offset,
            self.display_name()
        )
    }
}

fn decode_unknown_guid(
    fields: &mut Fields<'_>,
    size: u16,
    names: &dyn GuidNames,
) -> Result<UnknownGuidEntry> {
    if size != UNKNOWN_GUID_SIZE {
        return Ok(UnknownGuidEntry {
            flags: None,
            guid: None,
            name: UNKNOWN_NAME.to_string(),
        });
    }

    let flags = Some(fields.byte("flags", 0x3)?);
    let guid = fields.guid("guid", 0xE)?;
    let name = match names.lookup(&guid) {
        Some(name) => name.to_string(),
        None => format!("{{{}}}", guid),
    };

    Ok(UnknownGuidEntry {
        flags,
        guid: Some(guid),
        name,
    })
}

fn decode_folder(fields: &mut Fields<'_>, names: &dyn GuidNames) -> Result<FolderEntry> {
    let folder_id = fields.byte("id", 0x3)?;
    let guid = fields.guid("guid", 0x4)?;
    let known_folder = KnownFolder::from_id(folder_id);

    let name = match names.lookup(&guid) {
        Some(name) => name.to_string(),
        None => format!("{{{}: {}}}", known_folder.name(), guid),
    };

    Ok(FolderEntry {
        folder_id,
        known_folder,
        guid,
        name,
    })
}

fn decode_network_volume(fields: &mut Fields<'_>) -> Result<NetworkVolumeEntry> {
    let flags = fields.byte("flags", 0x4)?;

    let (name, description) = if flags & NetworkVolumeEntry::HAS_NAME != 0 {
        let (name, span) = fields.cstring("name", 0x5)?;
        let description = fields.string("description", 0x5 + span, None)?;
        (Some(name), Some(description))
    } else {
        (None, None)
    };

    Ok(NetworkVolumeEntry {
        flags,
        name,
        description,
    })
}

fn decode_network_share(fields: &mut Fields<'_>) -> Result<NetworkShareEntry> {
    let flags = fields.byte("flags", 0x4)?;
    let (path, span) = fields.cstring("path", 0x5)?;
    let description = fields.string("description", 0x5 + span, None)?;

    Ok(NetworkShareEntry {
        flags,
        path,
        description,
    })
}

fn decode_control_panel(fields: &mut Fields<'_>, names: &dyn GuidNames) -> Result<ControlPanelEntry> {
    let flags = fields.byte("flags", 0x3)?;
    let guid = fields.guid("guid", 0xD)?;

    let name = match names.lookup(&guid) {
        Some(name) => name.to_string(),
        None => format!("{{CONTROL PANEL {}}}", guid),
    };

    Ok(ControlPanelEntry { flags, guid, name })
}

fn decode_file_entry(fields: &mut Fields<'_>) -> Result<FileEntry> {
    fields.byte("flags", 0x3)?;
    FileEntry::parse(fields, 0x4)
}

fn decode_extended(fields: &mut Fields<'_>) -> Result<ExtendedEntry> {
    let entry = FileEntry::parse(fields, 0x4)?;

    let (short_name, span) = fields.cstring("short_name", 0x18)?;
    let long_name_offset = align(0x18 + span, 2) + 0x4C;
    let long_name = fields.wstring("long_name", long_name_offset, None)?;

    Ok(ExtendedEntry {
        entry,
        short_name,
        long_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::NoGuidNames;

    const MY_COMPUTER: &str = "20d04fe0-3aea-1069-a2d8-08002b30309d";
    const MY_COMPUTER_RAW: [u8; 16] = [
        0xE0, 0x4F, 0xD0, 0x20, 0xEA, 0x3A, 0x69, 0x10, 0xA2, 0xD8, 0x08, 0x00, 0x2B, 0x30, 0x30,
        0x9D,
    ];

    fn folder_record(id: u8) -> Vec<u8> {
        let mut data = vec![0x14, 0x00, 0x1F, id];
        data.extend_from_slice(&MY_COMPUTER_RAW);
        data
    }

    #[test]
    fn test_folder_resolved() {
        let data = folder_record(0x50);
        let names = [(MY_COMPUTER, "My Computer")];
        let item = ShellItem::decode(Block::new(&data, 0), &names).unwrap();

        assert_eq!(item.item_type(), ShellItemType::FolderEntry);
        assert_eq!(item.display_name(), "My Computer");
        assert_eq!(item.guid(), Some(MY_COMPUTER));
        assert!(item.modified_time().is_unknown());
    }

    #[test]
    fn test_folder_unresolved() {
        let data = folder_record(0x50);
        let item = ShellItem::decode(Block::new(&data, 0), &NoGuidNames).unwrap();
        assert_eq!(
            item.display_name(),
            format!("{{MY_COMPUTER: {}}}", MY_COMPUTER)
        );
        assert_eq!(
            item.to_string(),
            format!("FOLDER @ 0x0: {{MY_COMPUTER: {}}}.", MY_COMPUTER)
        );
    }

    #[test]
    fn test_unknown_tag() {
        let data = [0x06, 0x00, 0x99, 0x00, 0x00, 0x00];
        let item = ShellItem::decode(Block::new(&data, 0), &NoGuidNames).unwrap();
        assert_eq!(item.item_type(), ShellItemType::Other(0x99));
        assert_eq!(item.display_name(), UNKNOWN_NAME);
        assert_eq!(item.fields().len(), 2);
    }

    #[test]
    fn test_volume() {
        let mut data = vec![0x19, 0x00, 0x2F];
        data.extend_from_slice(b"C:\\\0");
        let item = ShellItem::decode(Block::new(&data, 0), &NoGuidNames).unwrap();
        assert_eq!(item.display_name(), "C:\\");
        assert_eq!(item.field("name").unwrap().unwrap(), FieldValue::String("C:\\".into()));
    }

    #[test]
    fn test_network_volume_without_name() {
        let data = [0x08, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00, 0x00];
        let item = ShellItem::decode(Block::new(&data, 0), &NoGuidNames).unwrap();
        assert_eq!(item.display_name(), "");
        assert_eq!(item.flags(), Some(0));
    }

    #[test]
    fn test_short_unknown_guid_at_buffer_end() {
        let data = [0x03, 0x00, 0x2E];
        let item = ShellItem::decode(Block::new(&data, 0), &NoGuidNames).unwrap();
        assert_eq!(item.display_name(), UNKNOWN_NAME);
        assert_eq!(item.guid(), None);
        assert_eq!(item.flags(), None);

        let items: Vec<_> = crate::list::ShellItemList::new(&data, 0).items().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().display_name(), UNKNOWN_NAME);
    }

    #[test]
    fn test_guid_overrun_is_error() {
        let data = [0x14, 0x00, 0x1F, 0x50, 0xE0, 0x4F];
        let err = ShellItem::decode(Block::new(&data, 0), &NoGuidNames).unwrap_err();
        assert!(err.is_overrun());
    }
}
