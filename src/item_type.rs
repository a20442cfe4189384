//! Shell item type tags and flag definitions.
//!
//! Every shell item carries a one-byte type tag at offset 0x2 that selects
//! its record layout.

/// Shell item kinds, keyed by type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ShellItemType {
    /// 0x00 - unknown, base fields only.
    Unknown0,

    /// 0x01 - unknown, base fields only.
    Unknown1,

    /// 0x2E - unknown, GUID present when the record is 0x20 bytes.
    UnknownGuid,

    /// 0x1F - folder entry (known folder id + GUID).
    FolderEntry,

    /// 0x2F - volume entry (drive name).
    Volume,

    /// 0x41, 0x42, 0x46, 0x47 - network volume entry.
    NetworkVolume,

    /// 0xC3 - network share entry.
    NetworkShare,

    /// 0x61 - URI entry.
    Uri,

    /// 0x71 - control panel entry.
    ControlPanel,

    /// 0x74 - extended, file-entry-shaped unknown entry.
    ExtendedUnknown,

    /// 0x31, 0x32, 0xB1 - file entry.
    FileEntry,

    /// Any other tag; decoded with base fields only.
    Other(u8),
}

impl ShellItemType {
    /// Tag of the first unknown kind.
    pub const UNKNOWN0: u8 = 0x00;
    /// Tag of the second unknown kind.
    pub const UNKNOWN1: u8 = 0x01;
    /// Tag of the unknown kind with optional GUID.
    pub const UNKNOWN_GUID: u8 = 0x2E;
    /// Tag of folder entries.
    pub const FOLDER_ENTRY: u8 = 0x1F;
    /// Tag of volume entries.
    pub const VOLUME: u8 = 0x2F;
    /// Tags of network volume entries.
    pub const NETWORK_VOLUME: [u8; 4] = [0x41, 0x42, 0x46, 0x47];
    /// Tag of network share entries.
    pub const NETWORK_SHARE: u8 = 0xC3;
    /// Tag of URI entries.
    pub const URI: u8 = 0x61;
    /// Tag of control panel entries.
    pub const CONTROL_PANEL: u8 = 0x71;
    /// Tag of the extended unknown kind.
    pub const EXTENDED_UNKNOWN: u8 = 0x74;
    /// Tags of file entries.
    pub const FILE_ENTRY: [u8; 3] = [0x31, 0x32, 0xB1];

    /// Maps a type tag to its kind. Unrecognised tags become [`ShellItemType::Other`].
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0x00 => ShellItemType::Unknown0,
            0x01 => ShellItemType::Unknown1,
            0x2E => ShellItemType::UnknownGuid,
            0x1F => ShellItemType::FolderEntry,
            0x2F => ShellItemType::Volume,
            0x41 | 0x42 | 0x46 | 0x47 => ShellItemType::NetworkVolume,
            0xC3 => ShellItemType::NetworkShare,
            0x61 => ShellItemType::Uri,
            0x71 => ShellItemType::ControlPanel,
            0x74 => ShellItemType::ExtendedUnknown,
            0x31 | 0x32 | 0xB1 => ShellItemType::FileEntry,
            other => ShellItemType::Other(other),
        }
    }

    /// Returns the name of this kind.
    pub fn name(&self) -> String {
        match self {
            ShellItemType::Unknown0 => "UNKNOWN0".to_string(),
            ShellItemType::Unknown1 => "UNKNOWN1".to_string(),
            ShellItemType::UnknownGuid => "UNKNOWN_GUID".to_string(),
            ShellItemType::FolderEntry => "FOLDER".to_string(),
            ShellItemType::Volume => "VOLUME".to_string(),
            ShellItemType::NetworkVolume => "NETWORK_VOLUME".to_string(),
            ShellItemType::NetworkShare => "NETWORK_SHARE".to_string(),
            ShellItemType::Uri => "URI".to_string(),
            ShellItemType::ControlPanel => "CONTROL_PANEL".to_string(),
            ShellItemType::ExtendedUnknown => "EXTENDED_UNKNOWN".to_string(),
            ShellItemType::FileEntry => "FILE".to_string(),
            ShellItemType::Other(tag) => format!("UNKNOWN_{:#04x}", tag),
        }
    }

    /// Returns true if records of this kind may fall back to a fragment.
    pub fn has_fragment_fallback(&self) -> bool {
        matches!(self, ShellItemType::FileEntry)
    }
}

/// File attribute flags stored in file entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileAttributes(pub u16);

impl FileAttributes {
    /// Read-only file.
    pub const READONLY: u16 = 0x0001;

    /// Hidden file.
    pub const HIDDEN: u16 = 0x0002;

    /// System file.
    pub const SYSTEM: u16 = 0x0004;

    /// Volume label (FAT).
    pub const VOLUME_LABEL: u16 = 0x0008;

    /// Directory.
    pub const DIRECTORY: u16 = 0x0010;

    /// Archive bit.
    pub const ARCHIVE: u16 = 0x0020;

    /// Device.
    pub const DEVICE: u16 = 0x0040;

    /// Normal file (no other attributes).
    pub const NORMAL: u16 = 0x0080;

    /// Temporary file.
    pub const TEMPORARY: u16 = 0x0100;

    /// Sparse file.
    pub const SPARSE_FILE: u16 = 0x0200;

    /// Reparse point.
    pub const REPARSE_POINT: u16 = 0x0400;

    /// Compressed file.
    pub const COMPRESSED: u16 = 0x0800;

    /// Offline storage.
    pub const OFFLINE: u16 = 0x1000;

    /// Not content indexed.
    pub const NOT_CONTENT_INDEXED: u16 = 0x2000;

    /// Encrypted file.
    pub const ENCRYPTED: u16 = 0x4000;

    /// Creates attributes from a raw WORD.
    pub fn new(attributes: u16) -> Self {
        Self(attributes)
    }

    /// Returns true if the specified flag is set.
    pub fn has_flag(&self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    /// Returns true if the entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.has_flag(Self::DIRECTORY)
    }

    /// Returns true if the entry is hidden.
    pub fn is_hidden(&self) -> bool {
        self.has_flag(Self::HIDDEN)
    }

    /// Returns true if the entry is a system file.
    pub fn is_system(&self) -> bool {
        self.has_flag(Self::SYSTEM)
    }

    /// Returns true if the entry is read-only.
    pub fn is_readonly(&self) -> bool {
        self.has_flag(Self::READONLY)
    }
}

/// Known folder identifiers stored at offset 0x3 of folder entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum KnownFolder {
    /// 0x00 or 0x68.
    InternetExplorer,
    /// 0x42.
    Libraries,
    /// 0x44.
    Users,
    /// 0x48.
    MyDocuments,
    /// 0x50.
    MyComputer,
    /// 0x58.
    Network,
    /// 0x60.
    RecycleBin,
    /// 0x70.
    Unknown,
    /// 0x80.
    MyGames,
    /// Any other id.
    Other(u8),
}

impl KnownFolder {
    /// Maps a folder id byte to a known folder.
    pub fn from_id(id: u8) -> Self {
        match id {
            0x00 | 0x68 => KnownFolder::InternetExplorer,
            0x42 => KnownFolder::Libraries,
            0x44 => KnownFolder::Users,
            0x48 => KnownFolder::MyDocuments,
            0x50 => KnownFolder::MyComputer,
            0x58 => KnownFolder::Network,
            0x60 => KnownFolder::RecycleBin,
            0x70 => KnownFolder::Unknown,
            0x80 => KnownFolder::MyGames,
            other => KnownFolder::Other(other),
        }
    }

    /// Returns the symbolic name, empty for unrecognised ids.
    pub fn name(&self) -> &'static str {
        match self {
            KnownFolder::InternetExplorer => "INTERNET_EXPLORER",
            KnownFolder::Libraries => "LIBRARIES",
            KnownFolder::Users => "USERS",
            KnownFolder::MyDocuments => "MY_DOCUMENTS",
            KnownFolder::MyComputer => "MY_COMPUTER",
            KnownFolder::Network => "NETWORK",
            KnownFolder::RecycleBin => "RECYCLE_BIN",
            KnownFolder::Unknown => "UNKNOWN",
            KnownFolder::MyGames => "MY_GAMES",
            KnownFolder::Other(_) => "",
        }
    }
}
