//! # Windows Shell Item Decoder
//!
//! A zero-copy decoder for Windows shell item lists, the binary records
//! Explorer stores in the `BagMRU` and `Bags` registry keys (shellbags) to
//! remember which folders, drives, network shares and URIs were browsed.
//!
//! ## Features
//!
//! - **Bounds-checked**: every read is checked against the buffer; nothing panics on corrupt data
//! - **Lazy**: records are decoded one at a time as the list iterator is pulled
//! - **Tolerant**: truncated file entries decode as fragments, bad timestamps become "unknown"
//! - **Caller-owned GUID table**: folder and control panel names resolve through any [`GuidNames`]
//!
//! ## Binary Layout
//!
//! ```text
//! [Shell Item List]
//!   [Shell Item]
//!     - Size (2 bytes, including itself)
//!     - Type tag (1 byte)
//!     - Type-specific body
//!   [Shell Item]
//!     ...
//!   [Terminator - size 0]
//! ```
//!
//! The type tag selects the body layout:
//!
//! | tag | kind |
//! |---|---|
//! | 0x1F | folder entry (known folder id + GUID) |
//! | 0x2F | volume entry |
//! | 0x31, 0x32, 0xB1 | file entry with version-gated extension block |
//! | 0x41, 0x42, 0x46, 0x47 | network volume entry |
//! | 0x61 | URI entry |
//! | 0x71 | control panel entry |
//! | 0x74 | extended file-entry-shaped entry |
//! | 0xC3 | network share entry |
//! | 0x00, 0x01, 0x2E, other | unknown entries |
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```no_run
//! use shell_items::ShellItemList;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let value_data: Vec<u8> = Vec::new();
//! // value_data is the raw data of a BagMRU value
//! for item in &ShellItemList::new(&value_data, 0) {
//!     let item = item?;
//!     println!("{} (modified {})", item.display_name(), item.modified_time());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Resolving GUIDs
//!
//! ```no_run
//! use std::collections::HashMap;
//! use shell_items::ShellItemList;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let value_data: Vec<u8> = Vec::new();
//! let mut names = HashMap::new();
//! names.insert("20d04fe0-3aea-1069-a2d8-08002b30309d".to_string(), "My Computer".to_string());
//!
//! let list = ShellItemList::new(&value_data, 0).with_guid_names(&names);
//! for item in &list {
//!     println!("{}", item?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod error;
pub mod field;
pub mod file_entry;
pub mod guid;
pub mod item_type;
pub mod list;
pub mod shell_item;
pub mod source;
pub mod utils;

// Python bindings (only compiled when python feature is enabled)
#[cfg(feature = "python")]
pub mod python;

// Re-export main types for convenience
pub use block::Block;
pub use error::{Result, ShellItemError};
pub use field::{Field, FieldKind, FieldValue, Fields};
pub use file_entry::{parse_item_pos, ExtensionBlock, FileEntry, ItemPosEntry};
pub use guid::{GuidNames, NoGuidNames};
pub use item_type::{FileAttributes, KnownFolder, ShellItemType};
pub use list::{ShellItemList, ShellItems};
pub use shell_item::{
    ControlPanelEntry, ExtendedEntry, FolderEntry, NetworkShareEntry, NetworkVolumeEntry,
    ShellItem, ShellItemKind, UnknownGuidEntry, UriEntry, VolumeEntry,
};
pub use source::ItemBuffer;
pub use utils::Timestamp;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
