//! Shell item list scanning.
//!
//! A shell item list is a run of records, each prefixed by its own size,
//! ended by a record whose size is zero. The scanner holds nothing but the
//! current offset; decoding happens lazily as the iterator is pulled.

use crate::block::Block;
use crate::error::Result;
use crate::guid::{GuidNames, NoGuidNames};
use crate::item_type::ShellItemType;
use crate::shell_item::ShellItem;
use std::iter::FusedIterator;
use tracing::{debug, warn};

/// The only valid size of a control panel record.
const CONTROL_PANEL_SIZE: u16 = 0x20;

static NO_GUID_NAMES: NoGuidNames = NoGuidNames;

/// A shell item list at an offset into a buffer.
///
/// The list is a description of where to scan, not a collection; every call
/// to [`ShellItemList::items`] starts a fresh scan.
#[derive(Clone, Copy)]
pub struct ShellItemList<'a, 'g> {
    buf: &'a [u8],
    offset: usize,
    parent: Option<usize>,
    names: &'g dyn GuidNames,
}

impl<'a> ShellItemList<'a, 'static> {
    /// Creates a list starting at `offset` with an empty GUID name table.
    pub fn new(buf: &'a [u8], offset: usize) -> Self {
        Self {
            buf,
            offset,
            parent: None,
            names: &NO_GUID_NAMES,
        }
    }
}

impl<'a, 'g> ShellItemList<'a, 'g> {
    /// Resolves GUID-bearing records against `names`.
    pub fn with_guid_names<'n>(self, names: &'n dyn GuidNames) -> ShellItemList<'a, 'n> {
        ShellItemList {
            buf: self.buf,
            offset: self.offset,
            parent: self.parent,
            names,
        }
    }

    /// Records the absolute offset of the structure that holds this list.
    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Returns the absolute offset the list starts at.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the block anchored at the start of the list.
    pub fn block(&self) -> Block<'a> {
        Block::with_parent(self.buf, self.offset, self.parent)
    }

    /// Returns an iterator over the records of the list.
    pub fn items(&self) -> ShellItems<'a, 'g> {
        ShellItems {
            list: self.block(),
            cursor: 0,
            names: self.names,
            done: false,
        }
    }
}

impl std::fmt::Debug for ShellItemList<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellItemList")
            .field("buffer_len", &self.buf.len())
            .field("offset", &self.offset)
            .field("parent", &self.parent)
            .finish()
    }
}

impl<'a, 'g> IntoIterator for &ShellItemList<'a, 'g> {
    type Item = Result<ShellItem<'a>>;
    type IntoIter = ShellItems<'a, 'g>;

    fn into_iter(self) -> Self::IntoIter {
        self.items()
    }
}

/// Iterator over the records of a [`ShellItemList`].
///
/// Records that fail to decode are yielded as errors and the scan continues
/// past them using their declared size. The scan ends without an error when
/// a zero size is found, when the size or type cannot be read, or at a
/// control panel record that is not the final 0x20 bytes of the buffer. A
/// record whose declared size runs past the buffer is decoded and is the last
/// one yielded.
#[derive(Clone)]
pub struct ShellItems<'a, 'g> {
    list: Block<'a>,
    cursor: usize,
    names: &'g dyn GuidNames,
    done: bool,
}

impl<'a, 'g> ShellItems<'a, 'g> {
    /// Returns the absolute offset of the next record to be read.
    pub fn position(&self) -> usize {
        self.list.absolute_offset(self.cursor)
    }

    fn stop(&mut self) -> Option<Result<ShellItem<'a>>> {
        self.done = true;
        None
    }
}

impl<'a, 'g> Iterator for ShellItems<'a, 'g> {
    type Item = Result<ShellItem<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let record = self.list.child(self.cursor);
        let offset = format!("{:#x}", record.offset());

        let size = match record.read_u16(0x0) {
            Ok(0) => {
                debug!(offset = %offset, "Zero-size record, end of list");
                return self.stop();
            }
            Ok(size) => size,
            Err(e) => {
                debug!(offset = %offset, error = %e, "No room for record size, end of list");
                return self.stop();
            }
        };

        let type_tag = match record.read_u8(0x2) {
            Ok(tag) => tag,
            Err(e) => {
                debug!(offset = %offset, error = %e, "No room for record type, end of list");
                return self.stop();
            }
        };

        let remaining = record.remaining();
        if type_tag == ShellItemType::CONTROL_PANEL
            && (size != CONTROL_PANEL_SIZE || remaining != usize::from(CONTROL_PANEL_SIZE))
        {
            debug!(
                offset = %offset,
                size = %format!("{:#x}", size),
                remaining = %format!("{:#x}", remaining),
                "Control panel record is not the final 0x20 bytes, end of list"
            );
            return self.stop();
        }

        // A record cut short by the buffer end still decodes, possibly as a
        // fragment, but nothing can follow it.
        if usize::from(size) > remaining {
            warn!(
                offset = %offset,
                size = %format!("{:#x}", size),
                remaining = %format!("{:#x}", remaining),
                "Declared record size overruns buffer, last record"
            );
            self.done = true;
        }

        self.cursor += usize::from(size);
        Some(ShellItem::decode(record, self.names))
    }
}

impl FusedIterator for ShellItems<'_, '_> {}
