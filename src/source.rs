//! Byte buffers that shell item lists are decoded from.
//!
//! Shell item lists usually come from registry value data handed over by a
//! hive reader, in which case a plain slice is all the decoder needs. For
//! blobs stored on disk, [`ItemBuffer`] memory-maps the file read-only.

use crate::error::Result;
use crate::list::ShellItemList;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Backing storage of an [`ItemBuffer`].
enum BufferData {
    /// Memory-mapped file data.
    Mapped(Mmap),
    /// Owned data, shareable across threads.
    Owned(Arc<Vec<u8>>),
}

impl BufferData {
    fn as_slice(&self) -> &[u8] {
        match self {
            BufferData::Mapped(mmap) => mmap,
            BufferData::Owned(data) => data,
        }
    }
}

/// An immutable byte buffer holding one or more shell item lists.
pub struct ItemBuffer {
    data: BufferData,
}

impl ItemBuffer {
    /// Memory-maps the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or mapped.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shell_items::ItemBuffer;
    ///
    /// let buffer = ItemBuffer::open("bagmru.bin").unwrap();
    /// for item in &buffer.shell_items(0) {
    ///     println!("{}", item.unwrap());
    /// }
    /// ```
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening shell item buffer");
        let file = File::open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size == 0 {
            // zero-length files cannot be mapped on every platform
            debug!("Empty file, using owned buffer");
            return Ok(Self::from_vec(Vec::new()));
        }

        // SAFETY: the file is opened read-only and the map is owned by the
        // returned buffer. Every read through it is bounds-checked by Block.
        // Truncation of the file by another process while mapped is outside
        // what this crate can guard against.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(size = mmap.len(), "Memory mapped file");

        Ok(Self::from_mmap(mmap))
    }

    /// Wraps an existing memory map.
    pub fn from_mmap(mmap: Mmap) -> Self {
        Self {
            data: BufferData::Mapped(mmap),
        }
    }

    /// Takes ownership of `data`.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::from_shared(Arc::new(data))
    }

    /// Wraps bytes already shared with other owners.
    pub fn from_shared(data: Arc<Vec<u8>>) -> Self {
        Self {
            data: BufferData::Owned(data),
        }
    }

    /// Returns the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Returns the buffer length in bytes.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the contents into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Returns the shell item list starting at `offset`.
    pub fn shell_items(&self, offset: usize) -> ShellItemList<'_, 'static> {
        ShellItemList::new(self.as_slice(), offset)
    }
}

impl AsRef<[u8]> for ItemBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for ItemBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl std::fmt::Debug for ItemBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.data {
            BufferData::Mapped(_) => "mapped",
            BufferData::Owned(_) => "owned",
        };
        f.debug_struct("ItemBuffer")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_owned_buffer() {
        let buffer = ItemBuffer::from_vec(vec![0x04, 0x00, 0x99, 0x00, 0x00, 0x00]);
        assert_eq!(buffer.len(), 6);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.shell_items(0).items().count(), 1);
        assert_eq!(buffer.shell_items(4).items().count(), 0);
    }

    #[test]
    fn test_open_file() {
        let path = std::env::temp_dir().join(format!("shell_items_source_{}.bin", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(&[0x04, 0x00, 0x01, 0x00, 0x00, 0x00]).unwrap();
        }

        let buffer = ItemBuffer::open(&path).unwrap();
        assert_eq!(buffer.to_vec(), vec![0x04, 0x00, 0x01, 0x00, 0x00, 0x00]);
        let items: Vec<_> = buffer.shell_items(0).items().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().type_tag(), 0x01);

        drop(buffer);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_missing_file() {
        let err = ItemBuffer::open("/nonexistent/shell_items.bin").unwrap_err();
        assert!(matches!(err, crate::error::ShellItemError::Io(_)));
    }
}
