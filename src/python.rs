//! Python bindings for the shell item decoder using PyO3.
//!
//! Records are converted to owned Python objects before they cross the
//! boundary, so nothing on the Python side borrows the decoded buffer.

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::utils::Timestamp;
use crate::{GuidNames, ItemBuffer, NoGuidNames, ShellItem as RustShellItem, ShellItemError, ShellItemList};

/// Convert a Rust ShellItemError to a Python exception
fn shell_item_error_to_py(err: ShellItemError) -> PyErr {
    match err {
        ShellItemError::Io(e) => PyIOError::new_err(e.to_string()),

        ShellItemError::BufferOverrun {
            offset,
            length,
            buffer_len,
        } => PyValueError::new_err(format!(
            "Buffer overrun: read of {} bytes at offset {:#x} (buffer length: {:#x})",
            length, offset, buffer_len
        )),

        ShellItemError::UnterminatedString { offset, buffer_len } => PyValueError::new_err(format!(
            "Unterminated string at offset {:#x} (buffer length: {:#x})",
            offset, buffer_len
        )),
    }
}

/// Convert a caught panic payload to a Python exception
fn panic_to_py(panic_err: Box<dyn Any + Send>) -> PyErr {
    let panic_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
        format!("Rust panic: {}", s)
    } else if let Some(s) = panic_err.downcast_ref::<String>() {
        format!("Rust panic: {}", s)
    } else {
        "Rust panic: unknown error".to_string()
    };
    PyRuntimeError::new_err(panic_msg)
}

fn iso_timestamp(ts: Timestamp) -> Option<String> {
    ts.as_datetime()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Python wrapper for a decoded ShellItem
///
/// Stores owned copies of the decoded values to avoid lifetime issues with PyO3.
#[pyclass(name = "ShellItem")]
#[derive(Clone)]
pub struct PyShellItem {
    offset: usize,
    size: u16,
    type_tag: u8,
    kind: String,
    name: String,
    guid: Option<String>,
    flags: Option<u32>,
    is_fragment: bool,
    modified: Option<String>,
    accessed: Option<String>,
    created: Option<String>,
}

impl From<&RustShellItem<'_>> for PyShellItem {
    fn from(item: &RustShellItem<'_>) -> Self {
        Self {
            offset: item.offset(),
            size: item.size(),
            type_tag: item.type_tag(),
            kind: item.item_type().name(),
            name: item.display_name().to_string(),
            guid: item.guid().map(str::to_string),
            flags: item.flags(),
            is_fragment: item.is_fragment(),
            modified: iso_timestamp(item.modified_time()),
            accessed: iso_timestamp(item.accessed_time()),
            created: iso_timestamp(item.created_time()),
        }
    }
}

#[pymethods]
impl PyShellItem {
    /// Absolute offset of the record in the buffer
    #[getter]
    fn offset(&self) -> usize {
        self.offset
    }

    /// Declared record size
    #[getter]
    fn size(&self) -> u16 {
        self.size
    }

    /// Raw type tag
    #[getter]
    fn type_tag(&self) -> u8 {
        self.type_tag
    }

    /// Kind name (e.g. "FILE", "FOLDER")
    #[getter]
    fn kind(&self) -> &str {
        &self.kind
    }

    /// Display name
    #[getter]
    fn name(&self) -> &str {
        &self.name
    }

    /// GUID for folder, control panel and 0x2E entries
    #[getter]
    fn guid(&self) -> Option<String> {
        self.guid.clone()
    }

    /// Record flags, if the kind has any
    #[getter]
    fn flags(&self) -> Option<u32> {
        self.flags
    }

    /// True if the record is a truncated file entry
    #[getter]
    fn is_fragment(&self) -> bool {
        self.is_fragment
    }

    /// Modified time as ISO 8601, or None if unknown
    #[getter]
    fn modified(&self) -> Option<String> {
        self.modified.clone()
    }

    /// Accessed time as ISO 8601, or None if unknown
    #[getter]
    fn accessed(&self) -> Option<String> {
        self.accessed.clone()
    }

    /// Created time as ISO 8601, or None if unknown
    #[getter]
    fn created(&self) -> Option<String> {
        self.created.clone()
    }

    fn __repr__(&self) -> String {
        format!(
            "ShellItem(kind={}, offset={:#x}, size={:#x}, name='{}')",
            self.kind, self.offset, self.size, self.name
        )
    }

    fn __str__(&self) -> String {
        format!("{} @ {:#x}: {}.", self.kind, self.offset, self.name)
    }
}

/// Decodes every record of the list at `offset` into owned wrappers
fn collect_items(
    buf: &[u8],
    offset: usize,
    guid_names: Option<&HashMap<String, String>>,
) -> PyResult<Vec<PyShellItem>> {
    let names: &dyn GuidNames = match guid_names {
        Some(names) => names,
        None => &NoGuidNames,
    };

    catch_unwind(AssertUnwindSafe(|| {
        ShellItemList::new(buf, offset)
            .with_guid_names(names)
            .items()
            .map(|item| item.map(|item| PyShellItem::from(&item)))
            .collect::<Result<Vec<_>, ShellItemError>>()
    }))
    .map_err(panic_to_py)?
    .map_err(shell_item_error_to_py)
}

/// Decode the shell item list at `offset` in `data`
#[pyfunction]
#[pyo3(signature = (data, offset = 0, guid_names = None))]
fn parse_shell_items(
    py: Python<'_>,
    data: &[u8],
    offset: usize,
    guid_names: Option<HashMap<String, String>>,
) -> PyResult<Vec<PyShellItem>> {
    // Release GIL during decoding
    py.allow_threads(|| collect_items(data, offset, guid_names.as_ref()))
}

/// Memory-map the file at `path` and decode the shell item list at `offset`
#[pyfunction]
#[pyo3(signature = (path, offset = 0, guid_names = None))]
fn open_shell_items(
    py: Python<'_>,
    path: &str,
    offset: usize,
    guid_names: Option<HashMap<String, String>>,
) -> PyResult<Vec<PyShellItem>> {
    // Release GIL during file I/O and decoding
    py.allow_threads(|| {
        let buffer = ItemBuffer::open(path).map_err(shell_item_error_to_py)?;
        collect_items(buffer.as_slice(), offset, guid_names.as_ref())
    })
}

/// Python module definition
#[pymodule]
fn shell_items(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyShellItem>()?;
    m.add_function(wrap_pyfunction!(parse_shell_items, m)?)?;
    m.add_function(wrap_pyfunction!(open_shell_items, m)?)?;

    // Add version constant
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
