//! Utility functions for binary parsing, timestamps and string conversion.

use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::{UTF_16LE, WINDOWS_1252};
use std::fmt;

/// Size of a GUID in bytes.
pub const GUID_SIZE: usize = 16;

/// Returns `offset` rounded up to the next multiple of `alignment`.
///
/// # Examples
///
/// ```rust
/// # use shell_items::utils::align;
/// assert_eq!(align(0x15, 2), 0x16);
/// assert_eq!(align(0x16, 2), 0x16);
/// ```
#[inline]
pub fn align(offset: usize, alignment: usize) -> usize {
    match offset % alignment {
        0 => offset,
        rem => offset + (alignment - rem),
    }
}

/// A decoded timestamp, or the explicit "unknown" sentinel.
///
/// Shell items carry DOS date/time values that are frequently zeroed or
/// corrupted, and several record kinds carry no timestamps at all. Both
/// cases are represented by [`Timestamp::Unknown`] rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Timestamp {
    /// No timestamp, or the stored bit pattern is not a valid date/time.
    Unknown,

    /// A valid timestamp (local time as stored, no time zone).
    Known(NaiveDateTime),
}

impl Timestamp {
    /// Returns the timestamp if it is known.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Timestamp::Known(dt) => Some(*dt),
            Timestamp::Unknown => None,
        }
    }

    /// Returns true if this is the unknown sentinel.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Timestamp::Unknown)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::Unknown
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Known(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Timestamp::Unknown => f.write_str("unknown"),
        }
    }
}

/// Converts a packed DOS date and time into a [`Timestamp`].
///
/// ```text
/// dosdate: bits 0-4 day, 5-8 month, 9-15 years since 1980
/// dostime: bits 0-4 seconds / 2, 5-10 minute, 11-15 hour
/// ```
///
/// Invalid combinations (day 0, month 13, hour 25, ...) yield
/// [`Timestamp::Unknown`].
pub fn dos_datetime(dosdate: u16, dostime: u16) -> Timestamp {
    let day = u32::from(dosdate & 0x001F);
    let month = u32::from((dosdate & 0x01E0) >> 5);
    let year = i32::from((dosdate & 0xFE00) >> 9) + 1980;

    let second = u32::from(dostime & 0x001F) * 2;
    let minute = u32::from((dostime & 0x07E0) >> 5);
    let hour = u32::from((dostime & 0xF800) >> 11);

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map_or(Timestamp::Unknown, Timestamp::Known)
}

/// Formats 16 raw bytes as a lowercase, hyphenated GUID.
///
/// The first three groups are stored little-endian, the last two in byte
/// order.
pub fn format_guid(raw: &[u8; GUID_SIZE]) -> String {
    let data1 = [raw[3], raw[2], raw[1], raw[0]];
    let data2 = [raw[5], raw[4]];
    let data3 = [raw[7], raw[6]];

    format!(
        "{}-{}-{}-{}-{}",
        hex::encode(data1),
        hex::encode(data2),
        hex::encode(data3),
        hex::encode(&raw[8..10]),
        hex::encode(&raw[10..16])
    )
}

/// Decodes an 8-bit (ANSI code page) string.
///
/// Short names are stored in the system code page; Windows-1252 maps every
/// byte, so decoding never fails.
pub fn decode_ansi(data: &[u8]) -> String {
    let (decoded, _had_errors) = WINDOWS_1252.decode_without_bom_handling(data);
    decoded.into_owned()
}

/// Decodes UTF-16LE data, stopping at the first NUL code unit.
///
/// Unpaired surrogates are replaced rather than rejected.
pub fn decode_utf16(data: &[u8]) -> String {
    let (decoded, _had_errors) = UTF_16LE.decode_without_bom_handling(data);
    match decoded.find('\0') {
        Some(end) => decoded[..end].to_string(),
        None => decoded.into_owned(),
    }
}

/// Returns the index of the first occurrence of `needle` in `haystack`.
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
