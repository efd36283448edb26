//! Directory entries and typed value decoding.
//!
//! The reader resolves where an entry's value lives (inline in the entry or
//! at an offset from the TIFF header) and hands the exact byte range to
//! [`decode_value`]. Decoding itself never touches the blob, so it cannot
//! read out of bounds.

use std::fmt;

use bytes::Bytes;
use serde::ser::{Serialize, SerializeSeq, Serializer};

use super::document::Document;
use super::header::ByteOrder;
use super::tags::FieldType;

// =============================================================================
// DirectoryEntry
// =============================================================================

/// Size of a single directory entry in bytes
pub const ENTRY_SIZE: usize = 12;

/// A raw 12-byte directory entry.
///
/// # Layout
/// ```text
/// Bytes 0-1:  Tag ID
/// Bytes 2-3:  Field type
/// Bytes 4-7:  Count (number of values, not bytes)
/// Bytes 8-11: Value (if it fits in 4 bytes) or offset from the TIFF header
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub tag: u16,

    /// Raw field type code, kept even when unknown so errors can report it
    pub field_type_raw: u16,

    /// Parsed field type (None if unknown)
    pub field_type: Option<FieldType>,

    pub count: u32,

    /// The raw value/offset bytes, in file byte order
    pub value_offset_bytes: [u8; 4],
}

impl DirectoryEntry {
    pub fn parse(bytes: &[u8; ENTRY_SIZE], byte_order: ByteOrder) -> Self {
        let tag = byte_order.read_u16([bytes[0], bytes[1]]);
        let field_type_raw = byte_order.read_u16([bytes[2], bytes[3]]);
        let count = byte_order.read_u32([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let value_offset_bytes = [bytes[8], bytes[9], bytes[10], bytes[11]];

        Self {
            tag,
            field_type_raw,
            field_type: FieldType::from_u16(field_type_raw),
            count,
            value_offset_bytes,
        }
    }

    /// Interpret the value field as an offset from the TIFF header.
    #[inline]
    pub fn value_offset(&self, byte_order: ByteOrder) -> u32 {
        byte_order.read_u32(self.value_offset_bytes)
    }

    /// Whether the value is stored in the entry itself.
    ///
    /// Rationals never are, whatever their count.
    pub fn is_inline(&self) -> bool {
        match self.field_type {
            Some(FieldType::Rational | FieldType::SRational) => false,
            Some(ft) => ft.fits_inline(self.count),
            None => false,
        }
    }
}

// =============================================================================
// Rational
// =============================================================================

/// A numerator/denominator pair, kept exactly as stored (not reduced).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Rational {
    pub numerator: i64,
    pub denominator: i64,
}

impl Rational {
    /// Build a rational, coercing `0/0` to `0/1`.
    pub fn new(numerator: i64, denominator: i64) -> Self {
        let denominator = if numerator == 0 && denominator == 0 {
            1
        } else {
            denominator
        };
        Self {
            numerator,
            denominator,
        }
    }

    /// Floating-point value, `None` when the denominator is zero.
    pub fn to_f64(self) -> Option<f64> {
        (self.denominator != 0).then(|| self.numerator as f64 / self.denominator as f64)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A decoded tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Entry with a count of zero
    Absent,
    Integer(i64),
    Integers(Vec<i64>),
    Text(String),
    /// Opaque bytes (UNDEFINED fields, thumbnail data)
    Bytes(Bytes),
    Rational(Rational),
    Rationals(Vec<Rational>),
    /// Nested directory (sub-IFD or thumbnail)
    Directory(Document),
}

impl Value {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Directory(d) => Some(d),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Absent => serializer.serialize_none(),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Integers(vs) => vs.serialize(serializer),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&hex::encode(b)),
            Value::Rational(r) => r.serialize(serializer),
            Value::Rationals(rs) => {
                let mut seq = serializer.serialize_seq(Some(rs.len()))?;
                for r in rs {
                    seq.serialize_element(r)?;
                }
                seq.end()
            }
            Value::Directory(d) => d.serialize(serializer),
        }
    }
}

// =============================================================================
// Decoders
// =============================================================================

/// Decode `count` values of `field_type` from `data`.
///
/// `data` must be exactly `field_type.byte_len(count)` bytes long; the reader
/// guarantees this after bounds checking.
pub fn decode_value(field_type: FieldType, count: u32, data: &[u8], order: ByteOrder) -> Value {
    if count == 0 {
        return Value::Absent;
    }

    match field_type {
        FieldType::Byte => integers(data.iter().map(|&b| b as i64).collect()),
        FieldType::Ascii => Value::Text(decode_ascii(data)),
        FieldType::Short => integers(
            data.chunks_exact(2)
                .map(|c| order.read_u16([c[0], c[1]]) as i64)
                .collect(),
        ),
        FieldType::Long => integers(
            data.chunks_exact(4)
                .map(|c| order.read_u32([c[0], c[1], c[2], c[3]]) as i64)
                .collect(),
        ),
        FieldType::SLong => integers(
            data.chunks_exact(4)
                .map(|c| order.read_i32([c[0], c[1], c[2], c[3]]) as i64)
                .collect(),
        ),
        FieldType::Rational => rationals(
            data.chunks_exact(8)
                .map(|c| {
                    Rational::new(
                        order.read_u32([c[0], c[1], c[2], c[3]]) as i64,
                        order.read_u32([c[4], c[5], c[6], c[7]]) as i64,
                    )
                })
                .collect(),
        ),
        FieldType::SRational => rationals(
            data.chunks_exact(8)
                .map(|c| {
                    Rational::new(
                        order.read_i32([c[0], c[1], c[2], c[3]]) as i64,
                        order.read_i32([c[4], c[5], c[6], c[7]]) as i64,
                    )
                })
                .collect(),
        ),
        FieldType::Undefined => Value::Bytes(Bytes::copy_from_slice(data)),
    }
}

fn integers(mut values: Vec<i64>) -> Value {
    if values.len() == 1 {
        Value::Integer(values.remove(0))
    } else {
        Value::Integers(values)
    }
}

fn rationals(mut values: Vec<Rational>) -> Value {
    if values.len() == 1 {
        Value::Rational(values.remove(0))
    } else {
        Value::Rationals(values)
    }
}

/// ASCII text with trailing NULs and whitespace removed.
///
/// Invalid UTF-8 is replaced rather than rejected; camera firmware is not
/// careful about what it puts in these fields.
fn decode_ascii(data: &[u8]) -> String {
    let end = data
        .iter()
        .rposition(|&b| b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&data[..end]).into_owned()
}

// =============================================================================
// Tests
// =============================================================================
