//! Recursive IFD reader.
//!
//! Walks IFD0, the Exif/GPS/Interoperability sub-directories it points to,
//! and IFD1 (the thumbnail directory), producing a [`Document`].
//!
//! Every read goes through [`Cursor`], which checks offsets against the blob
//! before slicing. Sub-directory recursion is capped at [`MAX_DEPTH`] levels,
//! and a [`Walk`] shared by the whole parse reads each directory at most once
//! and caps the total entry count at [`MAX_ENTRIES`]. Pointer cycles and
//! pointer fan-out both fail with a range error.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::ExifError;

use super::document::{
    Document, KEY_EXIF, KEY_GPS, KEY_INTEROPERABILITY, KEY_JPEG_INTERCHANGE, KEY_THUMBNAIL,
};
use super::header::{ByteOrder, ExifHeader};
use super::tags::{
    TagTable, EXIF_TAGS, GPS_TAGS, INTEROP_TAGS, TAG_EXIF_IFD_POINTER, TAG_GPS_IFD_POINTER,
    TAG_INTEROP_IFD_POINTER, TAG_JPEG_INTERCHANGE_FORMAT, TAG_JPEG_INTERCHANGE_FORMAT_LENGTH,
    TIFF_TAGS,
};
use super::values::{decode_value, DirectoryEntry, Value, ENTRY_SIZE};

/// Maximum nesting of sub-IFD pointers below IFD0
pub const MAX_DEPTH: usize = 8;

/// Maximum number of directory entries read from one blob
pub const MAX_ENTRIES: usize = u16::MAX as usize;

/// Size of the entry count that starts a directory
const COUNT_SIZE: usize = 2;

/// Size of the next-IFD offset that ends a directory
const NEXT_OFFSET_SIZE: usize = 4;

// =============================================================================
// Walk
// =============================================================================

/// Bookkeeping shared by every directory read during one parse.
#[derive(Debug, Default)]
pub struct Walk {
    visited: HashSet<usize>,
    entries: usize,
}

impl Walk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directory at `position` holding `count` entries.
    fn enter(&mut self, position: usize, count: usize) -> Result<(), ExifError> {
        if !self.visited.insert(position) {
            return Err(ExifError::RepeatedDirectory { position });
        }
        self.entries = self.entries.saturating_add(count);
        if self.entries > MAX_ENTRIES {
            return Err(ExifError::TooManyEntries(MAX_ENTRIES));
        }
        Ok(())
    }

    /// Number of directories read so far.
    pub fn directories(&self) -> usize {
        self.visited.len()
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Bounds-checked view of one directory inside an Exif blob.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    blob: &'a [u8],
    header_base: usize,
    position: usize,
    byte_order: ByteOrder,
    table: &'static TagTable,
    depth: usize,
}

impl<'a> Cursor<'a> {
    /// Cursor on IFD0, as located by a parsed header.
    pub fn root(blob: &'a [u8], header: &ExifHeader) -> Self {
        Self {
            blob,
            header_base: header.header_base,
            position: header.first_ifd_position(),
            byte_order: header.byte_order,
            table: &TIFF_TAGS,
            depth: 0,
        }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn table(&self) -> &'static TagTable {
        self.table
    }

    /// Cursor on a sub-directory at `offset` (relative to the TIFF header).
    fn child(&self, offset: u32, table: &'static TagTable) -> Result<Self, ExifError> {
        let depth = self.depth + 1;
        if depth > MAX_DEPTH {
            return Err(ExifError::TooDeep(MAX_DEPTH));
        }
        Ok(Self {
            position: self.resolve(offset)?,
            table,
            depth,
            ..*self
        })
    }

    /// Cursor on a directory at the same level (IFD1 after IFD0).
    fn sibling(&self, offset: u32) -> Result<Self, ExifError> {
        Ok(Self {
            position: self.resolve(offset)?,
            ..*self
        })
    }

    /// Absolute blob position of an offset relative to the TIFF header.
    fn resolve(&self, offset: u32) -> Result<usize, ExifError> {
        self.header_base
            .checked_add(offset as usize)
            .filter(|&pos| pos <= self.blob.len())
            .ok_or(ExifError::OutOfBounds {
                offset: offset as usize,
                len: 0,
                size: self.blob.len(),
            })
    }

    /// Borrow `len` bytes at absolute position `offset`.
    fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], ExifError> {
        offset
            .checked_add(len)
            .and_then(|end| self.blob.get(offset..end))
            .ok_or(ExifError::OutOfBounds {
                offset,
                len,
                size: self.blob.len(),
            })
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], ExifError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16, ExifError> {
        Ok(self.byte_order.read_u16(self.array(offset)?))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32, ExifError> {
        Ok(self.byte_order.read_u32(self.array(offset)?))
    }

    /// The entries of this directory, each with its absolute blob position.
    ///
    /// The whole entry block is bounds-checked up front.
    pub fn entries(&self) -> Result<impl Iterator<Item = (usize, DirectoryEntry)> + 'a, ExifError> {
        let count = self.read_u16(self.position)? as usize;
        let start = self.position + COUNT_SIZE;
        let block = self.bytes(start, count * ENTRY_SIZE)?;
        let byte_order = self.byte_order;

        Ok(block
            .chunks_exact(ENTRY_SIZE)
            .enumerate()
            .filter_map(move |(i, chunk)| {
                let raw: &[u8; ENTRY_SIZE] = chunk.try_into().ok()?;
                Some((start + i * ENTRY_SIZE, DirectoryEntry::parse(raw, byte_order)))
            }))
    }

    /// Offset of the next directory, or 0 when there is none.
    ///
    /// A directory truncated right after its entries is treated as the last one.
    fn next_offset(&self) -> Result<u32, ExifError> {
        let count = self.read_u16(self.position)? as usize;
        let pos = self.position + COUNT_SIZE + count * ENTRY_SIZE;
        if pos + NEXT_OFFSET_SIZE > self.blob.len() {
            debug!(position = pos, "Directory has no next-IFD offset");
            return Ok(0);
        }
        self.read_u32(pos)
    }

    /// Exact value bytes of an entry located at absolute position `entry_pos`.
    pub fn value_bytes(
        &self,
        entry_pos: usize,
        entry: &DirectoryEntry,
    ) -> Result<&'a [u8], ExifError> {
        let field_type = entry.field_type.ok_or(ExifError::UnsupportedFieldType {
            tag: entry.tag,
            field_type: entry.field_type_raw,
        })?;
        let len = field_type
            .byte_len(entry.count)
            .ok_or(ExifError::OutOfBounds {
                offset: entry_pos,
                len: usize::MAX,
                size: self.blob.len(),
            })?;

        if entry.is_inline() {
            self.bytes(entry_pos + 8, len)
        } else {
            let offset = self.resolve(entry.value_offset(self.byte_order))?;
            self.bytes(offset, len)
        }
    }

    /// Read this directory and every sub-directory it points to.
    ///
    /// Returns the document and the raw next-IFD offset.
    pub fn read_directory(&self, walk: &mut Walk) -> Result<(Document, u32), ExifError> {
        debug!(
            table = self.table.name(),
            position = self.position,
            depth = self.depth,
            "Reading directory"
        );
        walk.enter(self.position, self.read_u16(self.position)? as usize)?;

        let mut doc = Document::new();

        for (entry_pos, entry) in self.entries()? {
            let sub = match entry.tag {
                TAG_EXIF_IFD_POINTER => Some((KEY_EXIF, &EXIF_TAGS)),
                TAG_GPS_IFD_POINTER => Some((KEY_GPS, &GPS_TAGS)),
                TAG_INTEROP_IFD_POINTER => Some((KEY_INTEROPERABILITY, &INTEROP_TAGS)),
                _ => None,
            };

            if let Some((key, table)) = sub {
                let child = self.child(entry.value_offset(self.byte_order), table)?;
                let (child_doc, _) = child.read_directory(walk)?;
                doc.insert(key, Value::Directory(child_doc));
                continue;
            }

            let field_type = entry.field_type.ok_or(ExifError::UnsupportedFieldType {
                tag: entry.tag,
                field_type: entry.field_type_raw,
            })?;
            let data = self.value_bytes(entry_pos, &entry)?;
            let value = decode_value(field_type, entry.count, data, self.byte_order);
            let key = self.table.lookup(entry.tag).key();

            trace!(tag = entry.tag, key = %key, count = entry.count, "Decoded entry");
            doc.insert(key, value);
        }

        let next = self.next_offset()?;
        Ok((doc, next))
    }
}

// =============================================================================
// Document parsing
// =============================================================================

/// Parse an Exif APP1 payload into a document.
///
/// # Errors
/// - Format errors from [`ExifHeader::parse`]
/// - `InvalidIfdOffset`, `OutOfBounds` or `TooDeep` (range errors) when an
///   offset leaves the blob or pointers nest too deep
/// - `RepeatedDirectory` or `TooManyEntries` (range errors) when pointers
///   revisit a directory or the entries exceed [`MAX_ENTRIES`]
/// - `UnsupportedFieldType` for an entry with an unknown type code
pub fn parse(blob: &[u8]) -> Result<Document, ExifError> {
    let header = ExifHeader::parse(blob)?;
    let root = Cursor::root(blob, &header);
    let mut walk = Walk::new();

    let (mut doc, next) = root.read_directory(&mut walk)?;

    if next != 0 {
        let (ifd1, _) = root.sibling(next)?.read_directory(&mut walk)?;
        if let Some(thumbnail) = link_thumbnail(blob, header.header_base, ifd1)? {
            doc.insert(KEY_THUMBNAIL, Value::Directory(thumbnail));
        }
    }

    Ok(doc)
}

/// Replace IFD1's offset/length tags with the thumbnail bytes they describe.
///
/// Returns `None` when either tag is missing or not a non-negative integer.
fn link_thumbnail(
    blob: &[u8],
    header_base: usize,
    mut ifd1: Document,
) -> Result<Option<Document>, ExifError> {
    let offset_key = TIFF_TAGS.lookup(TAG_JPEG_INTERCHANGE_FORMAT).key();
    let length_key = TIFF_TAGS.lookup(TAG_JPEG_INTERCHANGE_FORMAT_LENGTH).key();

    let offset = ifd1.integer(&offset_key).filter(|v| *v >= 0);
    let length = ifd1.integer(&length_key).filter(|v| *v >= 0);
    let (Some(offset), Some(length)) = (offset, length) else {
        debug!("IFD1 without thumbnail offset/length, skipping thumbnail");
        return Ok(None);
    };

    let (offset, length) = (offset as usize, length as usize);
    let start = header_base.checked_add(offset);
    let data = start
        .and_then(|s| s.checked_add(length).map(|e| (s, e)))
        .and_then(|(s, e)| blob.get(s..e))
        .ok_or(ExifError::OutOfBounds {
            offset,
            len: length,
            size: blob.len(),
        })?;

    ifd1.remove(&offset_key);
    ifd1.remove(&length_key);
    ifd1.insert(KEY_JPEG_INTERCHANGE, Value::Bytes(Bytes::copy_from_slice(data)));

    debug!(offset, length, "Linked thumbnail");
    Ok(Some(ifd1))
}

// =============================================================================
// Tests
// =============================================================================
