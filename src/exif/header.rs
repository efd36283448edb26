//! Exif identifier and TIFF header parsing.
//!
//! An Exif APP1 payload is a classic TIFF file prefixed by a 6-byte identifier.
//! All offsets inside the TIFF structure are relative to the start of the
//! TIFF header, not to the start of the payload.
//!
//! # Layout
//! ```text
//! Bytes 0-5:   "Exif\0\0"
//! Bytes 6-7:   Byte order ("II" = little-endian, "MM" = big-endian)
//! Bytes 8-9:   Magic (42 = 0x002A)
//! Bytes 10-13: Offset to IFD0, relative to byte 6
//! ```

use crate::error::ExifError;

// =============================================================================
// Constants
// =============================================================================

/// Identifier that starts every Exif APP1 payload
pub const EXIF_IDENTIFIER: &[u8; 6] = b"Exif\0\0";

/// Size of the Exif identifier; also the position of the TIFF header in the blob
pub const EXIF_IDENTIFIER_SIZE: usize = 6;

/// Size of the classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Smallest blob that can hold the identifier and the TIFF header
pub const MIN_EXIF_SIZE: usize = EXIF_IDENTIFIER_SIZE + TIFF_HEADER_SIZE;

/// Byte order marker for little-endian ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: [u8; 2] = *b"II";

/// Byte order marker for big-endian ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: [u8; 2] = *b"MM";

/// TIFF magic number
const TIFF_MAGIC: u16 = 42;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of an Exif document.
///
/// Fixed once by the TIFF header and applied to every nested directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
        }
    }

    #[inline]
    pub fn read_i32(self, bytes: [u8; 4]) -> i32 {
        match self {
            ByteOrder::LittleEndian => i32::from_le_bytes(bytes),
            ByteOrder::BigEndian => i32::from_be_bytes(bytes),
        }
    }

    #[inline]
    pub fn write_u16(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    /// The two marker bytes for this byte order.
    pub const fn marker(self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => BYTE_ORDER_LITTLE_ENDIAN,
            ByteOrder::BigEndian => BYTE_ORDER_BIG_ENDIAN,
        }
    }
}

// =============================================================================
// ExifHeader
// =============================================================================

/// Parsed Exif identifier + TIFF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExifHeader {
    /// Byte order for all multi-byte values in the document
    pub byte_order: ByteOrder,

    /// Offset of the TIFF header within the blob
    pub header_base: usize,

    /// Offset of IFD0, relative to `header_base`
    pub first_ifd_offset: u32,
}

impl ExifHeader {
    /// Parse and validate the Exif identifier and TIFF header.
    ///
    /// # Errors
    /// - `TooSmall` if the blob cannot hold both headers
    /// - `InvalidIdentifier` if the blob does not start with `Exif\0\0`
    /// - `InvalidByteOrder` if the marker is neither II nor MM
    /// - `InvalidMagic` if the TIFF magic is not 42
    /// - `InvalidIfdOffset` unless `8 <= offset < blob.len() - 6`
    pub fn parse(blob: &[u8]) -> Result<Self, ExifError> {
        if blob.len() < MIN_EXIF_SIZE {
            return Err(ExifError::TooSmall {
                required: MIN_EXIF_SIZE,
                actual: blob.len(),
            });
        }

        if &blob[..EXIF_IDENTIFIER_SIZE] != EXIF_IDENTIFIER {
            return Err(ExifError::InvalidIdentifier);
        }

        let marker = [blob[6], blob[7]];
        let byte_order = match marker {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(ExifError::InvalidByteOrder(u16::from_be_bytes(marker))),
        };

        let magic = byte_order.read_u16([blob[8], blob[9]]);
        if magic != TIFF_MAGIC {
            return Err(ExifError::InvalidMagic(magic));
        }

        let first_ifd_offset = byte_order.read_u32([blob[10], blob[11], blob[12], blob[13]]);
        let offset = first_ifd_offset as usize;
        if offset < TIFF_HEADER_SIZE || offset >= blob.len() - EXIF_IDENTIFIER_SIZE {
            return Err(ExifError::InvalidIfdOffset {
                offset: first_ifd_offset,
                size: blob.len(),
            });
        }

        Ok(ExifHeader {
            byte_order,
            header_base: EXIF_IDENTIFIER_SIZE,
            first_ifd_offset,
        })
    }

    /// Absolute position of IFD0 within the blob.
    #[inline]
    pub fn first_ifd_position(&self) -> usize {
        self.header_base + self.first_ifd_offset as usize
    }
}

// =============================================================================
// Tests
// =============================================================================
