//! TIFF field types and EXIF tag catalogs.
//!
//! This module defines the vocabulary for EXIF parsing:
//! - Field types that determine how entry values are encoded
//! - One sorted tag catalog per directory kind (TIFF, Exif, GPS, Interoperability)
//! - The three pointer tags that link a directory to its sub-IFDs

use std::borrow::Cow;
use std::fmt;

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that may appear in an EXIF directory entry.
///
/// Each field type has a fixed element size, which decides whether a value
/// is stored inline in the entry or at an offset from the TIFF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer (1 byte)
    Byte = 1,

    /// 8-bit ASCII character (1 byte)
    Ascii = 2,

    /// Unsigned 16-bit integer (2 bytes)
    Short = 3,

    /// Unsigned 32-bit integer (4 bytes)
    Long = 4,

    /// Two unsigned 32-bit integers, numerator then denominator (8 bytes)
    Rational = 5,

    /// Undefined byte data (1 byte per element)
    Undefined = 7,

    /// Signed 32-bit integer (4 bytes)
    SLong = 9,

    /// Two signed 32-bit integers, numerator then denominator (8 bytes)
    SRational = 10,
}

impl FieldType {
    /// Maximum bytes that can be stored inline in an IFD entry.
    pub const INLINE_THRESHOLD: usize = 4;

    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long | FieldType::SLong => 4,
            FieldType::Rational | FieldType::SRational => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for types EXIF readers are not expected to handle
    /// (SBYTE, SSHORT, FLOAT, DOUBLE, ...).
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            _ => None,
        }
    }

    /// Total byte length of `count` values, or `None` on overflow.
    #[inline]
    pub fn byte_len(self, count: u32) -> Option<usize> {
        (count as usize).checked_mul(self.size_in_bytes())
    }

    /// Check if `count` values of this type fit in the 4-byte value field.
    #[inline]
    pub fn fits_inline(self, count: u32) -> bool {
        matches!(self.byte_len(count), Some(len) if len <= Self::INLINE_THRESHOLD)
    }
}

// =============================================================================
// Pointer Tags
// =============================================================================

/// Exif sub-IFD pointer (in the TIFF directory)
pub const TAG_EXIF_IFD_POINTER: u16 = 0x8769;

/// GPS sub-IFD pointer (in the TIFF directory)
pub const TAG_GPS_IFD_POINTER: u16 = 0x8825;

/// Interoperability sub-IFD pointer (in the Exif directory)
pub const TAG_INTEROP_IFD_POINTER: u16 = 0xa005;

/// Orientation tag (in the TIFF directory)
pub const TAG_ORIENTATION: u16 = 0x0112;

/// Thumbnail offset tag (in IFD1)
pub const TAG_JPEG_INTERCHANGE_FORMAT: u16 = 0x0201;

/// Thumbnail length tag (in IFD1)
pub const TAG_JPEG_INTERCHANGE_FORMAT_LENGTH: u16 = 0x0202;

// =============================================================================
// Tag Tables
// =============================================================================

/// One catalog row: a tag ID and the document key it maps to.
///
/// Pointer tags carry no name; the reader replaces them with a nested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEntry {
    pub id: u16,
    pub name: Option<&'static str>,
}

const fn tag(id: u16, name: &'static str) -> TagEntry {
    TagEntry {
        id,
        name: Some(name),
    }
}

const fn pointer(id: u16) -> TagEntry {
    TagEntry { id, name: None }
}

/// Result of a catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagName {
    /// The catalog assigns this name
    Known(&'static str),
    /// The catalog lists the tag as a sub-IFD pointer
    Pointer(u16),
    /// Not in the catalog
    Unknown(u16),
}

impl TagName {
    /// Document key for this tag.
    ///
    /// Pointer and unknown tags fall back to `tag_XXXX` (4 lower-case hex digits).
    pub fn key(&self) -> Cow<'static, str> {
        match *self {
            TagName::Known(name) => Cow::Borrowed(name),
            TagName::Pointer(id) | TagName::Unknown(id) => Cow::Owned(fallback_key(id)),
        }
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Deterministic key for a tag missing from the catalog.
pub fn fallback_key(id: u16) -> String {
    format!("tag_{:04x}", id)
}

/// Immutable, ascending-sorted tag catalog for one directory kind.
#[derive(Debug, Clone, Copy)]
pub struct TagTable {
    name: &'static str,
    entries: &'static [TagEntry],
}

impl TagTable {
    /// Build a table, asserting that `entries` are sorted by tag ID.
    ///
    /// Equal neighbours are allowed; lookups return the first of them.
    /// Used in `static` initializers, so an unsorted table fails to compile.
    pub const fn new(name: &'static str, entries: &'static [TagEntry]) -> Self {
        let mut i = 1;
        while i < entries.len() {
            assert!(
                entries[i - 1].id <= entries[i].id,
                "tag table entries must be sorted by id"
            );
            i += 1;
        }
        Self { name, entries }
    }

    /// Table name, used in log output.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn entries(&self) -> &'static [TagEntry] {
        self.entries
    }

    /// Binary search for `id`.
    pub fn lookup(&self, id: u16) -> TagName {
        let idx = self.entries.partition_point(|e| e.id < id);
        match self.entries.get(idx) {
            Some(entry) if entry.id == id => match entry.name {
                Some(name) => TagName::Known(name),
                None => TagName::Pointer(id),
            },
            _ => TagName::Unknown(id),
        }
    }

    /// IDs listed more than once, in ascending order.
    pub fn duplicate_ids(&self) -> Vec<u16> {
        let mut dups: Vec<u16> = self
            .entries
            .windows(2)
            .filter(|w| w[0].id == w[1].id)
            .map(|w| w[0].id)
            .collect();
        dups.dedup();
        dups
    }
}

const TIFF_ENTRIES: &[TagEntry] = &[
    tag(0x0100, "image_width"),
    tag(0x0101, "image_length"),
    tag(0x0102, "bits_per_sample"),
    tag(0x0103, "compression"),
    tag(0x0106, "photometric_interpretation"),
    tag(0x010e, "image_description"),
    tag(0x010f, "make"),
    tag(0x0110, "model"),
    tag(0x0111, "strip_offsets"),
    tag(0x0112, "orientation"),
    tag(0x0115, "samples_per_pixel"),
    tag(0x0116, "rows_per_strip"),
    tag(0x0117, "strip_byte_counts"),
    tag(0x011a, "x_resolution"),
    tag(0x011b, "y_resolution"),
    tag(0x011c, "planar_configuration"),
    tag(0x0128, "resolution_unit"),
    tag(0x012d, "transfer_function"),
    tag(0x0131, "software"),
    tag(0x0132, "date_time"),
    tag(0x013b, "artist"),
    tag(0x013e, "white_point"),
    tag(0x013f, "primary_chromaticities"),
    tag(0x0201, "jpeg_interchange_format"),
    tag(0x0202, "jpeg_interchange_format_length"),
    tag(0x0211, "ycbcr_coefficients"),
    tag(0x0212, "ycbcr_sub_sampling"),
    tag(0x0213, "ycbcr_positioning"),
    tag(0x0214, "reference_black_white"),
    tag(0x0d68, "copyright"),
    tag(0x8298, "copyright"),
    pointer(TAG_EXIF_IFD_POINTER),
    pointer(TAG_GPS_IFD_POINTER),
    tag(0xc4a5, "print_im"),
];

/// Tags of IFD0/IFD1 (TIFF baseline).
pub static TIFF_TAGS: TagTable = TagTable::new("tiff", TIFF_ENTRIES);

const EXIF_ENTRIES: &[TagEntry] = &[
    tag(0x829a, "exposure_time"),
    tag(0x829d, "f_number"),
    tag(0x8822, "exposure_program"),
    tag(0x8824, "spectral_sensitivity"),
    tag(0x8827, "iso_speed_ratings"),
    tag(0x8828, "oecf"),
    tag(0x882a, "time_zone_offset"),
    tag(0x882b, "self_timer_mode"),
    tag(0x8830, "sensitivity_type"),
    tag(0x8831, "standard_output_sensitivity"),
    tag(0x8832, "recommended_exposure_index"),
    tag(0x9000, "exif_version"),
    tag(0x9003, "date_time_original"),
    tag(0x9004, "date_time_digitized"),
    tag(0x9010, "offset_time"),
    tag(0x9011, "offset_time_original"),
    tag(0x9012, "offset_time_digitized"),
    tag(0x9101, "components_configuration"),
    tag(0x9102, "compressed_bits_per_pixel"),
    tag(0x9201, "shutter_speed_value"),
    tag(0x9202, "aperture_value"),
    tag(0x9203, "brightness_value"),
    tag(0x9204, "exposure_bias_value"),
    tag(0x9205, "max_aperture_value"),
    tag(0x9206, "subject_distance"),
    tag(0x9207, "metering_mode"),
    tag(0x9208, "light_source"),
    tag(0x9209, "flash"),
    tag(0x920a, "focal_length"),
    tag(0x927c, "maker_note"),
    tag(0x9286, "user_comment"),
    tag(0x9290, "sub_sec_time"),
    tag(0x9291, "sub_sec_time_original"),
    tag(0x9292, "sub_sec_time_digitized"),
    tag(0xa000, "flash_pix_version"),
    tag(0xa001, "color_space"),
    tag(0xa002, "pixel_x_dimension"),
    tag(0xa003, "pixel_y_dimension"),
    tag(0xa004, "related_sound_file"),
    pointer(TAG_INTEROP_IFD_POINTER),
    // listed twice in the source catalog; lookup returns the first
    tag(0xa20b, "flash_energy"),
    tag(0xa20b, "flash_energy"),
    tag(0xa20c, "spatial_frequency_response"),
    tag(0xa20e, "focal_plane_x_resolution"),
    tag(0xa20f, "focal_plane_y_resolution"),
    tag(0xa210, "focal_plane_resolution_unit"),
    tag(0xa214, "subject_location"),
    tag(0xa215, "exposure_index"),
    tag(0xa217, "sensing_method"),
    tag(0xa300, "file_source"),
    tag(0xa301, "scene_type"),
    tag(0xa302, "cfa_pattern"),
    tag(0xa401, "custom_rendered"),
    tag(0xa402, "exposure_mode"),
    tag(0xa403, "white_balance"),
    tag(0xa404, "digital_zoom_ratio"),
    tag(0xa405, "focal_length_in_35mm_film"),
    tag(0xa406, "scene_capture_type"),
    tag(0xa407, "gain_control"),
    tag(0xa408, "contrast"),
    tag(0xa409, "saturation"),
    tag(0xa40a, "sharpness"),
    tag(0xa40b, "device_setting_description"),
    tag(0xa40c, "subject_distance_range"),
    tag(0xa420, "image_unique_id"),
    tag(0xa430, "owner_name"),
    tag(0xa431, "serial_number"),
    tag(0xa432, "lens_info"),
    tag(0xa433, "lens_make"),
    tag(0xa434, "lens_model"),
    tag(0xa435, "lens_serial_number"),
];

/// Tags of the Exif sub-IFD.
pub static EXIF_TAGS: TagTable = TagTable::new("exif", EXIF_ENTRIES);

const GPS_ENTRIES: &[TagEntry] = &[
    tag(0x0000, "version_id"),
    tag(0x0001, "latitude_ref"),
    tag(0x0002, "latitude"),
    tag(0x0003, "longitude_ref"),
    tag(0x0004, "longitude"),
    tag(0x0005, "altitude_ref"),
    tag(0x0006, "altitude"),
    tag(0x0007, "timestamp"),
    tag(0x0008, "satellites"),
    tag(0x0009, "status"),
    tag(0x000a, "measure_mode"),
    tag(0x000b, "dop"),
    tag(0x000c, "speed_ref"),
    tag(0x000d, "speed"),
    tag(0x000e, "track_ref"),
    tag(0x000f, "track"),
    tag(0x0010, "img_direction_ref"),
    tag(0x0011, "img_direction"),
    tag(0x0012, "map_datum"),
    tag(0x0013, "dest_latitude_ref"),
    tag(0x0014, "dest_latitude"),
    tag(0x0015, "dest_longitude_ref"),
    tag(0x0016, "dest_longitude"),
    tag(0x0017, "bearing_ref"),
    tag(0x0018, "bearing"),
    tag(0x0019, "dest_distance_ref"),
    tag(0x001a, "dest_distance"),
    tag(0x001b, "processing_method"),
    tag(0x001c, "area_information"),
    tag(0x001d, "date_stamp"),
    tag(0x001e, "differential"),
];

/// Tags of the GPS sub-IFD.
pub static GPS_TAGS: TagTable = TagTable::new("gps", GPS_ENTRIES);

const INTEROP_ENTRIES: &[TagEntry] = &[
    tag(0x0001, "interoperability_index"),
    tag(0x0002, "interoperability_version"),
    tag(0x1000, "related_image_file_format"),
    tag(0x1001, "related_image_width"),
    tag(0x1002, "related_image_length"),
];

/// Tags of the Interoperability sub-IFD.
pub static INTEROP_TAGS: TagTable = TagTable::new("interoperability", INTEROP_ENTRIES);

// =============================================================================
// Tests
// =============================================================================
