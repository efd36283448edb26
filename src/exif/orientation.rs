//! Fast-path orientation lookup.
//!
//! Reads only the TIFF header and the entries of IFD0, without decoding any
//! value or following sub-directory pointers. Malformed input never fails:
//! the caller gets the identity orientation instead.

use tracing::{debug, warn};

use crate::pixel::transform::Orientation;

use super::header::ExifHeader;
use super::reader::Cursor;
use super::tags::{FieldType, TAG_ORIENTATION};

/// Orientation stored in an Exif blob, or the identity orientation.
pub fn resolve(blob: &[u8]) -> Orientation {
    find(blob).unwrap_or_default()
}

/// Orientation from the first payload that carries a well-formed tag.
///
/// Payloads that are not Exif, or whose orientation tag is malformed, are
/// skipped.
pub fn resolve_segments<'a, I>(payloads: I) -> Orientation
where
    I: IntoIterator<Item = &'a [u8]>,
{
    payloads
        .into_iter()
        .find_map(find)
        .unwrap_or_default()
}

/// Look up the orientation tag in IFD0.
///
/// Returns `None` when the blob is not a valid Exif payload, the tag is
/// missing, or the tag is not a single SHORT. A well-formed tag with a value
/// outside 1..=8 yields the identity orientation.
pub fn find(blob: &[u8]) -> Option<Orientation> {
    let header = match ExifHeader::parse(blob) {
        Ok(header) => header,
        Err(e) => {
            debug!(error = %e, "Not an Exif payload");
            return None;
        }
    };

    let cursor = Cursor::root(blob, &header);
    let entries = match cursor.entries() {
        Ok(entries) => entries,
        Err(e) => {
            debug!(error = %e, "Unreadable IFD0");
            return None;
        }
    };

    for (entry_pos, entry) in entries {
        if entry.tag != TAG_ORIENTATION {
            continue;
        }

        if entry.field_type != Some(FieldType::Short) || entry.count != 1 {
            warn!(
                field_type = entry.field_type_raw,
                count = entry.count,
                "Ignoring malformed orientation tag"
            );
            continue;
        }

        let code = cursor.read_u16(entry_pos + 8).ok()?;
        return Some(Orientation::from_code(code).unwrap_or_default());
    }

    None
}
