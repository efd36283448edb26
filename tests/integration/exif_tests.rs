//! Exif metadata extraction tests.
//!
//! Blobs are assembled with [`ExifBuilder`] in both byte orders and parsed
//! through the public API.

use exifpix::exif::{orientation, Document, Rational, Value};
use exifpix::{parse_exif, ErrorKind, ExifError, Orientation};
use serde_json::json;

use super::test_utils::{orientation_blob, ByteOrderType, ExifBuilder, Ifd};

/// IFD0 with Exif and GPS sub-directories, shared by the byte order tests.
fn camera_blob(order: ByteOrderType) -> Vec<u8> {
    let exif = Ifd::new()
        .rational(0x829a, &[(1, 250)])
        .short(0x8827, &[400])
        .ascii(0x9003, "2024:05:01 12:30:00")
        .srational(0x9204, &[(-1, 3)])
        .undefined(0x927c, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
        .long(0xa002, &[4032])
        .sub_ifd(0xa005, Ifd::new().ascii(0x0001, "R98"));

    let gps = Ifd::new()
        .byte(0x0000, &[2, 2, 0, 0])
        .ascii(0x0001, "N")
        .rational(0x0002, &[(48, 1), (51, 1), (2406, 100)]);

    ExifBuilder::new(order)
        .ifd0(
            Ifd::new()
                .ascii(0x010f, "Canon")
                .ascii(0x0110, "Canon EOS 5D")
                .short(0x0112, &[6])
                .rational(0x011a, &[(72, 1)])
                .sub_ifd(0x8769, exif)
                .sub_ifd(0x8825, gps)
                .ascii(0x8298, "ACME"),
        )
        .build()
}

fn assert_camera_document(doc: &Document) {
    assert_eq!(doc.get("make"), Some(&Value::Text("Canon".into())));
    assert_eq!(doc.get("model"), Some(&Value::Text("Canon EOS 5D".into())));
    assert_eq!(doc.integer("orientation"), Some(6));
    assert_eq!(doc.get("x_resolution"), Some(&Value::Rational(Rational::new(72, 1))));
    assert_eq!(doc.get("copyright"), Some(&Value::Text("ACME".into())));

    let exif = doc.document("exif").expect("exif sub-directory");
    assert_eq!(exif.get("exposure_time"), Some(&Value::Rational(Rational::new(1, 250))));
    assert_eq!(exif.integer("iso_speed_ratings"), Some(400));
    assert_eq!(
        exif.get("date_time_original").and_then(Value::as_text),
        Some("2024:05:01 12:30:00")
    );
    assert_eq!(exif.get("exposure_bias_value"), Some(&Value::Rational(Rational::new(-1, 3))));
    assert_eq!(
        exif.get("maker_note").and_then(Value::as_bytes).map(|b| b.to_vec()),
        Some(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
    );
    assert_eq!(exif.integer("pixel_x_dimension"), Some(4032));

    let interop = exif.document("interoperability").expect("interop sub-directory");
    assert_eq!(
        interop.get("interoperability_index").and_then(Value::as_text),
        Some("R98")
    );

    let gps = doc.document("gps").expect("gps sub-directory");
    assert_eq!(gps.get("version_id"), Some(&Value::Integers(vec![2, 2, 0, 0])));
    assert_eq!(gps.get("latitude_ref").and_then(Value::as_text), Some("N"));
    assert_eq!(
        gps.get("latitude"),
        Some(&Value::Rationals(vec![
            Rational::new(48, 1),
            Rational::new(51, 1),
            Rational::new(2406, 100),
        ]))
    );
}

// =============================================================================
// Document Structure
// =============================================================================

#[test]
fn test_little_endian_document() {
    let doc = parse_exif(&camera_blob(ByteOrderType::LittleEndian)).unwrap();
    assert_camera_document(&doc);
}

#[test]
fn test_big_endian_document() {
    let doc = parse_exif(&camera_blob(ByteOrderType::BigEndian)).unwrap();
    assert_camera_document(&doc);
}

#[test]
fn test_byte_orders_agree() {
    let le = parse_exif(&camera_blob(ByteOrderType::LittleEndian)).unwrap();
    let be = parse_exif(&camera_blob(ByteOrderType::BigEndian)).unwrap();
    assert_eq!(le, be);
}

#[test]
fn test_entry_order_preserved() {
    let doc = parse_exif(&camera_blob(ByteOrderType::LittleEndian)).unwrap();
    let keys: Vec<_> = doc.keys().collect();
    assert_eq!(
        keys,
        ["make", "model", "orientation", "x_resolution", "exif", "gps", "copyright"]
    );
}

#[test]
fn test_unknown_tag_uses_hex_key() {
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().short(0xc0de, &[7]).long(0x0100, &[640]))
        .build();
    let doc = parse_exif(&blob).unwrap();
    assert_eq!(doc.integer("tag_c0de"), Some(7));
    assert_eq!(doc.integer("image_width"), Some(640));
}

#[test]
fn test_zero_count_entry_is_absent() {
    let blob = ExifBuilder::new(ByteOrderType::BigEndian)
        .ifd0(Ifd::new().undefined(0x9286, &[]).short(0x0112, &[1]))
        .build();
    let doc = parse_exif(&blob).unwrap();
    assert_eq!(doc.get("tag_9286"), Some(&Value::Absent));
    assert_eq!(doc.integer("orientation"), Some(1));
}

#[test]
fn test_zero_over_zero_rational() {
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().rational(0x011a, &[(0, 0)]).rational(0x011b, &[(5, 0)]))
        .build();
    let doc = parse_exif(&blob).unwrap();
    assert_eq!(doc.get("x_resolution"), Some(&Value::Rational(Rational::new(0, 1))));
    // Only 0/0 is coerced
    let y = doc.get("y_resolution").unwrap();
    assert_eq!(
        y,
        &Value::Rational(Rational {
            numerator: 5,
            denominator: 0
        })
    );
}

#[test]
fn test_ascii_trailing_nuls_trimmed() {
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().raw(0x010f, 2, b"Nikon\0\0\0"))
        .build();
    let doc = parse_exif(&blob).unwrap();
    assert_eq!(doc.get("make").and_then(Value::as_text), Some("Nikon"));
}

// =============================================================================
// Thumbnail
// =============================================================================

#[test]
fn test_thumbnail_linked() {
    let thumb = [0xFF, 0xD8, 0xFF, 0xDB, 1, 2, 3, 4, 0xFF, 0xD9];
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().short(0x0112, &[3]))
        .thumbnail(Ifd::new().short(0x0103, &[6]), &thumb)
        .build();

    let doc = parse_exif(&blob).unwrap();
    let thumbnail = doc.document("thumbnail").expect("thumbnail");

    assert_eq!(
        thumbnail.get("jpeg_interchange").and_then(Value::as_bytes).map(|b| b.to_vec()),
        Some(thumb.to_vec())
    );
    assert_eq!(thumbnail.integer("compression"), Some(6));
    assert!(!thumbnail.contains_key("jpeg_interchange_format"));
    assert!(!thumbnail.contains_key("jpeg_interchange_format_length"));
}

#[test]
fn test_thumbnail_out_of_bounds() {
    let mut blob = ExifBuilder::new(ByteOrderType::BigEndian)
        .ifd0(Ifd::new().short(0x0112, &[1]))
        .thumbnail(Ifd::new(), &[0xFF; 16])
        .build();
    // Drop the tail of the thumbnail data
    blob.truncate(blob.len() - 4);

    let err = parse_exif(&blob).unwrap_err();
    assert!(matches!(err, ExifError::OutOfBounds { .. }));
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[test]
fn test_ifd1_without_thumbnail_tags_skipped() {
    // IFD0 -> IFD1 chain where IFD1 only carries a compression tag
    let mut blob = b"Exif\0\0II*\0\x08\0\0\0".to_vec();
    // IFD0 at 8: one entry, next IFD at 26
    blob.extend_from_slice(&[1, 0]);
    blob.extend_from_slice(&[0x12, 0x01, 3, 0, 1, 0, 0, 0, 8, 0, 0, 0]);
    blob.extend_from_slice(&26u32.to_le_bytes());
    // IFD1 at 26
    blob.extend_from_slice(&[1, 0]);
    blob.extend_from_slice(&[0x03, 0x01, 3, 0, 1, 0, 0, 0, 6, 0, 0, 0]);
    blob.extend_from_slice(&[0; 4]);

    let doc = parse_exif(&blob).unwrap();
    assert_eq!(doc.integer("orientation"), Some(8));
    assert!(!doc.contains_key("thumbnail"));
}

// =============================================================================
// Malformed Input
// =============================================================================

/// Header with IFD0 at `offset`, followed by an empty directory.
fn header_with_offset(offset: u32) -> Vec<u8> {
    let mut blob = b"Exif\0\0II*\0".to_vec();
    blob.extend_from_slice(&offset.to_le_bytes());
    blob.extend_from_slice(&[0; 6]);
    blob
}

#[test]
fn test_first_ifd_offset_window() {
    // 20-byte blob: offsets 8..14 are accepted
    assert!(parse_exif(&header_with_offset(8)).unwrap().is_empty());

    for offset in [0, 7, 14, 1000] {
        let err = parse_exif(&header_with_offset(offset)).unwrap_err();
        assert!(
            matches!(err, ExifError::InvalidIfdOffset { .. }),
            "offset {} gave {:?}",
            offset,
            err
        );
        assert_eq!(err.kind(), ErrorKind::Range);
    }
}

#[test]
fn test_header_errors() {
    assert_eq!(
        parse_exif(b"Exif\0\0II*\0").unwrap_err().kind(),
        ErrorKind::Range
    );
    assert_eq!(
        parse_exif(b"JFIF\0\0II*\0\x08\0\0\0\0\0").unwrap_err(),
        ExifError::InvalidIdentifier
    );
    assert_eq!(
        parse_exif(b"Exif\0\0XX*\0\x08\0\0\0\0\0").unwrap_err().kind(),
        ErrorKind::Format
    );
    assert_eq!(
        parse_exif(b"Exif\0\0II+\0\x08\0\0\0\0\0").unwrap_err(),
        ExifError::InvalidMagic(43)
    );
}

#[test]
fn test_entry_past_end_of_blob() {
    let mut blob = b"Exif\0\0MM\0*\0\0\0\x08".to_vec();
    // Claims three entries but holds one
    blob.extend_from_slice(&[0, 3]);
    blob.extend_from_slice(&[0x01, 0x12, 0, 3, 0, 0, 0, 1, 0, 6, 0, 0]);

    let err = parse_exif(&blob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[test]
fn test_value_offset_past_end() {
    let mut blob = b"Exif\0\0II*\0\x08\0\0\0".to_vec();
    blob.extend_from_slice(&[1, 0]);
    // 20-byte ASCII value stored at offset 0x1000
    blob.extend_from_slice(&[0x0f, 0x01, 2, 0, 20, 0, 0, 0, 0, 0x10, 0, 0]);
    blob.extend_from_slice(&[0; 4]);

    let err = parse_exif(&blob).unwrap_err();
    assert!(matches!(err, ExifError::OutOfBounds { .. }));
}

#[test]
fn test_unsupported_field_type() {
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().raw(0x010f, 13, &[0, 0, 0, 0]))
        .build();
    let err = parse_exif(&blob).unwrap_err();
    assert_eq!(
        err,
        ExifError::UnsupportedFieldType {
            tag: 0x010f,
            field_type: 13
        }
    );
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_pointer_cycle_is_rejected() {
    let mut blob = b"Exif\0\0II*\0\x08\0\0\0".to_vec();
    // Exif pointer back to IFD0 itself
    blob.extend_from_slice(&[1, 0]);
    blob.extend_from_slice(&[0x69, 0x87, 4, 0, 1, 0, 0, 0, 8, 0, 0, 0]);
    blob.extend_from_slice(&[0; 4]);

    let err = parse_exif(&blob).unwrap_err();
    assert_eq!(err, ExifError::RepeatedDirectory { position: 14 });
    assert_eq!(err.kind(), ErrorKind::Range);
}

#[test]
fn test_shared_sub_directory_is_rejected() {
    // IFD0 holds 30 Exif pointers, all to the same empty directory at 374
    let mut blob = b"Exif\0\0II*\0\x08\0\0\0".to_vec();
    blob.extend_from_slice(&30u16.to_le_bytes());
    for _ in 0..30 {
        blob.extend_from_slice(&[0x69, 0x87, 4, 0, 1, 0, 0, 0]);
        blob.extend_from_slice(&374u32.to_le_bytes());
    }
    blob.extend_from_slice(&[0; 4]);
    blob.extend_from_slice(&[0; 6]);

    let err = parse_exif(&blob).unwrap_err();
    assert_eq!(err, ExifError::RepeatedDirectory { position: 380 });
    assert_eq!(err.kind(), ErrorKind::Range);

    // The orientation lookup never follows pointers
    assert_eq!(orientation::resolve(&blob), Orientation::TopLeft);
}

// =============================================================================
// JSON Output
// =============================================================================

#[test]
fn test_document_json() {
    let blob = ExifBuilder::new(ByteOrderType::BigEndian)
        .ifd0(
            Ifd::new()
                .ascii(0x010f, "Fuji")
                .short(0x0112, &[1])
                .rational(0x011a, &[(300, 1)])
                .sub_ifd(0x8769, Ifd::new().undefined(0x927c, &[0xde, 0xad, 0xbe, 0xef, 0x01])),
        )
        .build();

    let doc = parse_exif(&blob).unwrap();
    let value = serde_json::to_value(&doc).unwrap();

    assert_eq!(
        value,
        json!({
            "make": "Fuji",
            "orientation": 1,
            "x_resolution": {"numerator": 300, "denominator": 1},
            "exif": {"maker_note": "deadbeef01"},
        })
    );
}

// =============================================================================
// Orientation Resolver
// =============================================================================

#[test]
fn test_resolve_every_code() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        for o in Orientation::ALL {
            let blob = orientation_blob(order, o.code() as u16);
            assert_eq!(orientation::resolve(&blob), o);
        }
    }
}

#[test]
fn test_resolve_tolerates_malformed_tags() {
    // Wrong type
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().long(0x0112, &[6]))
        .build();
    assert_eq!(orientation::resolve(&blob), Orientation::TopLeft);

    // Wrong count
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().short(0x0112, &[6, 6]))
        .build();
    assert_eq!(orientation::resolve(&blob), Orientation::TopLeft);

    // Out of range
    let blob = orientation_blob(ByteOrderType::BigEndian, 9);
    assert_eq!(orientation::resolve(&blob), Orientation::TopLeft);

    assert_eq!(orientation::resolve(b"garbage"), Orientation::TopLeft);
    assert_eq!(orientation::resolve(&[]), Orientation::TopLeft);
}

#[test]
fn test_resolve_ignores_sub_directories() {
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().sub_ifd(0x8769, Ifd::new().short(0x0112, &[6])))
        .build();
    assert_eq!(orientation::resolve(&blob), Orientation::TopLeft);
}

#[test]
fn test_resolve_survives_broken_full_parse() {
    // The orientation entry is readable even though a later entry is not
    let blob = ExifBuilder::new(ByteOrderType::LittleEndian)
        .ifd0(Ifd::new().short(0x0112, &[8]).raw(0x010f, 13, &[0; 4]))
        .build();
    assert!(parse_exif(&blob).is_err());
    assert_eq!(orientation::resolve(&blob), Orientation::LeftBottom);
}

#[test]
fn test_resolve_segments_skips_non_exif() {
    let xmp = b"http://ns.adobe.com/xap/1.0/\0<x:xmpmeta/>".to_vec();
    let exif = orientation_blob(ByteOrderType::BigEndian, 5);
    let payloads = [xmp.as_slice(), exif.as_slice()];
    assert_eq!(
        orientation::resolve_segments(payloads.iter().copied()),
        Orientation::LeftTop
    );
}
