//! JPEG marker segment handling.
//!
//! A JPEG stream is a sequence of marker segments: `FF xx`, a 2-byte
//! big-endian length that counts itself, then the payload. The entropy-coded
//! data starts after SOS, so everything needed for the header (frame size,
//! component count, APP segments) is found before it.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::exif::header::{ByteOrder, EXIF_IDENTIFIER, TIFF_HEADER_SIZE};
use crate::exif::tags::{FieldType, TAG_ORIENTATION};
use crate::pixel::format::ColorSpace;
use crate::pixel::transform::Orientation;

use super::{FrameHeader, JpegHeader, MarkerSegment};

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Start Of Scan marker code
pub const SOS: u8 = 0xDA;

/// Application segment 0 (JFIF) marker code
pub const APP0: u8 = 0xE0;

/// Application segment 1 (Exif) marker code
pub const APP1: u8 = 0xE1;

/// Application segment 14 (Adobe) marker code
pub const APP14: u8 = 0xEE;

/// Largest payload a single segment can carry
pub const MAX_PAYLOAD: usize = u16::MAX as usize - 2;

/// Whether `code` starts a frame (SOF0-SOF15 minus DHT, JPG and DAC).
fn is_sof(code: u8) -> bool {
    matches!(code, 0xC0..=0xCF) && !matches!(code, 0xC4 | 0xC8 | 0xCC)
}

/// Markers without a length field.
fn is_standalone(code: u8) -> bool {
    matches!(code, 0x01 | 0xD0..=0xD7)
}

// =============================================================================
// Header parsing
// =============================================================================

/// Walk the segments before SOS.
///
/// Collects every APP1 segment in stream order and decodes the frame header.
///
/// # Errors
/// `InvalidStream` when the data does not start with SOI, a segment runs past
/// the end of the data, or SOS (or the end) is reached without a frame header.
pub fn read_header(data: &[u8]) -> Result<JpegHeader, CodecError> {
    if data.len() < 4 || data[0..2] != SOI {
        return Err(invalid("missing SOI marker"));
    }

    let mut frame = None;
    let mut markers = Vec::new();
    let mut jfif = false;
    let mut adobe_transform = None;

    let mut pos = 2;
    loop {
        // Fill bytes before a marker are legal.
        while data.get(pos) == Some(&0xFF) && data.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }

        let (prefix, code) = match (data.get(pos), data.get(pos + 1)) {
            (Some(&p), Some(&c)) => (p, c),
            _ => return Err(invalid("unexpected end of data before SOS")),
        };
        if prefix != 0xFF {
            return Err(invalid(format!("expected marker at offset {}", pos)));
        }

        if code == SOS {
            break;
        }
        if is_standalone(code) {
            pos += 2;
            continue;
        }

        let length = match (data.get(pos + 2), data.get(pos + 3)) {
            (Some(&hi), Some(&lo)) => u16::from_be_bytes([hi, lo]) as usize,
            _ => return Err(invalid("truncated segment length")),
        };
        if length < 2 {
            return Err(invalid(format!("segment length {} too small", length)));
        }
        let end = pos + 2 + length;
        let payload = data
            .get(pos + 4..end)
            .ok_or_else(|| invalid(format!("segment 0x{:02X} truncated", code)))?;

        match code {
            c if is_sof(c) => frame = Some(parse_frame(c, payload)?),
            APP0 => jfif |= payload.starts_with(b"JFIF\0"),
            APP1 => markers.push(MarkerSegment::new(APP1, Bytes::copy_from_slice(payload))),
            APP14 if payload.len() >= 12 && payload.starts_with(b"Adobe") => {
                adobe_transform = Some(payload[11]);
            }
            _ => {}
        }

        pos = end;
    }

    let mut frame = frame.ok_or_else(|| invalid("no frame header before SOS"))?;
    frame.color_space = guess_color_space(&frame, jfif, adobe_transform);

    Ok(JpegHeader { frame, markers })
}

fn parse_frame(code: u8, payload: &[u8]) -> Result<FrameHeader, CodecError> {
    if payload.len() < 6 {
        return Err(invalid("frame header too short"));
    }
    let precision = payload[0];
    let height = u16::from_be_bytes([payload[1], payload[2]]) as u32;
    let width = u16::from_be_bytes([payload[3], payload[4]]) as u32;
    let components = payload[5];

    let ids: Vec<u8> = payload[6..]
        .chunks_exact(3)
        .take(components as usize)
        .map(|c| c[0])
        .collect();
    if ids.len() != components as usize {
        return Err(invalid("frame header component list truncated"));
    }
    if width == 0 || height == 0 {
        return Err(invalid(format!("invalid frame size {}x{}", width, height)));
    }

    Ok(FrameHeader {
        width,
        height,
        components,
        precision,
        progressive: matches!(code, 0xC2 | 0xC6 | 0xCA | 0xCE),
        component_ids: ids,
        color_space: ColorSpace::YCbCr,
    })
}

/// Color space of the compressed data, following the JFIF / Adobe conventions.
fn guess_color_space(frame: &FrameHeader, jfif: bool, adobe_transform: Option<u8>) -> ColorSpace {
    match frame.components {
        1 => ColorSpace::Grayscale,
        3 => {
            if jfif {
                return ColorSpace::YCbCr;
            }
            match adobe_transform {
                Some(0) => ColorSpace::Rgb,
                Some(_) => ColorSpace::YCbCr,
                None if frame.component_ids == [b'R', b'G', b'B'] => ColorSpace::Rgb,
                None => ColorSpace::YCbCr,
            }
        }
        4 => match adobe_transform {
            Some(2) => ColorSpace::Ycck,
            _ => ColorSpace::Cmyk,
        },
        _ => ColorSpace::YCbCr,
    }
}

fn invalid(message: impl Into<String>) -> CodecError {
    CodecError::InvalidStream {
        message: message.into(),
    }
}

/// Whether `data` fails header parsing.
pub fn is_broken(data: &[u8]) -> bool {
    read_header(data).is_err()
}

// =============================================================================
// Segment writing
// =============================================================================

/// Insert `segments` right after SOI, or after APP0 when the stream has one.
pub fn insert_segments(jpeg: &[u8], segments: &[MarkerSegment]) -> Result<Bytes, CodecError> {
    if jpeg.len() < 2 || jpeg[0..2] != SOI {
        return Err(invalid("missing SOI marker"));
    }

    let mut at = 2;
    if jpeg.get(2) == Some(&0xFF) && jpeg.get(3) == Some(&APP0) {
        if let (Some(&hi), Some(&lo)) = (jpeg.get(4), jpeg.get(5)) {
            let end = 4 + u16::from_be_bytes([hi, lo]) as usize;
            if end <= jpeg.len() {
                at = end;
            }
        }
    }

    let extra: usize = segments.iter().map(|s| s.payload.len() + 4).sum();
    let mut out = BytesMut::with_capacity(jpeg.len() + extra);
    out.extend_from_slice(&jpeg[..at]);
    for segment in segments {
        write_segment(&mut out, segment)?;
    }
    out.extend_from_slice(&jpeg[at..]);

    Ok(out.freeze())
}

fn write_segment(out: &mut BytesMut, segment: &MarkerSegment) -> Result<(), CodecError> {
    if segment.payload.len() > MAX_PAYLOAD {
        return Err(CodecError::Protocol {
            message: format!(
                "marker payload of {} bytes exceeds {}",
                segment.payload.len(),
                MAX_PAYLOAD
            ),
        });
    }
    out.put_u8(0xFF);
    out.put_u8(segment.marker);
    out.put_u16(segment.payload.len() as u16 + 2);
    out.extend_from_slice(&segment.payload);
    Ok(())
}

/// Minimal big-endian Exif APP1 payload holding only the orientation tag.
pub fn orientation_segment(orientation: Orientation) -> MarkerSegment {
    let order = ByteOrder::BigEndian;
    let mut p = BytesMut::with_capacity(32);

    p.extend_from_slice(EXIF_IDENTIFIER);
    p.extend_from_slice(&order.marker());
    p.extend_from_slice(&order.write_u16(42));
    p.extend_from_slice(&order.write_u32(TIFF_HEADER_SIZE as u32));

    // IFD0 with a single entry
    p.extend_from_slice(&order.write_u16(1));
    p.extend_from_slice(&order.write_u16(TAG_ORIENTATION));
    p.extend_from_slice(&order.write_u16(FieldType::Short as u16));
    p.extend_from_slice(&order.write_u32(1));
    p.extend_from_slice(&order.write_u16(orientation.code() as u16));
    p.extend_from_slice(&[0, 0]);

    // No IFD1
    p.extend_from_slice(&order.write_u32(0));

    MarkerSegment::new(APP1, p.freeze())
}

// =============================================================================
// Tests
// =============================================================================
