//! Row-batch conversion between wire layouts and codec layouts.
//!
//! The codec only deals in tightly packed GRAYSCALE, RGB or YCbCr rows.
//! [`pack_rows`] turns caller rows (any [`PixelFormat`], any stride) into that
//! form before compression; [`unpack_rows`] turns decompressed rows into the
//! caller's layout. Both work on a bounded batch of rows at a time.

use crate::error::PixelError;

use super::format::PixelFormat;

/// Filler for the padding byte of RGBX/BGRX output
const PAD: u8 = 0xFF;

/// Geometry shared by every row of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub format: PixelFormat,
    pub width: usize,
    /// Distance between the starts of two wire rows, in bytes
    pub stride: usize,
}

impl RowLayout {
    /// Validate `stride` against the tightly packed wire row.
    pub fn new(format: PixelFormat, width: usize, stride: usize) -> Result<Self, PixelError> {
        let row_bytes = format
            .row_bytes(width)
            .ok_or(PixelError::InvalidDimensions { width, height: 1 })?;
        if stride < row_bytes {
            return Err(PixelError::StrideTooSmall { stride, row_bytes });
        }
        Ok(Self {
            format,
            width,
            stride,
        })
    }

    /// Layout with no padding between rows.
    pub fn packed(format: PixelFormat, width: usize) -> Result<Self, PixelError> {
        let stride = format
            .row_bytes(width)
            .ok_or(PixelError::InvalidDimensions { width, height: 1 })?;
        Self::new(format, width, stride)
    }

    /// Tightly packed wire row width in bytes.
    pub fn row_bytes(&self) -> usize {
        // Checked in the constructors.
        self.format.row_bytes(self.width).unwrap_or(self.stride)
    }

    /// Bytes per codec row.
    pub fn codec_row_bytes(&self) -> usize {
        self.width * self.format.input_color_space().components()
    }

    /// Bytes per caller-visible decoded row.
    pub fn output_row_bytes(&self) -> usize {
        self.width * self.format.output_components()
    }

    /// Wire bytes spanned by `nrows` rows: the last row needs no padding.
    ///
    /// `None` when the span does not fit in `usize`.
    pub fn wire_span(&self, nrows: usize) -> Option<usize> {
        match nrows {
            0 => Some(0),
            n => self
                .stride
                .checked_mul(n - 1)?
                .checked_add(self.row_bytes()),
        }
    }
}

/// Bytes in `nrows` packed rows of `row` bytes. An overflowing product
/// saturates, so no real buffer passes the length check.
fn rows_len(row: usize, nrows: usize) -> usize {
    row.checked_mul(nrows).unwrap_or(usize::MAX)
}

fn check_len(actual: usize, expected: usize) -> Result<(), PixelError> {
    if actual < expected {
        return Err(PixelError::SizeMismatch { expected, actual });
    }
    Ok(())
}

// =============================================================================
// Encode direction
// =============================================================================

/// Convert `nrows` wire rows from `src` into packed codec rows in `dst`.
///
/// `src` starts at the first row of the batch; rows are `layout.stride`
/// bytes apart. `dst` receives `nrows * layout.codec_row_bytes()` bytes.
pub fn pack_rows(
    layout: &RowLayout,
    src: &[u8],
    nrows: usize,
    dst: &mut [u8],
) -> Result<(), PixelError> {
    let out_row = layout.codec_row_bytes();
    check_len(src.len(), layout.wire_span(nrows).unwrap_or(usize::MAX))?;
    check_len(dst.len(), rows_len(out_row, nrows))?;

    let row_bytes = layout.row_bytes();
    for i in 0..nrows {
        let s = &src[i * layout.stride..i * layout.stride + row_bytes];
        let d = &mut dst[i * out_row..(i + 1) * out_row];

        match layout.format {
            PixelFormat::Yuv422 => pack_yuv422(s, d),
            PixelFormat::Rgb565 => pack_rgb565(s, d),
            PixelFormat::Grayscale
            | PixelFormat::Yuv444
            | PixelFormat::Yvu444
            | PixelFormat::Rgb => d.copy_from_slice(s),
            PixelFormat::Bgr => reorder::<3, 3>(s, d, [2, 1, 0]),
            PixelFormat::Rgbx => reorder::<4, 3>(s, d, [0, 1, 2]),
            PixelFormat::Bgrx => reorder::<4, 3>(s, d, [2, 1, 0]),
        }
    }

    Ok(())
}

/// `[Y0, Cb, Y1, Cr]` → `[Y0, Cb, Cr, Y1, Cb, Cr]`.
///
/// With an odd width the second luma sample of the last macropixel is unused.
fn pack_yuv422(src: &[u8], dst: &mut [u8]) {
    for (x, px) in dst.chunks_exact_mut(3).enumerate() {
        let m = &src[(x / 2) * 4..(x / 2) * 4 + 4];
        let y = if x % 2 == 0 { m[0] } else { m[2] };
        px.copy_from_slice(&[y, m[1], m[3]]);
    }
}

/// Little-endian RGB565 → RGB888, low bits zero-filled.
fn pack_rgb565(src: &[u8], dst: &mut [u8]) {
    for (s, px) in src.chunks_exact(2).zip(dst.chunks_exact_mut(3)) {
        let v = u16::from_le_bytes([s[0], s[1]]);
        px[0] = (((v >> 11) & 0x1f) << 3) as u8;
        px[1] = (((v >> 5) & 0x3f) << 2) as u8;
        px[2] = ((v & 0x1f) << 3) as u8;
    }
}

/// Copy pixels of `S` bytes into pixels of `D` bytes, picking source channels.
fn reorder<const S: usize, const D: usize>(src: &[u8], dst: &mut [u8], pick: [usize; D]) {
    for (s, d) in src.chunks_exact(S).zip(dst.chunks_exact_mut(D)) {
        for (out, &idx) in d.iter_mut().zip(pick.iter()) {
            *out = s[idx];
        }
    }
}

// =============================================================================
// Decode direction
// =============================================================================

/// Convert `nrows` packed codec rows from `src` into caller rows in `dst`.
///
/// Output rows are tightly packed (`layout.output_row_bytes()` each).
/// YVU444 rows are copied unchanged; call [`swap_chroma`] on the finished
/// buffer.
pub fn unpack_rows(
    layout: &RowLayout,
    src: &[u8],
    nrows: usize,
    dst: &mut [u8],
) -> Result<(), PixelError> {
    let format = layout.format.check_decodable()?;
    let in_row = layout.codec_row_bytes();
    let out_row = layout.output_row_bytes();
    check_len(src.len(), rows_len(in_row, nrows))?;
    check_len(dst.len(), rows_len(out_row, nrows))?;

    let src = &src[..in_row * nrows];
    let dst = &mut dst[..out_row * nrows];

    match format {
        PixelFormat::Bgr => reorder::<3, 3>(src, dst, [2, 1, 0]),
        PixelFormat::Rgbx => expand_padded(src, dst, [0, 1, 2]),
        PixelFormat::Bgrx => expand_padded(src, dst, [2, 1, 0]),
        _ => dst.copy_from_slice(src),
    }

    Ok(())
}

fn expand_padded(src: &[u8], dst: &mut [u8], pick: [usize; 3]) {
    for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(4)) {
        d[0] = s[pick[0]];
        d[1] = s[pick[1]];
        d[2] = s[pick[2]];
        d[3] = PAD;
    }
}

/// Swap the second and third channel of every 3-byte pixel (YCbCr ↔ YCrCb).
pub fn swap_chroma(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(3) {
        px.swap(1, 2);
    }
}
