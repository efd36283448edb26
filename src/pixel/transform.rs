//! Orientation correction: transpose, vertical flip and horizontal mirror.
//!
//! Every EXIF orientation is a combination of at most those three steps,
//! applied in that order. Flip and mirror swap elements in place; transpose
//! writes into a second buffer of the same size, which
//! [`OrientationTransformer`] keeps between calls.

use serde::Serialize;
use tracing::debug;

use crate::error::{try_alloc, JpegError, PixelError};

// =============================================================================
// Orientation
// =============================================================================

/// EXIF orientation code (1-8), named after where row 0 / column 0 sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "u8")]
#[repr(u8)]
pub enum Orientation {
    #[default]
    TopLeft = 1,
    TopRight = 2,
    BottomRight = 3,
    BottomLeft = 4,
    LeftTop = 5,
    RightTop = 6,
    RightBottom = 7,
    LeftBottom = 8,
}

/// The steps needed to display an image upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrientationFlags {
    pub transpose: bool,
    /// Reverse the row order
    pub flip: bool,
    /// Reverse each row
    pub mirror: bool,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::TopLeft,
        Orientation::TopRight,
        Orientation::BottomRight,
        Orientation::BottomLeft,
        Orientation::LeftTop,
        Orientation::RightTop,
        Orientation::RightBottom,
        Orientation::LeftBottom,
    ];

    /// Orientation for a tag value, `None` outside 1..=8.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(usize::from(code).checked_sub(1)?).copied()
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn flags(self) -> OrientationFlags {
        let (transpose, flip, mirror) = match self {
            Orientation::TopLeft => (false, false, false),
            Orientation::TopRight => (false, false, true),
            Orientation::BottomRight => (false, true, true),
            Orientation::BottomLeft => (false, true, false),
            Orientation::LeftTop => (true, false, false),
            Orientation::RightTop => (true, false, true),
            Orientation::RightBottom => (true, true, true),
            Orientation::LeftBottom => (true, true, false),
        };
        OrientationFlags {
            transpose,
            flip,
            mirror,
        }
    }

    /// Whether correcting this orientation swaps width and height.
    pub const fn swaps_dimensions(self) -> bool {
        self.flags().transpose
    }
}

impl From<Orientation> for u8 {
    fn from(o: Orientation) -> u8 {
        o.code()
    }
}

// =============================================================================
// PixelBuffer
// =============================================================================

/// An owned, tightly packed image buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
}

impl PixelBuffer {
    /// Wrap `data`, checking it holds exactly `width * height` pixels.
    pub fn new(
        data: Vec<u8>,
        width: usize,
        height: usize,
        bytes_per_pixel: usize,
    ) -> Result<Self, PixelError> {
        if !(1..=4).contains(&bytes_per_pixel) {
            return Err(PixelError::UnsupportedElementWidth(bytes_per_pixel));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(bytes_per_pixel))
            .ok_or(PixelError::InvalidDimensions { width, height })?;
        if data.len() != expected {
            return Err(PixelError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            bytes_per_pixel,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    pub fn stride(&self) -> usize {
        self.width * self.bytes_per_pixel
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

// =============================================================================
// Operators
// =============================================================================

/// Write the transpose of `src` (`width` x `height`) into `dst`.
///
/// Element `(x, y)` of the source lands at `(y, x)`; `dst` is `height` pixels wide.
pub fn transpose(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<(), PixelError> {
    check_geometry(src.len(), width, height, bytes_per_pixel)?;
    if dst.len() != src.len() {
        return Err(PixelError::SizeMismatch {
            expected: src.len(),
            actual: dst.len(),
        });
    }

    match bytes_per_pixel {
        1 => transpose_n::<1>(src, dst, width, height),
        2 => transpose_n::<2>(src, dst, width, height),
        3 => transpose_n::<3>(src, dst, width, height),
        4 => transpose_n::<4>(src, dst, width, height),
        n => return Err(PixelError::UnsupportedElementWidth(n)),
    }
    Ok(())
}

fn transpose_n<const N: usize>(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    for (y, row) in src.chunks_exact(width * N).enumerate() {
        for (x, px) in row.chunks_exact(N).enumerate() {
            let d = (x * height + y) * N;
            dst[d..d + N].copy_from_slice(px);
        }
    }
}

/// Reverse the order of rows in place.
pub fn flip_vertical(
    buf: &mut [u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<(), PixelError> {
    check_geometry(buf.len(), width, height, bytes_per_pixel)?;
    let row = width * bytes_per_pixel;

    for i in 0..height / 2 {
        let j = height - 1 - i;
        let (top, bottom) = buf.split_at_mut(j * row);
        top[i * row..(i + 1) * row].swap_with_slice(&mut bottom[..row]);
    }
    Ok(())
}

/// Reverse the pixels of every row in place.
pub fn mirror_horizontal(
    buf: &mut [u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<(), PixelError> {
    check_geometry(buf.len(), width, height, bytes_per_pixel)?;

    match bytes_per_pixel {
        1 => mirror_n::<1>(buf, width),
        2 => mirror_n::<2>(buf, width),
        3 => mirror_n::<3>(buf, width),
        4 => mirror_n::<4>(buf, width),
        n => return Err(PixelError::UnsupportedElementWidth(n)),
    }
    Ok(())
}

fn mirror_n<const N: usize>(buf: &mut [u8], width: usize) {
    for row in buf.chunks_exact_mut(width * N) {
        for i in 0..width / 2 {
            let j = width - 1 - i;
            let (left, right) = row.split_at_mut(j * N);
            left[i * N..(i + 1) * N].swap_with_slice(&mut right[..N]);
        }
    }
}

fn check_geometry(
    len: usize,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<(), PixelError> {
    if !(1..=4).contains(&bytes_per_pixel) {
        return Err(PixelError::UnsupportedElementWidth(bytes_per_pixel));
    }
    if width == 0 || height == 0 {
        return Err(PixelError::InvalidDimensions { width, height });
    }
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(bytes_per_pixel))
        .ok_or(PixelError::InvalidDimensions { width, height })?;
    if len != expected {
        return Err(PixelError::SizeMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

// =============================================================================
// OrientationTransformer
// =============================================================================

/// Applies orientation corrections, reusing one scratch buffer for transposes.
///
/// After a transpose the caller's old buffer becomes the scratch buffer, so a
/// session decoding many same-sized images allocates only once.
#[derive(Debug, Default)]
pub struct OrientationTransformer {
    scratch: Vec<u8>,
}

impl OrientationTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correct `buffer` for `orientation`.
    pub fn apply(
        &mut self,
        buffer: PixelBuffer,
        orientation: Orientation,
    ) -> Result<PixelBuffer, JpegError> {
        let flags = orientation.flags();
        let PixelBuffer {
            mut data,
            mut width,
            mut height,
            bytes_per_pixel,
        } = buffer;

        if width == 0 || height == 0 || flags == OrientationFlags::default() {
            return Ok(PixelBuffer {
                data,
                width,
                height,
                bytes_per_pixel,
            });
        }

        debug!(
            code = orientation.code(),
            width, height, bytes_per_pixel, "Applying orientation"
        );

        if flags.transpose {
            if self.scratch.len() != data.len() {
                self.scratch = try_alloc(data.len())?;
            }
            transpose(&data, &mut self.scratch, width, height, bytes_per_pixel)?;
            std::mem::swap(&mut data, &mut self.scratch);
            std::mem::swap(&mut width, &mut height);
        }

        if flags.flip {
            flip_vertical(&mut data, width, height, bytes_per_pixel)?;
        }

        if flags.mirror {
            mirror_horizontal(&mut data, width, height, bytes_per_pixel)?;
        }

        Ok(PixelBuffer {
            data,
            width,
            height,
            bytes_per_pixel,
        })
    }

    /// Size of the retained scratch buffer.
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }
}

/// One-off orientation correction without scratch reuse.
pub fn apply(buffer: PixelBuffer, orientation: Orientation) -> Result<PixelBuffer, JpegError> {
    OrientationTransformer::new().apply(buffer, orientation)
}

// =============================================================================
// Tests
// =============================================================================
