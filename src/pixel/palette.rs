//! Colormap handling for quantized output.

use crate::error::{try_alloc, JpegError, PixelError};

/// Most planes a palette can have
pub const MAX_PLANES: usize = 3;

/// A colormap stored as one plane per channel.
///
/// Entry `i` of the palette is `(planes[0][i], planes[1][i], ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    planes: Vec<Vec<u8>>,
}

impl Palette {
    /// Build a palette from 1 to 3 planes of equal length.
    pub fn new(planes: Vec<Vec<u8>>) -> Result<Self, PixelError> {
        if planes.is_empty() || planes.len() > MAX_PLANES {
            return Err(PixelError::UnsupportedPlaneCount(planes.len()));
        }
        let len = planes[0].len();
        if let Some(bad) = planes.iter().find(|p| p.len() != len) {
            return Err(PixelError::SizeMismatch {
                expected: len,
                actual: bad.len(),
            });
        }
        Ok(Self { planes })
    }

    /// Number of channels per color.
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Number of colors.
    pub fn len(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    /// Channel values of color `index`.
    pub fn color(&self, index: usize) -> Option<Vec<u8>> {
        self.planes.iter().map(|p| p.get(index).copied()).collect()
    }

    /// Replace every index in `indices` by its color.
    ///
    /// Produces `channels()` bytes per pixel. Indices past the end of the
    /// palette expand to zeros.
    pub fn expand(&self, indices: &[u8]) -> Result<Vec<u8>, JpegError> {
        let n = self.channels();
        let len = indices
            .len()
            .checked_mul(n)
            .ok_or(JpegError::Memory { requested: usize::MAX })?;
        let mut out = try_alloc(len)?;

        match n {
            1 => expand_n::<1>(&self.planes, indices, &mut out),
            2 => expand_n::<2>(&self.planes, indices, &mut out),
            3 => expand_n::<3>(&self.planes, indices, &mut out),
            _ => return Err(PixelError::UnsupportedPlaneCount(n).into()),
        }
        Ok(out)
    }

    /// One integer per color: `v`, `(a << 8) | b` or `(r << 16) | (g << 8) | b`.
    pub fn packed(&self) -> Vec<u32> {
        (0..self.len())
            .map(|i| {
                self.planes
                    .iter()
                    .fold(0u32, |acc, p| (acc << 8) | u32::from(p[i]))
            })
            .collect()
    }
}

fn expand_n<const N: usize>(planes: &[Vec<u8>], indices: &[u8], out: &mut [u8]) {
    for (&idx, px) in indices.iter().zip(out.chunks_exact_mut(N)) {
        for (c, plane) in planes.iter().take(N).enumerate() {
            px[c] = plane.get(idx as usize).copied().unwrap_or(0);
        }
    }
}
