//! Color quantization for palette output.
//!
//! Two ways of choosing the palette:
//!
//! - one pass: a uniform grid whose per-channel level counts multiply to at
//!   most the requested number of colors
//! - two pass: median cut over a 5-bit-per-channel histogram of the image
//!
//! Pixels are then mapped to palette indices with no dithering, a 4x4
//! ordered (Bayer) dither, or Floyd-Steinberg error diffusion.

use std::fmt;
use std::ops::Range;

use crate::error::CodecError;
use crate::pixel::palette::Palette;

/// Smallest palette that can be requested
pub const MIN_COLORS: u16 = 8;

/// Largest palette that can be requested
pub const MAX_COLORS: u16 = 256;

/// Histogram precision per channel
const HIST_BITS: u32 = 5;
const HIST_SHIFT: u32 = 8 - HIST_BITS;

const BAYER: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

const NO_ENTRY: u16 = u16::MAX;

// =============================================================================
// Parameters
// =============================================================================

/// How quantization error is spread over neighbouring pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherMode {
    #[default]
    None,
    Ordered,
    FloydSteinberg,
}

impl DitherMode {
    /// Parse `NONE`, `ORDERED` or `FS` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        [DitherMode::None, DitherMode::Ordered, DitherMode::FloydSteinberg]
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    pub const fn name(self) -> &'static str {
        match self {
            DitherMode::None => "NONE",
            DitherMode::Ordered => "ORDERED",
            DitherMode::FloydSteinberg => "FS",
        }
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Palette size and pixel mapping settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizeParams {
    /// Upper bound on the palette size, 8..=256
    pub colors: u16,
    /// Build the palette from the image histogram
    pub two_pass: bool,
    pub dither: DitherMode,
}

// =============================================================================
// Quantizer
// =============================================================================

/// Maps full-color pixels onto a palette.
pub struct Quantizer {
    palette: Palette,
    colors: Vec<[i32; 3]>,
    channels: usize,
    dither: DitherMode,
    /// Distance between neighbouring palette levels, for ordered dithering
    spread: f32,
    /// Nearest palette entry per histogram cell
    cache: Vec<u16>,
}

impl Quantizer {
    /// Choose a palette for `pixels` (`channels` bytes each).
    pub fn new(pixels: &[u8], channels: usize, params: &QuantizeParams) -> Result<Self, CodecError> {
        if channels != 1 && channels != 3 {
            return Err(CodecError::Protocol {
                message: format!("cannot quantize {} channel pixels", channels),
            });
        }
        if !(MIN_COLORS..=MAX_COLORS).contains(&params.colors) {
            return Err(CodecError::Protocol {
                message: format!("palette size {} outside 8..=256", params.colors),
            });
        }

        let planes = if params.two_pass {
            median_cut(pixels, channels, params.colors as usize)
        } else {
            uniform(channels, params.colors as usize)
        };
        let palette = Palette::new(planes).map_err(|e| CodecError::Decode {
            message: e.to_string(),
        })?;

        Ok(Self::with_palette(palette, params.dither))
    }

    /// Quantizer for an existing palette.
    pub fn with_palette(palette: Palette, dither: DitherMode) -> Self {
        let channels = palette.channels();
        let colors: Vec<[i32; 3]> = (0..palette.len())
            .map(|i| {
                let mut c = [0i32; 3];
                for (slot, plane) in c.iter_mut().zip(palette.planes()) {
                    *slot = plane[i] as i32;
                }
                c
            })
            .collect();

        let levels = (colors.len().max(2) as f32).powf(1.0 / channels as f32);
        let spread = 255.0 / (levels - 1.0).max(1.0);

        Self {
            cache: vec![NO_ENTRY; 1 << (HIST_BITS as usize * channels)],
            palette,
            colors,
            channels,
            dither,
            spread,
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Map rows of `width` pixels to palette indices.
    pub fn map(&mut self, pixels: &[u8], width: usize) -> Vec<u8> {
        let n = self.channels;
        let row_len = width * n;
        if row_len == 0 {
            return Vec::new();
        }
        let height = pixels.len() / row_len;
        let mut out = vec![0u8; width * height];

        match self.dither {
            DitherMode::None => {
                for (px, idx) in pixels.chunks_exact(n).zip(out.iter_mut()) {
                    *idx = self.nearest(&widen(px));
                }
            }
            DitherMode::Ordered => {
                for y in 0..height {
                    for x in 0..width {
                        let m = BAYER[y % 4][x % 4] as f32;
                        let offset = ((m + 0.5) / 16.0 - 0.5) * self.spread;
                        let mut c = widen(&pixels[(y * width + x) * n..][..n]);
                        for v in c.iter_mut().take(n) {
                            *v += offset.round() as i32;
                        }
                        out[y * width + x] = self.nearest(&c);
                    }
                }
            }
            DitherMode::FloydSteinberg => self.diffuse(pixels, width, height, &mut out),
        }

        out
    }

    fn diffuse(&mut self, pixels: &[u8], width: usize, height: usize, out: &mut [u8]) {
        let n = self.channels;
        // One pixel of padding on each side
        let mut cur = vec![0i32; (width + 2) * n];
        let mut next = vec![0i32; (width + 2) * n];

        for y in 0..height {
            next.fill(0);
            for x in 0..width {
                let src = &pixels[(y * width + x) * n..][..n];
                let mut c = widen(src);
                for ch in 0..n {
                    c[ch] = (c[ch] + cur[(x + 1) * n + ch] / 16).clamp(0, 255);
                }

                let idx = self.nearest(&c);
                out[y * width + x] = idx;

                let chosen = self.colors.get(idx as usize).copied().unwrap_or_default();
                for ch in 0..n {
                    let err = c[ch] - chosen[ch];
                    cur[(x + 2) * n + ch] += err * 7;
                    next[x * n + ch] += err * 3;
                    next[(x + 1) * n + ch] += err * 5;
                    next[(x + 2) * n + ch] += err;
                }
            }
            std::mem::swap(&mut cur, &mut next);
        }
    }

    fn nearest(&mut self, c: &[i32; 3]) -> u8 {
        let n = self.channels;
        let key = c
            .iter()
            .take(n)
            .fold(0usize, |k, &v| (k << HIST_BITS) | (v.clamp(0, 255) as usize >> HIST_SHIFT));

        if self.cache[key] == NO_ENTRY {
            let center = cell_center(key, n);
            let best = self
                .colors
                .iter()
                .enumerate()
                .min_by_key(|(_, p)| {
                    (0..n)
                        .map(|ch| (p[ch] - center[ch]).pow(2))
                        .sum::<i32>()
                })
                .map_or(0, |(i, _)| i);
            self.cache[key] = best as u16;
        }
        self.cache[key] as u8
    }
}

fn widen(px: &[u8]) -> [i32; 3] {
    let mut c = [0i32; 3];
    for (slot, &v) in c.iter_mut().zip(px) {
        *slot = v as i32;
    }
    c
}

/// Middle of histogram cell `key`, in 8-bit units.
fn cell_center(key: usize, channels: usize) -> [i32; 3] {
    let mask = (1usize << HIST_BITS) - 1;
    let mut c = [0i32; 3];
    for ch in 0..channels {
        let shift = HIST_BITS as usize * (channels - 1 - ch);
        c[ch] = ((((key >> shift) & mask) << HIST_SHIFT) | (1 << (HIST_SHIFT - 1))) as i32;
    }
    c
}

// =============================================================================
// Palette selection
// =============================================================================

/// Levels per channel for a uniform palette of at most `colors` entries.
///
/// Starts from the largest equal split, then adds levels to green, red and
/// blue in turn while the product still fits.
pub fn uniform_levels(channels: usize, colors: usize) -> Vec<usize> {
    let fits = |levels: &[usize]| levels.iter().product::<usize>() <= colors;

    let mut root = 1;
    while fits(&vec![root + 1; channels]) {
        root += 1;
    }
    let mut levels = vec![root.max(2); channels];

    let order: &[usize] = if channels == 3 { &[1, 0, 2] } else { &[0] };
    loop {
        let mut changed = false;
        for &ch in order {
            levels[ch] += 1;
            if !fits(&levels) {
                levels[ch] -= 1;
                break;
            }
            changed = true;
        }
        if !changed {
            break;
        }
    }
    levels
}

fn uniform(channels: usize, colors: usize) -> Vec<Vec<u8>> {
    let levels = uniform_levels(channels, colors);
    let total: usize = levels.iter().product();

    let mut planes = vec![Vec::with_capacity(total); channels];
    for i in 0..total {
        let mut rest = i;
        for ch in (0..channels).rev() {
            let n = levels[ch];
            let level = rest % n;
            rest /= n;
            planes[ch].push(((level * 255 + (n - 1) / 2) / (n - 1)) as u8);
        }
    }
    planes
}

struct Bin {
    cell: [u8; 3],
    count: u32,
}

fn median_cut(pixels: &[u8], channels: usize, colors: usize) -> Vec<Vec<u8>> {
    let mut hist = vec![0u32; 1 << (HIST_BITS as usize * channels)];
    for px in pixels.chunks_exact(channels) {
        let key = px
            .iter()
            .fold(0usize, |k, &v| (k << HIST_BITS) | (v as usize >> HIST_SHIFT));
        hist[key] = hist[key].saturating_add(1);
    }

    let mask = (1usize << HIST_BITS) - 1;
    let mut bins: Vec<Bin> = hist
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(key, &count)| {
            let mut cell = [0u8; 3];
            for (ch, slot) in cell.iter_mut().take(channels).enumerate() {
                *slot = ((key >> (HIST_BITS as usize * (channels - 1 - ch))) & mask) as u8;
            }
            Bin { cell, count }
        })
        .collect();

    if bins.is_empty() {
        return vec![vec![0]; channels];
    }

    let mut boxes: Vec<Range<usize>> = vec![0..bins.len()];
    while boxes.len() < colors {
        // Widest box that can still be split
        let pick = boxes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.len() > 1)
            .map(|(i, r)| {
                let (axis, extent) = widest_axis(&bins[r.clone()], channels);
                (i, axis, extent)
            })
            .max_by_key(|&(_, _, extent)| extent);

        let Some((i, axis, _)) = pick else { break };
        let range = boxes[i].clone();
        let slice = &mut bins[range.clone()];
        slice.sort_unstable_by_key(|b| b.cell[axis]);

        let total: u64 = slice.iter().map(|b| b.count as u64).sum();
        let mut acc = 0u64;
        let mut split = 1;
        for (j, b) in slice.iter().enumerate() {
            acc += b.count as u64;
            if acc * 2 >= total {
                split = (j + 1).clamp(1, slice.len() - 1);
                break;
            }
        }

        boxes[i] = range.start..range.start + split;
        boxes.push(range.start + split..range.end);
    }

    let mut planes = vec![Vec::with_capacity(boxes.len()); channels];
    for r in &boxes {
        let total: u64 = bins[r.clone()].iter().map(|b| b.count as u64).sum();
        for (ch, plane) in planes.iter_mut().enumerate() {
            let sum: u64 = bins[r.clone()]
                .iter()
                .map(|b| {
                    let center = ((b.cell[ch] as u64) << HIST_SHIFT) | (1 << (HIST_SHIFT - 1));
                    center * b.count as u64
                })
                .sum();
            plane.push((sum / total.max(1)).min(255) as u8);
        }
    }
    planes
}

fn widest_axis(bins: &[Bin], channels: usize) -> (usize, u8) {
    (0..channels)
        .map(|ch| {
            let lo = bins.iter().map(|b| b.cell[ch]).min().unwrap_or(0);
            let hi = bins.iter().map(|b| b.cell[ch]).max().unwrap_or(0);
            (ch, hi - lo)
        })
        .max_by_key(|&(_, extent)| extent)
        .unwrap_or((0, 0))
}
