//! Full-range (JFIF) color conversions between the codec color spaces.

use crate::error::CodecError;
use crate::pixel::format::ColorSpace;

#[inline]
fn clamp(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// RGB → YCbCr (ITU-R BT.601, full range).
#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    [
        clamp(0.299 * r + 0.587 * g + 0.114 * b),
        clamp(128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b),
        clamp(128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b),
    ]
}

/// YCbCr → RGB (ITU-R BT.601, full range).
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let (y, cb, cr) = (y as f32, cb as f32 - 128.0, cr as f32 - 128.0);
    [
        clamp(y + 1.402 * cr),
        clamp(y - 0.344_136 * cb - 0.714_136 * cr),
        clamp(y + 1.772 * cb),
    ]
}

/// Luma of an RGB pixel.
#[inline]
pub fn rgb_to_gray(r: u8, g: u8, b: u8) -> u8 {
    rgb_to_ycbcr(r, g, b)[0]
}

/// Convert tightly packed pixels from one codec color space to another.
///
/// Only GRAYSCALE, RGB and YCbCr are accepted on either side. `dst` must hold
/// exactly as many pixels as `src`.
pub fn convert(
    from: ColorSpace,
    to: ColorSpace,
    src: &[u8],
    dst: &mut [u8],
) -> Result<(), CodecError> {
    let (sn, dn) = (from.components(), to.components());
    if src.len() / sn != dst.len() / dn || src.len() % sn != 0 || dst.len() % dn != 0 {
        return Err(CodecError::Protocol {
            message: format!(
                "cannot convert {} bytes of {} into {} bytes of {}",
                src.len(),
                from,
                dst.len(),
                to
            ),
        });
    }

    if from == to {
        dst.copy_from_slice(src);
        return Ok(());
    }

    let pixels = src.chunks_exact(sn).zip(dst.chunks_exact_mut(dn));
    match (from, to) {
        (ColorSpace::Rgb, ColorSpace::YCbCr) => {
            for (s, d) in pixels {
                d.copy_from_slice(&rgb_to_ycbcr(s[0], s[1], s[2]));
            }
        }
        (ColorSpace::YCbCr, ColorSpace::Rgb) => {
            for (s, d) in pixels {
                d.copy_from_slice(&ycbcr_to_rgb(s[0], s[1], s[2]));
            }
        }
        (ColorSpace::Rgb, ColorSpace::Grayscale) => {
            for (s, d) in pixels {
                d[0] = rgb_to_gray(s[0], s[1], s[2]);
            }
        }
        (ColorSpace::YCbCr, ColorSpace::Grayscale) => {
            for (s, d) in pixels {
                d[0] = s[0];
            }
        }
        (ColorSpace::Grayscale, ColorSpace::Rgb) => {
            for (s, d) in pixels {
                d.fill(s[0]);
            }
        }
        (ColorSpace::Grayscale, ColorSpace::YCbCr) => {
            for (s, d) in pixels {
                d.copy_from_slice(&[s[0], 128, 128]);
            }
        }
        _ => {
            return Err(CodecError::Protocol {
                message: format!("no conversion from {} to {}", from, to),
            })
        }
    }

    Ok(())
}
