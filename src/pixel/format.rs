//! Pixel layouts and color spaces.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::PixelError;

// =============================================================================
// ColorSpace
// =============================================================================

/// Color space of a JPEG stream or of a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorSpace {
    #[serde(rename = "GRAYSCALE")]
    Grayscale,
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "YCbCr")]
    YCbCr,
    #[serde(rename = "CMYK")]
    Cmyk,
    #[serde(rename = "YCCK")]
    Ycck,
    #[serde(rename = "BGR")]
    Bgr,
    #[serde(rename = "RGBX")]
    Rgbx,
    #[serde(rename = "BGRX")]
    Bgrx,
    /// YCbCr with the chroma channels swapped
    #[serde(rename = "YCrCb")]
    YCrCb,
}

impl ColorSpace {
    pub const fn name(self) -> &'static str {
        match self {
            ColorSpace::Grayscale => "GRAYSCALE",
            ColorSpace::Rgb => "RGB",
            ColorSpace::YCbCr => "YCbCr",
            ColorSpace::Cmyk => "CMYK",
            ColorSpace::Ycck => "YCCK",
            ColorSpace::Bgr => "BGR",
            ColorSpace::Rgbx => "RGBX",
            ColorSpace::Bgrx => "BGRX",
            ColorSpace::YCrCb => "YCrCb",
        }
    }

    pub const fn components(self) -> usize {
        match self {
            ColorSpace::Grayscale => 1,
            ColorSpace::Rgb | ColorSpace::YCbCr | ColorSpace::Bgr | ColorSpace::YCrCb => 3,
            ColorSpace::Cmyk | ColorSpace::Ycck | ColorSpace::Rgbx | ColorSpace::Bgrx => 4,
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// PixelFormat
// =============================================================================

/// Wire layout of raw pixels handed to the encoder or returned by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 4:2:2, `[Y0, Cb, Y1, Cr]` per pair of pixels
    Yuv422,
    /// 16-bit little-endian 5/6/5 RGB
    Rgb565,
    Grayscale,
    /// 4:4:4 `[Y, Cb, Cr]`
    Yuv444,
    /// 4:4:4 `[Y, Cr, Cb]` (decode only)
    Yvu444,
    Rgb,
    Bgr,
    /// `[R, G, B, X]`
    Rgbx,
    /// `[B, G, R, X]`
    Bgrx,
}

/// Accepted names, aliases included.
const NAMES: &[(&str, PixelFormat)] = &[
    ("YUV422", PixelFormat::Yuv422),
    ("YUYV", PixelFormat::Yuv422),
    ("RGB565", PixelFormat::Rgb565),
    ("GRAYSCALE", PixelFormat::Grayscale),
    ("YUV444", PixelFormat::Yuv444),
    ("YCbCr", PixelFormat::Yuv444),
    ("YVU444", PixelFormat::Yvu444),
    ("YCrCb", PixelFormat::Yvu444),
    ("RGB", PixelFormat::Rgb),
    ("RGB24", PixelFormat::Rgb),
    ("BGR", PixelFormat::Bgr),
    ("BGR24", PixelFormat::Bgr),
    ("RGBX", PixelFormat::Rgbx),
    ("RGB32", PixelFormat::Rgbx),
    ("BGRX", PixelFormat::Bgrx),
    ("BGR32", PixelFormat::Bgrx),
];

impl PixelFormat {
    /// Look up a layout by name or alias (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, PixelError> {
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, fmt)| fmt)
            .ok_or_else(|| PixelError::UnknownFormat(name.to_string()))
    }

    /// Canonical name.
    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::Yuv422 => "YUV422",
            PixelFormat::Rgb565 => "RGB565",
            PixelFormat::Grayscale => "GRAYSCALE",
            PixelFormat::Yuv444 => "YUV444",
            PixelFormat::Yvu444 => "YVU444",
            PixelFormat::Rgb => "RGB",
            PixelFormat::Bgr => "BGR",
            PixelFormat::Rgbx => "RGBX",
            PixelFormat::Bgrx => "BGRX",
        }
    }

    /// Bytes per pixel on the wire. 4:2:2 averages two bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Grayscale => 1,
            PixelFormat::Yuv422 | PixelFormat::Rgb565 => 2,
            PixelFormat::Yuv444 | PixelFormat::Yvu444 | PixelFormat::Rgb | PixelFormat::Bgr => 3,
            PixelFormat::Rgbx | PixelFormat::Bgrx => 4,
        }
    }

    /// Tightly packed wire row width in bytes, `None` on overflow.
    ///
    /// A 4:2:2 row always holds whole macropixels, so odd widths round up.
    pub fn row_bytes(self, width: usize) -> Option<usize> {
        match self {
            PixelFormat::Yuv422 => width.checked_add(1).and_then(|w| (w / 2).checked_mul(4)),
            _ => width.checked_mul(self.bytes_per_pixel()),
        }
    }

    /// Fail unless this layout can be fed to the encoder.
    pub fn check_encodable(self) -> Result<Self, PixelError> {
        match self {
            PixelFormat::Yvu444 => Err(PixelError::UnsupportedDirection {
                format: self.name(),
                direction: "encoding",
            }),
            _ => Ok(self),
        }
    }

    /// Fail unless the decoder can produce this layout.
    pub fn check_decodable(self) -> Result<Self, PixelError> {
        match self {
            PixelFormat::Yuv422 | PixelFormat::Rgb565 => Err(PixelError::UnsupportedDirection {
                format: self.name(),
                direction: "decoding",
            }),
            _ => Ok(self),
        }
    }

    /// Color space of the packed rows given to the codec when encoding.
    pub const fn input_color_space(self) -> ColorSpace {
        match self {
            PixelFormat::Grayscale => ColorSpace::Grayscale,
            PixelFormat::Yuv422 | PixelFormat::Yuv444 | PixelFormat::Yvu444 => ColorSpace::YCbCr,
            PixelFormat::Rgb565
            | PixelFormat::Rgb
            | PixelFormat::Bgr
            | PixelFormat::Rgbx
            | PixelFormat::Bgrx => ColorSpace::Rgb,
        }
    }

    /// Color space requested from the codec when decoding.
    pub const fn codec_color_space(self) -> ColorSpace {
        self.input_color_space()
    }

    /// Color space of the buffer returned to the caller.
    pub const fn output_color_space(self) -> ColorSpace {
        match self {
            PixelFormat::Grayscale => ColorSpace::Grayscale,
            PixelFormat::Yuv422 | PixelFormat::Yuv444 => ColorSpace::YCbCr,
            PixelFormat::Yvu444 => ColorSpace::YCrCb,
            PixelFormat::Rgb565 | PixelFormat::Rgb => ColorSpace::Rgb,
            PixelFormat::Bgr => ColorSpace::Bgr,
            PixelFormat::Rgbx => ColorSpace::Rgbx,
            PixelFormat::Bgrx => ColorSpace::Bgrx,
        }
    }

    /// Components per pixel of the returned buffer.
    pub const fn output_components(self) -> usize {
        self.output_color_space().components()
    }
}

impl FromStr for PixelFormat {
    type Err = PixelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
