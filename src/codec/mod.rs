//! JPEG codec collaborator.
//!
//! The decoder and encoder sessions never touch entropy-coded data
//! themselves. They talk to a [`JpegCodec`], which hands out a
//! [`ScanlineReader`] for decompression and a [`ScanlineWriter`] for
//! compression. Both move pixels in row batches so that callers can bound
//! their working memory.
//!
//! Marker parsing is shared by every backend through [`markers`]; the
//! default backend is [`ImageCodec`], built on the `image` crate.

pub mod color;
pub mod image_codec;
pub mod markers;
pub mod quantize;

use std::fmt;

use bytes::Bytes;

use crate::error::CodecError;
use crate::pixel::format::ColorSpace;
use crate::pixel::palette::Palette;

pub use image_codec::ImageCodec;
pub use quantize::{DitherMode, QuantizeParams};

// =============================================================================
// Header types
// =============================================================================

/// Frame header (SOFn) of a JPEG stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    /// Sample precision in bits
    pub precision: u8,
    pub progressive: bool,
    pub component_ids: Vec<u8>,
    /// Color space of the compressed data
    pub color_space: ColorSpace,
}

/// A marker segment preserved from, or written into, a JPEG stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSegment {
    /// Marker code, the byte following `0xFF`
    pub marker: u8,
    pub payload: Bytes,
}

impl MarkerSegment {
    pub fn new(marker: u8, payload: Bytes) -> Self {
        Self { marker, payload }
    }

    /// Whether this is an APP1 segment carrying an Exif blob.
    pub fn is_exif(&self) -> bool {
        self.marker == markers::APP1
            && self.payload.len() >= crate::exif::header::MIN_EXIF_SIZE
            && self.payload.starts_with(crate::exif::header::EXIF_IDENTIFIER)
    }
}

/// Everything known about a stream before decompression starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegHeader {
    pub frame: FrameHeader,
    /// APP1 segments in stream order
    pub markers: Vec<MarkerSegment>,
}

impl JpegHeader {
    /// Payload of the first Exif APP1 segment.
    pub fn exif_payload(&self) -> Option<&[u8]> {
        self.markers
            .iter()
            .find(|m| m.is_exif())
            .map(|m| &m.payload[..])
    }

    /// Payloads of every APP1 segment, in stream order.
    pub fn app1_payloads(&self) -> impl Iterator<Item = &[u8]> {
        self.markers
            .iter()
            .filter(|m| m.marker == markers::APP1)
            .map(|m| &m.payload[..])
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// Largest accepted output scale, the 16/8 ceiling of DCT scaling.
pub const MAX_SCALE: Scale = Scale { num: 2, denom: 1 };

/// Output scaling factor `num / denom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale {
    pub num: u32,
    pub denom: u32,
}

impl Scale {
    /// No scaling.
    pub const ONE: Scale = Scale { num: 1, denom: 1 };

    /// `None` unless both terms are positive.
    pub fn new(num: u32, denom: u32) -> Option<Self> {
        (num > 0 && denom > 0).then_some(Self { num, denom })
    }

    pub fn is_identity(&self) -> bool {
        self.num == self.denom
    }

    /// Whether this scale is larger than `other`.
    pub fn exceeds(&self, other: Scale) -> bool {
        self.num as u64 * other.denom as u64 > other.num as u64 * self.denom as u64
    }

    /// Length of a `dim`-pixel side after scaling, rounded up.
    pub fn apply(&self, dim: u32) -> u32 {
        let scaled = (dim as u64 * self.num as u64).div_ceil(self.denom.max(1) as u64);
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.denom)
    }
}

/// Inverse DCT algorithm requested from the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DctMethod {
    #[default]
    Fastest,
    Islow,
    Ifast,
    Float,
}

impl DctMethod {
    /// Parse `FASTEST`, `ISLOW`, `IFAST` or `FLOAT` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        [DctMethod::Fastest, DctMethod::Islow, DctMethod::Ifast, DctMethod::Float]
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    pub const fn name(self) -> &'static str {
        match self {
            DctMethod::Fastest => "FASTEST",
            DctMethod::Islow => "ISLOW",
            DctMethod::Ifast => "IFAST",
            DctMethod::Float => "FLOAT",
        }
    }
}

impl fmt::Display for DctMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decompression request.
///
/// A codec applies the tuning fields it supports and ignores the rest;
/// `None` leaves the codec's own default in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    /// GRAYSCALE, RGB or YCbCr
    pub out_color_space: ColorSpace,
    /// Produce palette indices instead of full color
    pub quantize: Option<QuantizeParams>,
    /// Output size relative to the frame
    pub scale: Scale,
    pub dct_method: DctMethod,
    pub output_gamma: Option<f64>,
    pub fancy_upsampling: Option<bool>,
    pub block_smoothing: Option<bool>,
}

impl DecodeParams {
    /// Full-size, unquantized output in `out_color_space`.
    pub fn new(out_color_space: ColorSpace) -> Self {
        Self {
            out_color_space,
            quantize: None,
            scale: Scale::ONE,
            dct_method: DctMethod::default(),
            output_gamma: None,
            fancy_upsampling: None,
            block_smoothing: None,
        }
    }
}

/// Compression request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    /// GRAYSCALE, RGB or YCbCr rows
    pub color_space: ColorSpace,
    /// 0-100
    pub quality: u8,
    /// Forward DCT algorithm, for codecs that offer a choice
    pub dct_method: DctMethod,
}

// =============================================================================
// Traits
// =============================================================================

/// Decompression in progress.
pub trait ScanlineReader {
    fn output_width(&self) -> u32;

    fn output_height(&self) -> u32;

    /// Bytes per pixel of the rows returned by [`read_scanlines`](Self::read_scanlines).
    ///
    /// 1 when quantizing, since rows then hold palette indices.
    fn output_components(&self) -> usize;

    /// Colormap of quantized output.
    fn palette(&self) -> Option<&Palette>;

    /// Copy up to `max_rows` rows into `dst` and return how many were read.
    ///
    /// Returns 0 once every row has been read.
    fn read_scanlines(&mut self, dst: &mut [u8], max_rows: usize) -> Result<usize, CodecError>;

    /// Non-fatal diagnostics raised so far.
    fn warnings(&self) -> &[String] {
        &[]
    }
}

/// Compression in progress.
pub trait ScanlineWriter {
    /// Queue a marker segment. Must precede the first scanline.
    fn write_marker(&mut self, segment: &MarkerSegment) -> Result<(), CodecError>;

    /// Consume `nrows` tightly packed rows and return how many were accepted.
    fn write_scanlines(&mut self, rows: &[u8], nrows: usize) -> Result<usize, CodecError>;

    /// Finish compression and return the JPEG stream.
    fn finish(self: Box<Self>) -> Result<Bytes, CodecError>;
}

/// Factory for decompression and compression sessions.
pub trait JpegCodec {
    fn read_header(&self, data: &[u8]) -> Result<JpegHeader, CodecError> {
        markers::read_header(data)
    }

    fn start_decompress<'a>(
        &self,
        data: &'a [u8],
        params: &DecodeParams,
    ) -> Result<Box<dyn ScanlineReader + 'a>, CodecError>;

    fn start_compress(&self, params: &EncodeParams) -> Result<Box<dyn ScanlineWriter>, CodecError>;
}
