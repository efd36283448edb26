//! JPEG decoding session.
//!
//! A [`Decoder`] pairs validated [`DecoderOptions`] with a [`JpegCodec`] and
//! runs the decode pipeline:
//!
//! ```text
//! read_scanlines (10 rows at a time)
//!     -> unpack rows into the requested layout
//!     -> expand the colormap           (quantized + expand_colormap)
//!     -> swap Cb/Cr                    (YVU444)
//!     -> correct the orientation       (apply_orientation)
//!     -> build Meta                    (unless without_meta)
//! ```
//!
//! The decoder keeps the transpose scratch buffer between calls, so decoding
//! a series of same-sized images allocates it once.

use serde::Serialize;
use tracing::debug;

use crate::codec::{markers, ImageCodec, JpegCodec, JpegHeader, ScanlineReader};
use crate::config::DecoderOptions;
use crate::error::{try_alloc, JpegError};
use crate::exif::{self, orientation, Document};
use crate::pixel::format::{ColorSpace, PixelFormat};
use crate::pixel::palette::Palette;
use crate::pixel::transcode::{swap_chroma, unpack_rows, RowLayout};
use crate::pixel::transform::{Orientation, OrientationTransformer, PixelBuffer};

/// Rows requested from the codec per call
pub const UNIT_LINES: usize = 10;

// =============================================================================
// Meta
// =============================================================================

/// Description of a decoded (or decodable) image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    /// Width after orientation correction
    pub width: usize,
    /// Height after orientation correction
    pub height: usize,
    /// Bytes per output row
    pub stride: usize,
    /// Color space of the compressed data
    pub original_colorspace: ColorSpace,
    /// Color space of the returned pixels
    pub output_colorspace: ColorSpace,
    pub num_components: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_tags: Option<Document>,
    /// One packed integer per palette entry, for quantized output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colormap: Option<Vec<u32>>,
}

/// Pixels returned by [`Decoder::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub pixels: PixelBuffer,
    /// `None` when the decoder was built with `without_meta`
    pub meta: Option<Meta>,
}

impl Decoded {
    pub fn data(&self) -> &[u8] {
        self.pixels.data()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.pixels.into_data()
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// Decoding session.
pub struct Decoder<C = ImageCodec> {
    codec: C,
    options: DecoderOptions,
    transformer: OrientationTransformer,
}

impl Decoder<ImageCodec> {
    /// Decoder backed by the `image` crate.
    pub fn new(options: DecoderOptions) -> Result<Self, JpegError> {
        Self::with_codec(ImageCodec::new(), options)
    }
}

impl<C: JpegCodec> Decoder<C> {
    pub fn with_codec(codec: C, options: DecoderOptions) -> Result<Self, JpegError> {
        options.validate()?;
        Ok(Self {
            codec,
            options,
            transformer: OrientationTransformer::new(),
        })
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Describe `data` without decompressing it.
    ///
    /// Dimensions account for the output scale. The colormap is only known
    /// after decompression and is never set here.
    pub fn read_header(&self, data: &[u8]) -> Result<Meta, JpegError> {
        let header = self.codec.read_header(data)?;
        let orientation = self.orientation(&header);
        let components = self.num_components();
        let scale = self.options.scale;

        self.meta(
            &header,
            scale.apply(header.frame.width) as usize,
            scale.apply(header.frame.height) as usize,
            components,
            orientation,
            None,
        )
    }

    /// Decode `data` into raw pixels.
    pub fn decode(&mut self, data: &[u8]) -> Result<Decoded, JpegError> {
        let format = self.options.pixel_format;
        let quantize = self.options.quantize();

        let header = self.codec.read_header(data)?;
        let mut reader = self.codec.start_decompress(data, &self.options.decode_params())?;

        let width = reader.output_width() as usize;
        let height = reader.output_height() as usize;
        debug!(
            width,
            height,
            format = %format,
            quantized = quantize.is_some(),
            scale = %self.options.scale,
            "Decoding"
        );

        let mut pixels = if quantize.is_some() {
            read_indices(reader.as_mut(), width, height)?
        } else {
            read_rows(reader.as_mut(), format, width, height)?
        };
        let mut bpp = if quantize.is_some() { 1 } else { format.output_components() };

        for warning in reader.warnings() {
            debug!(warning = %warning, "Suppressed codec warning");
        }

        let palette = reader.palette().map(|p| output_palette(p, format)).transpose()?;
        drop(reader);

        if let (true, Some(palette)) = (self.options.expand_colormap, &palette) {
            pixels = palette.expand(&pixels)?;
            bpp = palette.channels();
        }

        if format == PixelFormat::Yvu444 && bpp == 3 {
            swap_chroma(&mut pixels);
        }

        let orientation = self.orientation(&header);
        let buffer = PixelBuffer::new(pixels, width, height, bpp)?;
        let buffer = if self.options.apply_orientation {
            self.transformer.apply(buffer, orientation)?
        } else {
            buffer
        };

        let meta = if self.options.without_meta {
            None
        } else {
            Some(self.meta(
                &header,
                width,
                height,
                self.num_components(),
                orientation,
                palette.as_ref().map(Palette::packed),
            )?)
        };

        Ok(Decoded {
            pixels: buffer,
            meta,
        })
    }

    fn orientation(&self, header: &JpegHeader) -> Orientation {
        if self.options.apply_orientation {
            orientation::resolve_segments(header.app1_payloads())
        } else {
            Orientation::TopLeft
        }
    }

    fn num_components(&self) -> usize {
        match self.options.quantize() {
            Some(_) if !self.options.expand_colormap => 1,
            _ => self.options.pixel_format.output_components(),
        }
    }

    fn meta(
        &self,
        header: &JpegHeader,
        width: usize,
        height: usize,
        num_components: usize,
        orientation: Orientation,
        colormap: Option<Vec<u32>>,
    ) -> Result<Meta, JpegError> {
        let (width, height) = if self.options.apply_orientation && orientation.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        };

        let exif_tags = if self.options.with_exif_tags {
            Some(match header.exif_payload() {
                Some(blob) => exif::parse(blob)?,
                None => Document::new(),
            })
        } else {
            None
        };

        Ok(Meta {
            width,
            height,
            stride: width * num_components,
            original_colorspace: header.frame.color_space,
            output_colorspace: self.options.pixel_format.output_color_space(),
            num_components,
            exif_tags,
            colormap,
        })
    }
}

/// Whether `data` is not a readable JPEG stream.
///
/// Only the marker segments up to the first scan are checked.
pub fn is_broken(data: &[u8]) -> bool {
    markers::is_broken(data)
}

// =============================================================================
// Row reading
// =============================================================================

fn read_rows<R: ScanlineReader + ?Sized>(
    reader: &mut R,
    format: PixelFormat,
    width: usize,
    height: usize,
) -> Result<Vec<u8>, JpegError> {
    let layout = RowLayout::packed(format, width)?;
    let in_row = layout.codec_row_bytes();
    let out_row = layout.output_row_bytes();

    let mut out = try_alloc(checked_size(out_row, height)?)?;
    let mut batch = try_alloc(checked_size(in_row, UNIT_LINES)?)?;

    let mut row = 0;
    while row < height {
        let n = reader.read_scanlines(&mut batch, UNIT_LINES.min(height - row))?;
        if n == 0 {
            break;
        }
        unpack_rows(&layout, &batch, n, &mut out[row * out_row..(row + n) * out_row])?;
        row += n;
    }

    debug!(rows = row, "Read scanlines");
    Ok(out)
}

fn read_indices<R: ScanlineReader + ?Sized>(
    reader: &mut R,
    width: usize,
    height: usize,
) -> Result<Vec<u8>, JpegError> {
    let mut out = try_alloc(checked_size(width, height)?)?;

    let mut row = 0;
    while row < height {
        let n = reader.read_scanlines(&mut out[row * width..], UNIT_LINES.min(height - row))?;
        if n == 0 {
            break;
        }
        row += n;
    }

    debug!(rows = row, "Read palette indices");
    Ok(out)
}

fn checked_size(row_bytes: usize, rows: usize) -> Result<usize, JpegError> {
    row_bytes
        .checked_mul(rows)
        .ok_or(JpegError::Memory { requested: usize::MAX })
}

/// Palette with its planes in the order of the output layout.
fn output_palette(palette: &Palette, format: PixelFormat) -> Result<Palette, JpegError> {
    match format {
        PixelFormat::Bgr if palette.channels() == 3 => {
            let planes = palette.planes().iter().rev().cloned().collect();
            Ok(Palette::new(planes)?)
        }
        _ => Ok(palette.clone()),
    }
}

// =============================================================================
// Tests
// =============================================================================
