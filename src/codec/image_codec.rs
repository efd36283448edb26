//! Codec backend built on the `image` crate.
//!
//! The `image` JPEG decoder has no scanline API, so decompression decodes the
//! whole frame up front and hands rows out in batches. Compression buffers
//! rows until [`ScanlineWriter::finish`], then encodes and splices the queued
//! marker segments in after SOI/APP0.
//!
//! Output scaling resamples the decoded frame with a triangle filter. The DCT
//! method, output gamma, fancy upsampling and block smoothing have no
//! counterpart in the `image` decoder and are ignored.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageReader};
use tracing::debug;

use crate::error::{try_zeroed, CodecError};
use crate::pixel::format::ColorSpace;
use crate::pixel::palette::Palette;

use super::color;
use super::markers;
use super::quantize::Quantizer;
use super::{DecodeParams, EncodeParams, JpegCodec, MarkerSegment, ScanlineReader, ScanlineWriter};

/// Lowest quality the encoder accepts; 0 is raised to it.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Highest JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Clamp quality to 1-100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

/// Zero-filled buffer for `width x height` pixels of `components` bytes.
fn frame_buffer(width: u32, height: u32, components: usize) -> Result<Vec<u8>, CodecError> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(components))
        .ok_or(CodecError::Memory {
            requested: usize::MAX,
        })?;
    try_zeroed(len).ok_or(CodecError::Memory { requested: len })
}

fn check_color_space(cs: ColorSpace) -> Result<(), CodecError> {
    match cs {
        ColorSpace::Grayscale | ColorSpace::Rgb | ColorSpace::YCbCr => Ok(()),
        other => Err(CodecError::Protocol {
            message: format!("codec cannot work in {}", other),
        }),
    }
}

/// Default [`JpegCodec`].
#[derive(Debug, Clone, Default)]
pub struct ImageCodec {}

impl ImageCodec {
    pub fn new() -> Self {
        Self {}
    }
}

impl JpegCodec for ImageCodec {
    fn start_decompress<'a>(
        &self,
        data: &'a [u8],
        params: &DecodeParams,
    ) -> Result<Box<dyn ScanlineReader + 'a>, CodecError> {
        check_color_space(params.out_color_space)?;

        let reader = ImageReader::with_format(Cursor::new(data), image::ImageFormat::Jpeg);
        let mut img = reader.decode().map_err(|e| CodecError::Decode {
            message: e.to_string(),
        })?;

        if !params.scale.is_identity() {
            let (w, h) = (params.scale.apply(img.width()), params.scale.apply(img.height()));
            debug!(
                scale = %params.scale,
                from_width = img.width(),
                from_height = img.height(),
                width = w,
                height = h,
                "Scaling frame"
            );
            img = img.resize_exact(w.max(1), h.max(1), FilterType::Triangle);
        }
        if params.output_gamma.is_some()
            || params.fancy_upsampling.is_some()
            || params.block_smoothing.is_some()
        {
            debug!(
                dct_method = %params.dct_method,
                "Decoder tuning not supported by the image backend, ignored"
            );
        }

        let (width, height) = (img.width(), img.height());
        let (source_cs, pixels) = match img {
            DynamicImage::ImageLuma8(buf) => (ColorSpace::Grayscale, buf.into_raw()),
            other => (ColorSpace::Rgb, other.into_rgb8().into_raw()),
        };

        let out_cs = params.out_color_space;
        let pixels = if source_cs == out_cs {
            pixels
        } else {
            let mut converted = frame_buffer(width, height, out_cs.components())?;
            color::convert(source_cs, out_cs, &pixels, &mut converted)?;
            converted
        };

        debug!(width, height, source = %source_cs, output = %out_cs, "Decoded frame");

        let (rows, components, palette) = match params.quantize {
            Some(q) => {
                let mut quantizer = Quantizer::new(&pixels, out_cs.components(), &q)?;
                let indices = quantizer.map(&pixels, width as usize);
                debug!(
                    colors = quantizer.palette().len(),
                    dither = %q.dither,
                    two_pass = q.two_pass,
                    "Quantized frame"
                );
                (indices, 1, Some(quantizer.palette().clone()))
            }
            None => (pixels, out_cs.components(), None),
        };

        Ok(Box::new(ImageScanlineReader {
            rows,
            width,
            height,
            components,
            palette,
            next_row: 0,
        }))
    }

    fn start_compress(&self, params: &EncodeParams) -> Result<Box<dyn ScanlineWriter>, CodecError> {
        check_color_space(params.color_space)?;
        if params.width == 0 || params.height == 0 {
            return Err(CodecError::Encode {
                message: format!("invalid image size {}x{}", params.width, params.height),
            });
        }

        Ok(Box::new(ImageScanlineWriter {
            params: *params,
            markers: Vec::new(),
            rows: Vec::new(),
            rows_written: 0,
        }))
    }
}

// =============================================================================
// Decompression
// =============================================================================

struct ImageScanlineReader {
    rows: Vec<u8>,
    width: u32,
    height: u32,
    components: usize,
    palette: Option<Palette>,
    next_row: u32,
}

impl ScanlineReader for ImageScanlineReader {
    fn output_width(&self) -> u32 {
        self.width
    }

    fn output_height(&self) -> u32 {
        self.height
    }

    fn output_components(&self) -> usize {
        self.components
    }

    fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    fn read_scanlines(&mut self, dst: &mut [u8], max_rows: usize) -> Result<usize, CodecError> {
        let row_bytes = self.width as usize * self.components;
        let remaining = (self.height - self.next_row) as usize;
        let n = max_rows.min(remaining).min(dst.len() / row_bytes.max(1));
        if n == 0 {
            return Ok(0);
        }

        let start = self.next_row as usize * row_bytes;
        let len = n * row_bytes;
        dst[..len].copy_from_slice(&self.rows[start..start + len]);
        self.next_row += n as u32;

        Ok(n)
    }
}

// =============================================================================
// Compression
// =============================================================================

struct ImageScanlineWriter {
    params: EncodeParams,
    markers: Vec<MarkerSegment>,
    rows: Vec<u8>,
    rows_written: u32,
}

impl ImageScanlineWriter {
    fn row_bytes(&self) -> usize {
        self.params.width as usize * self.params.color_space.components()
    }
}

impl ScanlineWriter for ImageScanlineWriter {
    fn write_marker(&mut self, segment: &MarkerSegment) -> Result<(), CodecError> {
        if self.rows_written > 0 {
            return Err(CodecError::Protocol {
                message: "marker written after scanlines".to_string(),
            });
        }
        self.markers.push(segment.clone());
        Ok(())
    }

    fn write_scanlines(&mut self, rows: &[u8], nrows: usize) -> Result<usize, CodecError> {
        let row_bytes = self.row_bytes();
        let remaining = (self.params.height - self.rows_written) as usize;
        if nrows > remaining {
            return Err(CodecError::Protocol {
                message: format!("{} rows written, only {} remaining", nrows, remaining),
            });
        }
        let len = nrows * row_bytes;
        if rows.len() < len {
            return Err(CodecError::Protocol {
                message: format!("{} rows need {} bytes, got {}", nrows, len, rows.len()),
            });
        }

        let rows = &rows[..len];
        match self.params.color_space {
            ColorSpace::YCbCr => {
                let start = self.rows.len();
                self.rows.resize(start + len, 0);
                color::convert(ColorSpace::YCbCr, ColorSpace::Rgb, rows, &mut self.rows[start..])?;
            }
            _ => self.rows.extend_from_slice(rows),
        }
        self.rows_written += nrows as u32;

        Ok(nrows)
    }

    fn finish(self: Box<Self>) -> Result<Bytes, CodecError> {
        let EncodeParams {
            width,
            height,
            color_space,
            quality,
            dct_method,
        } = self.params;

        if self.rows_written != height {
            return Err(CodecError::Protocol {
                message: format!("finished after {} of {} rows", self.rows_written, height),
            });
        }

        let color_type = match color_space {
            ColorSpace::Grayscale => ExtendedColorType::L8,
            _ => ExtendedColorType::Rgb8,
        };

        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, clamp_quality(quality));
        encoder
            .encode(&self.rows, width, height, color_type)
            .map_err(|e| CodecError::Encode {
                message: e.to_string(),
            })?;

        debug!(
            width,
            height,
            bytes = output.len(),
            markers = self.markers.len(),
            dct_method = %dct_method,
            "Encoded frame"
        );

        if self.markers.is_empty() {
            return Ok(Bytes::from(output));
        }
        markers::insert_segments(&output, &self.markers)
    }
}

// =============================================================================
// Tests
// =============================================================================
