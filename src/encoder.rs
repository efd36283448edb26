//! JPEG encoding session.
//!
//! Raw input rows are converted to the codec layout ten at a time, so the
//! working buffer stays small however large the image is.

use bytes::Bytes;
use tracing::debug;

use crate::codec::{markers, EncodeParams, ImageCodec, JpegCodec};
use crate::config::EncoderOptions;
use crate::decoder::UNIT_LINES;
use crate::error::{try_alloc, JpegError, OptionError, PixelError};
use crate::pixel::transcode::{pack_rows, RowLayout};

/// Encoding session for images of one size.
pub struct Encoder<C = ImageCodec> {
    codec: C,
    options: EncoderOptions,
    width: usize,
    height: usize,
    layout: RowLayout,
    input_len: usize,
}

impl Encoder<ImageCodec> {
    /// Encoder backed by the `image` crate.
    pub fn new(width: usize, height: usize, options: EncoderOptions) -> Result<Self, JpegError> {
        Self::with_codec(ImageCodec::new(), width, height, options)
    }
}

impl<C: JpegCodec> Encoder<C> {
    /// Validate the options against the image size.
    ///
    /// # Errors
    /// - `Range` for a zero width or height, a size JPEG cannot hold, a
    ///   quality above 100, or a stride shorter than one packed row or too
    ///   large to address `height` rows
    /// - `Unsupported` for a layout that cannot be encoded
    pub fn with_codec(
        codec: C,
        width: usize,
        height: usize,
        options: EncoderOptions,
    ) -> Result<Self, JpegError> {
        if width == 0 || height == 0 || width > u16::MAX as usize || height > u16::MAX as usize {
            return Err(PixelError::InvalidDimensions { width, height }.into());
        }
        options.validate()?;

        let format = options.pixel_format;
        let layout = match options.stride {
            Some(stride) => RowLayout::new(format, width, stride),
            None => RowLayout::packed(format, width),
        }
        .map_err(|e| match e {
            PixelError::StrideTooSmall { stride, row_bytes } => JpegError::from(OptionError::Range {
                option: "stride",
                message: format!("{} is smaller than the packed row of {} bytes", stride, row_bytes),
            }),
            other => other.into(),
        })?;
        let input_len = layout
            .stride
            .checked_mul(height)
            .ok_or_else(|| OptionError::Range {
                option: "stride",
                message: format!("{} rows of {} bytes do not fit in memory", height, layout.stride),
            })?;

        Ok(Self {
            codec,
            options,
            width,
            height,
            layout,
            input_len,
        })
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes between the starts of two input rows.
    pub fn stride(&self) -> usize {
        self.layout.stride
    }

    /// Exact input size `encode` expects.
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Compress `raw`, which must be exactly `stride * height` bytes.
    pub fn encode(&self, raw: &[u8]) -> Result<Bytes, JpegError> {
        let expected = self.input_len();
        if raw.len() != expected {
            return Err(PixelError::SizeMismatch {
                expected,
                actual: raw.len(),
            }
            .into());
        }

        let format = self.options.pixel_format;
        let mut writer = self.codec.start_compress(&EncodeParams {
            width: self.width as u32,
            height: self.height as u32,
            color_space: format.input_color_space(),
            quality: self.options.quality,
            dct_method: self.options.dct_method,
        })?;

        if let Some(orientation) = self.options.orientation {
            writer.write_marker(&markers::orientation_segment(orientation))?;
        }

        let out_row = self.layout.codec_row_bytes();
        let mut batch = try_alloc(out_row * UNIT_LINES)?;

        let mut row = 0;
        while row < self.height {
            let n = UNIT_LINES.min(self.height - row);
            pack_rows(&self.layout, &raw[row * self.layout.stride..], n, &mut batch)?;
            let written = writer.write_scanlines(&batch[..n * out_row], n)?;
            row += written;
            if written == 0 {
                break;
            }
        }

        let jpeg = writer.finish()?;
        debug!(
            width = self.width,
            height = self.height,
            format = %format,
            quality = self.options.quality,
            bytes = jpeg.len(),
            "Encoded image"
        );
        Ok(jpeg)
    }
}

// =============================================================================
// Tests
// =============================================================================
