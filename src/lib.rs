//! # exifpix
//!
//! EXIF metadata extraction and raw pixel handling for JPEG images.
//!
//! ## Features
//!
//! - **Exif parsing**: bounds-checked IFD reader producing an ordered
//!   [`Document`], including the Exif/GPS/Interoperability sub-directories and
//!   the embedded thumbnail
//! - **Orientation**: fast orientation lookup and transpose/flip/mirror
//!   correction of decoded buffers
//! - **Pixel layouts**: YUV422, RGB565, RGB/BGR, RGBX/BGRX, YUV444/YVU444 and
//!   grayscale, converted in row batches
//! - **Palette output**: one- or two-pass quantization with optional dithering
//!   and colormap expansion
//! - **Scaled output**: decode at a fraction of the frame size
//!
//! ## Architecture
//!
//! - [`exif`] - Exif/TIFF header, tag catalogs, value decoding, IFD reader
//! - [`pixel`] - pixel layouts, row transcoding, orientation transforms, palettes
//! - [`codec`] - JPEG codec collaborator traits, marker handling, `image` backend
//! - [`decoder`] / [`encoder`] - decode and encode sessions
//! - [`config`] - option structs and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use exifpix::{Decoder, DecoderOptions, PixelFormat};
//!
//! let jpeg = std::fs::read("photo.jpg").unwrap();
//! let mut decoder = Decoder::new(DecoderOptions {
//!     pixel_format: PixelFormat::Bgr,
//!     apply_orientation: true,
//!     with_exif_tags: true,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let decoded = decoder.decode(&jpeg).unwrap();
//! let meta = decoded.meta.unwrap();
//! println!("{}x{} {}", meta.width, meta.height, meta.output_colorspace);
//! ```

pub mod codec;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod exif;
pub mod pixel;

// Re-export commonly used types
pub use codec::{
    DctMethod, DecodeParams, DitherMode, EncodeParams, FrameHeader, ImageCodec, JpegCodec,
    JpegHeader, MarkerSegment, QuantizeParams, Scale, ScanlineReader, ScanlineWriter,
};
pub use config::{Cli, Command, DecoderOptions, DitherOptions, EncoderOptions, DEFAULT_QUALITY};
pub use decoder::{is_broken, Decoded, Decoder, Meta, UNIT_LINES};
pub use encoder::Encoder;
pub use error::{CodecError, ErrorKind, ExifError, JpegError, OptionError, PixelError};
pub use exif::{parse as parse_exif, Document, Rational, Value};
pub use pixel::{
    ColorSpace, Orientation, OrientationFlags, OrientationTransformer, Palette, PixelBuffer,
    PixelFormat,
};
