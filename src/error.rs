use thiserror::Error;

/// Error category shared by every layer of the crate.
///
/// Each concrete error maps onto exactly one category via `kind()`, so
/// callers that only care about the class of failure do not need to match
/// on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad identifier, magic number or byte-order marker
    Format,
    /// Offset or size outside buffer bounds, numeric option out of range
    Range,
    /// Option value of the wrong type
    Type,
    /// Unimplemented field type, channel count or pixel layout
    Unsupported,
    /// Allocation failure
    Memory,
    /// Fatal error reported by the codec collaborator
    Codec,
}

/// Errors that can occur when parsing EXIF/TIFF metadata
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExifError {
    /// Blob does not start with `Exif\0\0`
    #[error("Invalid Exif identifier")]
    InvalidIdentifier,

    /// Byte order marker is neither II nor MM
    #[error("Invalid TIFF byte order: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidByteOrder(u16),

    /// TIFF magic number is not 42
    #[error("Invalid TIFF magic: expected 42, got {0}")]
    InvalidMagic(u16),

    /// Blob is too small to contain the Exif and TIFF headers
    #[error("Exif blob too small: need at least {required} bytes, got {actual}")]
    TooSmall { required: usize, actual: usize },

    /// First IFD offset outside the accepted window
    #[error("Invalid IFD offset {offset} for blob of {size} bytes")]
    InvalidIfdOffset { offset: u32, size: usize },

    /// A read would cross the end of the blob
    #[error("Read out of bounds: {len} bytes at offset {offset}, blob size is {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// Unknown field type in an IFD entry
    #[error("Unsupported field type {field_type} for tag 0x{tag:04x}")]
    UnsupportedFieldType { tag: u16, field_type: u16 },

    /// Sub-IFD pointers nest deeper than allowed (usually a pointer cycle)
    #[error("Sub-IFD nesting exceeds {0} levels")]
    TooDeep(usize),

    /// A directory is reached a second time through another pointer
    #[error("Directory at offset {position} is referenced more than once")]
    RepeatedDirectory { position: usize },

    /// The blob declares more directory entries than one parse will read
    #[error("Exif blob declares more than {0} directory entries")]
    TooManyEntries(usize),
}

impl ExifError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            ExifError::InvalidIdentifier
            | ExifError::InvalidByteOrder(_)
            | ExifError::InvalidMagic(_) => ErrorKind::Format,
            ExifError::TooSmall { .. }
            | ExifError::InvalidIfdOffset { .. }
            | ExifError::OutOfBounds { .. }
            | ExifError::TooDeep(_)
            | ExifError::RepeatedDirectory { .. }
            | ExifError::TooManyEntries(_) => ErrorKind::Range,
            ExifError::UnsupportedFieldType { .. } => ErrorKind::Unsupported,
        }
    }
}

/// Errors from the pixel transcoder, transform engine and palette expansion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PixelError {
    /// Layout name not recognized
    #[error("Unsupported pixel format: {0}")]
    UnknownFormat(String),

    /// Layout recognized but not available in this direction
    #[error("Pixel format {format} is not supported for {direction}")]
    UnsupportedDirection {
        format: &'static str,
        direction: &'static str,
    },

    /// Stride smaller than the tightly packed row
    #[error("Stride {stride} is smaller than the packed row width {row_bytes}")]
    StrideTooSmall { stride: usize, row_bytes: usize },

    /// Buffer length does not match the declared geometry
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Width or height is zero, or their product overflows
    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Element width outside 1..=4 bytes
    #[error("Unsupported bytes per pixel: {0}")]
    UnsupportedElementWidth(usize),

    /// Palette plane count outside 1..=3
    #[error("Unsupported number of palette planes: {0}")]
    UnsupportedPlaneCount(usize),
}

impl PixelError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            PixelError::StrideTooSmall { .. }
            | PixelError::SizeMismatch { .. }
            | PixelError::InvalidDimensions { .. } => ErrorKind::Range,
            PixelError::UnknownFormat(_)
            | PixelError::UnsupportedDirection { .. }
            | PixelError::UnsupportedElementWidth(_)
            | PixelError::UnsupportedPlaneCount(_) => ErrorKind::Unsupported,
        }
    }
}

/// Errors raised while validating encoder/decoder options
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// Option value has the wrong type
    #[error("Invalid type for option {option}: {message}")]
    Type {
        option: &'static str,
        message: String,
    },

    /// Numeric option out of range
    #[error("Option {option} out of range: {message}")]
    Range {
        option: &'static str,
        message: String,
    },

    /// Option value names something this crate does not implement
    #[error("Unsupported value for option {option}: {message}")]
    Unsupported {
        option: &'static str,
        message: String,
    },
}

impl OptionError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            OptionError::Type { .. } => ErrorKind::Type,
            OptionError::Range { .. } => ErrorKind::Range,
            OptionError::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }
}

/// Errors reported by the JPEG codec collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Stream is not a parseable JPEG
    #[error("Invalid JPEG stream: {message}")]
    InvalidStream { message: String },

    /// Decompression failed
    #[error("Failed to decode image: {message}")]
    Decode { message: String },

    /// Compression failed
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// Scanline calls made in the wrong order or with the wrong row shape
    #[error("Codec misuse: {message}")]
    Protocol { message: String },

    /// A frame buffer could not be allocated
    #[error("Failed to allocate {requested} bytes")]
    Memory { requested: usize },
}

/// Top-level error returned by the decoder and encoder sessions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JpegError {
    /// EXIF metadata parsing error
    #[error("Exif error: {0}")]
    Exif(#[from] ExifError),

    /// Pixel layout or transform error
    #[error("Pixel error: {0}")]
    Pixel(#[from] PixelError),

    /// Invalid option
    #[error("Option error: {0}")]
    Option(#[from] OptionError),

    /// Codec failure
    #[error("Codec error: {0}")]
    Codec(CodecError),

    /// Allocation of a working buffer failed
    #[error("Failed to allocate {requested} bytes")]
    Memory { requested: usize },
}

impl JpegError {
    /// Category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            JpegError::Exif(e) => e.kind(),
            JpegError::Pixel(e) => e.kind(),
            JpegError::Option(e) => e.kind(),
            JpegError::Codec(_) => ErrorKind::Codec,
            JpegError::Memory { .. } => ErrorKind::Memory,
        }
    }
}

impl From<CodecError> for JpegError {
    /// Allocation failures inside the codec surface as [`JpegError::Memory`].
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Memory { requested } => JpegError::Memory { requested },
            other => JpegError::Codec(other),
        }
    }
}

/// Allocate a zero-filled buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc(len: usize) -> Result<Vec<u8>, JpegError> {
    try_zeroed(len).ok_or(JpegError::Memory { requested: len })
}

/// Zero-filled buffer of `len` bytes, or `None` when it cannot be reserved.
pub(crate) fn try_zeroed(len: usize) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 0);
    Some(buf)
}
