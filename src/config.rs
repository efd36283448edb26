//! Encoder/decoder options and command-line configuration.
//!
//! Options can be built three ways:
//! - directly, starting from `Default` and setting fields
//! - from an untyped JSON option map via `from_json`
//! - from the command line via clap (flags also read `EXIFPIX_*` variables)
//!
//! Every path ends in `validate()`, which reports the same typed errors.
//!
//! # JSON option maps
//!
//! ```text
//! encoder: {"pixel_format": "RGB", "quality": 90, "orientation": 6, "stride": 3072,
//!           "dct_method": "ISLOW"}
//! decoder: {"pixel_format": "BGR", "dither": ["FS", true, 64],
//!           "expand_colormap": true, "with_exif_tags": true,
//!           "apply_orientation": true, "without_meta": false,
//!           "scale": "1/2", "dct_method": "FLOAT", "output_gamma": 1.0,
//!           "do_fancy_upsampling": true, "do_smoothing": false}
//! ```
//!
//! `scale` takes a positive integer, a positive float (kept to three
//! decimals) or a `"num/denom"` string.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

use crate::codec::quantize::{DitherMode, QuantizeParams, MAX_COLORS, MIN_COLORS};
use crate::codec::{DctMethod, DecodeParams, Scale, MAX_SCALE};
use crate::error::{JpegError, OptionError};
use crate::pixel::format::PixelFormat;
use crate::pixel::transform::Orientation;

// =============================================================================
// Default Values
// =============================================================================

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 75;

/// Highest accepted JPEG quality.
pub const MAX_QUALITY: u8 = 100;

/// Default encoder input layout.
pub const DEFAULT_ENCODER_FORMAT: PixelFormat = PixelFormat::Yuv422;

/// Default decoder output layout.
pub const DEFAULT_DECODER_FORMAT: PixelFormat = PixelFormat::Rgb;

// =============================================================================
// Encoder Options
// =============================================================================

/// Settings for [`Encoder`](crate::encoder::Encoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    pub pixel_format: PixelFormat,
    /// 0-100
    pub quality: u8,
    /// Written into a minimal Exif APP1 segment when set
    pub orientation: Option<Orientation>,
    /// Bytes between the starts of two input rows; tight rows when unset
    pub stride: Option<usize>,
    pub dct_method: DctMethod,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            pixel_format: DEFAULT_ENCODER_FORMAT,
            quality: DEFAULT_QUALITY,
            orientation: None,
            stride: None,
            dct_method: DctMethod::default(),
        }
    }
}

impl EncoderOptions {
    /// Check the settings that do not depend on the image size.
    pub fn validate(&self) -> Result<(), JpegError> {
        self.pixel_format.check_encodable()?;

        if self.quality > MAX_QUALITY {
            return Err(range("quality", format!("{} greater than 100", self.quality)));
        }
        if self.stride == Some(0) {
            return Err(range("stride", "must be positive"));
        }
        Ok(())
    }

    /// Parse an untyped option map. Missing keys keep their defaults.
    pub fn from_json(value: &Value) -> Result<Self, JpegError> {
        let map = as_object(value)?;
        let mut opts = Self::default();

        if let Some(v) = present(map, "pixel_format") {
            opts.pixel_format = pixel_format(v)?;
        }

        if let Some(v) = present(map, "quality") {
            opts.quality = quality(v)?;
        }

        if let Some(v) = present(map, "orientation") {
            let code = integer("orientation", v)?;
            let orientation = u16::try_from(code)
                .ok()
                .and_then(Orientation::from_code)
                .ok_or_else(|| range("orientation", format!("{} outside 1..=8", code)))?;
            opts.orientation = Some(orientation);
        }

        if let Some(v) = present(map, "stride") {
            let stride = integer("stride", v)?;
            let stride = usize::try_from(stride)
                .ok()
                .filter(|&s| s > 0)
                .ok_or_else(|| range("stride", format!("{} must be positive", stride)))?;
            opts.stride = Some(stride);
        }

        if let Some(v) = present(map, "dct_method") {
            opts.dct_method = dct_method(v)?;
        }

        opts.validate()?;
        Ok(opts)
    }
}

// =============================================================================
// Decoder Options
// =============================================================================

/// Palette output settings.
///
/// A mode of `NONE` turns quantization off entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DitherOptions {
    pub mode: DitherMode,
    /// Build the palette from the image instead of a uniform grid
    pub two_pass: bool,
    /// Palette size, 8..=256
    pub colors: u16,
}

impl DitherOptions {
    pub fn validate(&self) -> Result<(), JpegError> {
        if !(MIN_COLORS..=MAX_COLORS).contains(&self.colors) {
            return Err(range(
                "dither",
                format!("number of colors {} outside 8..=256", self.colors),
            ));
        }
        Ok(())
    }

    /// Quantizer settings, or `None` when the mode disables quantization.
    pub fn quantize(&self) -> Option<QuantizeParams> {
        match self.mode {
            DitherMode::None => None,
            dither => Some(QuantizeParams {
                colors: self.colors,
                two_pass: self.two_pass,
                dither,
            }),
        }
    }

    /// Parse `[mode, two_pass, colors]`.
    pub fn from_json(value: &Value) -> Result<Self, JpegError> {
        let items = value
            .as_array()
            .ok_or_else(|| type_error("dither", "expected [mode, two_pass, colors]"))?;
        if items.len() != 3 {
            return Err(OptionError::Unsupported {
                option: "dither",
                message: format!("expected 3 elements, got {}", items.len()),
            }
            .into());
        }

        let name = items[0]
            .as_str()
            .ok_or_else(|| type_error("dither", "mode must be a string"))?;
        let mode = DitherMode::from_name(name).ok_or_else(|| OptionError::Unsupported {
            option: "dither",
            message: format!("unknown dither mode {:?}", name),
        })?;

        let two_pass = truthy(&items[1]);

        let colors = integer("dither", &items[2])?;
        let colors = u16::try_from(colors)
            .map_err(|_| range("dither", format!("number of colors {} outside 8..=256", colors)))?;

        let opts = Self {
            mode,
            two_pass,
            colors,
        };
        opts.validate()?;
        Ok(opts)
    }
}

/// Settings for [`Decoder`](crate::decoder::Decoder).
///
/// The tuning fields after `apply_orientation` are handed to the codec,
/// which may ignore the ones it cannot honour. `None` keeps the codec default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderOptions {
    pub pixel_format: PixelFormat,
    pub dither: Option<DitherOptions>,
    /// Return pixels without a `Meta`
    pub without_meta: bool,
    /// Expand palette indices through the colormap
    pub expand_colormap: bool,
    /// Attach the parsed Exif document to `Meta`
    pub with_exif_tags: bool,
    /// Rotate/flip the output according to the Exif orientation
    pub apply_orientation: bool,
    /// Output size relative to the frame, at most 2/1
    pub scale: Scale,
    pub dct_method: DctMethod,
    /// Positive and finite
    pub output_gamma: Option<f64>,
    pub do_fancy_upsampling: Option<bool>,
    pub do_smoothing: Option<bool>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            pixel_format: DEFAULT_DECODER_FORMAT,
            dither: None,
            without_meta: false,
            expand_colormap: false,
            with_exif_tags: false,
            apply_orientation: false,
            scale: Scale::ONE,
            dct_method: DctMethod::default(),
            output_gamma: None,
            do_fancy_upsampling: None,
            do_smoothing: None,
        }
    }
}

impl DecoderOptions {
    pub fn validate(&self) -> Result<(), JpegError> {
        self.pixel_format.check_decodable()?;

        if let Some(dither) = &self.dither {
            dither.validate()?;
            if dither.quantize().is_some() {
                let n = self.pixel_format.output_components();
                if n != 1 && n != 3 {
                    return Err(OptionError::Unsupported {
                        option: "dither",
                        message: format!("cannot quantize {} output", self.pixel_format),
                    }
                    .into());
                }
            }
        }

        if Scale::new(self.scale.num, self.scale.denom).is_none() {
            return Err(range("scale", format!("{} less than or equal to 0", self.scale)));
        }
        if self.scale.exceeds(MAX_SCALE) {
            return Err(range("scale", format!("{} greater than {}", self.scale, MAX_SCALE)));
        }
        if let Some(gamma) = self.output_gamma {
            if !gamma.is_finite() || gamma <= 0.0 {
                return Err(range("output_gamma", format!("{} must be positive", gamma)));
            }
        }
        Ok(())
    }

    /// Quantizer settings, when dithering is enabled.
    pub fn quantize(&self) -> Option<QuantizeParams> {
        self.dither.as_ref().and_then(DitherOptions::quantize)
    }

    /// Decompression request for these options.
    pub fn decode_params(&self) -> DecodeParams {
        DecodeParams {
            out_color_space: self.pixel_format.codec_color_space(),
            quantize: self.quantize(),
            scale: self.scale,
            dct_method: self.dct_method,
            output_gamma: self.output_gamma,
            fancy_upsampling: self.do_fancy_upsampling,
            block_smoothing: self.do_smoothing,
        }
    }

    /// Parse an untyped option map. Missing keys keep their defaults.
    pub fn from_json(value: &Value) -> Result<Self, JpegError> {
        let map = as_object(value)?;
        let mut opts = Self::default();

        if let Some(v) = present(map, "pixel_format") {
            opts.pixel_format = pixel_format(v)?;
        }
        if let Some(v) = present(map, "dither") {
            opts.dither = Some(DitherOptions::from_json(v)?);
        }
        opts.without_meta = map.get("without_meta").is_some_and(truthy);
        opts.expand_colormap = map.get("expand_colormap").is_some_and(truthy);
        opts.with_exif_tags = map.get("with_exif_tags").is_some_and(truthy);
        opts.apply_orientation = map.get("apply_orientation").is_some_and(truthy);

        if let Some(v) = present(map, "scale") {
            opts.scale = scale(v)?;
        }
        if let Some(v) = present(map, "dct_method") {
            opts.dct_method = dct_method(v)?;
        }
        if let Some(v) = present(map, "output_gamma") {
            let gamma = v
                .as_f64()
                .ok_or_else(|| type_error("output_gamma", format!("expected a number, got {}", v)))?;
            opts.output_gamma = Some(gamma);
        }
        opts.do_fancy_upsampling = present(map, "do_fancy_upsampling").map(truthy);
        opts.do_smoothing = present(map, "do_smoothing").map(truthy);

        opts.validate()?;
        Ok(opts)
    }
}

// =============================================================================
// JSON helpers
// =============================================================================

fn type_error(option: &'static str, message: impl Into<String>) -> JpegError {
    OptionError::Type {
        option,
        message: message.into(),
    }
    .into()
}

fn range(option: &'static str, message: impl Into<String>) -> JpegError {
    OptionError::Range {
        option,
        message: message.into(),
    }
    .into()
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, JpegError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(type_error("options", format!("expected an object, got {}", other))),
    }
}

/// Value of `key`, treating `null` as absent.
fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

/// Anything but `null` and `false` counts as true.
fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn integer(option: &'static str, value: &Value) -> Result<i64, JpegError> {
    value
        .as_i64()
        .ok_or_else(|| type_error(option, format!("expected an integer, got {}", value)))
}

fn pixel_format(value: &Value) -> Result<PixelFormat, JpegError> {
    let name = value
        .as_str()
        .ok_or_else(|| type_error("pixel_format", format!("expected a string, got {}", value)))?;
    Ok(PixelFormat::from_name(name)?)
}

fn dct_method(value: &Value) -> Result<DctMethod, JpegError> {
    let name = value
        .as_str()
        .ok_or_else(|| type_error("dct_method", format!("expected a string, got {}", value)))?;
    dct_method_named(name)
}

fn dct_method_named(name: &str) -> Result<DctMethod, JpegError> {
    DctMethod::from_name(name).ok_or_else(|| {
        OptionError::Unsupported {
            option: "dct_method",
            message: format!("unknown DCT method {:?}", name),
        }
        .into()
    })
}

/// Integer, float or `"num/denom"` string.
fn scale(value: &Value) -> Result<Scale, JpegError> {
    match value {
        Value::String(text) => scale_from_str(text),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => rational_scale(i, 1),
            (None, Some(f)) => float_scale(f),
            _ => Err(range("scale", format!("{} out of range", n))),
        },
        other => Err(type_error(
            "scale",
            format!("expected a number or \"num/denom\", got {}", other),
        )),
    }
}

/// `"num/denom"` or a plain number.
fn scale_from_str(text: &str) -> Result<Scale, JpegError> {
    let malformed = || {
        type_error(
            "scale",
            format!("expected \"num/denom\" or a number, got {:?}", text),
        )
    };
    match text.split_once('/') {
        Some((num, denom)) => {
            let num = num.trim().parse::<i64>().map_err(|_| malformed())?;
            let denom = denom.trim().parse::<i64>().map_err(|_| malformed())?;
            rational_scale(num, denom)
        }
        None => float_scale(text.trim().parse::<f64>().map_err(|_| malformed())?),
    }
}

/// Floats keep three decimals, truncated.
fn float_scale(value: f64) -> Result<Scale, JpegError> {
    if !value.is_finite() {
        return Err(range("scale", format!("{} is not finite", value)));
    }
    if value <= 0.0 {
        return Err(range("scale", format!("{} less than or equal to 0", value)));
    }
    rational_scale((value * 1000.0) as i64, 1000)
}

fn rational_scale(num: i64, denom: i64) -> Result<Scale, JpegError> {
    if num <= 0 || denom <= 0 {
        return Err(range("scale", format!("{}/{} less than or equal to 0", num, denom)));
    }
    u32::try_from(num)
        .ok()
        .zip(u32::try_from(denom).ok())
        .and_then(|(num, denom)| Scale::new(num, denom))
        .ok_or_else(|| range("scale", format!("{}/{} out of range", num, denom)))
}

/// Integer or finite float in 0..=100; floats are truncated.
fn quality(value: &Value) -> Result<u8, JpegError> {
    let q = if let Some(i) = value.as_i64() {
        i as f64
    } else if let Some(f) = value.as_f64() {
        f
    } else {
        return Err(type_error("quality", format!("expected a number, got {}", value)));
    };

    if q < 0.0 {
        return Err(range("quality", "less than 0"));
    }
    if q > MAX_QUALITY as f64 {
        return Err(range("quality", "greater than 100"));
    }
    Ok(q as u8)
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// exifpix - JPEG metadata and raw pixel tool.
///
/// Reads Exif tags, decodes JPEG files into raw pixel buffers (optionally
/// upright and palette-quantized) and encodes raw buffers back into JPEG.
#[derive(Parser, Debug, Clone)]
#[command(name = "exifpix")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the Exif tags of a JPEG file as JSON.
    Exif(ExifArgs),

    /// Print the Exif orientation code (1-8) of a JPEG file.
    Orientation(InputArgs),

    /// Decode a JPEG file into raw pixels.
    Decode(DecodeArgs),

    /// Encode raw pixels into a JPEG file.
    Encode(EncodeArgs),

    /// Check that JPEG headers are readable.
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// JPEG file to read.
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ExifArgs {
    /// JPEG file, or a raw Exif blob with --raw.
    pub input: PathBuf,

    /// Treat the input as a bare `Exif\0\0` blob instead of a JPEG file.
    #[arg(long, default_value_t = false)]
    pub raw: bool,

    /// Pretty-print the JSON output.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// JPEG file to decode.
    pub input: PathBuf,

    /// Where to write the raw pixels.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Decoder options as a JSON object; replaces the flags below.
    #[arg(long, env = "EXIFPIX_DECODE_OPTIONS")]
    pub options: Option<String>,

    /// Output pixel layout.
    #[arg(long, default_value = "RGB", env = "EXIFPIX_PIXEL_FORMAT")]
    pub pixel_format: String,

    /// Dither mode for palette output (NONE, ORDERED or FS).
    #[arg(long)]
    pub dither: Option<String>,

    /// Palette size for --dither.
    #[arg(long, default_value_t = MAX_COLORS)]
    pub colors: u16,

    /// Build the palette from the image histogram.
    #[arg(long, default_value_t = false)]
    pub two_pass: bool,

    /// Expand palette indices into colors.
    #[arg(long, default_value_t = false)]
    pub expand_colormap: bool,

    /// Include the Exif tags in the printed metadata.
    #[arg(long, default_value_t = false)]
    pub with_exif_tags: bool,

    /// Turn the image upright according to its Exif orientation.
    #[arg(long, default_value_t = false, env = "EXIFPIX_APPLY_ORIENTATION")]
    pub apply_orientation: bool,

    /// Do not print metadata.
    #[arg(long, default_value_t = false)]
    pub without_meta: bool,

    /// Output scale, as "num/denom" or a number (at most 2).
    #[arg(long)]
    pub scale: Option<String>,

    /// Inverse DCT method (FASTEST, ISLOW, IFAST or FLOAT).
    #[arg(long)]
    pub dct_method: Option<String>,

    /// Output gamma, for codecs that apply one.
    #[arg(long)]
    pub output_gamma: Option<f64>,

    /// Request fancy chroma upsampling (true or false).
    #[arg(long)]
    pub fancy_upsampling: Option<bool>,

    /// Request block smoothing of coarse DC coefficients (true or false).
    #[arg(long)]
    pub smoothing: Option<bool>,
}

impl DecodeArgs {
    /// Validated decoder options from `--options` or the individual flags.
    pub fn decoder_options(&self) -> Result<DecoderOptions, JpegError> {
        if let Some(json) = &self.options {
            return DecoderOptions::from_json(&parse_json(json)?);
        }

        let dither = match &self.dither {
            Some(name) => Some(DitherOptions {
                mode: DitherMode::from_name(name).ok_or_else(|| OptionError::Unsupported {
                    option: "dither",
                    message: format!("unknown dither mode {:?}", name),
                })?,
                two_pass: self.two_pass,
                colors: self.colors,
            }),
            None => None,
        };

        let opts = DecoderOptions {
            pixel_format: PixelFormat::from_name(&self.pixel_format)?,
            dither,
            without_meta: self.without_meta,
            expand_colormap: self.expand_colormap,
            with_exif_tags: self.with_exif_tags,
            apply_orientation: self.apply_orientation,
            scale: self.scale.as_deref().map(scale_from_str).transpose()?.unwrap_or_default(),
            dct_method: self
                .dct_method
                .as_deref()
                .map(dct_method_named)
                .transpose()?
                .unwrap_or_default(),
            output_gamma: self.output_gamma,
            do_fancy_upsampling: self.fancy_upsampling,
            do_smoothing: self.smoothing,
        };
        opts.validate()?;
        Ok(opts)
    }
}

#[derive(Args, Debug, Clone)]
pub struct EncodeArgs {
    /// Raw pixel file to encode.
    pub input: PathBuf,

    /// Where to write the JPEG stream.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Image width in pixels.
    #[arg(long)]
    pub width: usize,

    /// Image height in pixels.
    #[arg(long)]
    pub height: usize,

    /// Encoder options as a JSON object; replaces the flags below.
    #[arg(long, env = "EXIFPIX_ENCODE_OPTIONS")]
    pub options: Option<String>,

    /// Input pixel layout.
    #[arg(long, default_value = "YUV422", env = "EXIFPIX_PIXEL_FORMAT")]
    pub pixel_format: String,

    /// JPEG quality (0-100).
    #[arg(short, long, default_value_t = DEFAULT_QUALITY, env = "EXIFPIX_QUALITY")]
    pub quality: u8,

    /// Orientation code (1-8) to record in the output.
    #[arg(long)]
    pub orientation: Option<u16>,

    /// Bytes between the starts of two input rows.
    #[arg(long)]
    pub stride: Option<usize>,

    /// Forward DCT method (FASTEST, ISLOW, IFAST or FLOAT).
    #[arg(long)]
    pub dct_method: Option<String>,
}

impl EncodeArgs {
    /// Validated encoder options from `--options` or the individual flags.
    pub fn encoder_options(&self) -> Result<EncoderOptions, JpegError> {
        if let Some(json) = &self.options {
            return EncoderOptions::from_json(&parse_json(json)?);
        }

        let orientation = match self.orientation {
            Some(code) => Some(
                Orientation::from_code(code)
                    .ok_or_else(|| range("orientation", format!("{} outside 1..=8", code)))?,
            ),
            None => None,
        };

        let opts = EncoderOptions {
            pixel_format: PixelFormat::from_name(&self.pixel_format)?,
            quality: self.quality,
            orientation,
            stride: self.stride,
            dct_method: self
                .dct_method
                .as_deref()
                .map(dct_method_named)
                .transpose()?
                .unwrap_or_default(),
        };
        opts.validate()?;
        Ok(opts)
    }
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// JPEG files to check.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

fn parse_json(text: &str) -> Result<Value, JpegError> {
    serde_json::from_str(text).map_err(|e| type_error("options", format!("invalid JSON: {}", e)))
}

// =============================================================================
// Tests
// =============================================================================
