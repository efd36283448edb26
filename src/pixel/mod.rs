//! Raw pixel handling: wire layouts, row transcoding, orientation and palettes.

pub mod format;
pub mod palette;
pub mod transcode;
pub mod transform;

pub use format::{ColorSpace, PixelFormat};
pub use palette::Palette;
pub use transcode::{pack_rows, swap_chroma, unpack_rows, RowLayout};
pub use transform::{Orientation, OrientationFlags, OrientationTransformer, PixelBuffer};
