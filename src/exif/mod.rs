//! EXIF metadata parsing.
//!
//! An Exif APP1 payload is a small TIFF file: a header, then a chain of
//! image file directories (IFDs) whose entries either hold their value inline
//! or point at it. This module decodes that structure into a [`Document`].
//!
//! # Structure
//!
//! - IFD0 holds the primary image tags and pointers to the Exif, GPS and
//!   Interoperability sub-directories
//! - IFD1, when present, describes the embedded thumbnail
//!
//! [`parse`] walks everything; [`orientation::resolve`] only reads the
//! orientation tag from IFD0.

pub mod document;
pub mod header;
pub mod orientation;
pub mod reader;
pub mod tags;
pub mod values;

pub use document::Document;
pub use header::{ByteOrder, ExifHeader};
pub use reader::{parse, Walk, MAX_DEPTH, MAX_ENTRIES};
pub use tags::{FieldType, TagName, TagTable, EXIF_TAGS, GPS_TAGS, INTEROP_TAGS, TIFF_TAGS};
pub use values::{DirectoryEntry, Rational, Value};
