//! Ordered tag-name → value mapping produced by the IFD reader.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::values::Value;

/// Key of the Exif sub-directory
pub const KEY_EXIF: &str = "exif";

/// Key of the GPS sub-directory
pub const KEY_GPS: &str = "gps";

/// Key of the Interoperability sub-directory
pub const KEY_INTEROPERABILITY: &str = "interoperability";

/// Key of the IFD1 document in the root document
pub const KEY_THUMBNAIL: &str = "thumbnail";

/// Key of the raw thumbnail bytes inside the thumbnail document
pub const KEY_JPEG_INTERCHANGE: &str = "jpeg_interchange";

/// An ordered mapping from tag name to decoded value.
///
/// Keys keep their first insertion position. Inserting an existing key
/// replaces its value in place, so a tag repeated within one directory ends
/// up holding the last value read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(Cow<'static, str>, Value)>,
    /// Position of every key in `entries`
    index: HashMap<Cow<'static, str>, usize>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the previous value for `key`, if any.
    pub fn insert(&mut self, key: impl Into<Cow<'static, str>>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.position(&key) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|idx| &self.entries[idx].1)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.index.remove(key)?;
        let (_, value) = self.entries.remove(idx);
        for (k, _) in &self.entries[idx..] {
            if let Some(pos) = self.index.get_mut(k.as_ref()) {
                *pos -= 1;
            }
        }
        Some(value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Nested document stored under `key`.
    pub fn document(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(Value::as_document)
    }

    /// Integer value stored under `key`.
    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_integer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key.as_ref(), value)?;
        }
        map.end()
    }
}
