//! In-memory representation of an EXIF block.
//!
//! A [`TagStore`] maps each [`Section`] (IFD) to its tags. All four sections
//! exist from construction on, so lookups never need an existence check.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

use super::rational::Rational;
use super::tags::{self, TagFormat};

/// A directory within the EXIF block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// IFD0: tags describing the main image (make, model, file date).
    Image,
    /// The Exif sub-IFD: capture details.
    Exif,
    /// The GPS sub-IFD.
    Gps,
    /// The interoperability sub-IFD, linked from the Exif IFD.
    Interop,
}

impl Section {
    pub const ALL: [Section; 4] = [Section::Image, Section::Exif, Section::Gps, Section::Interop];

    pub fn name(self) -> &'static str {
        match self {
            Section::Image => "image",
            Section::Exif => "exif",
            Section::Gps => "gps",
            Section::Interop => "interop",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The value of a single tag.
///
/// `UInt`, `Rational`, `Bytes` and `RationalList` are the canonical shapes
/// the serializer accepts. `Text` and `List` are loose shapes that values
/// built by hand (or carried over from older tooling) may still use;
/// [`TagStore::normalize`] folds them into canonical ones.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    UInt(u32),
    Rational(Rational),
    Bytes(Vec<u8>),
    RationalList(Vec<Rational>),
    Text(String),
    List(Vec<TagValue>),
}

impl TagValue {
    /// An ASCII value.
    pub fn ascii(s: &str) -> Self {
        TagValue::Bytes(s.as_bytes().to_vec())
    }

    /// Raw bytes, for `Bytes` and `Text` values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TagValue::Bytes(b) => Some(b),
            TagValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// The value read as text, without trailing NULs or surrounding spaces.
    pub fn as_text(&self) -> Option<String> {
        let bytes = self.as_bytes()?;
        let text = String::from_utf8_lossy(bytes);
        Some(text.trim_end_matches('\0').trim().to_string())
    }

    /// The value read as a sequence of rationals, whatever its shape.
    pub fn as_rationals(&self) -> Option<Vec<Rational>> {
        match self {
            TagValue::UInt(v) => Some(vec![Rational::integer(i64::from(*v))]),
            TagValue::Rational(r) => Some(vec![*r]),
            TagValue::RationalList(list) => Some(list.clone()),
            TagValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(coerce_element(item)?);
                }
                Some(out)
            }
            TagValue::Bytes(_) | TagValue::Text(_) => None,
        }
    }

    /// The canonical form of this value, or `None` when it has no
    /// representation the serializer can write.
    fn canonical(&self) -> Option<TagValue> {
        match self {
            TagValue::UInt(v) => Some(TagValue::Rational(Rational::integer(i64::from(*v)))),
            TagValue::Rational(r) => Some(TagValue::Rational(*r)),
            TagValue::Bytes(b) if b.is_empty() => None,
            TagValue::Bytes(b) => Some(TagValue::Bytes(b.clone())),
            TagValue::Text(s) if s.is_empty() => None,
            TagValue::Text(s) => Some(TagValue::Bytes(s.as_bytes().to_vec())),
            TagValue::RationalList(_) | TagValue::List(_) => {
                let list = self.as_rationals()?;
                match list.len() {
                    0 => None,
                    1 => Some(TagValue::Rational(list[0])),
                    _ => Some(TagValue::RationalList(list)),
                }
            }
        }
    }
}

/// One element of a list, coerced to a rational.
fn coerce_element(value: &TagValue) -> Option<Rational> {
    match value {
        TagValue::UInt(v) => Some(Rational::integer(i64::from(*v))),
        TagValue::Rational(r) => Some(*r),
        TagValue::RationalList(list) if list.len() == 1 => Some(list[0]),
        TagValue::List(items) if items.len() == 1 => coerce_element(&items[0]),
        _ => None,
    }
}

/// Tags of an EXIF block, grouped by section.
///
/// The store also remembers the wire format each parsed tag had, so the
/// serializer can write untouched tags back the way it found them. That
/// bookkeeping does not take part in equality.
#[derive(Debug, Clone)]
pub struct TagStore {
    sections: IndexMap<Section, IndexMap<u16, TagValue>>,
    formats: HashMap<(Section, u16), TagFormat>,
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for TagStore {
    fn eq(&self, other: &Self) -> bool {
        self.sections == other.sections
    }
}

impl TagStore {
    /// An empty store with every section present.
    pub fn new() -> Self {
        let sections = Section::ALL
            .iter()
            .map(|s| (*s, IndexMap::new()))
            .collect();
        Self {
            sections,
            formats: HashMap::new(),
        }
    }

    pub fn get(&self, section: Section, tag: u16) -> Option<&TagValue> {
        self.sections.get(&section).and_then(|tags| tags.get(&tag))
    }

    /// Insert or replace a tag. A replaced value's wire format is
    /// forgotten, so the new value is written with the tag's standard one.
    pub fn set(&mut self, section: Section, tag: u16, value: TagValue) {
        self.formats.remove(&(section, tag));
        self.sections.entry(section).or_default().insert(tag, value);
    }

    /// Remove a tag. Removing an absent tag is a no-op.
    pub fn remove(&mut self, section: Section, tag: u16) -> Option<TagValue> {
        self.formats.remove(&(section, tag));
        self.sections
            .get_mut(&section)
            .and_then(|tags| tags.shift_remove(&tag))
    }

    pub fn contains(&self, section: Section, tag: u16) -> bool {
        self.get(section, tag).is_some()
    }

    /// The tags of one section, in insertion order.
    pub fn section(&self, section: Section) -> impl Iterator<Item = (u16, &TagValue)> {
        self.sections
            .get(&section)
            .into_iter()
            .flat_map(|tags| tags.iter().map(|(t, v)| (*t, v)))
    }

    pub fn section_len(&self, section: Section) -> usize {
        self.sections.get(&section).map_or(0, IndexMap::len)
    }

    /// Total number of tags across all sections.
    pub fn len(&self) -> usize {
        self.sections.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text of a tag, if it holds bytes.
    pub fn text(&self, section: Section, tag: u16) -> Option<String> {
        self.get(section, tag).and_then(TagValue::as_text)
    }

    /// The wire format a tag was read with, if it came from a parsed block.
    pub fn format_hint(&self, section: Section, tag: u16) -> Option<TagFormat> {
        self.formats.get(&(section, tag)).copied()
    }

    pub(crate) fn set_format_hint(&mut self, section: Section, tag: u16, format: TagFormat) {
        self.formats.insert((section, tag), format);
    }

    /// Coerce every value into a canonical shape and drop tags that must
    /// not be written back.
    ///
    /// - `UInt(v)` becomes `Rational(v/1)`
    /// - `Text` becomes UTF-8 `Bytes`
    /// - single-element lists become a scalar `Rational`
    /// - other lists become a `RationalList`, element by element
    ///
    /// Empty byte strings and lists carry nothing and are dropped. Lists
    /// with a non-numeric element cannot be coerced and are dropped
    /// with a warning, as is the maker note blob, whose internal offsets do
    /// not survive a rewrite. Calling this twice is the same as calling it
    /// once.
    pub fn normalize(&mut self) {
        let mut dropped = Vec::new();

        for (section, tags) in self.sections.iter_mut() {
            tags.retain(|tag, value| match value.canonical() {
                Some(canonical) => {
                    *value = canonical;
                    true
                }
                None => {
                    log::warn!("Dropping {section} tag 0x{tag:04X}: value {value:?} cannot be normalized");
                    dropped.push((*section, *tag));
                    false
                }
            });
        }

        if self.remove(Section::Exif, tags::MAKER_NOTE).is_some() {
            log::debug!("Dropped maker note");
        }

        for key in dropped {
            self.formats.remove(&key);
        }
    }
}
