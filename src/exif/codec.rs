//! TIFF-structured EXIF block ↔ [`TagStore`].
//!
//! Parsing accepts both byte orders and an optional `Exif\0\0` prefix.
//! Serialization always produces a big-endian block without the prefix:
//!
//! ```text
//! "MM" 0x002A 0x00000008
//! IFD0    [entries sorted by tag][next = 0][out-of-line values]
//! Exif    (only when non-empty, or when Interop is written)
//! GPS     (only when non-empty)
//! Interop (only when non-empty)
//! ```
//!
//! Each IFD entry is 12 bytes: tag (2), type (2), count (4), value or
//! offset (4). Values of 4 bytes or less are stored inline, left-aligned.
//! The embedded thumbnail directory (IFD1) is never carried over.

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use std::collections::HashSet;
use std::io;
use std::marker::PhantomData;

use super::rational::Rational;
use super::store::{Section, TagStore, TagValue};
use super::tags::{self, TagFormat};

/// APP1 payload prefix preceding the TIFF structure in JPEG files.
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Upper bound on entries per directory; anything above is garbage.
const MAX_IFD_TAGS: usize = 1000;

const TIFF_HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 12;

/// A metadata block that cannot be read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("metadata block too short ({0} bytes)")]
    TooShort(usize),
    #[error("invalid byte order marker")]
    BadByteOrder,
    #[error("invalid TIFF magic number {0:#06x}")]
    BadMagic(u16),
    #[error("{what} at offset {offset} is out of bounds")]
    OutOfBounds { what: &'static str, offset: usize },
    #[error("directory at offset {offset} declares {count} entries")]
    TooManyEntries { offset: usize, count: usize },
}

/// A store that cannot be written.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("{section} tag 0x{tag:04X} holds a {shape} value; normalize the store before writing")]
    NotNormalized {
        section: Section,
        tag: u16,
        shape: &'static str,
    },
    #[error("{section} tag 0x{tag:04X}: no EXIF type can represent this value")]
    Unrepresentable { section: Section, tag: u16 },
    #[error("metadata block exceeds the 4 GiB offset range")]
    TooLarge,
    #[error("failed to build metadata block: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a raw EXIF block.
///
/// Entries with an unknown type or a value pointing outside the block are
/// skipped. A broken sub-directory is skipped as a whole; a broken header
/// or IFD0 fails the parse.
pub fn parse(raw: &[u8]) -> Result<TagStore, ParseError> {
    let data = raw.strip_prefix(EXIF_HEADER).unwrap_or(raw);
    if data.len() < TIFF_HEADER_LEN {
        return Err(ParseError::TooShort(data.len()));
    }

    match &data[0..2] {
        b"II" => IfdReader::<LittleEndian>::new(data).read(),
        b"MM" => IfdReader::<BigEndian>::new(data).read(),
        _ => Err(ParseError::BadByteOrder),
    }
}

/// Parse a block that may be missing or corrupt.
///
/// Never fails: an absent block and an unreadable one both yield an empty
/// store, so an image with broken metadata can still be edited.
pub fn parse_or_empty(raw: Option<&[u8]>) -> TagStore {
    match raw {
        None => TagStore::new(),
        Some(bytes) if bytes.is_empty() => TagStore::new(),
        Some(bytes) => parse(bytes).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable metadata block: {e}");
            TagStore::new()
        }),
    }
}

struct IfdReader<'a, B: ByteOrder> {
    data: &'a [u8],
    visited: HashSet<usize>,
    _order: PhantomData<B>,
}

impl<'a, B: ByteOrder> IfdReader<'a, B> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            visited: HashSet::new(),
            _order: PhantomData,
        }
    }

    fn read(mut self) -> Result<TagStore, ParseError> {
        let magic = B::read_u16(&self.data[2..4]);
        if magic != 42 {
            return Err(ParseError::BadMagic(magic));
        }
        let ifd0 = B::read_u32(&self.data[4..8]) as usize;

        let mut store = TagStore::new();
        let pointers = self.read_ifd(ifd0, Section::Image, &mut store)?;

        for (tag, offset) in pointers {
            let section = match tag {
                tags::EXIF_IFD_POINTER => Section::Exif,
                tags::GPS_IFD_POINTER => Section::Gps,
                _ => continue,
            };
            match self.read_ifd(offset, section, &mut store) {
                Ok(nested) => {
                    for (tag, offset) in nested {
                        if tag == tags::INTEROP_IFD_POINTER {
                            if let Err(e) = self.read_ifd(offset, Section::Interop, &mut store) {
                                log::warn!("Skipping unreadable interop directory: {e}");
                            }
                        }
                    }
                }
                Err(e) => log::warn!("Skipping unreadable {section} directory: {e}"),
            }
        }

        Ok(store)
    }

    fn slice(&self, offset: usize, len: usize, what: &'static str) -> Result<&'a [u8], ParseError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(ParseError::OutOfBounds { what, offset })
    }

    /// Read one directory into `store`, returning the sub-IFD pointers it
    /// contains as `(tag, offset)`.
    fn read_ifd(
        &mut self,
        offset: usize,
        section: Section,
        store: &mut TagStore,
    ) -> Result<Vec<(u16, usize)>, ParseError> {
        if !self.visited.insert(offset) {
            log::warn!("Directory at offset {offset} is referenced twice, ignoring");
            return Ok(Vec::new());
        }

        let count = B::read_u16(self.slice(offset, 2, "directory")?) as usize;
        if count > MAX_IFD_TAGS {
            return Err(ParseError::TooManyEntries { offset, count });
        }
        let entries = self.slice(offset + 2, count * ENTRY_LEN, "directory entries")?;

        let mut pointers = Vec::new();
        for entry in entries.chunks_exact(ENTRY_LEN) {
            let tag = B::read_u16(&entry[0..2]);
            let type_code = B::read_u16(&entry[2..4]);
            let count = B::read_u32(&entry[4..8]) as usize;
            let value_field = &entry[8..12];

            if tags::is_pointer(section, tag) {
                pointers.push((tag, B::read_u32(value_field) as usize));
                continue;
            }

            let Some(format) = TagFormat::from_code(type_code) else {
                log::debug!("Skipping {section} tag 0x{tag:04X} with unknown type {type_code}");
                continue;
            };

            let Some(size) = count.checked_mul(format.unit_size()) else {
                log::warn!("Skipping {section} tag 0x{tag:04X}: count {count} overflows");
                continue;
            };
            let raw = if size <= 4 {
                &value_field[..size]
            } else {
                let value_offset = B::read_u32(value_field) as usize;
                match self.slice(value_offset, size, "tag value") {
                    Ok(raw) => raw,
                    Err(e) => {
                        log::warn!("Skipping {section} tag 0x{tag:04X}: {e}");
                        continue;
                    }
                }
            };

            if let Some(value) = decode_value::<B>(format, count, raw) {
                store.set(section, tag, value);
                store.set_format_hint(section, tag, format);
            }
        }

        Ok(pointers)
    }
}

fn decode_value<B: ByteOrder>(format: TagFormat, count: usize, raw: &[u8]) -> Option<TagValue> {
    if count == 0 {
        return None;
    }

    let rationals: Vec<Rational> = match format {
        TagFormat::Ascii => {
            let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            return Some(TagValue::Bytes(raw[..end].to_vec()));
        }
        TagFormat::Byte | TagFormat::SByte | TagFormat::Undefined => {
            return Some(TagValue::Bytes(raw.to_vec()));
        }
        TagFormat::Float | TagFormat::Double => {
            // Kept as big-endian element bytes, the order we write in.
            let unit = format.unit_size();
            let mut bytes = raw.to_vec();
            if B::read_u16(&[0, 1]) != 1 {
                for chunk in bytes.chunks_exact_mut(unit) {
                    chunk.reverse();
                }
            }
            return Some(TagValue::Bytes(bytes));
        }
        TagFormat::Short => {
            let values: Vec<u16> = raw.chunks_exact(2).map(B::read_u16).collect();
            if let [single] = values[..] {
                return Some(TagValue::UInt(u32::from(single)));
            }
            values.into_iter().map(|v| Rational::integer(i64::from(v))).collect()
        }
        TagFormat::Long => {
            let values: Vec<u32> = raw.chunks_exact(4).map(B::read_u32).collect();
            if let [single] = values[..] {
                return Some(TagValue::UInt(single));
            }
            values.into_iter().map(|v| Rational::integer(i64::from(v))).collect()
        }
        TagFormat::SShort => raw
            .chunks_exact(2)
            .map(|c| Rational::integer(i64::from(B::read_i16(c))))
            .collect(),
        TagFormat::SLong => raw
            .chunks_exact(4)
            .map(|c| Rational::integer(i64::from(B::read_i32(c))))
            .collect(),
        TagFormat::Rational => raw
            .chunks_exact(8)
            .map(|c| Rational::new(i64::from(B::read_u32(&c[0..4])), i64::from(B::read_u32(&c[4..8]))))
            .collect(),
        TagFormat::SRational => raw
            .chunks_exact(8)
            .map(|c| Rational::new(i64::from(B::read_i32(&c[0..4])), i64::from(B::read_i32(&c[4..8]))))
            .collect(),
    };

    match rationals.len() {
        0 => None,
        1 => Some(TagValue::Rational(rationals[0])),
        _ => Some(TagValue::RationalList(rationals)),
    }
}

// ============================================================================
// Serialization
// ============================================================================

/// One encoded directory entry.
struct Entry {
    tag: u16,
    format: TagFormat,
    count: u32,
    data: Vec<u8>,
}

impl Entry {
    fn pointer(tag: u16) -> Self {
        Self {
            tag,
            format: TagFormat::Long,
            count: 1,
            data: vec![0; 4],
        }
    }

    /// Bytes this entry occupies in the value area after its directory.
    fn out_of_line_len(&self) -> usize {
        if self.data.len() > 4 {
            self.data.len() + self.data.len() % 2
        } else {
            0
        }
    }
}

struct Directory {
    section: Section,
    entries: Vec<Entry>,
}

impl Directory {
    fn len(&self) -> usize {
        2 + self.entries.len() * ENTRY_LEN + 4 + self.entries.iter().map(Entry::out_of_line_len).sum::<usize>()
    }

    fn set_pointer(&mut self, tag: u16, offset: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.data = offset.to_be_bytes().to_vec();
        }
    }
}

/// Encode a store as a big-endian TIFF block, ready to be embedded in an
/// image container.
///
/// The store must be normalized first (see [`TagStore::normalize`]).
/// Each tag is written with the format it was parsed with when the value
/// still fits it, otherwise with its standard EXIF format, otherwise with a
/// format inferred from the value.
pub fn serialize(store: &TagStore) -> Result<Vec<u8>, EncodeError> {
    let mut encoded = Vec::with_capacity(Section::ALL.len());
    for section in Section::ALL {
        encoded.push((section, encode_section(store, section)?));
    }
    // Pointers follow the directories actually written, not the store:
    // a section whose tags all encode to nothing gets neither.
    let emitted = |section: Section| {
        encoded
            .iter()
            .any(|(s, entries)| *s == section && !entries.is_empty())
    };
    let has_interop = emitted(Section::Interop);
    let has_exif = emitted(Section::Exif) || has_interop;
    let has_gps = emitted(Section::Gps);

    let mut directories: Vec<Directory> = Vec::new();
    for (section, mut entries) in encoded {
        match section {
            Section::Image => {
                if has_exif {
                    entries.push(Entry::pointer(tags::EXIF_IFD_POINTER));
                }
                if has_gps {
                    entries.push(Entry::pointer(tags::GPS_IFD_POINTER));
                }
            }
            Section::Exif if has_interop => {
                entries.push(Entry::pointer(tags::INTEROP_IFD_POINTER));
            }
            _ => {}
        }
        if entries.is_empty() && section != Section::Image {
            continue;
        }
        entries.sort_by_key(|e| e.tag);
        directories.push(Directory { section, entries });
    }

    // Directories are laid out back to back, each followed by its values.
    let mut offsets = Vec::with_capacity(directories.len());
    let mut next = TIFF_HEADER_LEN;
    for dir in &directories {
        offsets.push(next);
        next += dir.len();
    }
    if next > u32::MAX as usize {
        return Err(EncodeError::TooLarge);
    }
    let offset_of = |section: Section| {
        directories
            .iter()
            .position(|d| d.section == section)
            .map(|i| offsets[i] as u32)
    };
    let exif_offset = offset_of(Section::Exif);
    let gps_offset = offset_of(Section::Gps);
    let interop_offset = offset_of(Section::Interop);

    for dir in directories.iter_mut() {
        match dir.section {
            Section::Image => {
                if let Some(offset) = exif_offset {
                    dir.set_pointer(tags::EXIF_IFD_POINTER, offset);
                }
                if let Some(offset) = gps_offset {
                    dir.set_pointer(tags::GPS_IFD_POINTER, offset);
                }
            }
            Section::Exif => {
                if let Some(offset) = interop_offset {
                    dir.set_pointer(tags::INTEROP_IFD_POINTER, offset);
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::with_capacity(next);
    out.extend_from_slice(b"MM");
    out.write_u16::<BigEndian>(42)?;
    out.write_u32::<BigEndian>(TIFF_HEADER_LEN as u32)?;
    for (dir, offset) in directories.iter().zip(&offsets) {
        write_directory(&mut out, dir, *offset)?;
    }

    log::debug!(
        "Serialized {} tags in {} directories ({} bytes)",
        store.len(),
        directories.len(),
        out.len()
    );
    Ok(out)
}

fn write_directory(out: &mut Vec<u8>, dir: &Directory, offset: usize) -> io::Result<()> {
    let mut value_offset = offset + 2 + dir.entries.len() * ENTRY_LEN + 4;

    out.write_u16::<BigEndian>(dir.entries.len() as u16)?;
    for entry in &dir.entries {
        out.write_u16::<BigEndian>(entry.tag)?;
        out.write_u16::<BigEndian>(entry.format.code())?;
        out.write_u32::<BigEndian>(entry.count)?;
        if entry.data.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&inline);
        } else {
            out.write_u32::<BigEndian>(value_offset as u32)?;
            value_offset += entry.out_of_line_len();
        }
    }
    // No IFD1.
    out.write_u32::<BigEndian>(0)?;

    for entry in dir.entries.iter().filter(|e| e.data.len() > 4) {
        out.extend_from_slice(&entry.data);
        if entry.data.len() % 2 == 1 {
            out.push(0);
        }
    }
    Ok(())
}

fn encode_section(store: &TagStore, section: Section) -> Result<Vec<Entry>, EncodeError> {
    let mut entries = Vec::new();
    for (tag, value) in store.section(section) {
        if tags::is_pointer(section, tag) {
            continue;
        }
        let shape = match value {
            TagValue::Text(_) => Some("text"),
            TagValue::List(_) => Some("list"),
            _ => None,
        };
        if let Some(shape) = shape {
            return Err(EncodeError::NotNormalized { section, tag, shape });
        }

        let format = choose_format(value, store.format_hint(section, tag), tags::known_format(section, tag))
            .ok_or(EncodeError::Unrepresentable { section, tag })?;
        let entry = encode_entry(tag, format, value)?;
        if entry.count == 0 {
            log::debug!("Skipping empty {section} tag 0x{tag:04X}");
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Numeric view of a value, for the integer and rational formats.
fn numbers(value: &TagValue) -> Option<Vec<Rational>> {
    match value {
        TagValue::UInt(v) => Some(vec![Rational::integer(i64::from(*v))]),
        TagValue::Rational(r) => Some(vec![*r]),
        TagValue::RationalList(list) => Some(list.clone()),
        _ => None,
    }
}

fn fits(format: TagFormat, value: &TagValue) -> bool {
    if let TagValue::Bytes(bytes) = value {
        return format.is_byte_like() && bytes.len() % format.unit_size() == 0;
    }
    let Some(numbers) = numbers(value) else {
        return false;
    };
    let whole_in = |lo: i64, hi: i64| numbers.iter().all(|r| r.den == 1 && (lo..=hi).contains(&r.num));
    let parts_in = |lo: i64, hi: i64| {
        numbers
            .iter()
            .all(|r| (lo..=hi).contains(&r.num) && (lo..=hi).contains(&r.den))
    };
    match format {
        TagFormat::Byte => whole_in(0, i64::from(u8::MAX)),
        TagFormat::SByte => whole_in(i64::from(i8::MIN), i64::from(i8::MAX)),
        TagFormat::Short => whole_in(0, i64::from(u16::MAX)),
        TagFormat::SShort => whole_in(i64::from(i16::MIN), i64::from(i16::MAX)),
        TagFormat::Long => whole_in(0, i64::from(u32::MAX)),
        TagFormat::SLong => whole_in(i64::from(i32::MIN), i64::from(i32::MAX)),
        TagFormat::Rational => parts_in(0, i64::from(u32::MAX)),
        TagFormat::SRational => parts_in(i64::from(i32::MIN), i64::from(i32::MAX)),
        TagFormat::Ascii | TagFormat::Undefined | TagFormat::Float | TagFormat::Double => false,
    }
}

fn choose_format(value: &TagValue, hint: Option<TagFormat>, known: Option<TagFormat>) -> Option<TagFormat> {
    if let Some(format) = [hint, known].into_iter().flatten().find(|f| fits(*f, value)) {
        return Some(format);
    }
    let inferred = match value {
        TagValue::Bytes(_) => TagFormat::Undefined,
        TagValue::UInt(_) => TagFormat::Long,
        _ => TagFormat::Rational,
    };
    [inferred, TagFormat::SRational].into_iter().find(|f| fits(*f, value))
}

fn encode_entry(tag: u16, format: TagFormat, value: &TagValue) -> Result<Entry, EncodeError> {
    let mut data = Vec::new();
    let count;

    if let TagValue::Bytes(bytes) = value {
        data.extend_from_slice(bytes);
        if format == TagFormat::Ascii {
            data.push(0);
        }
        count = data.len() / format.unit_size();
    } else {
        let numbers = numbers(value).unwrap_or_default();
        for r in &numbers {
            match format {
                TagFormat::Byte => data.write_u8(r.num as u8)?,
                TagFormat::SByte => data.write_i8(r.num as i8)?,
                TagFormat::Short => data.write_u16::<BigEndian>(r.num as u16)?,
                TagFormat::SShort => data.write_i16::<BigEndian>(r.num as i16)?,
                TagFormat::Long => data.write_u32::<BigEndian>(r.num as u32)?,
                TagFormat::SLong => data.write_i32::<BigEndian>(r.num as i32)?,
                TagFormat::Rational => {
                    data.write_u32::<BigEndian>(r.num as u32)?;
                    data.write_u32::<BigEndian>(r.den as u32)?;
                }
                TagFormat::SRational => {
                    data.write_i32::<BigEndian>(r.num as i32)?;
                    data.write_i32::<BigEndian>(r.den as i32)?;
                }
                TagFormat::Ascii | TagFormat::Undefined | TagFormat::Float | TagFormat::Double => {}
            }
        }
        count = numbers.len();
    }

    let count = u32::try_from(count).map_err(|_| EncodeError::TooLarge)?;
    Ok(Entry {
        tag,
        format,
        count,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(num: i64, den: i64) -> Rational {
        Rational::new(num, den)
    }

    fn sample_store() -> TagStore {
        let mut store = TagStore::new();
        store.set(Section::Image, tags::MAKE, TagValue::ascii("Canon"));
        store.set(Section::Image, tags::MODEL, TagValue::ascii("Canon EOS R5"));
        store.set(Section::Image, tags::ORIENTATION, TagValue::UInt(1));
        store.set(Section::Image, tags::X_RESOLUTION, TagValue::Rational(r(72, 1)));
        store.set(Section::Image, tags::DATE_TIME, TagValue::ascii("2024:03:05 10:00:00"));
        store.set(Section::Exif, tags::DATE_TIME_ORIGINAL, TagValue::ascii("2024:03:05 10:00:00"));
        store.set(Section::Exif, tags::EXPOSURE_TIME, TagValue::Rational(r(1, 250)));
        store.set(Section::Exif, tags::EXIF_VERSION, TagValue::Bytes(b"0232".to_vec()));
        store.set(Section::Exif, 0x9204, TagValue::Rational(r(-1, 3))); // ExposureBias
        store.set(Section::Gps, tags::GPS_VERSION_ID, TagValue::Bytes(vec![2, 3, 0, 0]));
        store.set(Section::Gps, tags::GPS_LATITUDE_REF, TagValue::ascii("N"));
        store.set(
            Section::Gps,
            tags::GPS_LATITUDE,
            TagValue::RationalList(vec![r(48, 1), r(51, 1), r(237_600, 10_000)]),
        );
        store.set(Section::Interop, tags::INTEROP_INDEX, TagValue::ascii("R98"));
        store
    }

    /// Minimal little-endian block: IFD0 with Make and a GPS pointer,
    /// GPS IFD with a latitude reference.
    fn little_endian_block() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"II");
        b.extend_from_slice(&42u16.to_le_bytes());
        b.extend_from_slice(&8u32.to_le_bytes());
        // IFD0 at 8: 2 entries, ends at 8 + 2 + 24 + 4 = 38
        b.extend_from_slice(&2u16.to_le_bytes());
        // Make "Sony\0" (5 bytes, out of line at 38)
        b.extend_from_slice(&tags::MAKE.to_le_bytes());
        b.extend_from_slice(&2u16.to_le_bytes());
        b.extend_from_slice(&5u32.to_le_bytes());
        b.extend_from_slice(&38u32.to_le_bytes());
        // GPS pointer -> 44
        b.extend_from_slice(&tags::GPS_IFD_POINTER.to_le_bytes());
        b.extend_from_slice(&4u16.to_le_bytes());
        b.extend_from_slice(&1u32.to_le_bytes());
        b.extend_from_slice(&44u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        // value area
        b.extend_from_slice(b"Sony\0\0");
        // GPS IFD at 44: one entry
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&tags::GPS_LATITUDE_REF.to_le_bytes());
        b.extend_from_slice(&2u16.to_le_bytes());
        b.extend_from_slice(&2u32.to_le_bytes());
        b.extend_from_slice(b"S\0\0\0");
        b.extend_from_slice(&0u32.to_le_bytes());
        b
    }

    #[test]
    fn round_trip_preserves_store() {
        let mut store = sample_store();
        store.normalize();

        let bytes = serialize(&store).unwrap();
        let mut parsed = parse(&bytes).unwrap();
        parsed.normalize();

        assert_eq!(parsed, store);
    }

    #[test]
    fn output_is_big_endian_tiff() {
        let mut store = sample_store();
        store.normalize();
        let bytes = serialize(&store).unwrap();
        assert_eq!(&bytes[0..8], b"MM\0\x2A\0\0\0\x08");
    }

    #[test]
    fn ascii_written_with_single_nul() {
        let mut store = TagStore::new();
        store.set(Section::Image, tags::MAKE, TagValue::ascii("Canon"));
        let bytes = serialize(&store).unwrap();

        // IFD0: count, then the Make entry
        assert_eq!(&bytes[8..10], &[0, 1]);
        assert_eq!(&bytes[10..12], &tags::MAKE.to_be_bytes());
        assert_eq!(&bytes[12..14], &2u16.to_be_bytes());
        assert_eq!(&bytes[14..18], &6u32.to_be_bytes());
        // value area starts right after the directory
        let value_offset = u32::from_be_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]) as usize;
        assert_eq!(value_offset, 8 + 2 + 12 + 4);
        assert_eq!(&bytes[value_offset..value_offset + 6], b"Canon\0");
    }

    #[test]
    fn entries_sorted_by_tag() {
        let mut store = TagStore::new();
        store.set(Section::Image, tags::DATE_TIME, TagValue::ascii("2024:01:01 00:00:00"));
        store.set(Section::Image, tags::MAKE, TagValue::ascii("A"));
        store.set(Section::Image, tags::ORIENTATION, TagValue::Rational(r(1, 1)));
        let bytes = serialize(&store).unwrap();

        let tags_written: Vec<u16> = (0..3)
            .map(|i| {
                let at = 10 + i * ENTRY_LEN;
                u16::from_be_bytes([bytes[at], bytes[at + 1]])
            })
            .collect();
        assert_eq!(tags_written, vec![tags::MAKE, tags::ORIENTATION, tags::DATE_TIME]);
    }

    #[test]
    fn integer_tags_keep_integer_format() {
        let mut store = TagStore::new();
        store.set(Section::Image, tags::ORIENTATION, TagValue::UInt(6));
        store.normalize();
        let bytes = serialize(&store).unwrap();
        // type SHORT, value inline
        assert_eq!(&bytes[12..14], &3u16.to_be_bytes());
        assert_eq!(&bytes[18..20], &6u16.to_be_bytes());
    }

    #[test]
    fn empty_store_gives_bare_ifd0() {
        let bytes = serialize(&TagStore::new()).unwrap();
        assert_eq!(bytes.len(), 8 + 2 + 4);
        let parsed = parse(&bytes).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn parses_little_endian_with_exif_prefix() {
        let mut raw = EXIF_HEADER.to_vec();
        raw.extend_from_slice(&little_endian_block());
        let store = parse(&raw).unwrap();

        assert_eq!(store.text(Section::Image, tags::MAKE).as_deref(), Some("Sony"));
        assert_eq!(store.text(Section::Gps, tags::GPS_LATITUDE_REF).as_deref(), Some("S"));
        assert!(!store.contains(Section::Image, tags::GPS_IFD_POINTER));
        assert_eq!(store.format_hint(Section::Image, tags::MAKE), Some(TagFormat::Ascii));
    }

    #[test]
    fn little_endian_input_reencodes() {
        let mut store = parse(&little_endian_block()).unwrap();
        store.normalize();
        let mut again = parse(&serialize(&store).unwrap()).unwrap();
        again.normalize();
        assert_eq!(again, store);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse(b"MM"), Err(ParseError::TooShort(2)));
        assert_eq!(parse(b"XX\0\x2A\0\0\0\x08"), Err(ParseError::BadByteOrder));
        assert_eq!(parse(b"MM\0\x2B\0\0\0\x08"), Err(ParseError::BadMagic(0x2B)));
        assert!(matches!(
            parse(b"MM\0\x2A\0\0\xFF\xFF"),
            Err(ParseError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn rejects_oversized_directory() {
        let mut raw = b"MM\0\x2A\0\0\0\x08".to_vec();
        raw.extend_from_slice(&2000u16.to_be_bytes());
        assert_eq!(
            parse(&raw),
            Err(ParseError::TooManyEntries { offset: 8, count: 2000 })
        );
    }

    #[test]
    fn parse_or_empty_recovers() {
        assert!(parse_or_empty(None).is_empty());
        assert!(parse_or_empty(Some(b"")).is_empty());
        let store = parse_or_empty(Some(b"definitely not exif"));
        assert!(store.is_empty());
        assert_eq!(store.section_len(Section::Gps), 0);
    }

    #[test]
    fn skips_entry_pointing_outside_block() {
        let mut raw = b"MM\0\x2A\0\0\0\x08".to_vec();
        raw.extend_from_slice(&1u16.to_be_bytes());
        raw.extend_from_slice(&tags::MAKE.to_be_bytes());
        raw.extend_from_slice(&2u16.to_be_bytes());
        raw.extend_from_slice(&40u32.to_be_bytes());
        raw.extend_from_slice(&0xFFFFu32.to_be_bytes());
        raw.extend_from_slice(&0u32.to_be_bytes());

        let store = parse(&raw).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn refuses_unnormalized_values() {
        let mut store = TagStore::new();
        store.set(Section::Image, tags::MAKE, TagValue::Text("Canon".into()));
        assert!(matches!(serialize(&store), Err(EncodeError::NotNormalized { .. })));
    }

    #[test]
    fn refuses_out_of_range_rationals() {
        let mut store = TagStore::new();
        store.set(Section::Exif, 0x9999, TagValue::Rational(r(i64::MAX, 1)));
        assert!(matches!(serialize(&store), Err(EncodeError::Unrepresentable { .. })));
    }

    #[test]
    fn interop_forces_exif_directory() {
        let mut store = TagStore::new();
        store.set(Section::Interop, tags::INTEROP_INDEX, TagValue::ascii("R98"));
        let parsed = parse(&serialize(&store).unwrap()).unwrap();
        assert_eq!(parsed.text(Section::Interop, tags::INTEROP_INDEX).as_deref(), Some("R98"));
        assert_eq!(parsed.section_len(Section::Exif), 0);
    }

    #[test]
    fn section_with_only_empty_values_gets_no_pointer() {
        let mut store = TagStore::new();
        store.set(Section::Image, tags::MAKE, TagValue::ascii("Canon"));
        store.set(Section::Gps, tags::GPS_VERSION_ID, TagValue::Bytes(Vec::new()));
        store.set(Section::Exif, tags::USER_COMMENT, TagValue::Bytes(Vec::new()));

        // Without normalizing, the empty values are skipped at encode time.
        let bytes = serialize(&store).unwrap();
        assert_eq!(&bytes[8..10], &[0, 1]);
        assert_eq!(&bytes[10..12], &tags::MAKE.to_be_bytes());
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.section_len(Section::Gps), 0);
        assert_eq!(parsed.section_len(Section::Exif), 0);

        // Normalizing drops them, so the round trip is exact.
        store.normalize();
        assert_eq!(store.section_len(Section::Gps), 0);
        let mut parsed = parse(&serialize(&store).unwrap()).unwrap();
        parsed.normalize();
        assert_eq!(parsed, store);
    }

    #[test]
    fn empty_interop_value_does_not_force_exif_directory() {
        let mut store = TagStore::new();
        store.set(Section::Interop, 0x0099, TagValue::Bytes(Vec::new()));
        let bytes = serialize(&store).unwrap();
        assert_eq!(bytes.len(), 8 + 2 + 4);
    }

    #[test]
    fn fresh_value_is_not_written_with_stale_format() {
        let mut store = TagStore::new();
        store.set(Section::Exif, tags::DATE_TIME_ORIGINAL, TagValue::ascii("2020:01:01 00:00:00"));
        store.set_format_hint(Section::Exif, tags::DATE_TIME_ORIGINAL, TagFormat::Undefined);
        store.set(Section::Exif, tags::DATE_TIME_ORIGINAL, TagValue::ascii("2024:03:05 10:00:00"));

        let parsed = parse(&serialize(&store).unwrap()).unwrap();
        assert_eq!(
            parsed.format_hint(Section::Exif, tags::DATE_TIME_ORIGINAL),
            Some(TagFormat::Ascii)
        );
        assert_eq!(
            parsed.get(Section::Exif, tags::DATE_TIME_ORIGINAL),
            Some(&TagValue::Bytes(b"2024:03:05 10:00:00".to_vec()))
        );
    }
}
