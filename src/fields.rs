//! User-facing fields ↔ EXIF tags.
//!
//! The editor exposes four text fields: file name, capture date, latitude
//! and longitude. An empty field means "remove this data"; a field that
//! does not parse is an error and nothing is written.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{EditError, Result};
use crate::exif::rational::{decimal_to_dms, dms_to_decimal, is_valid_dms, Sign};
use crate::exif::store::{Section, TagStore, TagValue};
use crate::exif::tags;

/// Date format strings (chrono `strftime` syntax).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateFormats {
    /// Layout written into the EXIF date tags.
    pub storage: String,
    /// Layout used when showing a date to the user.
    pub display: String,
    /// Input layouts, tried in order; the first that matches wins.
    pub accepted: Vec<String>,
}

impl Default for DateFormats {
    fn default() -> Self {
        let accepted = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H-%M-%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%d %H-%M",
            "%Y-%m-%d",
            "%Y:%m:%d %H:%M:%S",
            "%Y:%m:%d %H-%M-%S",
            "%Y:%m:%d %H:%M",
            "%Y:%m:%d %H-%M",
            "%Y:%m:%d",
            "%d/%m/%Y %H-%M-%S",
            "%d/%m/%Y %H:%M:%S",
            "%d/%m/%Y %H:%M",
            "%d/%m/%Y %H-%M",
            "%d/%m/%Y",
        ];
        Self {
            storage: "%Y:%m:%d %H:%M:%S".to_string(),
            display: "%Y-%m-%d %H:%M:%S".to_string(),
            accepted: accepted.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A validated change to the capture date.
#[derive(Debug, Clone, PartialEq)]
pub enum DateEdit {
    /// Remove all date tags.
    Delete,
    /// Write this value (already in storage format) to all date tags.
    Set(String),
}

impl DateFormats {
    /// Validate date input and convert it to storage format.
    ///
    /// Surrounding whitespace is ignored and empty input means deletion.
    pub fn parse_date(&self, input: &str) -> Result<DateEdit> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(DateEdit::Delete);
        }
        let parsed = self
            .parse_accepted(input)
            .ok_or_else(|| EditError::InvalidDate(input.to_string()))?;
        let stored = format_datetime(&parsed, &self.storage)
            .ok_or_else(|| EditError::InvalidDate(input.to_string()))?;
        Ok(DateEdit::Set(stored))
    }

    /// Validate date input and re-present it in display format, the way a
    /// form field is normalized when it loses focus. Empty stays empty.
    pub fn to_display(&self, input: &str) -> Result<String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(String::new());
        }
        self.parse_accepted(input)
            .and_then(|dt| format_datetime(&dt, &self.display))
            .ok_or_else(|| EditError::InvalidDate(input.to_string()))
    }

    /// Convert a value read from an EXIF date tag to display format.
    pub fn stored_to_display(&self, stored: &str) -> Option<String> {
        let dt = parse_with(stored.trim(), &self.storage)?;
        format_datetime(&dt, &self.display)
    }

    fn parse_accepted(&self, input: &str) -> Option<NaiveDateTime> {
        self.accepted.iter().find_map(|fmt| parse_with(input, fmt))
    }
}

/// Parse `input` with one layout. Date-only layouts give midnight.
fn parse_with(input: &str, fmt: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input, fmt)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(input, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Format a timestamp, or `None` if `fmt` is not a valid layout.
pub fn format_datetime(dt: &NaiveDateTime, fmt: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", dt.format(fmt)).ok()?;
    Some(out)
}

/// Apply a date edit to the three date tags.
pub fn apply_date(store: &mut TagStore, edit: &DateEdit) {
    match edit {
        DateEdit::Set(value) => {
            for (section, tag) in tags::DATE_TAGS {
                store.set(section, tag, TagValue::ascii(value));
            }
        }
        DateEdit::Delete => {
            for (section, tag) in tags::DATE_TAGS {
                store.remove(section, tag);
            }
        }
    }
}

/// The capture date in display format.
///
/// DateTimeOriginal is preferred, then DateTimeDigitized, then the file
/// DateTime; the first one that parses is used.
pub fn read_date(store: &TagStore, formats: &DateFormats) -> Option<String> {
    tags::DATE_TAGS
        .iter()
        .filter_map(|(section, tag)| store.text(*section, *tag))
        .find_map(|text| formats.stored_to_display(&text))
}

// ── Coordinates ─────────────────────────────────────────────────────

/// A validated change to one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateEdit {
    /// Remove the coordinate and its hemisphere reference.
    Delete,
    /// Signed decimal degrees.
    Set(f64),
}

/// Parse a coordinate field.
///
/// Empty input means deletion. Anything else must be a finite decimal
/// number. Range is not checked here: see [`validate_coordinate_pair`].
pub fn parse_coordinate(input: &str) -> Result<CoordinateEdit> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(CoordinateEdit::Delete);
    }
    match input.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(CoordinateEdit::Set(v)),
        _ => Err(EditError::InvalidCoordinates(input.to_string())),
    }
}

/// Latitude or longitude, with the GPS tags that store it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn ref_tag(self) -> u16 {
        match self {
            Axis::Latitude => tags::GPS_LATITUDE_REF,
            Axis::Longitude => tags::GPS_LONGITUDE_REF,
        }
    }

    fn value_tag(self) -> u16 {
        match self {
            Axis::Latitude => tags::GPS_LATITUDE,
            Axis::Longitude => tags::GPS_LONGITUDE,
        }
    }

    fn reference(self, sign: Sign) -> &'static str {
        match (self, sign) {
            (Axis::Latitude, Sign::Positive) => "N",
            (Axis::Latitude, Sign::Negative) => "S",
            (Axis::Longitude, Sign::Positive) => "E",
            (Axis::Longitude, Sign::Negative) => "W",
        }
    }

    /// Largest valid magnitude in degrees.
    pub fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }
}

/// GPS version written alongside new coordinates.
const GPS_VERSION: [u8; 4] = [2, 3, 0, 0];

/// Apply a coordinate edit to the GPS section.
///
/// Setting writes the hemisphere reference and DMS triple, adding a GPS
/// version tag if there is none. Deleting removes both tags for this axis
/// only; if the version tag is then all that is left, it goes too.
pub fn apply_coordinate(store: &mut TagStore, axis: Axis, edit: CoordinateEdit) {
    match edit {
        CoordinateEdit::Set(value) => {
            let reference = axis.reference(Sign::of(value));
            store.set(Section::Gps, axis.ref_tag(), TagValue::ascii(reference));
            store.set(
                Section::Gps,
                axis.value_tag(),
                TagValue::RationalList(decimal_to_dms(value).to_vec()),
            );
            if !store.contains(Section::Gps, tags::GPS_VERSION_ID) {
                store.set(Section::Gps, tags::GPS_VERSION_ID, TagValue::Bytes(GPS_VERSION.to_vec()));
            }
        }
        CoordinateEdit::Delete => {
            store.remove(Section::Gps, axis.ref_tag());
            store.remove(Section::Gps, axis.value_tag());
            if store.section_len(Section::Gps) == 1 && store.contains(Section::Gps, tags::GPS_VERSION_ID) {
                store.remove(Section::Gps, tags::GPS_VERSION_ID);
            }
        }
    }
}

/// Decode one coordinate from the GPS section.
///
/// A missing reference counts as north/east. An invalid triple gives `None`.
pub fn read_coordinate(store: &TagStore, axis: Axis) -> Option<f64> {
    let dms = store.get(Section::Gps, axis.value_tag())?.as_rationals()?;
    if !is_valid_dms(&dms) {
        return None;
    }
    let reference = store
        .get(Section::Gps, axis.ref_tag())
        .and_then(|v| v.as_bytes().map(<[u8]>::to_vec))
        .unwrap_or_default();
    dms_to_decimal(&dms, Sign::from_reference(&reference)).ok()
}

/// Latitude and longitude, only when both decode.
pub fn read_coordinates(store: &TagStore) -> Option<(f64, f64)> {
    Some((
        read_coordinate(store, Axis::Latitude)?,
        read_coordinate(store, Axis::Longitude)?,
    ))
}

/// Form-level check of a coordinate pair before saving.
///
/// Both empty is fine (no position). Otherwise both must be numbers within
/// [-90, 90] and [-180, 180].
pub fn validate_coordinate_pair(latitude: &str, longitude: &str) -> Result<Option<(f64, f64)>> {
    let (latitude, longitude) = (latitude.trim(), longitude.trim());
    if latitude.is_empty() && longitude.is_empty() {
        return Ok(None);
    }

    let number = |input: &str| -> Result<f64> {
        match parse_coordinate(input)? {
            CoordinateEdit::Set(v) => Ok(v),
            CoordinateEdit::Delete => Err(EditError::InvalidCoordinates(input.to_string())),
        }
    };
    let lat = number(latitude)?;
    let lon = number(longitude)?;

    if lat.abs() > Axis::Latitude.limit() || lon.abs() > Axis::Longitude.limit() {
        return Err(EditError::OutOfRangeCoordinates {
            latitude: lat,
            longitude: lon,
        });
    }
    Ok(Some((lat, lon)))
}

/// Format decimal degrees for a text field: at most six decimals, no
/// trailing zeros.
pub fn format_coordinate(value: f64) -> String {
    let s = format!("{value:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

// ── Name ────────────────────────────────────────────────────────────

/// Characters that are not allowed in file names on common file systems.
const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '"', '*', '?', '<', '>', '|'];

/// Replace path-unsafe characters with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Keep only letters, digits, spaces, `_` and `-`, then trim trailing
/// whitespace. Letters and digits include non-ASCII ones.
pub fn filename_component(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    kept.trim_end().to_string()
}

/// The path a file would be renamed to for display name `name`: same
/// directory and extension, stem from both sanitizing passes.
///
/// `None` when nothing usable is left of the name.
pub fn derived_path(current: &Path, name: &str) -> Option<PathBuf> {
    let stem = filename_component(&sanitize_name(name));
    if stem.is_empty() {
        return None;
    }
    let file_name = match current.extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem,
    };
    Some(current.with_file_name(file_name))
}

// ── Field set ───────────────────────────────────────────────────────

/// The four editable fields as raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEditRequest {
    pub name: String,
    pub date: String,
    pub latitude: String,
    pub longitude: String,
}

/// Field edits that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEdits {
    pub date: DateEdit,
    pub latitude: CoordinateEdit,
    pub longitude: CoordinateEdit,
}

impl FieldEditRequest {
    /// Current values of a photo's fields, as a form would show them.
    pub fn from_store(path: &Path, store: &TagStore, formats: &DateFormats) -> Self {
        let coordinate = |axis| {
            read_coordinate(store, axis)
                .map(format_coordinate)
                .unwrap_or_default()
        };
        Self {
            name: crate::exif::reader::file_stem(path),
            date: read_date(store, formats).unwrap_or_default(),
            latitude: coordinate(Axis::Latitude),
            longitude: coordinate(Axis::Longitude),
        }
    }

    /// Check the date, then both coordinates.
    pub fn validate(&self, formats: &DateFormats) -> Result<ValidatedEdits> {
        Ok(ValidatedEdits {
            date: formats.parse_date(&self.date)?,
            latitude: parse_coordinate(&self.latitude)?,
            longitude: parse_coordinate(&self.longitude)?,
        })
    }
}

impl ValidatedEdits {
    /// Apply date, latitude and longitude, in that order.
    pub fn apply(&self, store: &mut TagStore) {
        apply_date(store, &self.date);
        apply_coordinate(store, Axis::Latitude, self.latitude);
        apply_coordinate(store, Axis::Longitude, self.longitude);
    }
}
