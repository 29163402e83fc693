//! Decimal degrees ↔ degrees/minutes/seconds rational triples.
//!
//! GPS positions are stored in EXIF as three unsigned rationals plus a
//! hemisphere reference letter. Seconds carry four decimal digits
//! (denominator 10000), which bounds the round-trip error to well under
//! 1/36000 of a degree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Denominator used for the seconds component.
pub const SECONDS_DENOMINATOR: i64 = 10_000;

/// A rational number as stored in an EXIF entry.
///
/// Signed and unsigned EXIF rationals share this type; the serializer picks
/// the wire format from the sign of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// A whole number (`v/1`).
    pub const fn integer(v: i64) -> Self {
        Self { num: v, den: 1 }
    }

    /// The value as a float, or `None` when the denominator is 0.
    pub fn to_f64(self) -> Option<f64> {
        if self.den == 0 {
            None
        } else {
            Some(self.num as f64 / self.den as f64)
        }
    }

    pub fn is_negative(self) -> bool {
        (self.num < 0) != (self.den < 0) && self.num != 0
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Hemisphere of a coordinate, carried separately from the magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// North or East.
    Positive,
    /// South or West.
    Negative,
}

impl Sign {
    /// Sign of a decimal coordinate. `-0.0` counts as positive.
    pub fn of(value: f64) -> Self {
        if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }

    /// Interpret an EXIF reference letter (`N`, `S`, `E`, `W`).
    ///
    /// Anything other than `S` or `W` (including a missing reference) is
    /// treated as positive.
    pub fn from_reference(reference: &[u8]) -> Self {
        match reference.first().map(u8::to_ascii_uppercase) {
            Some(b'S') | Some(b'W') => Sign::Negative,
            _ => Sign::Positive,
        }
    }
}

/// A DMS triple that cannot be decoded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidCoordinate {
    #[error("expected 3 DMS components, got {0}")]
    WrongArity(usize),
    #[error("DMS component {index} has a zero denominator")]
    ZeroDenominator { index: usize },
}

/// Convert non-negative decimal degrees into a `[degrees, minutes, seconds]`
/// rational triple.
///
/// Degrees and minutes are whole numbers; seconds are rounded half away from
/// zero to four decimal places. A seconds value that rounds up to 60 is
/// carried into the minutes (and minutes into the degrees), so the triple is
/// always canonical. The sign of `deg` is ignored: callers store it as a
/// reference letter.
///
/// ```
/// use exif_tools::exif::rational::{decimal_to_dms, Rational};
///
/// let dms = decimal_to_dms(48.8566);
/// assert_eq!(dms, [Rational::new(48, 1), Rational::new(51, 1), Rational::new(237_600, 10_000)]);
/// ```
pub fn decimal_to_dms(deg: f64) -> [Rational; 3] {
    let deg = deg.abs();
    let mut degrees = deg.trunc() as i64;
    let minutes_full = deg.fract() * 60.0;
    let mut minutes = minutes_full.trunc() as i64;
    let mut seconds = ((minutes_full - minutes as f64) * 60.0 * SECONDS_DENOMINATOR as f64).round() as i64;

    if seconds >= 60 * SECONDS_DENOMINATOR {
        seconds -= 60 * SECONDS_DENOMINATOR;
        minutes += 1;
    }
    if minutes >= 60 {
        minutes -= 60;
        degrees += 1;
    }

    [
        Rational::integer(degrees),
        Rational::integer(minutes),
        Rational::new(seconds, SECONDS_DENOMINATOR),
    ]
}

/// Convert a DMS triple back to signed decimal degrees.
///
/// Fails when the triple does not have exactly three components or when any
/// denominator is zero.
pub fn dms_to_decimal(dms: &[Rational], sign: Sign) -> Result<f64, InvalidCoordinate> {
    if dms.len() != 3 {
        return Err(InvalidCoordinate::WrongArity(dms.len()));
    }

    let mut parts = [0.0f64; 3];
    for (index, (part, r)) in parts.iter_mut().zip(dms).enumerate() {
        *part = r.to_f64().ok_or(InvalidCoordinate::ZeroDenominator { index })?;
    }

    let magnitude = parts[0] + parts[1] / 60.0 + parts[2] / 3600.0;
    Ok(match sign {
        Sign::Positive => magnitude,
        Sign::Negative => -magnitude,
    })
}

/// True when `dms` has exactly three components and no zero denominator.
pub fn is_valid_dms(dms: &[Rational]) -> bool {
    dms.len() == 3 && dms.iter().all(|r| r.den != 0)
}
