//! EXIF tag ids and TIFF wire formats.

use super::store::Section;

// IFD0 (image) tags
pub const IMAGE_DESCRIPTION: u16 = 0x010E;
pub const MAKE: u16 = 0x010F;
pub const MODEL: u16 = 0x0110;
pub const ORIENTATION: u16 = 0x0112;
pub const X_RESOLUTION: u16 = 0x011A;
pub const Y_RESOLUTION: u16 = 0x011B;
pub const RESOLUTION_UNIT: u16 = 0x0128;
pub const SOFTWARE: u16 = 0x0131;
pub const DATE_TIME: u16 = 0x0132;
pub const ARTIST: u16 = 0x013B;
pub const COPYRIGHT: u16 = 0x8298;

// Sub-IFD pointers. Never stored in a TagStore: the serializer computes them.
pub const EXIF_IFD_POINTER: u16 = 0x8769;
pub const GPS_IFD_POINTER: u16 = 0x8825;
pub const INTEROP_IFD_POINTER: u16 = 0xA005;

// Exif IFD tags
pub const EXPOSURE_TIME: u16 = 0x829A;
pub const F_NUMBER: u16 = 0x829D;
pub const ISO_SPEED: u16 = 0x8827;
pub const EXIF_VERSION: u16 = 0x9000;
pub const DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const DATE_TIME_DIGITIZED: u16 = 0x9004;
pub const FOCAL_LENGTH: u16 = 0x920A;
pub const MAKER_NOTE: u16 = 0x927C;
pub const USER_COMMENT: u16 = 0x9286;
pub const COLOR_SPACE: u16 = 0xA001;
pub const PIXEL_X_DIMENSION: u16 = 0xA002;
pub const PIXEL_Y_DIMENSION: u16 = 0xA003;
pub const LENS_MODEL: u16 = 0xA434;

// GPS IFD tags
pub const GPS_VERSION_ID: u16 = 0x0000;
pub const GPS_LATITUDE_REF: u16 = 0x0001;
pub const GPS_LATITUDE: u16 = 0x0002;
pub const GPS_LONGITUDE_REF: u16 = 0x0003;
pub const GPS_LONGITUDE: u16 = 0x0004;
pub const GPS_ALTITUDE_REF: u16 = 0x0005;
pub const GPS_ALTITUDE: u16 = 0x0006;
pub const GPS_TIME_STAMP: u16 = 0x0007;
pub const GPS_DATE_STAMP: u16 = 0x001D;

// Interop IFD tags
pub const INTEROP_INDEX: u16 = 0x0001;
pub const INTEROP_VERSION: u16 = 0x0002;

/// Tags holding a capture date, in the order they are consulted when
/// presenting the date to a user.
pub const DATE_TAGS: [(Section, u16); 3] = [
    (Section::Exif, DATE_TIME_ORIGINAL),
    (Section::Exif, DATE_TIME_DIGITIZED),
    (Section::Image, DATE_TIME),
];

/// TIFF field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagFormat {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
}

impl TagFormat {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => TagFormat::Byte,
            2 => TagFormat::Ascii,
            3 => TagFormat::Short,
            4 => TagFormat::Long,
            5 => TagFormat::Rational,
            6 => TagFormat::SByte,
            7 => TagFormat::Undefined,
            8 => TagFormat::SShort,
            9 => TagFormat::SLong,
            10 => TagFormat::SRational,
            11 => TagFormat::Float,
            12 => TagFormat::Double,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        match self {
            TagFormat::Byte => 1,
            TagFormat::Ascii => 2,
            TagFormat::Short => 3,
            TagFormat::Long => 4,
            TagFormat::Rational => 5,
            TagFormat::SByte => 6,
            TagFormat::Undefined => 7,
            TagFormat::SShort => 8,
            TagFormat::SLong => 9,
            TagFormat::SRational => 10,
            TagFormat::Float => 11,
            TagFormat::Double => 12,
        }
    }

    /// Size in bytes of one element.
    pub fn unit_size(self) -> usize {
        match self {
            TagFormat::Byte | TagFormat::Ascii | TagFormat::SByte | TagFormat::Undefined => 1,
            TagFormat::Short | TagFormat::SShort => 2,
            TagFormat::Long | TagFormat::SLong | TagFormat::Float => 4,
            TagFormat::Rational | TagFormat::SRational | TagFormat::Double => 8,
        }
    }

    /// Formats whose payload is carried as raw bytes in a `TagValue`.
    pub fn is_byte_like(self) -> bool {
        matches!(
            self,
            TagFormat::Byte
                | TagFormat::Ascii
                | TagFormat::SByte
                | TagFormat::Undefined
                | TagFormat::Float
                | TagFormat::Double
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TagFormat::Short | TagFormat::Long | TagFormat::SShort | TagFormat::SLong
        )
    }
}

/// Canonical wire format of tags this crate writes or commonly meets.
///
/// Tags missing from this table keep the format they were parsed with, or
/// get one inferred from their value.
pub fn known_format(section: Section, tag: u16) -> Option<TagFormat> {
    use TagFormat::*;
    let format = match (section, tag) {
        (Section::Image, IMAGE_DESCRIPTION | MAKE | MODEL | SOFTWARE | DATE_TIME | ARTIST | COPYRIGHT) => Ascii,
        (Section::Image, ORIENTATION | RESOLUTION_UNIT) => Short,
        (Section::Image, X_RESOLUTION | Y_RESOLUTION) => Rational,
        (Section::Exif, DATE_TIME_ORIGINAL | DATE_TIME_DIGITIZED | LENS_MODEL) => Ascii,
        (Section::Exif, EXPOSURE_TIME | F_NUMBER | FOCAL_LENGTH) => Rational,
        (Section::Exif, ISO_SPEED | COLOR_SPACE) => Short,
        (Section::Exif, PIXEL_X_DIMENSION | PIXEL_Y_DIMENSION) => Long,
        (Section::Exif, EXIF_VERSION | USER_COMMENT | MAKER_NOTE) => Undefined,
        (Section::Gps, GPS_VERSION_ID | GPS_ALTITUDE_REF) => Byte,
        (Section::Gps, GPS_LATITUDE_REF | GPS_LONGITUDE_REF | GPS_DATE_STAMP) => Ascii,
        (Section::Gps, GPS_LATITUDE | GPS_LONGITUDE | GPS_ALTITUDE | GPS_TIME_STAMP) => Rational,
        (Section::Interop, INTEROP_INDEX) => Ascii,
        (Section::Interop, INTEROP_VERSION) => Undefined,
        _ => return None,
    };
    Some(format)
}

/// True for the tags that link one IFD to another.
pub fn is_pointer(section: Section, tag: u16) -> bool {
    matches!(
        (section, tag),
        (Section::Image, EXIF_IFD_POINTER | GPS_IFD_POINTER) | (Section::Exif, INTEROP_IFD_POINTER)
    )
}
