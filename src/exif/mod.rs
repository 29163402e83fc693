pub mod codec;
pub mod rational;
pub mod reader;
pub mod store;
pub mod tags;
pub mod writer;

pub use codec::{parse, parse_or_empty, serialize, EncodeError, ParseError};
pub use rational::{decimal_to_dms, dms_to_decimal, is_valid_dms, Rational, Sign};
pub use reader::{read_photo_info, read_raw_exif, PhotoInfo};
pub use store::{Section, TagStore, TagValue};
pub use writer::insert_exif;
