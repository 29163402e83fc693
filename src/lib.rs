//! # exif-tools
//!
//! Read and edit the handful of photo metadata fields people actually
//! change by hand: the file name, the capture date, and the GPS position.
//! Everything else in the EXIF block is carried through untouched.
//!
//! ## Quick Start
//!
//! The editor handles the full load → edit → save flow for one photo:
//!
//! ```rust,no_run
//! use exif_tools::editor::MetadataEditor;
//! use exif_tools::fields::DateFormats;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut editor = MetadataEditor::new(DateFormats::default());
//!     let mut edits = editor.load(Path::new("IMG_0001.jpg"))?.fields.clone();
//!
//!     edits.date = "05/03/2024 10:00".into();
//!     edits.latitude = "48.8566".into();
//!     edits.longitude = "2.3522".into();
//!
//!     let outcome = editor.save(&edits, None)?;
//!     println!("Saved: {}", outcome.path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The EXIF codec can be used on its own:
//!
//! ```rust,no_run
//! use exif_tools::exif::{self, Section};
//! use exif_tools::exif::tags;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let path = Path::new("photo.jpg");
//!
//!     // 1. Read and parse the raw EXIF block
//!     let raw = exif::read_raw_exif(path)?;
//!     let mut store = exif::parse_or_empty(raw.as_deref());
//!     println!("Camera: {:?}", store.text(Section::Image, tags::MODEL));
//!
//!     // 2. Change it
//!     store.set(Section::Image, tags::ARTIST, exif::TagValue::ascii("Jane Doe"));
//!     store.normalize();
//!
//!     // 3. Write it back
//!     let block = exif::serialize(&store)?;
//!     exif::insert_exif(path, &block)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | EXIF location |
//! |--------|---------------|
//! | JPEG (`.jpg`, `.jpeg`) | APP1 segment |
//! | PNG (`.png`) | `eXIf` chunk |
//! | WebP (`.webp`) | `EXIF` RIFF chunk |
//!
//! ## Modules
//!
//! - [`config`]: Configuration types and loading/saving
//! - [`editor`]: Load/edit/save workflow for one photo
//! - [`error`]: Error type for editing operations
//! - [`exif`]: EXIF block codec, tag store, file reading and writing
//! - [`fields`]: Conversions between form fields and tags
//! - [`pipeline`]: Image collection, folder navigation, batch processing
//! - [`species`]: Naming photos after the species they show

pub mod config;
pub mod editor;
pub mod error;
pub mod exif;
pub mod fields;
pub mod pipeline;
pub mod species;
