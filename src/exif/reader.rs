use img_parts::{Bytes, DynImage, ImageEXIF};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::codec::{self, ParseError};
use super::store::{Section, TagStore};
use super::tags;
use crate::error::{EditError, Result};
use crate::fields::{self, DateFormats};
use crate::pipeline::ImageKind;

/// What was found in the image's metadata slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataStatus {
    /// A readable EXIF block.
    Present,
    /// No EXIF block at all.
    Absent,
    /// An EXIF block that could not be parsed; treated as empty.
    Unreadable,
}

/// Summary of a photo for display.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoInfo {
    pub path: PathBuf,
    /// File stem.
    pub name: String,
    /// Container format label (`JPEG`, `PNG`, `WebP`).
    pub format: Option<String>,
    pub file_size: u64,
    /// Human-readable file size, e.g. `"12.34 KB"`.
    pub weight: String,
    /// Pixel `(width, height)`.
    pub dimensions: Option<(u32, u32)>,
    /// Camera make and model.
    pub device: Option<String>,
    /// Capture date in display format.
    pub date_taken: Option<String>,
    /// Last modification time in display format.
    pub modified: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub metadata: MetadataStatus,
}

/// Parse the image container at `path`.
///
/// The container type is sniffed from the content, not the extension.
pub(crate) fn open_container(path: &Path) -> Result<DynImage> {
    let bytes = std::fs::read(path).map_err(|e| EditError::io(path, e))?;

    match DynImage::from_bytes(Bytes::from(bytes)) {
        Ok(Some(image)) => Ok(image),
        Ok(None) => Err(EditError::UnsupportedImage(path.to_path_buf())),
        Err(e) => {
            log::warn!("Failed to parse image container {}: {e}", path.display());
            Err(EditError::UnsupportedImage(path.to_path_buf()))
        }
    }
}

/// Read the raw EXIF block (TIFF structure, no `Exif\0\0` prefix) embedded
/// in an image, if there is one.
pub fn read_raw_exif(path: &Path) -> Result<Option<Vec<u8>>> {
    let image = open_container(path)?;
    Ok(image.exif().map(|exif| exif.to_vec()))
}

/// Read the metadata of an image into a fresh [`TagStore`].
///
/// A corrupt block is not an error: the store comes back empty and the
/// status says so.
pub fn read_store(path: &Path) -> Result<(TagStore, MetadataStatus)> {
    let Some(raw) = read_raw_exif(path)? else {
        log::debug!("No EXIF data found in {}", path.display());
        return Ok((TagStore::new(), MetadataStatus::Absent));
    };

    match codec::parse(&raw) {
        Ok(store) => Ok((store, MetadataStatus::Present)),
        Err(e) => {
            warn_unreadable(path, &e);
            Ok((TagStore::new(), MetadataStatus::Unreadable))
        }
    }
}

fn warn_unreadable(path: &Path, e: &ParseError) {
    log::warn!(
        "Ignoring unreadable EXIF block in {}: {e}. Editing starts from empty metadata.",
        path.display()
    );
}

/// Collect the display summary of a photo.
pub fn read_photo_info(path: &Path, formats: &DateFormats) -> Result<PhotoInfo> {
    let (store, metadata) = read_store(path)?;
    let fs_meta = std::fs::metadata(path).map_err(|e| EditError::io(path, e))?;

    let modified = fs_meta.modified().ok().and_then(|t| {
        let local: chrono::DateTime<chrono::Local> = t.into();
        fields::format_datetime(&local.naive_local(), &formats.display)
    });
    let coordinates = fields::read_coordinates(&store);

    Ok(PhotoInfo {
        path: path.to_path_buf(),
        name: file_stem(path),
        format: ImageKind::from_path(path).map(|k| k.label().to_string()),
        file_size: fs_meta.len(),
        weight: format_weight(fs_meta.len()),
        dimensions: image::image_dimensions(path).ok(),
        device: device_name(&store),
        date_taken: fields::read_date(&store, formats),
        modified,
        latitude: coordinates.map(|(lat, _)| lat),
        longitude: coordinates.map(|(_, lon)| lon),
        metadata,
    })
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Format a byte count as kilobytes with two decimals.
pub fn format_weight(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

/// Camera name from the Make and Model tags.
///
/// Runs of whitespace are collapsed. Many cameras repeat the make at the
/// start of the model (`Canon` / `Canon EOS R5`); the model alone is used
/// then.
pub fn device_name(store: &TagStore) -> Option<String> {
    let collapse = |tag| {
        store
            .text(Section::Image, tag)
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    };
    let make = collapse(tags::MAKE);
    let model = collapse(tags::MODEL);

    if make.is_empty() && model.is_empty() {
        return None;
    }
    if model.to_lowercase().starts_with(&make.to_lowercase()) {
        return Some(model);
    }
    Some(format!("{make} {model}").trim().to_string())
}
