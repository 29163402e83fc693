use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, DynImage, ImageEXIF};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::reader::open_container;
use crate::error::{EditError, Result};

const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;

/// Replace the EXIF block embedded in an image.
///
/// `tiff` is a raw TIFF structure as produced by
/// [`serialize`](super::codec::serialize); the container adds its own
/// framing (`Exif\0\0` for JPEG). Every other segment or chunk of the file
/// is kept as is. The file is rewritten through a temporary file in the same
/// directory, so a failed write leaves the original untouched.
pub fn insert_exif(path: &Path, tiff: &[u8]) -> Result<()> {
    let mut image = open_container(path)?;

    let orig_exif_pos = match &image {
        DynImage::Jpeg(jpeg) => find_exif_segment_pos(jpeg),
        _ => None,
    };

    image.set_exif(Some(Bytes::copy_from_slice(tiff)));

    // set_exif() appends the new APP1 after a fixed number of segments,
    // which can land it behind an XMP APP1. Many readers want EXIF first.
    if let DynImage::Jpeg(jpeg) = &mut image {
        restore_exif_position(jpeg, orig_exif_pos);
    }

    let output = image.encoder().bytes();
    replace_file(path, &output)?;
    log::debug!("Wrote {} byte EXIF block to {}", tiff.len(), path.display());
    Ok(())
}

/// Find the position of the EXIF APP1 segment in a JPEG.
/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == MARKER_APP1 && s.contents().starts_with(EXIF_PREFIX))
}

/// Move the EXIF segment back to where the old one was, or right after the
/// JFIF header when the file had none.
fn restore_exif_position(jpeg: &mut Jpeg, orig_pos: Option<usize>) {
    let Some(new_pos) = find_exif_segment_pos(jpeg) else {
        return;
    };
    let target_pos = orig_pos.unwrap_or_else(|| {
        match jpeg.segments().first() {
            Some(first) if first.marker() == MARKER_APP0 => 1,
            _ => 0,
        }
    });
    if target_pos < new_pos {
        let segments = jpeg.segments_mut();
        let seg = segments.remove(new_pos);
        segments.insert(target_pos, seg);
    }
}

/// Atomically replace `path` with `contents`, keeping its permissions.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| EditError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| EditError::io(tmp.path(), e))?;

    if let Ok(meta) = std::fs::metadata(path) {
        if let Err(e) = tmp.as_file().set_permissions(meta.permissions()) {
            log::warn!("Could not carry permissions over to {}: {e}", path.display());
        }
    }

    tmp.persist(path).map_err(|e| EditError::io(path, e.error))?;
    Ok(())
}
