//! Error types for metadata editing.

use std::io;
use std::path::PathBuf;

use crate::exif::codec::EncodeError;

/// Result type for editor operations.
pub type Result<T> = std::result::Result<T, EditError>;

/// Errors that abort a load or save.
///
/// Validation errors (`InvalidDate`, `InvalidCoordinates`,
/// `OutOfRangeCoordinates`) are raised before anything is written, so the
/// file on disk is untouched when one of them is returned. A rename that
/// fails after the metadata was written is not an error: see
/// [`crate::editor::SaveOutcome::rename_failure`].
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The date text matched none of the accepted formats.
    #[error("Invalid date format: {0:?}")]
    InvalidDate(String),

    /// A coordinate could not be parsed as a decimal number.
    #[error("Invalid coordinate: {0:?}")]
    InvalidCoordinates(String),

    /// Both coordinates parsed, but at least one is outside its valid range.
    #[error("Coordinates out of range: latitude {latitude}, longitude {longitude}")]
    OutOfRangeCoordinates { latitude: f64, longitude: f64 },

    /// The file is not an image container we can carry metadata in.
    #[error("Unsupported image: {}", .0.display())]
    UnsupportedImage(PathBuf),

    /// `save` was called before any image was loaded.
    #[error("No image loaded")]
    NotLoaded,

    /// The edited metadata could not be encoded.
    #[error("Failed to encode metadata: {0}")]
    Encode(#[from] EncodeError),

    /// Reading, writing, copying or replacing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A background save task panicked or was cancelled.
    #[error("Background save failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EditError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by user input rather than the file system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EditError::InvalidDate(_)
                | EditError::InvalidCoordinates(_)
                | EditError::OutOfRangeCoordinates { .. }
        )
    }
}
