//! Load → edit → save workflow for a single photo.
//!
//! Every save re-reads the metadata from disk, applies the edits, and
//! rewrites the file through a temporary copy. A rename, if one is asked
//! for, happens only after the new metadata is safely on disk.
//!
//! ```rust,no_run
//! use exif_tools::editor::MetadataEditor;
//! use exif_tools::fields::DateFormats;
//! use std::path::Path;
//!
//! let mut editor = MetadataEditor::new(DateFormats::default());
//! let mut edits = editor.load(Path::new("IMG_0001.jpg"))?.fields.clone();
//! edits.name = "Ardea cinerea".into();
//! edits.date = "2024-03-05 10:00".into();
//! edits.latitude = "48.8566".into();
//! edits.longitude = "2.3522".into();
//!
//! let outcome = editor.save(&edits, None)?;
//! println!("Saved to {}", outcome.path.display());
//! if let Some(failure) = &outcome.rename_failure {
//!     eprintln!("Metadata saved, but rename failed: {}", failure.source);
//! }
//! # Ok::<(), exif_tools::error::EditError>(())
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{EditError, Result};
use crate::exif::reader::{self, MetadataStatus};
use crate::exif::store::TagStore;
use crate::exif::{codec, writer};
use crate::fields::{self, DateFormats, FieldEditRequest, ValidatedEdits};

/// Where the editor is in its lifecycle.
///
/// `Saved` and `Failed` are not terminal: the user may keep editing and
/// save again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    Loaded,
    Editing,
    Saving,
    Saved,
    Failed,
}

/// A photo opened for editing.
#[derive(Debug, Clone)]
pub struct LoadedPhoto {
    pub path: PathBuf,
    /// Metadata as read at load time. Saves do not reuse it.
    pub store: TagStore,
    pub status: MetadataStatus,
    /// Current field values, for pre-filling a form.
    pub fields: FieldEditRequest,
}

/// A rename that failed after the metadata was written.
#[derive(Debug)]
pub struct RenameFailure {
    pub target: PathBuf,
    pub source: io::Error,
}

/// Result of a save that wrote the metadata.
#[derive(Debug)]
pub struct SaveOutcome {
    /// Where the file is now.
    pub path: PathBuf,
    /// Set when the file should have moved but could not. The metadata
    /// was still saved, at `path`.
    pub rename_failure: Option<RenameFailure>,
}

impl SaveOutcome {
    /// True when everything asked for was done.
    pub fn is_complete(&self) -> bool {
        self.rename_failure.is_none()
    }
}

/// Open a photo and snapshot its fields.
///
/// The container must be readable; its metadata need not be.
pub fn load_photo(path: &Path, formats: &DateFormats) -> Result<LoadedPhoto> {
    let (store, status) = reader::read_store(path)?;
    let fields = FieldEditRequest::from_store(path, &store, formats);
    log::debug!("Loaded {} ({status:?}, {} tags)", path.display(), store.len());
    Ok(LoadedPhoto {
        path: path.to_path_buf(),
        store,
        status,
        fields,
    })
}

/// Re-read the metadata of `path`, apply `edits`, and write it back in place.
pub fn write_metadata(path: &Path, edits: &ValidatedEdits) -> Result<()> {
    let raw = reader::read_raw_exif(path)?;
    let mut store = codec::parse_or_empty(raw.as_deref());

    edits.apply(&mut store);
    store.normalize();
    let block = codec::serialize(&store)?;

    writer::insert_exif(path, &block)
}

/// The path a save would leave the file at: `target` if given, else one
/// derived from `name`, else `current`.
pub fn final_path(current: &Path, name: &str, target: Option<&Path>) -> PathBuf {
    target
        .map(Path::to_path_buf)
        .or_else(|| fields::derived_path(current, name))
        .unwrap_or_else(|| current.to_path_buf())
}

/// Validate, write, then rename.
///
/// Validation errors come back before the file is touched. Once the
/// metadata is written, a failed rename is reported in the outcome rather
/// than as an error. An existing file at the destination is never
/// overwritten.
pub fn save_photo(
    path: &Path,
    edits: &FieldEditRequest,
    target: Option<&Path>,
    formats: &DateFormats,
) -> Result<SaveOutcome> {
    let validated = edits.validate(formats)?;
    write_metadata(path, &validated)?;
    log::info!("Metadata written to {}", path.display());

    let destination = final_path(path, &edits.name, target);
    if destination == path {
        return Ok(SaveOutcome {
            path: path.to_path_buf(),
            rename_failure: None,
        });
    }

    match rename_no_replace(path, &destination) {
        Ok(()) => {
            log::info!("Renamed {} → {}", path.display(), destination.display());
            Ok(SaveOutcome {
                path: destination,
                rename_failure: None,
            })
        }
        Err(source) => {
            log::warn!(
                "Metadata saved, but renaming {} to {} failed: {source}",
                path.display(),
                destination.display()
            );
            Ok(SaveOutcome {
                path: path.to_path_buf(),
                rename_failure: Some(RenameFailure {
                    target: destination,
                    source,
                }),
            })
        }
    }
}

/// Move `from` to `to`, failing with `AlreadyExists` if `to` is taken.
///
/// The hard link is created and checked for collision in one step. A
/// change of letter case only is allowed when `to` names `from` itself,
/// which is what a case-insensitive file system reports as taken.
fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::hard_link(from, to) {
        Ok(()) => {
            if let Err(e) = std::fs::remove_file(from) {
                let _ = std::fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            if is_case_only_change(from, to) && !listed_exactly(to)? {
                std::fs::rename(from, to)
            } else {
                Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", to.display()),
                ))
            }
        }
        // No hard links on this file system.
        Err(e) => {
            log::debug!("Hard link to {} failed ({e}), renaming instead", to.display());
            if to.exists() && !is_case_only_change(from, to) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", to.display()),
                ));
            }
            std::fs::rename(from, to)
        }
    }
}

fn is_case_only_change(from: &Path, to: &Path) -> bool {
    let name = |p: &Path| p.file_name().map(|n| n.to_string_lossy().to_lowercase());
    from.parent() == to.parent() && from.file_name() != to.file_name() && name(from) == name(to)
}

/// True when the directory holds an entry spelled exactly like `path`.
fn listed_exactly(path: &Path) -> io::Result<bool> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let wanted = path.file_name();
    for entry in std::fs::read_dir(dir)? {
        if Some(entry?.file_name().as_os_str()) == wanted {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Copy `path` to `new_path` and save the edits into the copy.
///
/// The original is left byte-for-byte untouched. If writing the copy
/// fails, the copy is removed again.
pub fn save_photo_as(
    path: &Path,
    new_path: &Path,
    edits: &FieldEditRequest,
    formats: &DateFormats,
) -> Result<SaveOutcome> {
    let validated = edits.validate(formats)?;

    if new_path == path {
        write_metadata(path, &validated)?;
    } else {
        std::fs::copy(path, new_path).map_err(|e| EditError::io(new_path, e))?;
        if let Err(e) = write_metadata(new_path, &validated) {
            if let Err(cleanup) = std::fs::remove_file(new_path) {
                log::warn!("Could not remove partial copy {}: {cleanup}", new_path.display());
            }
            return Err(e);
        }
    }

    log::info!("Saved copy of {} as {}", path.display(), new_path.display());
    Ok(SaveOutcome {
        path: new_path.to_path_buf(),
        rename_failure: None,
    })
}

/// Suggested destination for "save as": `<stem>-copy.<ext>` next to the
/// original.
pub fn default_copy_path(path: &Path) -> PathBuf {
    let stem = reader::file_stem(path);
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}-copy.{}", ext.to_string_lossy()),
        None => format!("{stem}-copy"),
    };
    path.with_file_name(file_name)
}

/// Run [`save_photo`] on the blocking thread pool.
///
/// File I/O is blocking; async hosts should save through this so their
/// event loop keeps running. The caller must not start a second save of
/// the same file before this one resolves.
pub async fn save_in_background(
    path: PathBuf,
    edits: FieldEditRequest,
    target: Option<PathBuf>,
    formats: DateFormats,
) -> Result<SaveOutcome> {
    tokio::task::spawn_blocking(move || save_photo(&path, &edits, target.as_deref(), &formats)).await?
}

/// Stateful editor for one photo at a time.
#[derive(Debug)]
pub struct MetadataEditor {
    formats: DateFormats,
    state: EditorState,
    current: Option<LoadedPhoto>,
}

impl MetadataEditor {
    pub fn new(formats: DateFormats) -> Self {
        Self {
            formats,
            state: EditorState::Idle,
            current: None,
        }
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn current(&self) -> Option<&LoadedPhoto> {
        self.current.as_ref()
    }

    pub fn formats(&self) -> &DateFormats {
        &self.formats
    }

    /// Open a photo, replacing the current one.
    pub fn load(&mut self, path: &Path) -> Result<&LoadedPhoto> {
        match load_photo(path, &self.formats) {
            Ok(photo) => {
                self.state = EditorState::Loaded;
                Ok(&*self.current.insert(photo))
            }
            Err(e) => {
                self.state = EditorState::Failed;
                self.current = None;
                Err(e)
            }
        }
    }

    /// Note that the user started changing fields.
    pub fn begin_edit(&mut self) {
        if self.current.is_some() {
            self.state = EditorState::Editing;
        }
    }

    /// Save edits to the current photo, renaming it to `target` or to a
    /// name derived from `edits.name`.
    pub fn save(&mut self, edits: &FieldEditRequest, target: Option<&Path>) -> Result<SaveOutcome> {
        let path = self.current_path()?;
        self.state = EditorState::Saving;
        let result = save_photo(&path, edits, target, &self.formats);
        self.finish(result)
    }

    /// Save edits into a copy at `new_path`; the original stays as it was.
    /// The copy becomes the current photo.
    pub fn save_as(&mut self, new_path: &Path, edits: &FieldEditRequest) -> Result<SaveOutcome> {
        let path = self.current_path()?;
        self.state = EditorState::Saving;
        let result = save_photo_as(&path, new_path, edits, &self.formats);
        self.finish(result)
    }

    fn current_path(&self) -> Result<PathBuf> {
        self.current
            .as_ref()
            .map(|photo| photo.path.clone())
            .ok_or(EditError::NotLoaded)
    }

    fn finish(&mut self, result: Result<SaveOutcome>) -> Result<SaveOutcome> {
        match result {
            Ok(outcome) => {
                self.state = EditorState::Saved;
                match load_photo(&outcome.path, &self.formats) {
                    Ok(photo) => self.current = Some(photo),
                    Err(e) => log::warn!("Saved, but could not reload {}: {e}", outcome.path.display()),
                }
                Ok(outcome)
            }
            Err(e) => {
                self.state = EditorState::Failed;
                Err(e)
            }
        }
    }
}
