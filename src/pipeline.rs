use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::config::Config;
use crate::editor::{self, load_photo};
use crate::fields::{self, FieldEditRequest};
use crate::species;

/// Container format of an image, determined by its extension.
///
/// # Example
///
/// ```rust
/// use exif_tools::pipeline::ImageKind;
/// use std::path::Path;
///
/// assert_eq!(ImageKind::from_path(Path::new("photo.JPG")), Some(ImageKind::Jpeg));
/// assert_eq!(ImageKind::from_path(Path::new("photo.gif")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageKind {
    /// JPEG: EXIF in an APP1 segment
    Jpeg,
    /// PNG: EXIF in an eXIf chunk
    Png,
    /// WebP: EXIF in a RIFF chunk
    WebP,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::WebP),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "JPEG",
            ImageKind::Png => "PNG",
            ImageKind::WebP => "WebP",
        }
    }
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Only files whose extension is listed
/// in `extensions` are included.
///
/// # Example
///
/// ```rust,no_run
/// use exif_tools::config::Config;
/// use exif_tools::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let config = Config::default();
/// let images = collect_images(
///     &[PathBuf::from("photo.jpg"), PathBuf::from("./photos/")],
///     &config.files.extensions,
/// );
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf], extensions: &[String]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path, extensions) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p, extensions) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has one of the configured extensions.
pub fn is_supported_image(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Create a backup of the original file, unless one already exists.
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path).context("Failed to create backup")?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}

// ── Folder navigation ────────────────────────────────────────────────

/// The images of one folder, for stepping through them one at a time.
///
/// Ordered by creation time (modification time where the file system
/// has no creation time), oldest first; ties are broken by name.
/// Stepping past either end wraps around.
#[derive(Debug, Clone)]
pub struct ImageList {
    images: Vec<PathBuf>,
    index: usize,
}

impl ImageList {
    /// List the images next to `path`, positioned on `path`.
    pub fn for_file(path: &Path, extensions: &[String]) -> Result<Self> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut dated: Vec<(SystemTime, PathBuf)> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_supported_image(e.path(), extensions))
            .map(|e| {
                let time = e
                    .metadata()
                    .ok()
                    .and_then(|m| m.created().or_else(|_| m.modified()).ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (time, e.into_path())
            })
            .collect();
        dated.sort();

        let images: Vec<PathBuf> = dated.into_iter().map(|(_, p)| p).collect();
        let index = images
            .iter()
            .position(|p| p.file_name() == path.file_name())
            .with_context(|| format!("{} is not a supported image in {}", path.display(), dir.display()))?;

        Ok(Self { images, index })
    }

    pub fn current(&self) -> &Path {
        &self.images[self.index]
    }

    /// Move to the next image, wrapping to the first.
    pub fn next(&mut self) -> &Path {
        self.index = (self.index + 1) % self.images.len();
        self.current()
    }

    /// Move to the previous image, wrapping to the last.
    pub fn prev(&mut self) -> &Path {
        self.index = (self.index + self.images.len() - 1) % self.images.len();
        self.current()
    }

    /// Record that the current image now lives at `new_path`.
    pub fn replace_current(&mut self, new_path: PathBuf) {
        self.images[self.index] = new_path;
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.images
    }
}

// ── Batch processing ─────────────────────────────────────────────────

/// Field changes requested from the command line. `None` keeps the
/// photo's current value; `Some("")` clears it.
#[derive(Debug, Clone, Default)]
pub struct FieldOverrides {
    pub name: Option<String>,
    /// Text put in front of the current name, unless the file already
    /// carries a species name.
    pub prefix: Option<String>,
    pub date: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl FieldOverrides {
    /// The field values to save for the photo at `path`, whose current
    /// values are `current`.
    pub fn apply(&self, path: &Path, current: &FieldEditRequest) -> FieldEditRequest {
        let pick = |over: &Option<String>, cur: &String| over.clone().unwrap_or_else(|| cur.clone());
        let mut name = pick(&self.name, &current.name);
        if let Some(prefix) = &self.prefix {
            if species::has_species_name(path) {
                log::info!("{} already carries a species name, not prefixing", path.display());
            } else {
                name = species::prefix_name(prefix, &name);
            }
        }
        FieldEditRequest {
            name,
            date: pick(&self.date, &current.date),
            latitude: pick(&self.latitude, &current.latitude),
            longitude: pick(&self.longitude, &current.longitude),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.prefix.is_none()
            && self.date.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

/// The result of processing a single image.
#[derive(Debug, Serialize)]
pub struct ProcessResult {
    pub path: PathBuf,
    /// Where the file ends up (or would, in a dry run).
    pub final_path: Option<PathBuf>,
    /// Field values before the edit.
    pub before: Option<FieldEditRequest>,
    /// Field values that were (or would be) saved.
    pub after: Option<FieldEditRequest>,
    pub backup_path: Option<PathBuf>,
    /// Set when the metadata was saved but the rename failed.
    pub rename_error: Option<String>,
    pub error: Option<String>,
    pub dry_run: bool,
}

impl ProcessResult {
    fn new(path: &Path, dry_run: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            final_path: None,
            before: None,
            after: None,
            backup_path: None,
            rename_error: None,
            error: None,
            dry_run,
        }
    }
}

/// Apply `overrides` to one image and save it.
///
/// The coordinate pair is range-checked before anything is written. In a
/// dry run the edits are validated and the destination computed, but no
/// file is touched.
///
/// # Example
///
/// ```rust,no_run
/// use exif_tools::config::Config;
/// use exif_tools::pipeline::{process_image, FieldOverrides};
/// use std::path::Path;
///
/// # async fn example() {
/// let config = Config::default();
/// let overrides = FieldOverrides {
///     date: Some("2024-03-05 10:00".into()),
///     ..Default::default()
/// };
/// let result = process_image(Path::new("photo.jpg"), &overrides, None, &config).await;
/// if let Some(err) = &result.error {
///     eprintln!("{err}");
/// }
/// # }
/// ```
pub async fn process_image(
    path: &Path,
    overrides: &FieldOverrides,
    target: Option<&Path>,
    config: &Config,
) -> ProcessResult {
    let mut result = ProcessResult::new(path, config.output.dry_run);

    let photo = match load_photo(path, &config.dates) {
        Ok(photo) => photo,
        Err(e) => {
            result.error = Some(e.to_string());
            return result;
        }
    };
    let edits = overrides.apply(path, &photo.fields);
    result.before = Some(photo.fields);
    result.after = Some(edits.clone());

    if let Err(e) = fields::validate_coordinate_pair(&edits.latitude, &edits.longitude) {
        result.error = Some(e.to_string());
        return result;
    }

    if config.output.dry_run {
        match edits.validate(&config.dates) {
            Ok(_) => result.final_path = Some(editor::final_path(path, &edits.name, target)),
            Err(e) => result.error = Some(e.to_string()),
        }
        return result;
    }

    if config.output.backup_originals {
        match backup_file(path) {
            Ok(backup) => result.backup_path = Some(backup),
            Err(e) => log::warn!("Failed to backup {}: {e}", path.display()),
        }
    }

    match editor::save_in_background(
        path.to_path_buf(),
        edits,
        target.map(Path::to_path_buf),
        config.dates.clone(),
    )
    .await
    {
        Ok(outcome) => {
            result.rename_error = outcome
                .rename_failure
                .as_ref()
                .map(|f| format!("could not rename to {}: {}", f.target.display(), f.source));
            result.final_path = Some(outcome.path);
        }
        Err(e) => result.error = Some(e.to_string()),
    }

    result
}
