//! Species naming helpers.
//!
//! Identifying the animal or plant in a photo is left to an external
//! classifier behind [`SpeciesClassifier`]. This module only decides what
//! to do with its answer: photos are named `"<Genus species> <rest>"`.

use anyhow::Result;
use std::path::Path;

use crate::editor::LoadedPhoto;
use crate::fields;

/// An external service that names the species shown in a photo.
///
/// # Example
///
/// ```rust
/// use exif_tools::species::SpeciesClassifier;
/// use std::path::Path;
///
/// struct AlwaysHeron;
///
/// #[async_trait::async_trait]
/// impl SpeciesClassifier for AlwaysHeron {
///     fn name(&self) -> &str {
///         "always-heron"
///     }
///
///     async fn classify(
///         &self,
///         _image: &Path,
///         _latitude: Option<f64>,
///         _longitude: Option<f64>,
///     ) -> anyhow::Result<String> {
///         Ok("Ardea cinerea".to_string())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait SpeciesClassifier: Send + Sync {
    /// The display name of this classifier.
    fn name(&self) -> &str;

    /// Scientific name of the species in the image, or an empty string when
    /// nothing was recognized with enough confidence.
    ///
    /// * `latitude`, `longitude`: where the photo was taken, when known,
    ///   to narrow the candidates to species seen in that area
    async fn classify(&self, image: &Path, latitude: Option<f64>, longitude: Option<f64>) -> Result<String>;
}

/// Put `prefix` in front of the current name.
pub fn prefix_name(prefix: &str, current: &str) -> String {
    format!("{prefix} {current}").trim().to_string()
}

/// True when a file name already starts with a binomial name: more than two
/// words, the first capitalized and the second lower-case
/// (`"Ardea cinerea 3.jpg"`).
pub fn has_species_name(path: &Path) -> bool {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let words: Vec<&str> = stem.split_whitespace().collect();
    if words.len() <= 2 {
        return false;
    }
    let starts_upper = words[0].chars().next().is_some_and(char::is_uppercase);
    let starts_lower = words[1].chars().next().is_some_and(char::is_lowercase);
    starts_upper && starts_lower
}

/// Ask `classifier` for a species and build the suggested new name for
/// `photo`.
///
/// Returns `None` when the file is already named after a species or when
/// the classifier recognized nothing. The suggestion is passed through
/// the name sanitizer so it is safe to use as a file name.
pub async fn suggest_name(classifier: &dyn SpeciesClassifier, photo: &LoadedPhoto) -> Result<Option<String>> {
    if has_species_name(&photo.path) {
        log::debug!("{} already carries a species name", photo.path.display());
        return Ok(None);
    }

    let position = fields::read_coordinates(&photo.store);
    let species = classifier
        .classify(&photo.path, position.map(|(lat, _)| lat), position.map(|(_, lon)| lon))
        .await?;
    let species = species.trim();
    if species.is_empty() {
        log::info!("{}: no species recognized in {}", classifier.name(), photo.path.display());
        return Ok(None);
    }

    log::info!("{}: {} → {species}", classifier.name(), photo.path.display());
    Ok(Some(fields::sanitize_name(&prefix_name(species, &photo.fields.name))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::load_photo;
    use crate::exif::reader::MetadataStatus;
    use crate::exif::store::TagStore;
    use crate::fields::{Axis, CoordinateEdit, DateFormats, FieldEditRequest, apply_coordinate};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Returns a fixed answer and records what it was asked.
    struct FixedClassifier {
        answer: String,
        calls: Mutex<Vec<(Option<f64>, Option<f64>)>>,
    }

    impl FixedClassifier {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SpeciesClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn classify(&self, _image: &Path, latitude: Option<f64>, longitude: Option<f64>) -> Result<String> {
            self.calls.lock().unwrap().push((latitude, longitude));
            Ok(self.answer.clone())
        }
    }

    fn photo(path: &str, store: TagStore) -> LoadedPhoto {
        let path = PathBuf::from(path);
        let fields = FieldEditRequest::from_store(&path, &store, &DateFormats::default());
        LoadedPhoto {
            path,
            store,
            status: MetadataStatus::Present,
            fields,
        }
    }

    #[test]
    fn prefixing() {
        assert_eq!(prefix_name("Ardea cinerea", "IMG_0001"), "Ardea cinerea IMG_0001");
        assert_eq!(prefix_name("Ardea cinerea", ""), "Ardea cinerea");
        assert_eq!(prefix_name("", "IMG_0001"), "IMG_0001");
    }

    #[test]
    fn species_name_detection() {
        assert!(has_species_name(Path::new("/p/Ardea cinerea 3.jpg")));
        assert!(has_species_name(Path::new("Ardea cinerea IMG_0001.jpg")));
        assert!(!has_species_name(Path::new("Ardea cinerea.jpg")));
        assert!(!has_species_name(Path::new("IMG 0001 copy.jpg")));
        assert!(!has_species_name(Path::new("ardea cinerea 3.jpg")));
        assert!(!has_species_name(Path::new("IMG_0001.jpg")));
    }

    #[tokio::test]
    async fn suggestion_uses_position() {
        let mut store = TagStore::new();
        apply_coordinate(&mut store, Axis::Latitude, CoordinateEdit::Set(48.8566));
        apply_coordinate(&mut store, Axis::Longitude, CoordinateEdit::Set(2.3522));
        let photo = photo("/p/IMG_0001.jpg", store);
        let classifier = FixedClassifier::new("Ardea cinerea");

        let name = suggest_name(&classifier, &photo).await.unwrap();
        assert_eq!(name.as_deref(), Some("Ardea cinerea IMG_0001"));

        let calls = classifier.calls.lock().unwrap();
        let (lat, lon) = calls[0];
        assert!((lat.unwrap() - 48.8566).abs() < 1e-6);
        assert!((lon.unwrap() - 2.3522).abs() < 1e-6);
    }

    #[tokio::test]
    async fn no_suggestion_when_nothing_recognized() {
        let photo = photo("/p/IMG_0002.jpg", TagStore::new());
        let classifier = FixedClassifier::new("  ");
        assert_eq!(suggest_name(&classifier, &photo).await.unwrap(), None);
        assert_eq!(classifier.calls.lock().unwrap()[0], (None, None));
    }

    #[tokio::test]
    async fn named_photos_are_not_reclassified() {
        let photo = photo("/p/Ardea cinerea 2.jpg", TagStore::new());
        let classifier = FixedClassifier::new("Egretta garzetta");
        assert_eq!(suggest_name(&classifier, &photo).await.unwrap(), None);
        assert!(classifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn suggestion_from_loaded_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("DSC01234.jpg");
        image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]))
            .save(&path)
            .unwrap();
        let photo = load_photo(&path, &DateFormats::default()).unwrap();

        let classifier = FixedClassifier::new("Vulpes vulpes");
        let name = suggest_name(&classifier, &photo).await.unwrap();
        assert_eq!(name.as_deref(), Some("Vulpes vulpes DSC01234"));
    }
}
