//! End-to-end editing scenarios on real image files.

use std::fs;
use std::path::{Path, PathBuf};

use exif_tools::editor::{self, EditorState, MetadataEditor};
use exif_tools::exif::reader::{self, MetadataStatus};
use exif_tools::exif::{self, tags, Rational, Section, TagStore, TagValue};
use exif_tools::fields::{DateFormats, FieldEditRequest};
use tempfile::TempDir;

fn plain_jpeg(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    image::RgbImage::from_fn(16, 12, |x, y| image::Rgb([(x * 15) as u8, (y * 20) as u8, 128]))
        .save(&path)
        .unwrap();
    path
}

/// A JPEG carrying camera, date and GPS tags, as a phone would write it.
fn camera_jpeg(dir: &TempDir, name: &str) -> PathBuf {
    let path = plain_jpeg(dir, name);
    let mut store = TagStore::new();
    store.set(Section::Image, tags::MAKE, TagValue::ascii("Canon"));
    store.set(Section::Image, tags::MODEL, TagValue::ascii("Canon EOS R5"));
    store.set(Section::Image, tags::DATE_TIME, TagValue::ascii("2023:07:14 18:30:00"));
    store.set(Section::Exif, tags::DATE_TIME_ORIGINAL, TagValue::ascii("2023:07:14 18:30:00"));
    store.set(Section::Exif, tags::FOCAL_LENGTH, TagValue::Rational(Rational::new(50, 1)));
    store.set(Section::Gps, tags::GPS_VERSION_ID, TagValue::Bytes(vec![2, 3, 0, 0]));
    store.set(Section::Gps, tags::GPS_LATITUDE_REF, TagValue::ascii("S"));
    store.set(
        Section::Gps,
        tags::GPS_LATITUDE,
        TagValue::RationalList(vec![Rational::integer(33), Rational::integer(52), Rational::new(76800, 10000)]),
    );
    store.set(Section::Gps, tags::GPS_LONGITUDE_REF, TagValue::ascii("E"));
    store.set(
        Section::Gps,
        tags::GPS_LONGITUDE,
        TagValue::RationalList(vec![Rational::integer(151), Rational::integer(12), Rational::new(334800, 10000)]),
    );
    store.normalize();
    exif::insert_exif(&path, &exif::serialize(&store).unwrap()).unwrap();
    path
}

fn stored(path: &Path) -> TagStore {
    let (store, status) = reader::read_store(path).unwrap();
    assert_eq!(status, MetadataStatus::Present);
    store
}

fn fields(path: &Path) -> FieldEditRequest {
    editor::load_photo(path, &DateFormats::default()).unwrap().fields
}

#[test]
fn scenario_a_date_in_all_slots() {
    let dir = TempDir::new().unwrap();
    let path = plain_jpeg(&dir, "IMG_0001.jpg");

    let mut edits = fields(&path);
    edits.date = "2024-03-05 10:00:00".into();
    editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    let store = stored(&path);
    for (section, tag) in tags::DATE_TAGS {
        assert_eq!(store.text(section, tag).as_deref(), Some("2024:03:05 10:00:00"));
    }
    assert_eq!(fields(&path).date, "2024-03-05 10:00:00");
}

#[test]
fn scenario_b_gps_written_as_dms() {
    let dir = TempDir::new().unwrap();
    let path = plain_jpeg(&dir, "IMG_0002.jpg");

    let mut edits = fields(&path);
    edits.latitude = "48.8566".into();
    edits.longitude = "2.3522".into();
    editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    let store = stored(&path);
    assert_eq!(store.text(Section::Gps, tags::GPS_LATITUDE_REF).as_deref(), Some("N"));
    assert_eq!(store.text(Section::Gps, tags::GPS_LONGITUDE_REF).as_deref(), Some("E"));
    assert_eq!(
        store.get(Section::Gps, tags::GPS_LATITUDE).and_then(TagValue::as_rationals),
        Some(vec![Rational::integer(48), Rational::integer(51), Rational::new(237600, 10000)])
    );

    let reloaded = fields(&path);
    assert_eq!(reloaded.latitude, "48.8566");
    assert_eq!(reloaded.longitude, "2.3522");
}

#[test]
fn scenario_c_clearing_gps_keeps_other_tags() {
    let dir = TempDir::new().unwrap();
    let path = camera_jpeg(&dir, "IMG_0003.jpg");
    assert_eq!(fields(&path).latitude, "-33.8688");

    let mut edits = fields(&path);
    edits.latitude.clear();
    edits.longitude.clear();
    editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    let store = stored(&path);
    for tag in [
        tags::GPS_LATITUDE_REF,
        tags::GPS_LATITUDE,
        tags::GPS_LONGITUDE_REF,
        tags::GPS_LONGITUDE,
    ] {
        assert!(!store.contains(Section::Gps, tag));
    }
    assert_eq!(store.text(Section::Image, tags::MAKE).as_deref(), Some("Canon"));
    assert_eq!(store.text(Section::Image, tags::MODEL).as_deref(), Some("Canon EOS R5"));
    assert_eq!(
        store.text(Section::Exif, tags::DATE_TIME_ORIGINAL).as_deref(),
        Some("2023:07:14 18:30:00")
    );
    assert_eq!(
        store.get(Section::Exif, tags::FOCAL_LENGTH),
        Some(&TagValue::Rational(Rational::new(50, 1)))
    );
}

#[test]
fn scenario_d_name_goes_through_both_sanitizers() {
    let dir = TempDir::new().unwrap();
    let path = plain_jpeg(&dir, "IMG_0004.jpg");

    let mut edits = fields(&path);
    edits.name = "Héron cendré: 1".into();
    let outcome = editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    // ':' becomes '_' in the first pass; the second keeps accented letters.
    let expected = dir.path().join("Héron cendré_ 1.jpg");
    assert!(outcome.is_complete());
    assert_eq!(outcome.path, expected);
    assert!(expected.exists());
    assert!(!path.exists());
}

#[test]
fn scenario_e_unreadable_metadata_is_replaced() {
    let dir = TempDir::new().unwrap();
    let path = plain_jpeg(&dir, "IMG_0005.jpg");
    exif::insert_exif(&path, b"definitely not a TIFF block").unwrap();

    let photo = editor::load_photo(&path, &DateFormats::default()).unwrap();
    assert_eq!(photo.status, MetadataStatus::Unreadable);
    assert!(photo.store.is_empty());

    let mut edits = photo.fields.clone();
    edits.date = "05/03/2024".into();
    editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    let store = stored(&path);
    assert_eq!(store.len(), 3);
    for (section, tag) in tags::DATE_TAGS {
        assert_eq!(store.text(section, tag).as_deref(), Some("2024:03:05 00:00:00"));
    }
}

#[test]
fn scenario_e_absent_metadata() {
    let dir = TempDir::new().unwrap();
    let path = plain_jpeg(&dir, "IMG_0006.jpg");
    assert_eq!(
        editor::load_photo(&path, &DateFormats::default()).unwrap().status,
        MetadataStatus::Absent
    );

    let mut edits = fields(&path);
    edits.latitude = "10".into();
    edits.longitude = "-20".into();
    editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    let store = stored(&path);
    assert_eq!(store.section_len(Section::Image), 0);
    assert_eq!(store.section_len(Section::Exif), 0);
    assert_eq!(store.section_len(Section::Gps), 5);
    assert_eq!(store.text(Section::Gps, tags::GPS_LONGITUDE_REF).as_deref(), Some("W"));
}

#[test]
fn invalid_input_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = camera_jpeg(&dir, "IMG_0007.jpg");
    let before = fs::read(&path).unwrap();

    let mut editor = MetadataEditor::new(DateFormats::default());
    let mut edits = editor.load(&path).unwrap().fields.clone();
    edits.name = "renamed".into();
    edits.date = "March 5th".into();

    let err = editor.save(&edits, None).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(editor.state(), EditorState::Failed);
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!dir.path().join("renamed.jpg").exists());
}

#[test]
fn save_as_leaves_original_untouched() {
    let dir = TempDir::new().unwrap();
    let path = camera_jpeg(&dir, "IMG_0008.jpg");
    let before = fs::read(&path).unwrap();
    let copy = editor::default_copy_path(&path);
    assert_eq!(copy, dir.path().join("IMG_0008-copy.jpg"));

    let mut editor = MetadataEditor::new(DateFormats::default());
    let mut edits = editor.load(&path).unwrap().fields.clone();
    edits.date = "2020-01-02 03:04".into();
    editor.save_as(&copy, &edits).unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(fields(&copy).date, "2020-01-02 03:04:00");
    assert_eq!(editor.current().unwrap().path, copy);
    assert_eq!(editor.state(), EditorState::Saved);
}

#[test]
fn rename_collision_keeps_both_files() {
    let dir = TempDir::new().unwrap();
    let path = plain_jpeg(&dir, "IMG_0009.jpg");
    let taken = dir.path().join("Ardea cinerea.jpg");
    fs::write(&taken, b"someone else's photo").unwrap();

    let mut edits = fields(&path);
    edits.name = "Ardea cinerea".into();
    edits.latitude = "1.5".into();
    edits.longitude = "2.5".into();
    let outcome = editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    let failure = outcome.rename_failure.as_ref().unwrap();
    assert_eq!(failure.target, taken);
    assert_eq!(failure.source.kind(), std::io::ErrorKind::AlreadyExists);
    assert_eq!(outcome.path, path);
    assert_eq!(fs::read(&taken).unwrap(), b"someone else's photo");
    assert_eq!(fields(&path).latitude, "1.5");
}

#[test]
fn png_container() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scan.png");
    image::RgbaImage::from_pixel(6, 6, image::Rgba([1, 2, 3, 255]))
        .save(&path)
        .unwrap();

    let mut edits = fields(&path);
    edits.date = "2024-12-31 23:59:59".into();
    edits.latitude = "-0.5".into();
    edits.longitude = "179.999".into();
    editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    assert!(image::open(&path).is_ok());
    let reloaded = fields(&path);
    assert_eq!(reloaded.date, "2024-12-31 23:59:59");
    assert_eq!(reloaded.latitude, "-0.5");
    assert_eq!(reloaded.longitude, "179.999");
}

#[test]
fn photo_info_summary() {
    let dir = TempDir::new().unwrap();
    let path = camera_jpeg(&dir, "IMG_0010.jpg");

    let info = exif::read_photo_info(&path, &DateFormats::default()).unwrap();
    assert_eq!(info.name, "IMG_0010");
    assert_eq!(info.format.as_deref(), Some("JPEG"));
    assert_eq!(info.dimensions, Some((16, 12)));
    assert_eq!(info.device.as_deref(), Some("Canon EOS R5"));
    assert_eq!(info.date_taken.as_deref(), Some("2023-07-14 18:30:00"));
    assert_eq!(info.metadata, MetadataStatus::Present);
    assert!((info.latitude.unwrap() + 33.8688).abs() < 1e-6);
}

#[test]
fn written_block_reads_back_with_nom_exif() {
    use nom_exif::{Exif, ExifIter, ExifTag, MediaParser, MediaSource};

    let dir = TempDir::new().unwrap();
    let path = camera_jpeg(&dir, "IMG_0011.jpg");
    let mut edits = fields(&path);
    edits.latitude = "48.8566".into();
    edits.longitude = "2.3522".into();
    edits.date = "2024-03-05 10:00:00".into();
    editor::save_photo(&path, &edits, None, &DateFormats::default()).unwrap();

    let mut parser = MediaParser::new();
    let iter: ExifIter = parser.parse(MediaSource::file_path(&path).unwrap()).unwrap();
    let gps = iter.parse_gps_info().unwrap().unwrap();
    assert_eq!(gps.latitude_ref, 'N');
    assert_eq!(gps.longitude_ref, 'E');
    assert_eq!(gps.latitude.0.0, 48);
    assert_eq!(gps.latitude.1.0, 51);

    let exif: Exif = iter.into();
    let make = exif.get(ExifTag::Make).unwrap().to_string();
    assert!(make.contains("Canon"), "{make}");
}
