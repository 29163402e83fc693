use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use exif_tools::exif::PhotoInfo;
use exif_tools::fields::FieldEditRequest;
use exif_tools::{config, editor, exif, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "exif-tools",
    version,
    about = "Edit photo file names, capture dates and GPS positions"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// New file name, without extension (single file only; empty keeps the name)
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// Text to put in front of the current file name
    #[arg(long, value_name = "TEXT")]
    prefix: Option<String>,

    /// Capture date in any accepted format; an empty value removes it
    #[arg(long, value_name = "DATE")]
    date: Option<String>,

    /// Latitude in decimal degrees; an empty value removes it
    #[arg(long = "lat", value_name = "DEGREES", allow_hyphen_values = true)]
    latitude: Option<String>,

    /// Longitude in decimal degrees; an empty value removes it
    #[arg(long = "lon", value_name = "DEGREES", allow_hyphen_values = true)]
    longitude: Option<String>,

    /// Save the edits into a copy instead (single file only)
    #[arg(long = "save-as", value_name = "FILE")]
    save_as: Option<PathBuf>,

    /// Display photo information and exit
    #[arg(long)]
    show: bool,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Preview changes without writing to files
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> pipeline::FieldOverrides {
        pipeline::FieldOverrides {
            name: self.name.clone(),
            prefix: self.prefix.clone(),
            date: self.date.clone(),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.output.dry_run = true;
    }

    let images = pipeline::collect_images(&cli.paths, &config.files.extensions);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    // Handle --show
    if cli.show {
        let mut infos = Vec::new();
        for image_path in &images {
            match exif::read_photo_info(image_path, &config.dates) {
                Ok(info) => infos.push(info),
                Err(e) => log::error!("{}: {e}", image_path.display()),
            }
        }
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&infos)?);
        } else {
            infos.iter().for_each(print_photo_info);
        }
        return Ok(());
    }

    let overrides = cli.overrides();
    if overrides.is_empty() && cli.save_as.is_none() {
        anyhow::bail!("Nothing to change. Pass --name, --prefix, --date, --lat/--lon or --save-as.");
    }
    if (cli.name.is_some() || cli.save_as.is_some()) && images.len() != 1 {
        anyhow::bail!(
            "--name and --save-as need exactly one image, but {} were given.",
            images.len()
        );
    }

    // Handle --save-as
    if let Some(ref new_path) = cli.save_as {
        return save_copy(&images[0], new_path, &overrides, &config);
    }

    log::info!("Found {} image(s) to process", images.len());
    if config.output.dry_run {
        log::info!("DRY RUN — no files will be modified");
    }

    let mut results = Vec::new();
    let total = images.len();

    for (i, image_path) in images.iter().enumerate() {
        log::info!("[{}/{}] Processing: {}", i + 1, total, image_path.display());

        let result = pipeline::process_image(image_path, &overrides, None, &config).await;

        if let Some(ref err) = result.error {
            log::error!("  Error: {err}");
        } else {
            if config.output.dry_run && !cli.json {
                print_edit_preview(&result);
            }
            if let Some(ref backup) = result.backup_path {
                log::info!("  Backup: {}", backup.display());
            }
            if let Some(ref err) = result.rename_error {
                log::warn!("  Metadata saved, but {err}");
            } else if let Some(ref final_path) = result.final_path {
                if final_path != image_path {
                    log::info!("  Renamed to {}", final_path.display());
                }
            }
        }

        results.push(result);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    // Summary
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let success = total - failed;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    if failed > 0 {
        anyhow::bail!("{failed} of {total} images could not be saved");
    }
    Ok(())
}

/// Write the edits into a copy of `path` at `new_path`.
fn save_copy(
    path: &Path,
    new_path: &Path,
    overrides: &pipeline::FieldOverrides,
    config: &config::Config,
) -> Result<()> {
    let photo = editor::load_photo(path, &config.dates)?;
    let edits = overrides.apply(path, &photo.fields);
    exif_tools::fields::validate_coordinate_pair(&edits.latitude, &edits.longitude)?;

    if config.output.dry_run {
        edits.validate(&config.dates)?;
        print_field_table(&photo.fields, &edits);
        println!("  Would save a copy as {}", new_path.display());
        return Ok(());
    }

    let outcome = editor::save_photo_as(path, new_path, &edits, &config.dates)?;
    println!("Saved copy: {}", outcome.path.display());
    Ok(())
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (field column width + " : " = 17 chars + 2 leading spaces).
const INDENT: &str = "                   ";

/// Print the before/after table for one dry-run result.
fn print_edit_preview(result: &pipeline::ProcessResult) {
    let (Some(before), Some(after)) = (&result.before, &result.after) else {
        return;
    };
    println!();
    println!("{BOLD}File:{RESET} {}", result.path.display());
    print_field_table(before, after);
    if let Some(ref final_path) = result.final_path {
        if final_path != &result.path {
            println!("  Would rename to {}", final_path.display());
        }
    }
}

/// Print current and new field values; changed rows are green with `*`.
fn print_field_table(before: &FieldEditRequest, after: &FieldEditRequest) {
    println!("  {DIM}{}{RESET}", "─".repeat(66));
    let rows = [
        ("Name", &before.name, &after.name),
        ("Date", &before.date, &after.date),
        ("Latitude", &before.latitude, &after.latitude),
        ("Longitude", &before.longitude, &after.longitude),
    ];
    for (field, old, new) in rows {
        if old == new {
            print_row(field, old);
        } else {
            let shown = if new.is_empty() { "(removed)" } else { new.as_str() };
            print_changed(field, old, shown);
        }
    }
    println!("  {DIM}{}{RESET}", "─".repeat(66));
    println!("  {GREEN}*{RESET} = new value to be written");
}

/// Print the summary of one photo.
fn print_photo_info(info: &PhotoInfo) {
    println!();
    println!("{BOLD}File:{RESET} {}", info.path.display());
    println!("{DIM}{}{RESET}", "═".repeat(68));

    print_row("Name", &info.name);
    if let Some(ref format) = info.format {
        print_row("Format", format);
    }
    print_row("Size", &info.weight);
    if let Some((w, h)) = info.dimensions {
        print_row("Dimensions", &format!("{w} x {h}"));
    }
    if let Some(ref modified) = info.modified {
        print_row("Modified", modified);
    }

    println!();
    println!("  {BOLD}Metadata{RESET} {DIM}({}){RESET}", status_label(info));
    println!("  {DIM}{}{RESET}", "─".repeat(66));
    let mut any = false;
    if let Some(ref device) = info.device {
        print_row("Device", device);
        any = true;
    }
    if let Some(ref date) = info.date_taken {
        print_row("Date taken", date);
        any = true;
    }
    if let (Some(lat), Some(lon)) = (info.latitude, info.longitude) {
        print_row("Latitude", &format!("{lat:.6}"));
        print_row("Longitude", &format!("{lon:.6}"));
        any = true;
    }
    if !any {
        println!("  {DIM}(no editable metadata found){RESET}");
    }
    println!();
}

fn status_label(info: &PhotoInfo) -> &'static str {
    match info.metadata {
        exif::reader::MetadataStatus::Present => "present",
        exif::reader::MetadataStatus::Absent => "none",
        exif::reader::MetadataStatus::Unreadable => "unreadable",
    }
}

/// Print a single row in the display table.
fn print_row(field: &str, val: &str) {
    let field_col = format!("{:<14}", field);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {field_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Print a changed row: old value dimmed, new value green with `*`.
fn print_changed(field: &str, old: &str, new: &str) {
    let field_col = format!("{:<14}", field);
    if !old.is_empty() {
        println!("  {DIM}{field_col} : {old}{RESET}");
        println!("  {GREEN}{INDENT}{new} *{RESET}");
    } else {
        println!("  {GREEN}{field_col} : {new} *{RESET}");
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for word in s.split_whitespace() {
        match lines.last_mut() {
            Some(line) if line.len() + 1 + word.len() <= max_width => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_string()),
        }
    }
    if lines.is_empty() {
        lines.push(s.to_string());
    }
    lines
}
