//! Selection collector: turns command-line inputs into source images.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use pf_core::paths::is_image_file;
use pf_core::SourceImage;
use walkdir::WalkDir;

/// Input that means "read locators from stdin".
pub const STDIN_MARKER: &str = "-";

/// Collect source images from `inputs`, in the order given.
///
/// - `-` reads newline separated locators from `stdin`.
/// - A directory contributes its image files (sorted by name); with
///   `recursive` its subdirectories too.
/// - Anything else is taken as a locator verbatim, even if it does not
///   exist locally, so the encoder can report on it.
///
/// Duplicates are dropped, keeping the first occurrence.
pub fn collect(
    inputs: &[String],
    recursive: bool,
    stdin: impl BufRead,
) -> Result<Vec<SourceImage>> {
    let mut stdin = Some(stdin);
    let mut seen = HashSet::new();
    let mut selection = Vec::new();

    let mut push = |source: SourceImage| {
        if seen.insert(source.clone()) {
            selection.push(source);
        } else {
            tracing::debug!("Skipping duplicate input {source}");
        }
    };

    for input in inputs {
        if input == STDIN_MARKER {
            let Some(reader) = stdin.take() else {
                tracing::warn!("stdin listed more than once; ignoring repeat");
                continue;
            };
            for line in reader.lines() {
                let line = line.context("Failed to read locators from stdin")?;
                let line = line.trim();
                if !line.is_empty() {
                    push(SourceImage::new(line));
                }
            }
            continue;
        }

        let source = SourceImage::new(input.as_str());
        match source.local_path() {
            Some(path) if path.is_dir() => {
                for image in expand_dir(&path, recursive)? {
                    push(image);
                }
            }
            Some(path) if !path.exists() => {
                tracing::warn!("Input {} does not exist", path.display());
                push(source);
            }
            _ => push(source),
        }
    }

    Ok(selection)
}

fn expand_dir(dir: &Path, recursive: bool) -> Result<Vec<SourceImage>> {
    let mut walker = WalkDir::new(dir).sort_by_file_name().min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut images = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to read directory {:?}", dir))?;
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            images.push(SourceImage::new(entry.path().to_string_lossy().as_ref()));
        }
    }

    if images.is_empty() {
        tracing::warn!("No images found in {}", dir.display());
    }

    Ok(images)
}
