//! Configuration persistence using toml_edit to preserve formatting and comments.

use anyhow::{Context, Result};
use std::path::Path;
use toml_edit::DocumentMut;

/// Write `output.destination` into the config file, creating the file (and
/// its directory) if needed. Everything else in the file is left untouched.
pub fn set_destination(path: &Path, token: &str) -> Result<()> {
    let mut doc = read_document(path)?;

    if !doc.contains_table("output") {
        doc["output"] = toml_edit::table();
    }
    doc["output"]["destination"] = toml_edit::value(token);

    write_document(path, &doc)
}

fn read_document(path: &Path) -> Result<DocumentMut> {
    if !path.exists() {
        return Ok(DocumentMut::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    content
        .parse()
        .with_context(|| format!("Failed to parse config file: {:?}", path))
}

fn write_document(path: &Path, doc: &DocumentMut) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    std::fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}
