//! Transcoding job data model.
//!
//! A [`SourceImage`] is collected once from the user's selection, turned
//! into a [`TranscodeJob`] by the job builder, and consumed by the encoder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::ids::JobId;
use crate::media::TargetFormat;
use crate::quality::{Crf, WebpQuality};

const FILE_SCHEME: &str = "file://";

/// Opaque locator of an input image (a path or a URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceImage(String);

impl SourceImage {
    /// Wrap a locator as given by the selection collaborator.
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// The locator exactly as it was collected.
    pub fn locator(&self) -> &str {
        &self.0
    }

    /// Resolve the locator to a local filesystem path.
    ///
    /// `file://` URIs and plain paths resolve; other URI schemes do not.
    pub fn local_path(&self) -> Option<PathBuf> {
        if let Some(rest) = self.0.strip_prefix(FILE_SCHEME) {
            return Some(PathBuf::from(rest));
        }
        if self.0.contains("://") {
            return None;
        }
        Some(PathBuf::from(&self.0))
    }

    /// The value handed to the encoder as its input argument.
    ///
    /// Local locators are passed as paths; anything else is passed through
    /// untouched so the tool can resolve its own protocols.
    pub fn input_arg(&self) -> String {
        match self.local_path() {
            Some(path) => path.to_string_lossy().into_owned(),
            None => self.0.clone(),
        }
    }

    /// Short name for logs and reports.
    pub fn display_name(&self) -> String {
        self.local_path()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| self.0.clone())
    }
}

impl fmt::Display for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceImage {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Parallelism hints passed to the AV1 encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvifTuning {
    /// Encoder thread count.
    pub threads: u32,
    /// Encoder effort (`-cpu-used`); higher is faster.
    pub cpu_used: u32,
    /// Row-based multithreading.
    pub row_mt: bool,
    /// Tile grid columns.
    pub tile_columns: u32,
    /// Tile grid rows.
    pub tile_rows: u32,
}

impl Default for AvifTuning {
    fn default() -> Self {
        Self {
            threads: 4,
            cpu_used: 4,
            row_mt: true,
            tile_columns: 2,
            tile_rows: 2,
        }
    }
}

impl AvifTuning {
    /// Tile grid in the `COLSxROWS` form the encoder expects.
    pub fn tiles(&self) -> String {
        format!("{}x{}", self.tile_columns, self.tile_rows)
    }
}

/// Format-specific encoder settings for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum EncodeSettings {
    Avif {
        crf: Crf,
        #[serde(default)]
        tuning: AvifTuning,
    },
    Webp {
        quality: WebpQuality,
    },
}

impl EncodeSettings {
    /// The output format these settings produce.
    pub fn format(&self) -> TargetFormat {
        match self {
            EncodeSettings::Avif { .. } => TargetFormat::Avif,
            EncodeSettings::Webp { .. } => TargetFormat::Webp,
        }
    }

    /// The raw quality control value on the format's own scale.
    pub fn quality_value(&self) -> u32 {
        match self {
            EncodeSettings::Avif { crf, .. } => crf.value(),
            EncodeSettings::Webp { quality } => quality.value(),
        }
    }
}

/// A single image transcoding request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub id: JobId,
    pub source: SourceImage,
    pub settings: EncodeSettings,
    /// Collision-free file name (`<uuid>.<ext>`) used in the scratch area
    /// and at the destination.
    pub output_file_name: String,
}

impl TranscodeJob {
    pub fn format(&self) -> TargetFormat {
        self.settings.format()
    }

    pub fn media_type(&self) -> &'static str {
        self.format().media_type()
    }
}
