//! Job builder: turns a selected image into a [`TranscodeJob`].
//!
//! Building is pure apart from drawing a random identifier for the output
//! name, which keeps names unique even when jobs are built concurrently.

use pf_core::{
    AvifTuning, Crf, EncodeSettings, JobId, SourceImage, TargetFormat, TranscodeJob, WebpQuality,
};
use uuid::Uuid;

/// Generate a unique `<uuid>.<ext>` file name for the given format.
pub fn output_file_name(format: TargetFormat) -> String {
    format!("{}.{}", Uuid::new_v4(), format.extension())
}

/// Build a job from a raw quality value on the format's own scale.
///
/// For AVIF `quality` is a CRF (lower is better); for WEBP it is a
/// percentage (higher is better).
///
/// # Errors
///
/// Returns [`pf_core::Error::Validation`] if `quality` is out of range for
/// the format.
pub fn build_job(
    source: SourceImage,
    format: TargetFormat,
    quality: u32,
    tuning: &AvifTuning,
) -> pf_core::Result<TranscodeJob> {
    let settings = match format {
        TargetFormat::Avif => EncodeSettings::Avif {
            crf: Crf::new(quality)?,
            tuning: tuning.clone(),
        },
        TargetFormat::Webp => EncodeSettings::Webp {
            quality: WebpQuality::new(quality)?,
        },
    };
    Ok(job_for(source, &settings))
}

/// Build a job from already validated settings.
pub fn job_for(source: SourceImage, settings: &EncodeSettings) -> TranscodeJob {
    TranscodeJob {
        id: JobId::new(),
        source,
        settings: settings.clone(),
        output_file_name: output_file_name(settings.format()),
    }
}
