//! Encoder invoker: runs one job through an [`Encoder`] and records the
//! outcome.
//!
//! Every failure mode ends up in an [`EncodeResult`]; nothing is propagated
//! past the job boundary.

use std::path::PathBuf;

use pf_av::{EncodeRequest, Encoder, LogSender, RunScratch};
use pf_core::TranscodeJob;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Outcome of encoding one job.
#[derive(Debug, Clone, Serialize)]
pub struct EncodeResult {
    pub job: TranscodeJob,
    pub success: bool,
    /// Tool log on success or failure, or the invocation error detail.
    pub log_text: String,
    /// Staged output file, present only on success.
    pub produced_file: Option<PathBuf>,
    /// The tool's return code, if it ran to completion.
    pub return_code: Option<i32>,
    /// The encode was stopped by cancellation rather than failing.
    pub cancelled: bool,
}

impl EncodeResult {
    fn failed(job: TranscodeJob, log_text: String, return_code: Option<i32>) -> Self {
        Self {
            job,
            success: false,
            log_text,
            produced_file: None,
            return_code,
            cancelled: false,
        }
    }
}

/// Encode `job` into the run's staging directory.
///
/// Success means return code `0` *and* an output file on disk.
pub async fn invoke(
    encoder: &dyn Encoder,
    job: TranscodeJob,
    scratch: &RunScratch,
    log: &LogSender,
    cancel: &CancellationToken,
) -> EncodeResult {
    let output = scratch.path_for(&job.output_file_name);
    let request = EncodeRequest {
        input: job.source.input_arg(),
        output: output.clone(),
        settings: job.settings.clone(),
    };

    tracing::debug!(
        job_id = %job.id,
        "Encoding {} -> {} with {}",
        job.source,
        output.display(),
        encoder.name()
    );

    match encoder.encode(&request, log, cancel).await {
        Ok(out) if out.succeeded() => {
            if output.is_file() {
                EncodeResult {
                    job,
                    success: true,
                    log_text: out.log,
                    produced_file: Some(output),
                    return_code: Some(out.return_code),
                    cancelled: false,
                }
            } else {
                let mut log_text = out.log;
                log_text.push_str(&format!(
                    "{} reported success but produced no file at {}\n",
                    encoder.name(),
                    output.display()
                ));
                EncodeResult::failed(job, log_text, Some(out.return_code))
            }
        }
        Ok(out) => {
            tracing::warn!(
                job_id = %job.id,
                "{} exited with code {}",
                encoder.name(),
                out.return_code
            );
            EncodeResult::failed(job, out.log, Some(out.return_code))
        }
        Err(e) => {
            let cancelled = e.is_cancelled();
            if cancelled {
                tracing::info!(job_id = %job.id, "Encode cancelled");
            } else {
                tracing::warn!(job_id = %job.id, "Encoder invocation failed: {e}");
            }
            let mut result = EncodeResult::failed(job, e.to_string(), None);
            result.cancelled = cancelled;
            result
        }
    }
}
