//! Terminal output for pipeline events and run reports.

use pf_core::events::{Event, EventPayload};
use pf_pipeline::{JobReport, PublishOutcome, RunReport};

/// Turns pipeline events into progress lines.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    total: usize,
    started: usize,
}

impl ProgressPrinter {
    /// Line to print for an event, if any. Encoder log lines are left to
    /// the tracing output.
    pub fn line_for(&mut self, event: &Event) -> Option<String> {
        match &event.payload {
            EventPayload::RunStarted { jobs, format, .. } => {
                self.total = *jobs;
                self.started = 0;
                Some(format!("Converting {jobs} image(s) to {format}"))
            }
            EventPayload::JobStarted {
                source,
                output_file_name,
                ..
            } => {
                self.started += 1;
                Some(format!(
                    "[{}/{}] {source} -> {output_file_name}",
                    self.started, self.total
                ))
            }
            EventPayload::JobPublished { locator, bytes, .. } => {
                Some(format!("  ✓ saved {locator} ({})", human_bytes(*bytes)))
            }
            EventPayload::JobShared { locator, .. } => Some(format!("  ↗ shared {locator}")),
            EventPayload::JobFailed { stage, error, .. } => {
                let mut line = format!("  ✗ {} failed", stage.as_str());
                for detail in error.lines() {
                    line.push_str("\n      ");
                    line.push_str(detail);
                }
                Some(line)
            }
            EventPayload::RunCancelled { skipped, .. } => {
                Some(format!("Cancelled; {skipped} image(s) skipped"))
            }
            EventPayload::JobLog { .. }
            | EventPayload::JobEncoded { .. }
            | EventPayload::RunFinished { .. } => None,
        }
    }
}

/// Human-readable summary of a finished run.
pub fn summary(report: &RunReport) -> String {
    let mut out = format!(
        "\n{} succeeded, {} failed, {} cancelled ({:.1}s)",
        report.succeeded,
        report.failed,
        report.cancelled,
        report.elapsed_ms as f64 / 1000.0
    );

    let failures: Vec<&JobReport> = report.outcomes.iter().filter(|r| r.failed()).collect();
    if !failures.is_empty() {
        out.push_str("\n\nFailures:");
        for job in failures {
            let reason = match &job.outcome {
                Some(PublishOutcome::EncodeFailed { log }) => {
                    last_line(log).unwrap_or("encoder failed without output").to_string()
                }
                Some(PublishOutcome::PublishFailed { error }) => error.clone(),
                _ => continue,
            };
            out.push_str(&format!("\n  {}: {reason}", job.source.display_name()));
        }
    }

    for job in report.outcomes.iter().filter(|r| r.share_error.is_some()) {
        if let Some(ref error) = job.share_error {
            out.push_str(&format!(
                "\n  {}: saved, but sharing failed: {error}",
                job.source.display_name()
            ));
        }
    }

    out
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().find(|l| !l.trim().is_empty())
}

fn human_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}
