//! Pipeline orchestrator: owns the run state and the background worker.
//!
//! ```text
//! Idle -> Running -> (per job: Encoding -> Publishing -> Done | Error) -> Idle
//! ```
//!
//! At most one run exists at a time. A start request while a run is active
//! is rejected, never queued. Each run stages its encodes in its own
//! directory under the scratch area, removed when the run ends.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pf_av::{Encoder, LogSender, RunScratch, ScratchArea};
use pf_core::events::{EventBus, EventPayload, FailureStage};
use pf_core::{EncodeSettings, JobId, RunId, SourceImage, TargetFormat, TranscodeJob};

use crate::builder;
use crate::destination::Destination;
use crate::invoker::{self, EncodeResult};
use crate::publisher::{self, PublishOutcome};
use crate::share::Share;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Whether a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
}

/// Where a single job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Queued,
    Encoding,
    Publishing,
    Done,
    Error,
    Skipped,
}

/// Progress of one job within the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub source: SourceImage,
    pub output_file_name: String,
    pub phase: JobPhase,
}

/// Snapshot of everything the pipeline is doing.
///
/// This is the only mutable state the pipeline has. Front ends read it
/// through [`Orchestrator::state`] instead of keeping their own flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub phase: RunPhase,
    pub run_id: Option<RunId>,
    pub selection: Vec<SourceImage>,
    pub settings: Option<EncodeSettings>,
    pub jobs: Vec<JobStatus>,
}

impl PipelineState {
    fn set_job_phase(&mut self, job_id: JobId, phase: JobPhase) {
        if let Some(status) = self.jobs.iter_mut().find(|s| s.job_id == job_id) {
            status.phase = phase;
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and reports
// ---------------------------------------------------------------------------

/// Everything needed to start a run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Images in the order they were selected.
    pub selection: Vec<SourceImage>,
    pub settings: EncodeSettings,
    /// Jobs encoded concurrently. `0` is treated as `1`.
    pub parallelism: usize,
}

impl RunRequest {
    pub fn new(selection: Vec<SourceImage>, settings: EncodeSettings) -> Self {
        Self {
            selection,
            settings,
            parallelism: 1,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }
}

/// Why a run was not started. Neither case changes the pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("no images selected")]
    SelectionEmpty,
    #[error("a conversion is already running, please wait")]
    AlreadyRunning,
}

/// Final record of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub source: SourceImage,
    pub output_file_name: String,
    /// `None` when the job was skipped because the run was cancelled.
    pub outcome: Option<PublishOutcome>,
    pub shared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_error: Option<String>,
}

impl JobReport {
    fn new(job: &TranscodeJob, outcome: Option<PublishOutcome>) -> Self {
        Self {
            job_id: job.id,
            source: job.source.clone(),
            output_file_name: job.output_file_name.clone(),
            outcome,
            shared: false,
            share_error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.as_ref().is_some_and(PublishOutcome::is_published)
    }

    pub fn failed(&self) -> bool {
        self.outcome.as_ref().is_some_and(|o| !o.is_published())
    }

    pub fn skipped(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub format: TargetFormat,
    /// One entry per selected image, in selection order.
    pub outcomes: Vec<JobReport>,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed_ms: u64,
}

impl RunReport {
    fn new(
        run_id: RunId,
        format: TargetFormat,
        outcomes: Vec<JobReport>,
        started: Instant,
    ) -> Self {
        let succeeded = outcomes.iter().filter(|r| r.succeeded()).count();
        let failed = outcomes.iter().filter(|r| r.failed()).count();
        let cancelled = outcomes.iter().filter(|r| r.skipped()).count();
        Self {
            run_id,
            format,
            outcomes,
            succeeded,
            failed,
            cancelled,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Every job was published.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

/// Handle to a run started by [`Orchestrator::start`].
#[derive(Debug)]
pub struct RunHandle {
    run_id: RunId,
    cancel: CancellationToken,
    task: JoinHandle<RunReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Stop the run. Remaining jobs are skipped and the running encode is
    /// killed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token cancelling this run; hand it to signal handlers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> pf_core::Result<RunReport> {
        self.task
            .await
            .map_err(|e| pf_core::Error::Internal(format!("pipeline worker failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

struct Inner {
    encoder: Arc<dyn Encoder>,
    destination: Arc<dyn Destination>,
    share: Arc<dyn Share>,
    scratch: ScratchArea,
    events: Arc<EventBus>,
    state: Mutex<PipelineState>,
}

/// Runs transcoding jobs on a single background worker.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        destination: Arc<dyn Destination>,
        share: Arc<dyn Share>,
        scratch: ScratchArea,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                encoder,
                destination,
                share,
                scratch,
                events,
                state: Mutex::new(PipelineState::default()),
            }),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PipelineState {
        self.inner.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().phase == RunPhase::Running
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    /// Start a run on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, request: RunRequest) -> Result<RunHandle, StartError> {
        if request.selection.is_empty() {
            tracing::info!("Run rejected: no images selected");
            return Err(StartError::SelectionEmpty);
        }

        let run_id = RunId::new();
        let jobs: Vec<TranscodeJob> = request
            .selection
            .iter()
            .cloned()
            .map(|source| builder::job_for(source, &request.settings))
            .collect();

        {
            let mut state = self.inner.state.lock();
            if state.phase == RunPhase::Running {
                tracing::info!("Run rejected: a run is already in progress");
                return Err(StartError::AlreadyRunning);
            }
            *state = PipelineState {
                phase: RunPhase::Running,
                run_id: Some(run_id),
                selection: request.selection.clone(),
                settings: Some(request.settings.clone()),
                jobs: jobs
                    .iter()
                    .map(|job| JobStatus {
                        job_id: job.id,
                        source: job.source.clone(),
                        output_file_name: job.output_file_name.clone(),
                        phase: JobPhase::Queued,
                    })
                    .collect(),
            };
        }

        let cancel = CancellationToken::new();
        let worker = self.clone();
        let token = cancel.clone();
        let format = request.settings.format();
        let parallelism = request.parallelism.max(1);
        let task = tokio::spawn(async move {
            worker.run(run_id, format, jobs, parallelism, token).await
        });

        Ok(RunHandle {
            run_id,
            cancel,
            task,
        })
    }

    async fn run(
        self,
        run_id: RunId,
        format: TargetFormat,
        jobs: Vec<TranscodeJob>,
        parallelism: usize,
        cancel: CancellationToken,
    ) -> RunReport {
        // Back to Idle however the worker exits, including a panic.
        let _idle = IdleOnDrop(&self.inner.state);
        let started = Instant::now();
        let events = &self.inner.events;

        tracing::info!(
            run_id = %run_id,
            "Starting run: {} image(s) to {format}, {} at a time, into {}",
            jobs.len(),
            parallelism,
            self.inner.destination.describe()
        );
        events.broadcast(EventPayload::RunStarted {
            run_id,
            jobs: jobs.len(),
            format,
        });

        let staging = self
            .inner
            .scratch
            .begin_run(self.inner.destination.local_root());
        let outcomes = match staging {
            Ok(staging) => {
                let jobs = jobs
                    .into_iter()
                    .map(|job| self.process_job(job, &staging, &cancel));
                futures::stream::iter(jobs)
                    .buffered(parallelism)
                    .collect::<Vec<_>>()
                    .await
            }
            Err(e) => {
                let error = format!(
                    "scratch area {} unavailable: {e}",
                    self.inner.scratch.root().display()
                );
                tracing::error!(run_id = %run_id, "{error}");
                jobs.iter()
                    .map(|job| {
                        self.fail(job, FailureStage::Encode, &error);
                        let outcome = PublishOutcome::EncodeFailed { log: error.clone() };
                        JobReport::new(job, Some(outcome))
                    })
                    .collect()
            }
        };

        let report = RunReport::new(run_id, format, outcomes, started);

        if cancel.is_cancelled() {
            tracing::info!(run_id = %run_id, "Run cancelled; {} job(s) skipped", report.cancelled);
            events.broadcast(EventPayload::RunCancelled {
                run_id,
                skipped: report.cancelled,
            });
        }
        tracing::info!(
            run_id = %run_id,
            "Run finished: {} succeeded, {} failed, {} cancelled in {}ms",
            report.succeeded,
            report.failed,
            report.cancelled,
            report.elapsed_ms
        );
        events.broadcast(EventPayload::RunFinished {
            run_id,
            succeeded: report.succeeded,
            failed: report.failed,
        });

        report
    }

    async fn process_job(
        &self,
        job: TranscodeJob,
        staging: &RunScratch,
        cancel: &CancellationToken,
    ) -> JobReport {
        let inner = &self.inner;

        if cancel.is_cancelled() {
            inner.state.lock().set_job_phase(job.id, JobPhase::Skipped);
            return JobReport::new(&job, None);
        }

        inner.state.lock().set_job_phase(job.id, JobPhase::Encoding);
        inner.events.broadcast(EventPayload::JobStarted {
            job_id: job.id,
            source: job.source.to_string(),
            output_file_name: job.output_file_name.clone(),
        });

        let log = {
            let events = Arc::clone(&inner.events);
            let job_id = job.id;
            LogSender::new(move |line| {
                tracing::trace!(job_id = %job_id, "{line}");
                events.broadcast(EventPayload::JobLog {
                    job_id,
                    line: line.to_string(),
                });
            })
        };

        let result = invoker::invoke(inner.encoder.as_ref(), job, staging, &log, cancel).await;

        if result.cancelled {
            inner.state.lock().set_job_phase(result.job.id, JobPhase::Skipped);
            return JobReport::new(&result.job, None);
        }

        if result.success {
            inner.events.broadcast(EventPayload::JobEncoded {
                job_id: result.job.id,
            });
            inner.state.lock().set_job_phase(result.job.id, JobPhase::Publishing);
        }

        let (job, outcome) = self.publish(result).await;
        let mut report = JobReport::new(&job, Some(outcome.clone()));

        match outcome {
            PublishOutcome::Published {
                locator,
                path,
                media_type,
                bytes,
            } => {
                inner.events.broadcast(EventPayload::JobPublished {
                    job_id: job.id,
                    locator: locator.clone(),
                    bytes,
                });
                if inner.share.enabled() {
                    match inner.share.share(&locator, path.as_deref(), &media_type).await {
                        Ok(()) => {
                            report.shared = true;
                            inner.events.broadcast(EventPayload::JobShared {
                                job_id: job.id,
                                locator,
                            });
                        }
                        Err(e) => {
                            tracing::warn!(job_id = %job.id, "Sharing {locator} failed: {e}");
                            report.share_error = Some(e.to_string());
                        }
                    }
                }
                inner.state.lock().set_job_phase(job.id, JobPhase::Done);
            }
            PublishOutcome::EncodeFailed { log } => {
                self.fail(&job, FailureStage::Encode, &last_lines(&log, 5));
            }
            PublishOutcome::PublishFailed { error } => {
                self.fail(&job, FailureStage::Publish, &error);
            }
        }

        report
    }

    /// Run the blocking copy off the async executor.
    async fn publish(&self, result: EncodeResult) -> (TranscodeJob, PublishOutcome) {
        let destination = Arc::clone(&self.inner.destination);
        let job = result.job.clone();
        let task =
            tokio::task::spawn_blocking(move || publisher::publish(&result, destination.as_ref()));
        match task.await {
            Ok(outcome) => (job, outcome),
            Err(e) => (
                job,
                PublishOutcome::PublishFailed {
                    error: format!("publish task failed: {e}"),
                },
            ),
        }
    }

    fn fail(&self, job: &TranscodeJob, stage: FailureStage, error: &str) {
        tracing::error!(
            job_id = %job.id,
            "{} failed for {}: {error}",
            stage.as_str(),
            job.source.display_name()
        );
        self.inner.state.lock().set_job_phase(job.id, JobPhase::Error);
        self.inner.events.broadcast(EventPayload::JobFailed {
            job_id: job.id,
            stage,
            error: error.to_string(),
        });
    }
}

/// Resets the state to [`RunPhase::Idle`] when dropped.
struct IdleOnDrop<'a>(&'a Mutex<PipelineState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        *self.0.lock() = PipelineState::default();
    }
}

/// The last `n` non-empty lines of a log, for one-line summaries.
fn last_lines(log: &str, n: usize) -> String {
    let lines: Vec<&str> = log.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
