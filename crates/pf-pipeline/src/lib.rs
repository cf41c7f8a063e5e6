//! # pf-pipeline
//!
//! The single-worker transcoding pipeline.
//!
//! Each selected image flows through the same steps:
//!
//! 1. [`builder`] turns it into a [`TranscodeJob`](pf_core::TranscodeJob)
//!    with a collision-free output name.
//! 2. [`invoker`] runs the [`Encoder`](pf_av::Encoder) and captures its log.
//! 3. [`publisher`] copies the staged file into a [`Destination`].
//! 4. [`share`] optionally hands the published file to another program.
//!
//! The [`Orchestrator`] drives a run on a background task and reports every
//! job's outcome.

pub mod builder;
pub mod destination;
pub mod invoker;
pub mod orchestrator;
pub mod publisher;
pub mod share;

pub use builder::{build_job, job_for, output_file_name};
pub use destination::{
    CreatedFile, Destination, DestinationToken, DirectoryDestination, TreeDestination,
};
pub use invoker::{invoke, EncodeResult};
pub use orchestrator::{
    JobPhase, JobReport, JobStatus, Orchestrator, PipelineState, RunHandle, RunPhase, RunReport,
    RunRequest, StartError,
};
pub use publisher::{publish, PublishOutcome};
pub use share::{CommandShare, NoShare, Share};
