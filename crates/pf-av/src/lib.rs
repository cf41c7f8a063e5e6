//! # pf-av
//!
//! External tool management and image encoding for the pixforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the path to
//!   ffmpeg, honoring a configured override.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support, plus a streaming mode that forwards log lines as they arrive
//!   and can be cancelled.
//! - **Encoding** ([`Encoder`], [`FfmpegEncoder`]) -- the one-method seam the
//!   pipeline calls per image, and its ffmpeg implementation.
//! - **Scratch staging** ([`ScratchArea`], [`RunScratch`]) -- per-run
//!   directories encoder output is written to before publishing.

pub mod command;
pub mod encoder;
pub mod scratch;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{LogSender, StreamedOutput, ToolCommand, ToolOutput};
pub use encoder::{EncodeOutput, EncodeRequest, Encoder, FfmpegEncoder};
pub use scratch::{RunScratch, ScratchArea};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
