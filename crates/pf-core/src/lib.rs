//! pf-core: shared types, IDs, errors, configuration, and event system.
//!
//! This crate is the foundational dependency for all other pf-* crates,
//! providing type-safe identifiers, a unified error type, the image
//! format and quality model, transcoding job types, application
//! configuration, and a broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod job;
pub mod media;
pub mod paths;
pub mod quality;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use job::{AvifTuning, EncodeSettings, SourceImage, TranscodeJob};
pub use media::TargetFormat;
pub use quality::{Crf, WebpQuality};
