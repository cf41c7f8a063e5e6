//! pixforge: convert selected images to AVIF or WEBP and save them to a
//! user-chosen destination.
//!
//! The pipeline itself lives in the `pf-*` crates; this crate holds the
//! command-line glue around it.

pub mod app;
pub mod config;
pub mod report;
pub mod selection;
