//! Build pipeline module for esmbuild.
//!
//! Sequences the build stages (script transform, stylesheet variants,
//! passthrough asset copy) over a resolved configuration, each stage
//! independently incremental and interceptable through the hook
//! registry.
//!
//! # Overview
//!
//! - **Context**: the per-process [`BuildContext`] owning the resolved
//!   configuration, the lazy hook registry, and per-stage run state.
//! - **Stages**: input selection (mask, ignore set, since-filter),
//!   transform seam, mirrored output writing.
//! - **Pipeline**: clean plus the fixed full-build stage order.

pub mod assets;
pub mod context;
pub mod pipeline;
pub mod script;
pub mod stage;
pub mod style;

pub use context::BuildContext;
pub use pipeline::{BuildSummary, Pipeline};
pub use stage::{StageId, StageOutcome};

use std::path::PathBuf;
use thiserror::Error;

/// Error during build execution.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration error, fatal before any stage runs
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid mask or ignore pattern
    #[error("Pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
    /// Script transform failure; fails the whole stage
    #[error("Script transform failed for {}: {message}", file.display())]
    Transform { file: PathBuf, message: String },
}
