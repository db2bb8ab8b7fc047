//! esmbuild - Library for building ES-module distributions
//!
//! This library provides functionality to:
//! - Resolve build options from CLI flags, a project config file, and
//!   the launcher's environment payload
//! - Run the staged build pipeline (scripts, stylesheet variants,
//!   passthrough assets) with incremental input selection
//! - Extend or veto individual stages through the hook registry
//! - Watch the source tree and rebuild the affected stage per change

pub mod build;
pub mod cli;
pub mod config;
pub mod hooks;
pub mod launcher;
pub mod report;
pub mod watch;
