//! Watch mode: incremental rebuilds on file changes.
//!
//! Watches the source root recursively and routes each event through the
//! same pipeline the full build uses. A changed file triggers a run of
//! exactly the stage whose mask owns it, scoped to that file; a new
//! directory triggers a full stage pass without cleaning; a removed
//! source removes its mapped outputs. Build failures during a watch
//! session are reported and watching continues.
//!
//! Raw backend events are consumed without debouncing: the since-filter
//! already deduplicates redundant change bursts, and deletion handling
//! needs the event kind the debouncers erase.

use notify::event::{CreateKind, EventKind, RemoveKind};
use notify::{RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use thiserror::Error;

use crate::build::pipeline::Pipeline;
use crate::build::script;
use crate::build::stage::StageId;
use crate::build::BuildContext;
use crate::config::schema::{BuildConfig, StyleVariant};

/// Error during watch mode.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize the file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add the watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Event channel closed
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// Source directory not found
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// The stage whose mask owns a source path, if any.
///
/// Checked in pipeline order; the script mask wins for `.js` even though
/// no other mask overlaps it today.
pub fn route_stage(config: &BuildConfig, path: &Path) -> Option<StageId> {
    if config.script_mask.matches(path) {
        return Some(StageId::Script);
    }
    for variant in StyleVariant::ALL {
        if config.style_mask(variant).matches(path) {
            return Some(StageId::Style(variant));
        }
    }
    if config.asset_mask.matches(path) {
        return Some(StageId::Assets);
    }
    None
}

/// The output files a removed source maps to.
///
/// Stylesheet sources map to their compiled `.css`; script sources map
/// to the emitted `.js` plus its possible `.map` sibling; everything
/// else mirrors as-is. Returns the empty list for paths outside the
/// source root.
pub fn deletion_targets(config: &BuildConfig, source: &Path) -> Vec<PathBuf> {
    let Some(mirrored) = config.mirror_output(source) else {
        return Vec::new();
    };
    match source.extension().and_then(|e| e.to_str()) {
        Some("less") | Some("scss") => vec![mirrored.with_extension("css")],
        Some("js") | Some("jsx") | Some("ts") | Some("tsx") => {
            let out = mirrored.with_extension("js");
            let map = script::map_sibling(&out);
            vec![out, map]
        }
        _ => vec![mirrored],
    }
}

/// Watch the source root and rebuild on changes.
///
/// Blocks until the event channel closes (normally never; interrupted
/// with Ctrl+C).
pub fn watch_and_rebuild(ctx: &BuildContext, pipeline: &Pipeline<'_>) -> Result<(), WatchError> {
    let config = ctx.config();
    let reporter = ctx.reporter();
    if !config.src_dir.exists() {
        return Err(WatchError::SourceNotFound(config.src_dir.clone()));
    }

    let (tx, rx) = channel();
    let mut watcher =
        notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(WatchError::WatcherInit)?;
    watcher.watch(&config.src_dir, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;
    reporter.watcher(&format!("watching {} for changes...", config.src_dir.display()));

    loop {
        match rx.recv() {
            Ok(Ok(event)) => handle_event(ctx, pipeline, &event),
            Ok(Err(error)) => {
                reporter.error(&format!("[watcher] backend error: {}", error));
            }
            Err(error) => return Err(WatchError::ChannelError(error.to_string())),
        }
    }
}

/// Dispatch one backend event. Never fails: build and IO errors are
/// reported and the session continues.
pub(crate) fn handle_event(ctx: &BuildContext, pipeline: &Pipeline<'_>, event: &notify::Event) {
    let config = ctx.config();
    for path in &event.paths {
        if config.is_ignored(path) {
            continue;
        }
        match &event.kind {
            EventKind::Create(CreateKind::Folder) => on_dir_added(ctx, pipeline, path),
            EventKind::Create(_) => {
                if path.is_dir() {
                    on_dir_added(ctx, pipeline, path);
                } else {
                    on_file_changed(ctx, pipeline, path);
                }
            }
            EventKind::Modify(_) => {
                if path.is_file() {
                    on_file_changed(ctx, pipeline, path);
                } else if path.is_dir() {
                    // A directory moved into the tree arrives as a
                    // rename-style modification, not a creation.
                    on_dir_added(ctx, pipeline, path);
                } else {
                    // Some backends report deletions as modifications of
                    // a path that no longer exists.
                    on_removed(ctx, path);
                }
            }
            EventKind::Remove(RemoveKind::File) => on_file_removed(ctx, path),
            EventKind::Remove(RemoveKind::Folder) => on_dir_removed(ctx, path),
            EventKind::Remove(_) => on_removed(ctx, path),
            _ => {}
        }
    }
}

fn on_file_changed(ctx: &BuildContext, pipeline: &Pipeline<'_>, path: &Path) {
    let Some(stage) = route_stage(ctx.config(), path) else {
        return;
    };
    ctx.reporter().watcher(&format!("File {} was changed", path.display()));
    if let Err(error) = pipeline.run_stage(stage, Some(path)) {
        ctx.reporter().error(&format!("[watcher] build {} failed: {}", stage, error));
    }
}

fn on_dir_added(ctx: &BuildContext, pipeline: &Pipeline<'_>, path: &Path) {
    let reporter = ctx.reporter();
    reporter.watcher(&format!("Dir {} was added, build all start...", path.display()));
    match pipeline.build_stages() {
        Ok(_) => reporter.watcher("build all end."),
        Err(error) => reporter.error(&format!("[watcher] build all failed: {}", error)),
    }
}

fn on_file_removed(ctx: &BuildContext, path: &Path) {
    for target in deletion_targets(ctx.config(), path) {
        if fs::remove_file(&target).is_ok() {
            ctx.reporter().watcher(&format!("File {} was removed", target.display()));
        }
    }
}

fn on_dir_removed(ctx: &BuildContext, path: &Path) {
    let Some(mirrored) = ctx.config().mirror_output(path) else {
        return;
    };
    if fs::remove_dir_all(&mirrored).is_ok() {
        ctx.reporter().watcher(&format!("Dir {} was removed", mirrored.display()));
    }
}

/// Removal of unknown kind: the source is already gone, so classify by
/// the mirrored output path's own shape.
fn on_removed(ctx: &BuildContext, path: &Path) {
    let mirrored_dir =
        ctx.config().mirror_output(path).is_some_and(|mirrored| mirrored.is_dir());
    if mirrored_dir {
        on_dir_removed(ctx, path);
    } else {
        on_file_removed(ctx, path);
    }
}
