//! Stage protocol plumbing: identities, input selection, output
//! mirroring.
//!
//! Every stage follows the same protocol: select inputs (an explicit
//! file from the watcher, or the stage's whole mask), filter them by the
//! ignore set and by modification time since the stage's last successful
//! run, transform, and write outputs mirroring the source-relative path
//! under the output root.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::build::context::BuildContext;
use crate::build::BuildError;
use crate::config::schema::{BuildConfig, Mask, StyleVariant};

/// One independently-triggerable build stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Script,
    Style(StyleVariant),
    Assets,
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageId::Script => f.write_str("js"),
            StageId::Style(variant) => variant.fmt(f),
            StageId::Assets => f.write_str("others"),
        }
    }
}

/// What a stage invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage ran; lists the output files written.
    Built(Vec<PathBuf>),
    /// A hook vetoed the stage. Not an error.
    Paused,
}

impl StageOutcome {
    pub fn is_paused(&self) -> bool {
        matches!(self, StageOutcome::Paused)
    }

    /// Output files written, empty when paused.
    pub fn outputs(&self) -> &[PathBuf] {
        match self {
            StageOutcome::Built(files) => files,
            StageOutcome::Paused => &[],
        }
    }
}

/// The mask a stage selects inputs from.
pub fn stage_mask(config: &BuildConfig, stage: StageId) -> &Mask {
    match stage {
        StageId::Script => &config.script_mask,
        StageId::Style(variant) => config.style_mask(variant),
        StageId::Assets => &config.asset_mask,
    }
}

/// Select the input files for one stage invocation.
///
/// `file` scopes the run to a single changed file; `None` means the
/// stage's whole mask. Either way the ignore set applies, and only
/// files modified after the stage's last successful run are kept.
pub fn select_inputs(
    ctx: &BuildContext,
    stage: StageId,
    file: Option<&Path>,
) -> Result<Vec<PathBuf>, BuildError> {
    let config = ctx.config();
    let mask = stage_mask(config, stage);

    let candidates: Vec<PathBuf> = match file {
        Some(path) if mask.matches(path) => vec![path.to_path_buf()],
        Some(_) => Vec::new(),
        None => mask.expand()?,
    };

    let since = ctx.last_run(stage);
    let selected = candidates
        .into_iter()
        .filter(|path| !config.is_ignored(path))
        .filter(|path| modified_since(path, since))
        .collect();
    Ok(selected)
}

/// Whether a file was modified strictly after `since`.
///
/// Unreadable metadata drops the file from this run; the next change
/// event brings it back.
fn modified_since(path: &Path, since: Option<SystemTime>) -> bool {
    let Some(since) = since else {
        return true;
    };
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified > since,
        Err(_) => false,
    }
}

/// Mirror a source file into the output tree, optionally remapping the
/// extension (compiled stylesheets emit `css`, compiled scripts `js`).
///
/// Returns `None` for paths outside the source root.
pub fn output_path(config: &BuildConfig, source: &Path, extension: Option<&str>) -> Option<PathBuf> {
    let mirrored = config.mirror_output(source)?;
    match extension {
        Some(ext) => Some(mirrored.with_extension(ext)),
        None => Some(mirrored),
    }
}

/// Write an output file, creating parent directories as needed.
pub fn write_output(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// Copy a source file byte-for-byte to its mirrored output path.
pub fn copy_through(config: &BuildConfig, source: &Path) -> io::Result<Option<PathBuf>> {
    let Some(target) = output_path(config, source, None) else {
        return Ok(None);
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, &target)?;
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RawOptions;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn context_in(temp: &TempDir) -> BuildContext {
        let raw = RawOptions {
            root: Some(temp.path().display().to_string()),
            ..Default::default()
        };
        let config = crate::config::schema::BuildConfig::resolve(&raw);
        fs::create_dir_all(&config.src_dir).unwrap();
        BuildContext::new(config)
    }

    #[test]
    fn test_select_whole_mask_on_first_run() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        let src = &ctx.config().src_dir;
        fs::write(src.join("a.js"), "a").unwrap();
        fs::write(src.join("b.scss"), "b").unwrap();

        let inputs = select_inputs(&ctx, StageId::Script, None).unwrap();
        assert_eq!(inputs, vec![src.join("a.js")]);
    }

    #[test]
    fn test_since_filter_excludes_unchanged_files() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        let src = ctx.config().src_dir.clone();
        fs::write(src.join("a.js"), "a").unwrap();
        fs::write(src.join("b.js"), "b").unwrap();

        sleep(Duration::from_millis(20));
        ctx.commit_run(StageId::Script, SystemTime::now());
        let inputs = select_inputs(&ctx, StageId::Script, None).unwrap();
        assert!(inputs.is_empty());

        sleep(Duration::from_millis(20));
        fs::write(src.join("b.js"), "changed").unwrap();
        let inputs = select_inputs(&ctx, StageId::Script, None).unwrap();
        assert_eq!(inputs, vec![src.join("b.js")]);
    }

    #[test]
    fn test_explicit_file_scope() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        let src = ctx.config().src_dir.clone();
        fs::write(src.join("a.js"), "a").unwrap();
        fs::write(src.join("b.js"), "b").unwrap();

        let scoped = src.join("a.js");
        let inputs = select_inputs(&ctx, StageId::Script, Some(&scoped)).unwrap();
        assert_eq!(inputs, vec![scoped]);

        // A scoped file outside the stage's mask selects nothing.
        let foreign = src.join("b.scss");
        let inputs = select_inputs(&ctx, StageId::Script, Some(&foreign)).unwrap();
        assert!(inputs.is_empty());
    }

    #[test]
    fn test_ignored_files_are_dropped() {
        let temp = TempDir::new().unwrap();
        let raw = RawOptions {
            root: Some(temp.path().display().to_string()),
            ignore: Some("src/**/*.test.js".to_string()),
            ..Default::default()
        };
        let config = crate::config::schema::BuildConfig::resolve(&raw);
        fs::create_dir_all(&config.src_dir).unwrap();
        let ctx = BuildContext::new(config);
        let src = ctx.config().src_dir.clone();
        fs::write(src.join("a.js"), "a").unwrap();
        fs::write(src.join("a.test.js"), "t").unwrap();

        let inputs = select_inputs(&ctx, StageId::Script, None).unwrap();
        assert_eq!(inputs, vec![src.join("a.js")]);
    }

    #[test]
    fn test_output_path_extension_remap() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        let config = ctx.config();

        let scss = config.src_dir.join("theme/a.scss");
        assert_eq!(
            output_path(config, &scss, Some("css")),
            Some(config.out_dir.join("theme/a.css"))
        );

        let ts = config.src_dir.join("a.ts");
        assert_eq!(output_path(config, &ts, Some("js")), Some(config.out_dir.join("a.js")));

        let png = config.src_dir.join("img/logo.png");
        assert_eq!(output_path(config, &png, None), Some(config.out_dir.join("img/logo.png")));
    }

    #[test]
    fn test_copy_through() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(&temp);
        let source = ctx.config().src_dir.join("data/x.json");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"{\"a\":1}").unwrap();

        let target = copy_through(ctx.config(), &source).unwrap().unwrap();
        assert_eq!(target, ctx.config().out_dir.join("data/x.json"));
        assert_eq!(fs::read(&target).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_stage_display_names() {
        assert_eq!(StageId::Script.to_string(), "js");
        assert_eq!(StageId::Style(StyleVariant::Scss).to_string(), "scss");
        assert_eq!(StageId::Assets.to_string(), "others");
    }
}
